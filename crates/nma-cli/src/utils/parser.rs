use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid grid dimensions '{0}'. Expected 'N' or 'NX,NY,NZ' with positive integers.")]
    InvalidDims(String),

    #[error("Invalid z rescale '{0}'. Expected 'SPACING,EXTENT' (e.g., '0.29,20.0').")]
    InvalidRescale(String),
}

/// Parses `N` (a cubic grid) or `NX,NY,NZ`.
pub fn parse_dims(value: &str) -> Result<[usize; 3], ParseError> {
    let invalid = || ParseError::InvalidDims(value.to_string());
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let dims = match parts[..] {
        [n] => [n; 3],
        [nx, ny, nz] => [nx, ny, nz],
        _ => return Err(invalid()),
    };
    if dims.contains(&0) {
        return Err(invalid());
    }
    Ok(dims)
}

/// Parses `SPACING,EXTENT` for the z rescaling of the mean mesh.
pub fn parse_rescale(value: &str) -> Result<(f64, f64), ParseError> {
    let invalid = || ParseError::InvalidRescale(value.to_string());
    let (spacing, extent) = value.split_once(',').ok_or_else(invalid)?;
    let spacing: f64 = spacing.trim().parse().map_err(|_| invalid())?;
    let extent: f64 = extent.trim().parse().map_err(|_| invalid())?;
    if !(spacing > 0.0 && extent > 0.0) {
        return Err(invalid());
    }
    Ok((spacing, extent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_accept_single_and_triple_values() {
        assert_eq!(parse_dims("64"), Ok([64, 64, 64]));
        assert_eq!(parse_dims("128, 96,40"), Ok([128, 96, 40]));
    }

    #[test]
    fn dims_reject_malformed_values() {
        for bad in ["", "0", "4,4", "4,4,4,4", "a,b,c", "-1", "8,0,8"] {
            assert_eq!(parse_dims(bad), Err(ParseError::InvalidDims(bad.to_string())));
        }
    }

    #[test]
    fn rescale_parses_spacing_and_extent() {
        assert_eq!(parse_rescale("0.29,20"), Ok((0.29, 20.0)));
        assert!(parse_rescale("0.29").is_err());
        assert!(parse_rescale("0,20").is_err());
        assert!(parse_rescale("x,1").is_err());
    }
}

//! NumPy `.npy` (format version 1.0) persistence for voxel masks.
//!
//! Grids are stored in C order with shape `(nz, ny, nx)`, matching the in-memory layout of
//! [`VoxelGrid`], so a saved mask loads in NumPy as `mask[z, y, x]`.

use crate::core::models::grid::{GridError, GridSpec, MeanMask, VoxelGrid};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an .npy file (bad magic bytes)")]
    BadMagic,
    #[error("Unsupported .npy format version {0}.{1}")]
    UnsupportedVersion(u8, u8),
    #[error("Malformed .npy header: {0}")]
    Header(String),
    #[error("Unsupported array layout: {0}")]
    Unsupported(String),
    #[error("Array data does not match its header: {0}")]
    Grid(#[from] GridError),
}

/// Element types that can be written to an `.npy` file.
pub trait NpyElement: Copy {
    const DESCR: &'static str;
    fn write_le(self, out: &mut Vec<u8>);
}

impl NpyElement for u8 {
    const DESCR: &'static str = "|u1";
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

fn header_for(descr: &str, dims: [usize; 3]) -> Vec<u8> {
    let [nx, ny, nz] = dims;
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}, {}), }}",
        descr, nz, ny, nx
    );
    // magic(6) + version(2) + header length(2) + dict + padding + newline
    let unpadded = MAGIC.len() + 4 + dict.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;

    let mut header = Vec::with_capacity(unpadded + padding);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&[1, 0]);
    let header_len = (dict.len() + padding + 1) as u16;
    header.extend_from_slice(&header_len.to_le_bytes());
    header.extend_from_slice(dict.as_bytes());
    header.extend(std::iter::repeat_n(b' ', padding));
    header.push(b'\n');
    header
}

pub fn write_grid<T: NpyElement>(grid: &VoxelGrid<T>, writer: &mut impl Write) -> Result<(), NpyError> {
    writer.write_all(&header_for(T::DESCR, grid.dims()))?;
    let mut body = Vec::with_capacity(grid.as_slice().len() * std::mem::size_of::<T>());
    for &value in grid.as_slice() {
        value.write_le(&mut body);
    }
    writer.write_all(&body)?;
    Ok(())
}

pub fn write_grid_to_path<T: NpyElement>(
    grid: &VoxelGrid<T>,
    path: impl AsRef<Path>,
) -> Result<(), NpyError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_grid(grid, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, PartialEq)]
struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn dict_value<'a>(dict: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let pattern = format!("'{}':", key);
    let start = dict
        .find(&pattern)
        .ok_or_else(|| NpyError::Header(format!("missing key '{}'", key)))?
        + pattern.len();
    Ok(dict[start..].trim_start())
}

fn parse_header(dict: &str) -> Result<Header, NpyError> {
    let descr_rest = dict_value(dict, "descr")?;
    let descr = descr_rest
        .strip_prefix('\'')
        .and_then(|s| s.split('\'').next())
        .ok_or_else(|| NpyError::Header("descr is not a quoted string".into()))?
        .to_string();

    let fortran_order = dict_value(dict, "fortran_order")?.starts_with("True");

    let shape_rest = dict_value(dict, "shape")?;
    let inner = shape_rest
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| NpyError::Header("shape is not a tuple".into()))?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::Header(format!("invalid shape entry '{}'", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Header {
        descr,
        fortran_order,
        shape,
    })
}

/// Reads a 3-D `u8`, `f32` or `f64` array as a scalar field with unit spacing.
pub fn read_grid(reader: &mut impl Read) -> Result<MeanMask, NpyError> {
    let mut preamble = [0u8; 10];
    reader.read_exact(&mut preamble)?;
    if &preamble[..6] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (preamble[6], preamble[7]);
    let header_len = match major {
        1 => u16::from_le_bytes([preamble[8], preamble[9]]) as usize,
        2 | 3 => {
            let mut rest = [0u8; 2];
            reader.read_exact(&mut rest)?;
            u32::from_le_bytes([preamble[8], preamble[9], rest[0], rest[1]]) as usize
        }
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let mut dict_bytes = vec![0u8; header_len];
    reader.read_exact(&mut dict_bytes)?;
    let dict = String::from_utf8_lossy(&dict_bytes);
    let header = parse_header(&dict)?;

    if header.fortran_order {
        return Err(NpyError::Unsupported("Fortran-ordered arrays".into()));
    }
    let [nz, ny, nx] = header.shape[..] else {
        return Err(NpyError::Unsupported(format!(
            "expected a 3-D array, found shape {:?}",
            header.shape
        )));
    };
    if GridSpec::checked_voxel_count([nx, ny, nz]).is_none() {
        return Err(NpyError::Header(format!(
            "shape {:?} holds more elements than can be addressed",
            header.shape
        )));
    }
    let spec = GridSpec::new([nx, ny, nz])?;

    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;

    let values: Vec<f32> = match header.descr.as_str() {
        "|u1" | "<u1" => body.iter().map(|&b| b as f32).collect(),
        "<f4" => body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        "<f8" => body
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
        other => return Err(NpyError::Unsupported(format!("dtype '{}'", other))),
    };

    Ok(VoxelGrid::from_vec(spec, values)?)
}

pub fn read_grid_from_path(path: impl AsRef<Path>) -> Result<MeanMask, NpyError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_grid(&mut reader)
}

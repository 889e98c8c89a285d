use crate::core::io::traits::MeshFile;
use crate::core::models::mesh::{MeshError, TriangleMesh};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const HEADER_PREFIX: &str = "# vtk DataFile Version";

#[derive(Debug, Error)]
pub enum VtkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: VtkParseErrorKind },
    #[error("Unsupported dataset type '{0}'; only POLYDATA is supported")]
    UnsupportedDataset(String),
    #[error("Missing required section: {0}")]
    MissingSection(&'static str),
    #[error("Invalid mesh topology: {0}")]
    Mesh(#[from] MeshError),
}

#[derive(Debug, Error, PartialEq)]
pub enum VtkParseErrorKind {
    #[error("File does not start with a '# vtk DataFile Version' header")]
    MissingHeader,
    #[error("Unknown file encoding '{0}'; expected ASCII or BINARY")]
    InvalidEncoding(String),
    #[error("Unexpected keyword '{0}'")]
    UnexpectedKeyword(String),
    #[error("Invalid integer '{0}'")]
    InvalidInt(String),
    #[error("Invalid floating point value '{0}'")]
    InvalidFloat(String),
    #[error("Unsupported scalar type '{0}'")]
    UnsupportedScalarType(String),
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Binary section needs {expected} bytes, only {available} remain")]
    TruncatedBinary { expected: usize, available: usize },
    #[error("Cell list is inconsistent with its declared size")]
    CellSizeMismatch,
    #[error("Declared count {0} does not fit in the file")]
    CountTooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Float32,
    Float64,
    Int32,
    Int64,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "float" => Some(Self::Float32),
            "double" => Some(Self::Float64),
            "int" | "vtktypeint32" => Some(Self::Int32),
            "vtkidtype" | "vtktypeint64" => Some(Self::Int64),
            _ => None,
        }
    }

    fn size(self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
            Self::Float64 | Self::Int64 => 8,
        }
    }

    fn decode_be(self, bytes: &[u8]) -> f64 {
        match self {
            Self::Float32 => f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::Float64 => f64::from_be_bytes(bytes[..8].try_into().unwrap_or([0; 8])),
            Self::Int32 => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::Int64 => i64::from_be_bytes(bytes[..8].try_into().unwrap_or([0; 8])) as f64,
        }
    }
}

struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            line: 1,
        }
    }

    fn error(&self, kind: VtkParseErrorKind) -> VtkError {
        VtkError::Parse {
            line: self.line,
            kind,
        }
    }

    fn next_line(&mut self) -> Option<String> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let text = String::from_utf8_lossy(&rest[..end])
            .trim_end_matches('\r')
            .to_string();
        self.pos += (end + 1).min(rest.len());
        self.line += 1;
        Some(text)
    }

    fn next_token(&mut self) -> Option<&'a str> {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            if self.data[self.pos] == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        let start = self.pos;
        while self.pos < self.data.len() && !self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        std::str::from_utf8(&self.data[start..self.pos]).ok()
    }

    fn expect_token(&mut self) -> Result<&'a str, VtkError> {
        self.next_token()
            .ok_or_else(|| self.error(VtkParseErrorKind::UnexpectedEof))
    }

    fn expect_usize(&mut self) -> Result<usize, VtkError> {
        let token = self.expect_token()?;
        token
            .parse()
            .map_err(|_| self.error(VtkParseErrorKind::InvalidInt(token.to_string())))
    }

    /// Consumes the remainder of the current line, so that binary payloads start at the next byte.
    fn finish_line(&mut self) {
        while self.pos < self.data.len() {
            let byte = self.data[self.pos];
            self.pos += 1;
            if byte == b'\n' {
                self.line += 1;
                break;
            }
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take_bytes(&mut self, len: usize) -> Result<&'a [u8], VtkError> {
        let available = self.remaining();
        if len > available {
            return Err(self.error(VtkParseErrorKind::TruncatedBinary {
                expected: len,
                available,
            }));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_values(
        &mut self,
        encoding: Encoding,
        scalar: ScalarType,
        count: usize,
    ) -> Result<Vec<f64>, VtkError> {
        match encoding {
            Encoding::Ascii => {
                // Every ASCII value takes at least a digit and a separator.
                let mut values = Vec::with_capacity(count.min(self.remaining() / 2));
                for _ in 0..count {
                    let token = self.expect_token()?;
                    let value: f64 = token.parse().map_err(|_| {
                        self.error(VtkParseErrorKind::InvalidFloat(token.to_string()))
                    })?;
                    values.push(value);
                }
                Ok(values)
            }
            Encoding::Binary => {
                self.finish_line();
                let len = count
                    .checked_mul(scalar.size())
                    .ok_or_else(|| self.error(VtkParseErrorKind::CountTooLarge(count)))?;
                let bytes = self.take_bytes(len)?;
                Ok(bytes
                    .chunks_exact(scalar.size())
                    .map(|chunk| scalar.decode_be(chunk))
                    .collect())
            }
        }
    }

    fn read_indices(
        &mut self,
        encoding: Encoding,
        scalar: ScalarType,
        count: usize,
    ) -> Result<Vec<usize>, VtkError> {
        match encoding {
            Encoding::Ascii => {
                let mut indices = Vec::with_capacity(count.min(self.remaining() / 2));
                for _ in 0..count {
                    indices.push(self.expect_usize()?);
                }
                Ok(indices)
            }
            Encoding::Binary => {
                let values = self.read_values(encoding, scalar, count)?;
                values
                    .into_iter()
                    .map(|v| {
                        if v < 0.0 {
                            Err(self.error(VtkParseErrorKind::InvalidInt(v.to_string())))
                        } else {
                            Ok(v as usize)
                        }
                    })
                    .collect()
            }
        }
    }

    fn skip_metadata(&mut self) {
        self.finish_line();
        while let Some(line) = self.next_line() {
            if line.trim().is_empty() {
                break;
            }
        }
    }
}

fn split_counted_cells(flat: &[usize], cell_count: usize) -> Option<Vec<Vec<usize>>> {
    // Each cell occupies at least its arity entry.
    let mut cells = Vec::with_capacity(cell_count.min(flat.len()));
    let mut pos = 0;
    for _ in 0..cell_count {
        let arity = *flat.get(pos)?;
        let end = pos.checked_add(1)?.checked_add(arity)?;
        cells.push(flat.get(pos + 1..end)?.to_vec());
        pos = end;
    }
    (pos == flat.len()).then_some(cells)
}

fn split_offset_cells(offsets: &[usize], connectivity: &[usize]) -> Option<Vec<Vec<usize>>> {
    offsets
        .windows(2)
        .map(|w| connectivity.get(w[0]..w[1]).map(<[usize]>::to_vec))
        .collect()
}

fn strip_to_triangles(strip: &[usize]) -> Vec<Vec<usize>> {
    strip
        .windows(3)
        .enumerate()
        .map(|(i, w)| {
            if i % 2 == 0 {
                vec![w[0], w[1], w[2]]
            } else {
                vec![w[1], w[0], w[2]]
            }
        })
        .collect()
}

/// Reads a cell section in either the classic `n size` layout or the `OFFSETS`/`CONNECTIVITY`
/// layout used since file version 5.
fn read_cells(scanner: &mut Scanner, encoding: Encoding) -> Result<Vec<Vec<usize>>, VtkError> {
    let cell_count = scanner.expect_usize()?;
    let size = scanner.expect_usize()?;

    let saved = (scanner.pos, scanner.line);
    let next = scanner.next_token();
    if next.is_some_and(|t| t.eq_ignore_ascii_case("OFFSETS")) {
        let offset_type = scanner.expect_token()?;
        let offset_scalar = ScalarType::parse(offset_type).ok_or_else(|| {
            scanner.error(VtkParseErrorKind::UnsupportedScalarType(offset_type.into()))
        })?;
        let offsets = scanner.read_indices(encoding, offset_scalar, cell_count)?;

        let keyword = scanner.expect_token()?;
        if !keyword.eq_ignore_ascii_case("CONNECTIVITY") {
            return Err(scanner.error(VtkParseErrorKind::UnexpectedKeyword(keyword.into())));
        }
        let conn_type = scanner.expect_token()?;
        let conn_scalar = ScalarType::parse(conn_type).ok_or_else(|| {
            scanner.error(VtkParseErrorKind::UnsupportedScalarType(conn_type.into()))
        })?;
        let connectivity = scanner.read_indices(encoding, conn_scalar, size)?;
        return split_offset_cells(&offsets, &connectivity)
            .ok_or_else(|| scanner.error(VtkParseErrorKind::CellSizeMismatch));
    }

    (scanner.pos, scanner.line) = saved;
    let flat = scanner.read_indices(encoding, ScalarType::Int32, size)?;
    split_counted_cells(&flat, cell_count)
        .ok_or_else(|| scanner.error(VtkParseErrorKind::CellSizeMismatch))
}

/// VTK legacy polydata (`.vtk`) surface meshes.
///
/// Polygons are fan-triangulated and triangle strips are unrolled; vertex and line cells
/// carry no surface and are skipped. Point and cell attribute sections are ignored.
pub struct VtkFile;

impl MeshFile for VtkFile {
    type Error = VtkError;

    fn read_from(reader: &mut impl BufRead) -> Result<TriangleMesh, Self::Error> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let mut scanner = Scanner::new(&data);

        let header = scanner
            .next_line()
            .ok_or_else(|| scanner.error(VtkParseErrorKind::MissingHeader))?;
        if !header.trim_start().starts_with(HEADER_PREFIX) {
            return Err(VtkError::Parse {
                line: 1,
                kind: VtkParseErrorKind::MissingHeader,
            });
        }
        let _title = scanner.next_line();
        let encoding_line = scanner
            .next_line()
            .ok_or_else(|| scanner.error(VtkParseErrorKind::UnexpectedEof))?;
        let encoding = match encoding_line.trim().to_ascii_uppercase().as_str() {
            "ASCII" => Encoding::Ascii,
            "BINARY" => Encoding::Binary,
            other => {
                return Err(VtkError::Parse {
                    line: 3,
                    kind: VtkParseErrorKind::InvalidEncoding(other.to_string()),
                });
            }
        };

        let keyword = scanner.expect_token()?;
        if !keyword.eq_ignore_ascii_case("DATASET") {
            return Err(scanner.error(VtkParseErrorKind::UnexpectedKeyword(keyword.into())));
        }
        let dataset = scanner.expect_token()?;
        if !dataset.eq_ignore_ascii_case("POLYDATA") {
            return Err(VtkError::UnsupportedDataset(dataset.to_string()));
        }

        let mut points: Option<Vec<Point3<f64>>> = None;
        let mut polygons: Vec<Vec<usize>> = Vec::new();

        while let Some(keyword) = scanner.next_token() {
            match keyword.to_ascii_uppercase().as_str() {
                "POINTS" => {
                    let count = scanner.expect_usize()?;
                    let type_name = scanner.expect_token()?;
                    let scalar = ScalarType::parse(type_name).ok_or_else(|| {
                        scanner.error(VtkParseErrorKind::UnsupportedScalarType(type_name.into()))
                    })?;
                    let coord_count = count
                        .checked_mul(3)
                        .ok_or_else(|| scanner.error(VtkParseErrorKind::CountTooLarge(count)))?;
                    let coords = scanner.read_values(encoding, scalar, coord_count)?;
                    points = Some(
                        coords
                            .chunks_exact(3)
                            .map(|c| Point3::new(c[0], c[1], c[2]))
                            .collect(),
                    );
                }
                "POLYGONS" => polygons.extend(read_cells(&mut scanner, encoding)?),
                "TRIANGLE_STRIPS" => {
                    for strip in read_cells(&mut scanner, encoding)? {
                        polygons.extend(strip_to_triangles(&strip));
                    }
                }
                "VERTICES" | "LINES" => {
                    read_cells(&mut scanner, encoding)?;
                }
                "METADATA" => scanner.skip_metadata(),
                "POINT_DATA" | "CELL_DATA" | "FIELD" => break,
                _ => {
                    return Err(
                        scanner.error(VtkParseErrorKind::UnexpectedKeyword(keyword.into()))
                    );
                }
            }
        }

        let points = points.ok_or(VtkError::MissingSection("POINTS"))?;
        Ok(TriangleMesh::from_polygons(points, &polygons)?)
    }

    fn write_to(mesh: &TriangleMesh, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{} 3.0", HEADER_PREFIX)?;
        writeln!(writer, "normal_mode_analysis mesh")?;
        writeln!(writer, "ASCII")?;
        writeln!(writer, "DATASET POLYDATA")?;
        writeln!(writer, "POINTS {} double", mesh.vertices().len())?;
        for v in mesh.vertices() {
            writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
        }
        let faces = mesh.faces();
        writeln!(writer, "POLYGONS {} {}", faces.len(), faces.len() * 4)?;
        for [a, b, c] in faces {
            writeln!(writer, "3 {} {} {}", a, b, c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::mesh::test_shapes::cuboid;
    use std::io::Cursor;

    const TETRA_ASCII: &str = "# vtk DataFile Version 3.0
nucleus
ASCII
DATASET POLYDATA
POINTS 4 float
0 0 0 1 0 0
0 1 0
0 0 1
POLYGONS 4 16
3 0 2 1
3 0 1 3
3 0 3 2
3 1 2 3
POINT_DATA 4
SCALARS ids int 1
LOOKUP_TABLE default
0 1 2 3
";

    fn read_str(content: &str) -> Result<TriangleMesh, VtkError> {
        VtkFile::read_from(&mut Cursor::new(content.as_bytes()))
    }

    #[test]
    fn reads_ascii_polydata_and_ignores_point_data() {
        let mesh = read_str(TETRA_ASCII).unwrap();
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.faces().len(), 4);
        assert_eq!(mesh.vertices()[3], Point3::new(0.0, 0.0, 1.0));
        assert!((mesh.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn fan_triangulates_quads_and_unrolls_strips() {
        let content = "# vtk DataFile Version 3.0
quad
ASCII
DATASET POLYDATA
POINTS 5 double
0 0 0 1 0 0 1 1 0 0 1 0 2 1 0
POLYGONS 1 5
4 0 1 2 3
TRIANGLE_STRIPS 1 5
4 0 1 3 2
LINES 1 3
2 0 4
";
        let mesh = read_str(content).unwrap();
        assert_eq!(
            mesh.faces(),
            &[[0, 1, 2], [0, 2, 3], [0, 1, 3], [3, 1, 2]]
        );
    }

    #[test]
    fn reads_version_5_offsets_and_connectivity() {
        let content = "# vtk DataFile Version 5.1
tri
ASCII
DATASET POLYDATA
POINTS 3 float
0 0 0 1 0 0 0 1 0
METADATA
INFORMATION 0

POLYGONS 2 3
OFFSETS vtktypeint64
0 3
CONNECTIVITY vtktypeint64
0 1 2
";
        let mesh = read_str(content).unwrap();
        assert_eq!(mesh.faces(), &[[0, 1, 2]]);
    }

    #[test]
    fn reads_binary_big_endian_sections() {
        let mut data = Vec::new();
        data.extend_from_slice(b"# vtk DataFile Version 3.0\nbinary\nBINARY\nDATASET POLYDATA\n");
        data.extend_from_slice(b"POINTS 3 float\n");
        for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.extend_from_slice(b"\nPOLYGONS 1 4\n");
        for value in [3i32, 0, 1, 2] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.push(b'\n');

        let mesh = VtkFile::read_from(&mut Cursor::new(data)).unwrap();
        assert_eq!(mesh.vertices()[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.faces(), &[[0, 1, 2]]);
    }

    #[test]
    fn rejects_missing_header() {
        let result = read_str("not a vtk file\n");
        assert!(matches!(
            result,
            Err(VtkError::Parse {
                line: 1,
                kind: VtkParseErrorKind::MissingHeader
            })
        ));
    }

    #[test]
    fn rejects_non_polydata_datasets() {
        let content = "# vtk DataFile Version 3.0\ngrid\nASCII\nDATASET STRUCTURED_POINTS\n";
        assert!(matches!(
            read_str(content),
            Err(VtkError::UnsupportedDataset(name)) if name == "STRUCTURED_POINTS"
        ));
    }

    #[test]
    fn rejects_invalid_coordinates_with_line_number() {
        let content = "# vtk DataFile Version 3.0\nbad\nASCII\nDATASET POLYDATA\nPOINTS 1 float\n0 abc 0\n";
        let err = read_str(content).unwrap_err();
        match err {
            VtkError::Parse { line, kind } => {
                assert_eq!(line, 6);
                assert_eq!(kind, VtkParseErrorKind::InvalidFloat("abc".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_out_of_bounds_polygon_indices() {
        let content = "# vtk DataFile Version 3.0\nbad\nASCII\nDATASET POLYDATA\nPOINTS 3 float\n0 0 0 1 0 0 0 1 0\nPOLYGONS 1 4\n3 0 1 7\n";
        assert!(matches!(
            read_str(content),
            Err(VtkError::Mesh(MeshError::FaceIndexOutOfBounds { index: 7, .. }))
        ));
    }

    #[test]
    fn rejects_cell_list_with_wrong_size() {
        let content = "# vtk DataFile Version 3.0\nbad\nASCII\nDATASET POLYDATA\nPOINTS 3 float\n0 0 0 1 0 0 0 1 0\nPOLYGONS 1 5\n3 0 1 2 0\n";
        assert!(matches!(
            read_str(content),
            Err(VtkError::Parse {
                kind: VtkParseErrorKind::CellSizeMismatch,
                ..
            })
        ));
    }

    #[test]
    fn rejects_point_counts_that_overflow() {
        for count in ["6148914691236517206", "3074457345618258602", "18446744073709551615"] {
            for encoding in ["ASCII", "BINARY"] {
                let content = format!(
                    "# vtk DataFile Version 3.0\nhuge\n{encoding}\nDATASET POLYDATA\nPOINTS {count} float\n0 0 0\n"
                );
                assert!(
                    matches!(read_str(&content), Err(VtkError::Parse { .. })),
                    "{encoding} POINTS {count}"
                );
            }
        }
    }

    #[test]
    fn rejects_cell_arity_that_overflows() {
        let content = "# vtk DataFile Version 3.0\nbad\nASCII\nDATASET POLYDATA\nPOINTS 3 float\n0 0 0 1 0 0 0 1 0\nPOLYGONS 1 2\n18446744073709551615 0\n";
        assert!(matches!(
            read_str(content),
            Err(VtkError::Parse {
                kind: VtkParseErrorKind::CellSizeMismatch,
                ..
            })
        ));
    }

    #[test]
    fn rejects_huge_cell_count_in_small_file() {
        let content = "# vtk DataFile Version 3.0\nbad\nASCII\nDATASET POLYDATA\nPOINTS 3 float\n0 0 0 1 0 0 0 1 0\nPOLYGONS 4000000000000 4\n3 0 1 2\n";
        assert!(matches!(
            read_str(content),
            Err(VtkError::Parse {
                kind: VtkParseErrorKind::CellSizeMismatch,
                ..
            })
        ));
    }

    #[test]
    fn rejects_truncated_binary_cells() {
        let mut data = Vec::new();
        data.extend_from_slice(b"# vtk DataFile Version 3.0\nbinary\nBINARY\nDATASET POLYDATA\n");
        data.extend_from_slice(b"POINTS 1 float\n");
        for value in [0.0f32; 3] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.extend_from_slice(b"\nPOLYGONS 1 4611686018427387904\n");
        data.extend_from_slice(&3i32.to_be_bytes());

        assert!(matches!(
            VtkFile::read_from(&mut Cursor::new(data)),
            Err(VtkError::Parse {
                kind: VtkParseErrorKind::CountTooLarge(_),
                ..
            })
        ));
    }

    #[test]
    fn rejects_file_without_points() {
        let content = "# vtk DataFile Version 3.0\nempty\nASCII\nDATASET POLYDATA\n";
        assert!(matches!(
            read_str(content),
            Err(VtkError::MissingSection("POINTS"))
        ));
    }

    #[test]
    fn written_file_reads_back_identically() {
        let mesh = cuboid(Point3::new(-1.5, 0.25, 2.0), Point3::new(3.0, 4.125, 9.5));
        let mut buffer = Vec::new();
        VtkFile::write_to(&mesh, &mut buffer).unwrap();

        let read_back = VtkFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(read_back, mesh);
    }
}

use crate::core::io::traits::MeshFile;
use crate::core::models::mesh::{MeshError, TriangleMesh};
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;
const SOLID_NAME: &str = "normal_mode_analysis";

#[derive(Debug, Error)]
pub enum StlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Binary STL declares {declared} facets but contains {available} bytes of facet data")]
    Truncated { declared: usize, available: usize },
    #[error("Malformed ASCII STL on line {line}: {message}")]
    Ascii { line: usize, message: String },
    #[error("Mesh has more faces ({0}) than a binary STL can hold")]
    TooManyFacets(usize),
    #[error("Invalid mesh topology: {0}")]
    Mesh(#[from] MeshError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

/// Unit normal of a triangle from its winding, or zero for a degenerate triangle.
pub fn facet_normal(triangle: &[Point3<f64>; 3]) -> Vector3<f64> {
    let [a, b, c] = triangle;
    (b - a)
        .cross(&(c - a))
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}

fn push_f32s(buffer: &mut Vec<u8>, values: impl IntoIterator<Item = f64>) {
    for value in values {
        buffer.extend_from_slice(&(value as f32).to_le_bytes());
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> f64 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]) as f64
}

fn unmerged_mesh(vertices: Vec<Point3<f64>>) -> Result<TriangleMesh, StlError> {
    let faces = (0..vertices.len() / 3)
        .map(|i| [3 * i, 3 * i + 1, 3 * i + 2])
        .collect();
    Ok(TriangleMesh::new(vertices, faces)?)
}

/// Binary STL, the compact form written by default.
pub struct BinaryStlFile;

/// ASCII STL (`solid` ... `endsolid`).
pub struct AsciiStlFile;

impl MeshFile for BinaryStlFile {
    type Error = StlError;

    fn read_from(reader: &mut impl BufRead) -> Result<TriangleMesh, Self::Error> {
        let mut header = [0u8; HEADER_LEN + 4];
        reader.read_exact(&mut header)?;
        let declared = u32::from_le_bytes([header[80], header[81], header[82], header[83]]) as usize;

        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        if body.len() < declared * FACET_LEN {
            return Err(StlError::Truncated {
                declared,
                available: body.len(),
            });
        }

        let mut vertices = Vec::with_capacity(declared * 3);
        for facet in body.chunks_exact(FACET_LEN).take(declared) {
            for corner in 0..3 {
                let offset = 12 + corner * 12;
                vertices.push(Point3::new(
                    read_f32(facet, offset),
                    read_f32(facet, offset + 4),
                    read_f32(facet, offset + 8),
                ));
            }
        }
        unmerged_mesh(vertices)
    }

    fn write_to(mesh: &TriangleMesh, writer: &mut impl Write) -> Result<(), Self::Error> {
        let facet_count =
            u32::try_from(mesh.faces().len()).map_err(|_| StlError::TooManyFacets(mesh.faces().len()))?;

        let mut header = [b' '; HEADER_LEN];
        let label = format!("binary STL written by {}", SOLID_NAME);
        header[..label.len()].copy_from_slice(label.as_bytes());
        writer.write_all(&header)?;
        writer.write_all(&facet_count.to_le_bytes())?;

        let mut facet = Vec::with_capacity(FACET_LEN);
        for triangle in mesh.triangles() {
            facet.clear();
            let n = facet_normal(&triangle);
            push_f32s(&mut facet, [n.x, n.y, n.z]);
            for v in &triangle {
                push_f32s(&mut facet, [v.x, v.y, v.z]);
            }
            facet.extend_from_slice(&0u16.to_le_bytes());
            writer.write_all(&facet)?;
        }
        Ok(())
    }
}

impl MeshFile for AsciiStlFile {
    type Error = StlError;

    fn read_from(reader: &mut impl BufRead) -> Result<TriangleMesh, Self::Error> {
        let mut vertices = Vec::new();
        let mut saw_solid = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("solid") => saw_solid = true,
                Some("vertex") => {
                    let coords: Vec<f64> = parts
                        .map(str::parse)
                        .collect::<Result<_, _>>()
                        .map_err(|e| StlError::Ascii {
                            line: line_num,
                            message: format!("invalid vertex coordinate ({})", e),
                        })?;
                    if coords.len() != 3 {
                        return Err(StlError::Ascii {
                            line: line_num,
                            message: format!("vertex needs 3 coordinates, found {}", coords.len()),
                        });
                    }
                    vertices.push(Point3::new(coords[0], coords[1], coords[2]));
                }
                Some("endsolid") => break,
                _ => {}
            }
        }

        if !saw_solid {
            return Err(StlError::Ascii {
                line: 1,
                message: "missing 'solid' header".to_string(),
            });
        }
        if vertices.len() % 3 != 0 {
            return Err(StlError::Ascii {
                line: 0,
                message: format!("{} vertices do not form whole facets", vertices.len()),
            });
        }
        unmerged_mesh(vertices)
    }

    fn write_to(mesh: &TriangleMesh, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "solid {}", SOLID_NAME)?;
        for triangle in mesh.triangles() {
            let n = facet_normal(&triangle);
            writeln!(writer, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
            writeln!(writer, "    outer loop")?;
            for v in &triangle {
                writeln!(writer, "      vertex {:e} {:e} {:e}", v.x, v.y, v.z)?;
            }
            writeln!(writer, "    endloop")?;
            writeln!(writer, "  endfacet")?;
        }
        writeln!(writer, "endsolid {}", SOLID_NAME)?;
        Ok(())
    }
}

impl StlFormat {
    /// Guesses the flavour of STL data. Binary files whose 80-byte header happens to start
    /// with `solid` are recognised by their exact facet-count length.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() >= HEADER_LEN + 4 {
            let declared = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
            if bytes.len() == HEADER_LEN + 4 + declared * FACET_LEN {
                return StlFormat::Binary;
            }
        }
        if bytes.trim_ascii_start().starts_with(b"solid") {
            StlFormat::Ascii
        } else {
            StlFormat::Binary
        }
    }

    pub fn read_from_path(path: impl AsRef<std::path::Path>) -> Result<TriangleMesh, StlError> {
        let bytes = std::fs::read(path)?;
        let mut reader = io::Cursor::new(bytes.as_slice());
        match Self::detect(&bytes) {
            StlFormat::Binary => BinaryStlFile::read_from(&mut reader),
            StlFormat::Ascii => AsciiStlFile::read_from(&mut reader),
        }
    }

    pub fn write_to_path(
        self,
        mesh: &TriangleMesh,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), StlError> {
        match self {
            StlFormat::Binary => BinaryStlFile::write_to_path(mesh, path),
            StlFormat::Ascii => AsciiStlFile::write_to_path(mesh, path),
        }
    }
}

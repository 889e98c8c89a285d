use crate::core::models::mesh::TriangleMesh;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing surface mesh file formats.
///
/// Implementors handle format-specific parsing and serialization; the path-based helpers
/// wrap the underlying file in buffered readers and writers.
pub trait MeshFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a triangle mesh from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<TriangleMesh, Self::Error>;

    /// Writes a triangle mesh to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(mesh: &TriangleMesh, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a triangle mesh from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<TriangleMesh, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a triangle mesh to a file path, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(mesh, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ID_COLUMN: &str = "CellId";
pub const MESH_EXTENSION: &str = "vtk";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Manifest '{path}' has no '{column}' column")]
    MissingColumn { path: String, column: String },
}

/// The list of segmented cells making up a dataset, one mesh per cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetManifest {
    cell_ids: Vec<String>,
}

impl DatasetManifest {
    pub fn new(cell_ids: Vec<String>) -> Self {
        Self { cell_ids }
    }

    pub fn load(path: &Path, id_column: &str) -> Result<Self, ManifestError> {
        debug!("Loading dataset manifest from {:?}", path);
        let csv_error = |source| ManifestError::Csv {
            path: path.to_string_lossy().to_string(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
        let column = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .position(|h| h.trim() == id_column)
            .ok_or_else(|| ManifestError::MissingColumn {
                path: path.to_string_lossy().to_string(),
                column: id_column.to_string(),
            })?;

        let mut cell_ids = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(csv_error)?;
            match record.get(column).map(str::trim) {
                Some(id) if !id.is_empty() => cell_ids.push(id.to_string()),
                _ => warn!(row = row + 1, "Skipping manifest row without a cell id."),
            }
        }
        debug!(count = cell_ids.len(), "Dataset manifest loaded.");
        Ok(Self { cell_ids })
    }

    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    pub fn truncate(&mut self, limit: usize) {
        self.cell_ids.truncate(limit);
    }

    pub fn mesh_path(mesh_dir: &Path, cell_id: &str) -> PathBuf {
        mesh_dir.join(format!("{}.{}", cell_id, MESH_EXTENSION))
    }

    pub fn mesh_paths(&self, mesh_dir: &Path) -> Vec<PathBuf> {
        self.cell_ids
            .iter()
            .map(|id| Self::mesh_path(mesh_dir, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_reads_ids_from_named_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nucleus_timelapse.csv");
        fs::write(
            &path,
            "Index,CellId,Frame\n0,abc123,1\n1,def456,2\n2,,3\n3, ghi789 ,4\n",
        )
        .unwrap();

        let manifest = DatasetManifest::load(&path, DEFAULT_ID_COLUMN).unwrap();
        assert_eq!(manifest.cell_ids(), &["abc123", "def456", "ghi789"]);
        assert_eq!(
            manifest.mesh_paths(Path::new("meshes")),
            vec![
                PathBuf::from("meshes/abc123.vtk"),
                PathBuf::from("meshes/def456.vtk"),
                PathBuf::from("meshes/ghi789.vtk"),
            ]
        );
    }

    #[test]
    fn load_supports_custom_id_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        fs::write(&path, "name\nnucleus_a\nnucleus_b\n").unwrap();

        let mut manifest = DatasetManifest::load(&path, "name").unwrap();
        manifest.truncate(1);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.cell_ids(), &["nucleus_a"]);
    }

    #[test]
    fn load_fails_for_missing_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        fs::write(&path, "Index,Frame\n0,1\n").unwrap();

        let result = DatasetManifest::load(&path, DEFAULT_ID_COLUMN);
        assert!(matches!(
            result,
            Err(ManifestError::MissingColumn { column, .. }) if column == "CellId"
        ));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = DatasetManifest::load(&dir.path().join("absent.csv"), DEFAULT_ID_COLUMN);
        assert!(matches!(result, Err(ManifestError::Csv { .. })));
    }

    #[test]
    fn load_fails_for_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "CellId,Frame\na,1\nb,2,extra\n").unwrap();

        let result = DatasetManifest::load(&path, DEFAULT_ID_COLUMN);
        assert!(matches!(result, Err(ManifestError::Csv { .. })));
    }
}

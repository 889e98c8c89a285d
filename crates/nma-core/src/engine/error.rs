use thiserror::Error;

use super::config::ConfigError;
use crate::core::geometry::isosurface::IsosurfaceError;
use crate::core::io::manifest::ManifestError;
use crate::core::io::npy::NpyError;
use crate::core::io::stl::StlError;
use crate::core::io::vtk::VtkError;
use crate::core::models::grid::GridError;
use crate::core::models::mesh::MeshError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read dataset manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Failed to load mesh '{path}': {source}")]
    MeshLoad {
        path: String,
        #[source]
        source: VtkError,
    },

    #[error("VTK error: {0}")]
    Vtk(#[from] VtkError),

    #[error("STL error: {0}")]
    Stl(#[from] StlError),

    #[error("Mask file error: {0}")]
    Npy(#[from] NpyError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Isosurface extraction failed: {0}")]
    Isosurface(#[from] IsosurfaceError),

    #[error("Dataset is empty: no meshes to average")]
    EmptyDataset,

    #[error("Mask grid {actual:?} does not match the configured grid {expected:?}")]
    GridMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

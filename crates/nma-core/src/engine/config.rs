use crate::core::geometry::isosurface::IsosurfaceOptions;
use crate::core::geometry::voxelize::{VoxelizationMethod, VoxelizeOptions};
use crate::core::io::manifest::DEFAULT_ID_COLUMN;
use crate::core::io::stl::StlFormat;
use crate::core::models::grid::GridSpec;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    pub manifest_path: PathBuf,
    pub mesh_dir: PathBuf,
    pub id_column: String,
    pub limit: Option<usize>,
}

/// Conversion of mesh z coordinates from slice indices to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZRescale {
    /// Physical distance between two acquired slices.
    pub z_spacing: f64,
    /// Physical height covered by the stack.
    pub extent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub mesh_path: PathBuf,
    pub mask_path: Option<PathBuf>,
    pub stl_format: StlFormat,
    pub z_rescale: Option<ZRescale>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeanMeshConfig {
    pub dataset: DatasetConfig,
    pub grid: GridSpec,
    pub voxelization: VoxelizeOptions,
    pub surface: IsosurfaceOptions,
    pub output: OutputConfig,
}

#[derive(Default)]
pub struct MeanMeshConfigBuilder {
    manifest_path: Option<PathBuf>,
    mesh_dir: Option<PathBuf>,
    id_column: Option<String>,
    limit: Option<usize>,
    dims: Option<[usize; 3]>,
    z_spacing: Option<f64>,
    z_extent: Option<f64>,
    center_on_grid: Option<bool>,
    method: Option<VoxelizationMethod>,
    level: Option<f32>,
    step_size: Option<usize>,
    mesh_path: Option<PathBuf>,
    mask_path: Option<PathBuf>,
    stl_format: Option<StlFormat>,
    z_rescale: Option<ZRescale>,
}

impl MeanMeshConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest_path(mut self, path: PathBuf) -> Self {
        self.manifest_path = Some(path);
        self
    }
    pub fn mesh_dir(mut self, dir: PathBuf) -> Self {
        self.mesh_dir = Some(dir);
        self
    }
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
    pub fn dims(mut self, dims: [usize; 3]) -> Self {
        self.dims = Some(dims);
        self
    }
    pub fn z_spacing(mut self, spacing: f64) -> Self {
        self.z_spacing = Some(spacing);
        self
    }
    /// Spreads the z-planes evenly over `[0, extent]` instead of using `dims[2]` planes.
    pub fn z_extent(mut self, extent: Option<f64>) -> Self {
        self.z_extent = extent;
        self
    }
    pub fn center_on_grid(mut self, center: bool) -> Self {
        self.center_on_grid = Some(center);
        self
    }
    pub fn method(mut self, method: VoxelizationMethod) -> Self {
        self.method = Some(method);
        self
    }
    pub fn level(mut self, level: f32) -> Self {
        self.level = Some(level);
        self
    }
    pub fn step_size(mut self, step: usize) -> Self {
        self.step_size = Some(step);
        self
    }
    pub fn mesh_path(mut self, path: PathBuf) -> Self {
        self.mesh_path = Some(path);
        self
    }
    pub fn mask_path(mut self, path: Option<PathBuf>) -> Self {
        self.mask_path = path;
        self
    }
    pub fn stl_format(mut self, format: StlFormat) -> Self {
        self.stl_format = Some(format);
        self
    }
    pub fn z_rescale(mut self, rescale: Option<ZRescale>) -> Self {
        self.z_rescale = rescale;
        self
    }

    pub fn build(self) -> Result<MeanMeshConfig, ConfigError> {
        let dataset = DatasetConfig {
            manifest_path: self
                .manifest_path
                .ok_or(ConfigError::MissingParameter("manifest_path"))?,
            mesh_dir: self
                .mesh_dir
                .ok_or(ConfigError::MissingParameter("mesh_dir"))?,
            id_column: self
                .id_column
                .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string()),
            limit: self.limit,
        };
        if dataset.limit == Some(0) {
            return Err(invalid("limit", "must be at least 1"));
        }

        let dims = self.dims.ok_or(ConfigError::MissingParameter("dims"))?;
        let z_spacing = self.z_spacing.unwrap_or(1.0);
        let base = GridSpec::new(dims).map_err(|e| invalid("dims", e))?;
        let grid = match self.z_extent {
            Some(extent) => {
                GridSpec::z_planes_for_extent([base.nx(), base.ny()], extent, z_spacing)
                    .map_err(|e| invalid("z_extent", e))?
            }
            None => base
                .with_z_spacing(z_spacing)
                .map_err(|e| invalid("z_spacing", e))?,
        };

        let surface = IsosurfaceOptions {
            level: self.level.unwrap_or(IsosurfaceOptions::default().level),
            step_size: self.step_size.unwrap_or(1),
        };
        if surface.step_size == 0 {
            return Err(invalid("step_size", "must be at least 1"));
        }
        if !surface.level.is_finite() {
            return Err(invalid("level", "must be a finite number"));
        }

        if let Some(rescale) = &self.z_rescale {
            let valid = |v: f64| v.is_finite() && v > 0.0;
            if !valid(rescale.z_spacing) || !valid(rescale.extent) {
                return Err(invalid(
                    "rescale_z",
                    format!("spacing and extent must be positive, got {rescale:?}"),
                ));
            }
            // Rescaling converts slice indices; a spaced grid already yields physical z.
            if grid.spacing.z != 1.0 {
                return Err(invalid(
                    "rescale_z",
                    format!(
                        "cannot be combined with a grid z spacing of {}",
                        grid.spacing.z
                    ),
                ));
            }
        }

        Ok(MeanMeshConfig {
            dataset,
            grid,
            voxelization: VoxelizeOptions {
                method: self.method.unwrap_or_default(),
                center_on_grid: self.center_on_grid.unwrap_or(true),
            },
            surface,
            output: OutputConfig {
                mesh_path: self
                    .mesh_path
                    .ok_or(ConfigError::MissingParameter("mesh_path"))?,
                mask_path: self.mask_path,
                stl_format: self.stl_format.unwrap_or_default(),
                z_rescale: self.z_rescale,
            },
        })
    }
}

fn invalid(parameter: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.to_string(),
    }
}

use normal_mode_analysis::core::geometry::voxelize::VoxelizationMethod;
use normal_mode_analysis::core::io::manifest::DEFAULT_ID_COLUMN;
use normal_mode_analysis::core::io::stl::StlFormat;
use std::path::PathBuf;

/// Values used when neither the config file, the command line nor `--set` provide one.
pub struct DefaultsConfig {
    pub id_column: String,
    pub dims: [usize; 3],
    pub z_spacing: f64,
    pub center: bool,
    pub method: VoxelizationMethod,
    pub level: f32,
    pub step_size: usize,
    pub mesh_output: PathBuf,
    pub stl_format: StlFormat,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            dims: [128, 128, 128],
            z_spacing: 1.0,
            center: true,
            method: VoxelizationMethod::RayParity,
            level: 0.5,
            step_size: 1,
            mesh_output: PathBuf::from("mean_nuc_mesh.stl"),
            stl_format: StlFormat::Binary,
        }
    }
}

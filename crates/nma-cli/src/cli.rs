use crate::utils::parser::{parse_dims, parse_rescale};
use clap::{Args, Parser, Subcommand, ValueEnum};
use normal_mode_analysis::core::geometry::voxelize::VoxelizationMethod;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Julie Cass",
    version,
    about = "nma - Mean nuclear shape analysis: voxelize segmented nucleus meshes, average them and extract the mean surface.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the mean nuclear mesh of a dataset of segmented nucleus meshes.
    MeanMesh(MeanMeshArgs),
    /// Voxelize a single mesh into a binary `.npy` mask.
    Voxelize(VoxelizeArgs),
    /// Extract an STL surface from an `.npy` mask.
    Surface(SurfaceArgs),
    /// Cut a mesh with z-planes and write the contours as CSV.
    Slice(SliceArgs),
    /// Print a summary of a VTK or STL mesh.
    Info(InfoArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    /// Even-odd ray casting along x.
    RayParity,
    /// Plane-by-plane contour rasterization.
    CrossSection,
}

impl From<MethodArg> for VoxelizationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::RayParity => VoxelizationMethod::RayParity,
            MethodArg::CrossSection => VoxelizationMethod::CrossSection,
        }
    }
}

/// Grid and voxelization options shared by `mean-mesh` and `voxelize`.
#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    /// Grid size in samples, either `N` or `NX,NY,NZ`.
    #[arg(short, long, value_name = "DIMS", value_parser = parse_dims)]
    pub dims: Option<[usize; 3]>,

    /// Physical distance between z-planes of the grid.
    #[arg(short = 'z', long, value_name = "FLOAT")]
    pub z_spacing: Option<f64>,

    /// Spread the z-planes evenly over `[0, EXTENT]`, one per z-spacing, instead of
    /// taking their number from `--dims`.
    #[arg(long, value_name = "EXTENT")]
    pub z_extent: Option<f64>,

    /// Voxelization strategy.
    #[arg(short, long, value_enum, value_name = "METHOD")]
    pub method: Option<MethodArg>,

    /// Sample meshes in their own coordinates instead of centering them on the grid.
    #[arg(long)]
    pub no_center: bool,
}

/// Arguments for the `mean-mesh` subcommand.
#[derive(Args, Debug)]
pub struct MeanMeshArgs {
    // --- Core Arguments ---
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// CSV manifest listing the cells of the dataset.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Directory holding one `<cell id>.vtk` mesh per cell.
    #[arg(long, value_name = "PATH")]
    pub mesh_dir: Option<PathBuf>,

    /// Path for the output STL mesh.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Also save the mean occupancy mask as `.npy`.
    #[arg(long, value_name = "PATH")]
    pub mask_output: Option<PathBuf>,

    // --- Dataset Overrides ---
    /// Manifest column holding the cell ids.
    #[arg(long, value_name = "NAME")]
    pub id_column: Option<String>,

    /// Use only the first N cells of the manifest.
    #[arg(short = 'n', long, value_name = "INT")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub grid: GridArgs,

    // --- Surface Overrides ---
    /// Occupancy fraction at which the mean surface is extracted.
    #[arg(short, long, value_name = "FLOAT")]
    pub level: Option<f32>,

    /// Sample every N-th voxel when extracting the surface.
    #[arg(long, value_name = "INT")]
    pub step_size: Option<usize>,

    /// Rescale mesh z from slice indices to physical units, given as `SPACING,EXTENT`.
    #[arg(long, value_name = "SPACING,EXTENT", value_parser = parse_rescale)]
    pub rescale_z: Option<(f64, f64)>,

    /// Write ASCII STL instead of binary.
    #[arg(long)]
    pub ascii: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S surface.level=0.4
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `voxelize` subcommand.
#[derive(Args, Debug)]
pub struct VoxelizeArgs {
    /// Input mesh (VTK or STL).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output `.npy` mask.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    #[command(flatten)]
    pub grid: GridArgs,
}

/// Arguments for the `surface` subcommand.
#[derive(Args, Debug)]
pub struct SurfaceArgs {
    /// Input `.npy` mask.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output STL mesh.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Physical distance between z-planes of the mask.
    #[arg(short = 'z', long, value_name = "FLOAT", default_value_t = 1.0)]
    pub z_spacing: f64,

    /// Occupancy fraction at which the surface is extracted.
    #[arg(short, long, value_name = "FLOAT", default_value_t = 0.5)]
    pub level: f32,

    /// Sample every N-th voxel when extracting the surface.
    #[arg(long, value_name = "INT", default_value_t = 1)]
    pub step_size: usize,

    /// Write ASCII STL instead of binary.
    #[arg(long)]
    pub ascii: bool,
}

/// Arguments for the `slice` subcommand.
#[derive(Args, Debug)]
pub struct SliceArgs {
    /// Input mesh (VTK or STL).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output CSV file with columns `contour,closed,x,y,z`.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Heights of the cutting planes.
    #[arg(short = 'z', long = "at", value_name = "FLOAT", num_args(1..), required = true, allow_negative_numbers = true)]
    pub z_values: Vec<f64>,
}

/// Arguments for the `info` subcommand.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Mesh to summarize (VTK or STL).
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,
}

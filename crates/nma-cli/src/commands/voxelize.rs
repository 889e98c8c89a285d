use crate::cli::{GridArgs, VoxelizeArgs};
use crate::config::defaults::DefaultsConfig;
use crate::error::{CliError, Result};
use normal_mode_analysis::core::geometry::voxelize::{VoxelizationMethod, VoxelizeOptions};
use normal_mode_analysis::core::models::grid::{GridSpec, MASK_INSIDE};
use normal_mode_analysis::workflows::mean_mesh;
use tracing::info;

/// Grid geometry and voxelization options from the command line, falling back to defaults.
pub fn grid_from_args(args: &GridArgs) -> Result<(GridSpec, VoxelizeOptions)> {
    let defaults = DefaultsConfig::default();
    let dims = args.dims.unwrap_or(defaults.dims);
    let z_spacing = args.z_spacing.unwrap_or(defaults.z_spacing);
    let grid = match args.z_extent {
        Some(extent) => GridSpec::new(dims)
            .and_then(|grid| GridSpec::z_planes_for_extent([grid.nx(), grid.ny()], extent, z_spacing)),
        None => GridSpec::new(dims).and_then(|grid| grid.with_z_spacing(z_spacing)),
    }
    .map_err(|e| CliError::Argument(e.to_string()))?;
    let options = VoxelizeOptions {
        method: args
            .method
            .map(VoxelizationMethod::from)
            .unwrap_or(defaults.method),
        center_on_grid: !args.no_center && defaults.center,
    };
    Ok((grid, options))
}

pub fn run(args: VoxelizeArgs) -> Result<()> {
    let (grid, options) = grid_from_args(&args.grid)?;
    info!(
        "Voxelizing {:?} onto a {:?} grid using {:?}.",
        &args.input, grid.dims, options.method
    );
    let mask = mean_mesh::voxelize_file(&args.input, &grid, &options, &args.output)?;
    println!(
        "✓ {} of {} samples inside; mask written to: {}",
        mask.count_where(|v| v == MASK_INSIDE),
        grid.voxel_count(),
        args.output.display()
    );
    Ok(())
}

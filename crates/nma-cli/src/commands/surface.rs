use crate::cli::SurfaceArgs;
use crate::error::Result;
use normal_mode_analysis::core::geometry::isosurface::IsosurfaceOptions;
use normal_mode_analysis::core::io::stl::StlFormat;
use normal_mode_analysis::workflows::mean_mesh;
use tracing::{info, warn};

pub fn run(args: SurfaceArgs) -> Result<()> {
    let options = IsosurfaceOptions {
        level: args.level,
        step_size: args.step_size,
    };
    let format = if args.ascii {
        StlFormat::Ascii
    } else {
        StlFormat::Binary
    };
    info!(
        "Extracting surface from {:?} at level {} (step {}).",
        &args.input, options.level, options.step_size
    );

    let mesh =
        mean_mesh::surface_from_mask_file(&args.input, args.z_spacing, &options, &args.output, format)?;

    if mesh.is_empty() {
        warn!("No surface found at level {}.", options.level);
    }
    println!(
        "✓ Surface with {} faces written to: {}",
        mesh.faces().len(),
        args.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::error::CliError;
    use clap::Parser;
    use normal_mode_analysis::core::io::npy;
    use normal_mode_analysis::core::models::grid::{GridSpec, MASK_INSIDE, VoxelGrid};
    use normal_mode_analysis::engine::error::EngineError;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> SurfaceArgs {
        match Cli::parse_from(["nma", "surface"].iter().chain(args).copied()).command {
            Commands::Surface(args) => args,
            other => panic!("Expected 'surface' subcommand, got {other:?}"),
        }
    }

    #[test]
    fn extracts_surface_from_binary_mask() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("block.npy");
        let output = dir.path().join("block.stl");

        let mut mask = VoxelGrid::zeros(GridSpec::cubic(6).unwrap());
        for k in 2..4 {
            for j in 2..4 {
                for i in 2..4 {
                    mask.set(i, j, k, MASK_INSIDE);
                }
            }
        }
        npy::write_grid_to_path(&mask, &input).unwrap();

        run(parse(&[
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--ascii",
        ]))
        .unwrap();

        let mesh = StlFormat::read_from_path(&output).unwrap();
        assert!(!mesh.is_empty());
        assert!(mesh.signed_volume() > 1.0);
    }

    #[test]
    fn missing_mask_is_an_engine_error() {
        let dir = tempdir().unwrap();
        let result = run(parse(&[
            "-i",
            dir.path().join("missing.npy").to_str().unwrap(),
            "-o",
            dir.path().join("out.stl").to_str().unwrap(),
        ]));
        assert!(matches!(result, Err(CliError::Engine(EngineError::Npy(_)))));
    }
}

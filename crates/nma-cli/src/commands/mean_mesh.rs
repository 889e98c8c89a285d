use crate::cli::MeanMeshArgs;
use crate::config::PartialMeanMeshConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use normal_mode_analysis::{engine::progress::ProgressReporter, workflows};
use tracing::{info, warn};

pub fn run(args: MeanMeshArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialMeanMeshConfig::from_file(path)?,
        None => PartialMeanMeshConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.callback());

    println!("Computing the mean mesh...");
    info!("Invoking the core mean mesh workflow...");
    let result = workflows::mean_mesh::run(&config, &reporter)?;

    if result.mesh.is_empty() {
        warn!("The mean mask produced an empty surface.");
        println!(
            "Warning: no surface at level {} (try a lower --level).",
            config.surface.level
        );
    }
    println!(
        "✓ Mean of {} meshes ({} faces, volume {:.2}) written to: {}",
        result.mesh_count,
        result.summary.face_count,
        result.summary.volume,
        config.output.mesh_path.display()
    );
    if let Some(mask_path) = &config.output.mask_path {
        println!("  Mean mask written to: {}", mask_path.display());
    }
    Ok(())
}

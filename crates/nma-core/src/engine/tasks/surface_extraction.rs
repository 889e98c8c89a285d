use crate::core::geometry::isosurface::{IsosurfaceOptions, extract_isosurface};
use crate::core::models::grid::MeanMask;
use crate::core::models::mesh::TriangleMesh;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument, warn};

#[instrument(skip_all, name = "surface_extraction_task", fields(level = options.level))]
pub fn run(
    mask: &MeanMask,
    options: &IsosurfaceOptions,
    reporter: &ProgressReporter,
) -> Result<TriangleMesh, EngineError> {
    reporter.report(Progress::Message("Extracting isosurface...".to_string()));

    let peak = mask.max_value().unwrap_or(0.0);
    if peak <= options.level {
        warn!(
            peak,
            level = options.level,
            "No voxel exceeds the iso-level; the extracted surface will be empty."
        );
    }

    let mesh = extract_isosurface(mask, options)?;
    info!(
        vertices = mesh.vertices().len(),
        faces = mesh.faces().len(),
        "Isosurface extracted."
    );
    Ok(mesh)
}

use crate::core::geometry::cross_section::{Contour, cross_section};
use crate::core::geometry::isosurface::IsosurfaceOptions;
use crate::core::geometry::voxelize::{VoxelizeOptions, voxelize};
use crate::core::io::manifest::DatasetManifest;
use crate::core::io::npy;
use crate::core::io::stl::StlFormat;
use crate::core::io::traits::MeshFile;
use crate::core::io::vtk::VtkFile;
use crate::core::models::grid::{BinaryMask, GridSpec, MASK_INSIDE, MeanMask};
use crate::core::models::mesh::{MeshSummary, TriangleMesh};
use crate::engine::config::MeanMeshConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct MeanMeshResult {
    pub mesh: TriangleMesh,
    pub mask: MeanMask,
    pub mesh_count: usize,
    pub summary: MeshSummary,
}

#[instrument(skip_all, name = "mean_mesh_workflow")]
pub fn run(
    config: &MeanMeshConfig,
    reporter: &ProgressReporter,
) -> Result<MeanMeshResult, EngineError> {
    // === Phase 1: Dataset ===
    let mesh_paths = reporter.phase("Loading Dataset", || -> Result<Vec<PathBuf>, EngineError> {
        let mut manifest =
            DatasetManifest::load(&config.dataset.manifest_path, &config.dataset.id_column)?;
        if let Some(limit) = config.dataset.limit {
            manifest.truncate(limit);
        }
        if manifest.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        info!("Dataset contains {} cell(s).", manifest.len());
        Ok(manifest.mesh_paths(&config.dataset.mesh_dir))
    })?;

    // === Phase 2: Mean mask ===
    let mask = reporter.phase("Averaging Masks", || {
        tasks::mask_accumulation::run(&mesh_paths, &config.grid, &config.voxelization, reporter)
    })?;

    if let Some(mask_path) = &config.output.mask_path {
        info!("Saving mean mask to {:?}.", mask_path);
        npy::write_grid_to_path(&mask, mask_path)?;
    }

    // === Phase 3: Mean surface ===
    let mut mesh = reporter.phase("Extracting Surface", || {
        tasks::surface_extraction::run(&mask, &config.surface, reporter)
    })?;

    if let Some(rescale) = &config.output.z_rescale {
        let dz = mesh.rescale_z(rescale.z_spacing, rescale.extent)?;
        info!(dz, "Rescaled mesh z axis to physical units.");
    }

    // === Phase 4: Export ===
    reporter.phase("Writing Mesh", || {
        config
            .output
            .stl_format
            .write_to_path(&mesh, &config.output.mesh_path)
    })?;

    let summary = mesh.summary();
    info!(
        faces = summary.face_count,
        volume = summary.volume,
        "Mean mesh written to {:?}.",
        config.output.mesh_path
    );
    Ok(MeanMeshResult {
        mesh,
        mask,
        mesh_count: mesh_paths.len(),
        summary,
    })
}

/// Reads a surface mesh, choosing the format from the file extension (`.stl`, else VTK).
pub fn load_mesh(path: &Path) -> Result<TriangleMesh, EngineError> {
    let is_stl = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("stl"));
    if is_stl {
        return Ok(StlFormat::read_from_path(path)?);
    }
    VtkFile::read_from_path(path).map_err(|source| EngineError::MeshLoad {
        path: path.display().to_string(),
        source,
    })
}

/// Voxelizes one mesh file and saves the binary mask as `.npy`.
#[instrument(skip_all, name = "voxelize_file", fields(mesh = %mesh_path.display()))]
pub fn voxelize_file(
    mesh_path: &Path,
    grid: &GridSpec,
    options: &VoxelizeOptions,
    output_path: &Path,
) -> Result<BinaryMask, EngineError> {
    let mesh = load_mesh(mesh_path)?;
    let mask = voxelize(&mesh, grid, options);
    npy::write_grid_to_path(&mask, output_path)?;
    info!(
        inside = mask.count_where(|v| v == MASK_INSIDE),
        "Mask written to {:?}.",
        output_path
    );
    Ok(mask)
}

/// Extracts the isosurface of a saved `.npy` mask and writes it as STL.
///
/// Saved masks carry no geometry, so `z_spacing` restores the physical plane distance.
/// Binary masks stored as 0/255 are brought to the `[0, 1]` occupancy scale first.
#[instrument(skip_all, name = "surface_from_mask_file", fields(mask = %mask_path.display()))]
pub fn surface_from_mask_file(
    mask_path: &Path,
    z_spacing: f64,
    options: &IsosurfaceOptions,
    output_path: &Path,
    format: StlFormat,
) -> Result<TriangleMesh, EngineError> {
    let raw = npy::read_grid_from_path(mask_path)?;
    let spec = raw.spec().with_z_spacing(z_spacing)?;
    let mut mask = raw.with_spec(spec)?;
    if mask.max_value().is_some_and(|peak| peak > 1.0) {
        info!("Mask values exceed 1; treating it as a 0-255 binary mask.");
        mask = mask.map(|v| v / f32::from(MASK_INSIDE));
    }

    let mesh = tasks::surface_extraction::run(&mask, options, &ProgressReporter::new())?;
    format.write_to_path(&mesh, output_path)?;
    info!("Surface written to {:?}.", output_path);
    Ok(mesh)
}

/// Cuts a mesh file at each of `z_values`, returning the contours per plane.
#[instrument(skip_all, name = "slice_file", fields(mesh = %mesh_path.display()))]
pub fn slice_file(
    mesh_path: &Path,
    z_values: &[f64],
    reporter: &ProgressReporter,
) -> Result<Vec<(f64, Vec<Contour>)>, EngineError> {
    let mesh = load_mesh(mesh_path)?;
    reporter.report(Progress::TaskStart {
        total_steps: z_values.len() as u64,
    });
    let sections = z_values
        .iter()
        .map(|&z| {
            let contours = cross_section(&mesh, z);
            reporter.report(Progress::TaskIncrement);
            (z, contours)
        })
        .collect();
    reporter.report(Progress::TaskFinish);
    Ok(sections)
}

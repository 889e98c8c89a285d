use crate::core::geometry::voxelize::{VoxelizeOptions, voxelize};
use crate::core::io::traits::MeshFile;
use crate::core::io::vtk::VtkFile;
use crate::core::models::grid::{BinaryMask, GridSpec, MASK_INSIDE, MeanMask, VoxelGrid};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Running voxel-wise sum of binary masks sharing one grid.
pub struct MaskAccumulator {
    spec: GridSpec,
    sums: Vec<u32>,
    count: usize,
}

impl MaskAccumulator {
    pub fn new(spec: GridSpec) -> Self {
        Self {
            sums: vec![0; spec.voxel_count()],
            spec,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, mask: &BinaryMask) -> Result<(), EngineError> {
        if mask.dims() != self.spec.dims {
            return Err(EngineError::GridMismatch {
                expected: self.spec.dims,
                actual: mask.dims(),
            });
        }
        for (sum, &value) in self.sums.iter_mut().zip(mask.as_slice()) {
            *sum = sum.checked_add(u32::from(value)).ok_or_else(|| {
                EngineError::Internal("voxel occupancy sum overflowed u32".to_string())
            })?;
        }
        self.count += 1;
        Ok(())
    }

    /// Mean occupancy per voxel as a fraction in `[0, 1]`.
    pub fn finish(self) -> Result<MeanMask, EngineError> {
        if self.count == 0 {
            return Err(EngineError::EmptyDataset);
        }
        let denominator = self.count as f64 * f64::from(MASK_INSIDE);
        let data = self
            .sums
            .into_iter()
            .map(|sum| (f64::from(sum) / denominator) as f32)
            .collect();
        Ok(VoxelGrid::from_vec(self.spec, data)?)
    }
}

/// Loads, voxelizes and averages every mesh in `mesh_paths`.
///
/// Meshes are processed one after another so that only one binary mask is alive at a
/// time; each voxelization parallelizes over z-planes internally.
#[instrument(skip_all, name = "mask_accumulation_task", fields(meshes = mesh_paths.len()))]
pub fn run(
    mesh_paths: &[PathBuf],
    grid: &GridSpec,
    options: &VoxelizeOptions,
    reporter: &ProgressReporter,
) -> Result<MeanMask, EngineError> {
    info!(
        dims = ?grid.dims,
        method = ?options.method,
        "Accumulating mean mask over {} mesh(es).",
        mesh_paths.len()
    );
    reporter.report(Progress::TaskStart {
        total_steps: mesh_paths.len() as u64,
    });

    let mut accumulator = MaskAccumulator::new(*grid);
    for path in mesh_paths {
        let mesh = VtkFile::read_from_path(path).map_err(|source| EngineError::MeshLoad {
            path: path.display().to_string(),
            source,
        })?;
        let mask = voxelize(&mesh, grid, options);
        debug!(
            path = %path.display(),
            faces = mesh.faces().len(),
            inside = mask.count_where(|v| v == MASK_INSIDE),
            "Mesh voxelized."
        );
        accumulator.add(&mask)?;
        reporter.report(Progress::TaskIncrement);
    }

    reporter.report(Progress::TaskFinish);
    let mean = accumulator.finish()?;
    info!(
        max_occupancy = mean.max_value().unwrap_or(0.0),
        "Mean mask computed."
    );
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::mesh::test_shapes::cuboid;
    use nalgebra::Point3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn mask_with(spec: GridSpec, inside: &[(usize, usize, usize)]) -> BinaryMask {
        let mut mask = VoxelGrid::zeros(spec);
        for &(i, j, k) in inside {
            mask.set(i, j, k, MASK_INSIDE);
        }
        mask
    }

    #[test]
    fn accumulator_averages_each_mask_once() {
        let spec = GridSpec::cubic(3).unwrap();
        let mut acc = MaskAccumulator::new(spec);
        acc.add(&mask_with(spec, &[(0, 0, 0), (1, 1, 1)])).unwrap();
        acc.add(&mask_with(spec, &[(1, 1, 1)])).unwrap();
        acc.add(&mask_with(spec, &[(1, 1, 1), (2, 2, 2)])).unwrap();
        acc.add(&mask_with(spec, &[(1, 1, 1)])).unwrap();
        assert_eq!(acc.count(), 4);

        let mean = acc.finish().unwrap();
        assert_eq!(mean.get(1, 1, 1), 1.0);
        assert_eq!(mean.get(0, 0, 0), 0.25);
        assert_eq!(mean.get(2, 2, 2), 0.25);
        assert_eq!(mean.get(2, 1, 0), 0.0);
    }

    #[test]
    fn accumulator_rejects_mismatched_grid() {
        let mut acc = MaskAccumulator::new(GridSpec::cubic(3).unwrap());
        let other = VoxelGrid::zeros(GridSpec::cubic(4).unwrap());
        assert!(matches!(
            acc.add(&other),
            Err(EngineError::GridMismatch {
                expected: [3, 3, 3],
                actual: [4, 4, 4]
            })
        ));
    }

    #[test]
    fn finishing_without_masks_is_an_empty_dataset() {
        let acc = MaskAccumulator::new(GridSpec::cubic(2).unwrap());
        assert!(matches!(acc.finish(), Err(EngineError::EmptyDataset)));
    }

    #[test]
    fn run_reports_one_increment_per_mesh() {
        let dir = tempdir().unwrap();
        let small = cuboid(Point3::new(-1.2, -1.2, -1.2), Point3::new(1.2, 1.2, 1.2));
        let large = cuboid(Point3::new(-2.2, -2.2, -2.2), Point3::new(2.2, 2.2, 2.2));
        let paths: Vec<PathBuf> = [("small", &small), ("large", &large)]
            .into_iter()
            .map(|(name, mesh)| {
                let path = dir.path().join(format!("{name}.vtk"));
                VtkFile::write_to_path(mesh, &path).unwrap();
                path
            })
            .collect();

        let increments = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::TaskIncrement = event {
                increments.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let spec = GridSpec::cubic(9).unwrap();
        let mean = run(&paths, &spec, &VoxelizeOptions::default(), &reporter).unwrap();

        assert_eq!(increments.load(Ordering::SeqCst), 2);
        // Grid center is (4, 4, 4): the small cube covers 3^3 samples, the large one 5^3.
        assert_eq!(mean.get(4, 4, 4), 1.0);
        assert_eq!(mean.get(6, 4, 4), 0.5);
        assert_eq!(mean.get(7, 4, 4), 0.0);
        assert_eq!(mean.count_where(|v| v == 1.0), 27);
        assert_eq!(mean.count_where(|v| v == 0.5), 125 - 27);
    }

    #[test]
    fn run_fails_on_missing_mesh_file() {
        let dir = tempdir().unwrap();
        let missing = vec![dir.path().join("absent.vtk")];
        let err = run(
            &missing,
            &GridSpec::cubic(4).unwrap(),
            &VoxelizeOptions::default(),
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MeshLoad { .. }));
    }
}

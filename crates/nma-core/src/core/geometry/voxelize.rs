use super::cross_section::cross_section;
use super::fill_row_between_crossings;
use crate::core::models::grid::{BinaryMask, GridSpec, VoxelGrid};
use crate::core::models::mesh::TriangleMesh;
use nalgebra::Point3;
use serde::Deserialize;
use tracing::{debug, instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fractions of the grid spacing by which rays are lifted off the sample rows, so a ray can
/// never pass exactly through a mesh vertex or edge lying on integer grid coordinates.
const RAY_JITTER_Y: f64 = 3.1e-7;
const RAY_JITTER_Z: f64 = 5.3e-7;
const PARALLEL_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoxelizationMethod {
    /// Even-odd ray casting along x through every sample row.
    #[default]
    RayParity,
    /// Cut the mesh into contours plane by plane and rasterize the contours.
    CrossSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelizeOptions {
    pub method: VoxelizationMethod,
    /// Translate the mesh so that the origin of its coordinate frame lands on the grid center.
    pub center_on_grid: bool,
}

impl Default for VoxelizeOptions {
    fn default() -> Self {
        Self {
            method: VoxelizationMethod::default(),
            center_on_grid: true,
        }
    }
}

/// Triangle projected onto the yz-plane, with the data needed to intersect x-rays.
struct RayTriangle {
    corners: [Point3<f64>; 3],
    y_range: (f64, f64),
    z_range: (f64, f64),
}

impl RayTriangle {
    fn new(corners: [Point3<f64>; 3]) -> Self {
        let range = |values: [f64; 3]| {
            (
                values[0].min(values[1]).min(values[2]),
                values[0].max(values[1]).max(values[2]),
            )
        };
        Self {
            corners,
            y_range: range(corners.map(|c| c.y)),
            z_range: range(corners.map(|c| c.z)),
        }
    }

    /// X coordinate where the ray `(y, z)` pierces the triangle, if it does.
    fn intersect(&self, y: f64, z: f64) -> Option<f64> {
        let [p0, p1, p2] = &self.corners;
        let cross = |ay: f64, az: f64, by: f64, bz: f64| ay * bz - az * by;

        let area = cross(p1.y - p0.y, p1.z - p0.z, p2.y - p0.y, p2.z - p0.z);
        if area.abs() < PARALLEL_EPSILON {
            return None;
        }
        let l0 = cross(p1.y - y, p1.z - z, p2.y - y, p2.z - z) / area;
        let l1 = cross(p2.y - y, p2.z - z, p0.y - y, p0.z - z) / area;
        let l2 = 1.0 - l0 - l1;
        if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
            return None;
        }
        Some(l0 * p0.x + l1 * p1.x + l2 * p2.x)
    }
}

fn positioned_mesh(
    mesh: &TriangleMesh,
    spec: &GridSpec,
    options: &VoxelizeOptions,
) -> TriangleMesh {
    let mut placed = mesh.clone();
    if options.center_on_grid {
        placed.translate(&spec.center().coords);
    }
    placed
}

fn ray_parity_plane(triangles: &[RayTriangle], spec: &GridSpec, k: usize, plane: &mut [u8]) {
    let nx = spec.nx();
    let z = spec.position(0, 0, k).z + RAY_JITTER_Z * spec.spacing.z;

    let in_plane: Vec<&RayTriangle> = triangles
        .iter()
        .filter(|t| t.z_range.0 <= z && z <= t.z_range.1)
        .collect();
    if in_plane.is_empty() {
        return;
    }

    let mut crossings = Vec::new();
    for (j, row) in plane.chunks_exact_mut(nx).enumerate() {
        let y = spec.position(0, j, k).y + RAY_JITTER_Y * spec.spacing.y;
        crossings.clear();
        crossings.extend(
            in_plane
                .iter()
                .filter(|t| t.y_range.0 <= y && y <= t.y_range.1)
                .filter_map(|t| t.intersect(y, z)),
        );
        if crossings.len() % 2 == 1 {
            trace!(row = j, plane = k, "Odd number of ray crossings; ignoring the last one.");
        }
        fill_row_between_crossings(row, &mut crossings, spec);
    }
}

fn cross_section_plane(mesh: &TriangleMesh, spec: &GridSpec, k: usize, plane: &mut [u8]) {
    let nx = spec.nx();
    let z = spec.position(0, 0, k).z;

    let contours = cross_section(mesh, z);
    if contours.is_empty() {
        return;
    }
    let edges: Vec<_> = contours
        .iter()
        .filter(|c| c.is_closed)
        .flat_map(|c| c.segments())
        .collect();

    let mut crossings = Vec::new();
    for (j, row) in plane.chunks_exact_mut(nx).enumerate() {
        let y = spec.position(0, j, k).y + RAY_JITTER_Y * spec.spacing.y;
        crossings.clear();
        crossings.extend(edges.iter().filter_map(|(a, b)| {
            ((a.y > y) != (b.y > y)).then(|| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
        }));
        fill_row_between_crossings(row, &mut crossings, spec);
    }
}

/// Rasterizes a closed surface into a binary mask on `spec`.
///
/// Samples inside the surface are set to [`MASK_INSIDE`](crate::core::models::grid::MASK_INSIDE),
/// all others to zero. Z-planes are independent and are processed in parallel when the
/// `parallel` feature is enabled.
#[instrument(skip_all, name = "voxelize", fields(faces = mesh.faces().len()))]
pub fn voxelize(mesh: &TriangleMesh, spec: &GridSpec, options: &VoxelizeOptions) -> BinaryMask {
    let placed = positioned_mesh(mesh, spec, options);
    let triangles: Vec<RayTriangle> = match options.method {
        VoxelizationMethod::RayParity => placed.triangles().map(RayTriangle::new).collect(),
        VoxelizationMethod::CrossSection => Vec::new(),
    };

    let fill_plane = |(k, plane): (usize, &mut [u8])| match options.method {
        VoxelizationMethod::RayParity => ray_parity_plane(&triangles, spec, k, plane),
        VoxelizationMethod::CrossSection => cross_section_plane(&placed, spec, k, plane),
    };

    let mut mask: BinaryMask = VoxelGrid::zeros(*spec);
    let plane_len = spec.nx() * spec.ny();

    #[cfg(not(feature = "parallel"))]
    let iterator = mask.as_mut_slice().chunks_exact_mut(plane_len).enumerate();

    #[cfg(feature = "parallel")]
    let iterator = mask
        .as_mut_slice()
        .par_chunks_exact_mut(plane_len)
        .enumerate();

    iterator.for_each(fill_plane);
    debug!(
        inside = mask.count_where(|v| v > 0),
        total = spec.voxel_count(),
        "Voxelization finished."
    );
    mask
}

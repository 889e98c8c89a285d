use crate::core::models::grid::VoxelGrid;
use crate::core::models::mesh::{MeshError, TriangleMesh};
use nalgebra::Point3;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, instrument};

/// Cube corners are numbered `dx + 2 * dy + 4 * dz`. Every tetrahedron runs along the main
/// diagonal from corner 0 to corner 7, stepping one axis at a time (Kuhn decomposition),
/// so neighbouring cubes always split their shared face along the same diagonal.
const KUHN_TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

#[derive(Debug, Error, PartialEq)]
pub enum IsosurfaceError {
    #[error("Step size must be at least 1")]
    ZeroStepSize,
    #[error("Grid {dims:?} sampled every {step_size} voxels has fewer than 2 samples along an axis")]
    GridTooSmall { dims: [usize; 3], step_size: usize },
    #[error("Iso-level must be finite, got {0}")]
    InvalidLevel(f32),
    #[error("Generated mesh is inconsistent: {0}")]
    Mesh(#[from] MeshError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsosurfaceOptions {
    /// Samples strictly above this value are inside the surface.
    pub level: f32,
    /// Use every `step_size`-th sample along each axis; larger steps give coarser meshes.
    pub step_size: usize,
}

impl Default for IsosurfaceOptions {
    fn default() -> Self {
        Self {
            level: 0.5,
            step_size: 1,
        }
    }
}

struct Sampler<'a> {
    field: &'a VoxelGrid<f32>,
    step: usize,
    counts: [usize; 3],
}

impl Sampler<'_> {
    fn id(&self, a: usize, b: usize, c: usize) -> usize {
        (c * self.counts[1] + b) * self.counts[0] + a
    }

    fn value(&self, a: usize, b: usize, c: usize) -> f32 {
        self.field.get(a * self.step, b * self.step, c * self.step)
    }

    fn position(&self, a: usize, b: usize, c: usize) -> Point3<f64> {
        self.field
            .spec()
            .position(a * self.step, b * self.step, c * self.step)
    }
}

#[derive(Clone, Copy)]
struct Corner {
    id: usize,
    value: f32,
    position: Point3<f64>,
}

#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Point3<f64>>,
    edge_vertices: HashMap<(usize, usize), usize>,
    faces: Vec<[usize; 3]>,
}

impl MeshBuilder {
    fn edge_vertex(&mut self, a: &Corner, b: &Corner, level: f32) -> usize {
        let (lo, hi) = if a.id < b.id { (a, b) } else { (b, a) };
        *self
            .edge_vertices
            .entry((lo.id, hi.id))
            .or_insert_with(|| {
                let t = f64::from((level - lo.value) / (hi.value - lo.value));
                self.vertices
                    .push(lo.position + (hi.position - lo.position) * t);
                self.vertices.len() - 1
            })
    }

    /// Polygonizes one tetrahedron.
    ///
    /// Winding is decided from the orientation of the tetrahedron corners rather than from
    /// the interpolated vertices, which may coincide when a sample equals `level`.
    fn polygonize_tetrahedron(&mut self, corners: [Corner; 4], level: f32) {
        let (inside, outside): (Vec<Corner>, Vec<Corner>) =
            corners.iter().partition(|c| c.value > level);

        match (inside.as_slice(), outside.as_slice()) {
            ([lone], others) | (others, [lone]) if others.len() == 3 => {
                let mut face = [
                    self.edge_vertex(lone, &others[0], level),
                    self.edge_vertex(lone, &others[1], level),
                    self.edge_vertex(lone, &others[2], level),
                ];
                // Positive when the face normal points away from the lone corner.
                let away = orientation(lone, &others[0], &others[1], &others[2]) > 0.0;
                let lone_inside = inside.len() == 1;
                if away != lone_inside {
                    face.swap(1, 2);
                }
                self.faces.push(face);
            }
            ([a, b], [c, d]) => {
                let ac = self.edge_vertex(a, c, level);
                let ad = self.edge_vertex(a, d, level);
                let bd = self.edge_vertex(b, d, level);
                let bc = self.edge_vertex(b, c, level);
                if orientation(a, b, c, d) > 0.0 {
                    self.faces.push([ac, ad, bd]);
                    self.faces.push([ac, bd, bc]);
                } else {
                    self.faces.push([ac, bd, ad]);
                    self.faces.push([ac, bc, bd]);
                }
            }
            _ => {}
        }
    }
}

/// Six times the signed volume of the tetrahedron `(a, b, c, d)`.
fn orientation(a: &Corner, b: &Corner, c: &Corner, d: &Corner) -> f64 {
    let origin = a.position;
    (b.position - origin)
        .cross(&(c.position - origin))
        .dot(&(d.position - origin))
}

/// Extracts the surface `value == level` of a scalar field as a closed triangle mesh.
///
/// Each grid cube is split into six tetrahedra and every tetrahedron is polygonized on
/// its own; vertices on shared grid edges are merged, so the surface is watertight
/// wherever it does not reach the grid boundary. Faces are wound outward, away from
/// samples above `level`. Vertices are placed in the physical frame of the grid spec.
#[instrument(skip_all, name = "isosurface", fields(level = options.level, step = options.step_size))]
pub fn extract_isosurface(
    field: &VoxelGrid<f32>,
    options: &IsosurfaceOptions,
) -> Result<TriangleMesh, IsosurfaceError> {
    if options.step_size == 0 {
        return Err(IsosurfaceError::ZeroStepSize);
    }
    if !options.level.is_finite() {
        return Err(IsosurfaceError::InvalidLevel(options.level));
    }
    let dims = field.dims();
    let counts = dims.map(|n| n.saturating_sub(1) / options.step_size + 1);
    if counts.iter().any(|&n| n < 2) {
        return Err(IsosurfaceError::GridTooSmall {
            dims,
            step_size: options.step_size,
        });
    }

    let sampler = Sampler {
        field,
        step: options.step_size,
        counts,
    };
    let mut builder = MeshBuilder::default();

    for c in 0..counts[2] - 1 {
        for b in 0..counts[1] - 1 {
            for a in 0..counts[0] - 1 {
                let cube: [Corner; 8] = std::array::from_fn(|corner| {
                    let (x, y, z) = (a + (corner & 1), b + ((corner >> 1) & 1), c + (corner >> 2));
                    Corner {
                        id: sampler.id(x, y, z),
                        value: sampler.value(x, y, z),
                        position: sampler.position(x, y, z),
                    }
                });
                let all_inside = cube.iter().all(|k| k.value > options.level);
                let all_outside = cube.iter().all(|k| k.value <= options.level);
                if all_inside || all_outside {
                    continue;
                }
                for tet in &KUHN_TETRAHEDRA {
                    builder.polygonize_tetrahedron(tet.map(|i| cube[i]), options.level);
                }
            }
        }
    }

    debug!(
        vertices = builder.vertices.len(),
        faces = builder.faces.len(),
        "Isosurface extracted."
    );
    Ok(TriangleMesh::new(builder.vertices, builder.faces)?)
}

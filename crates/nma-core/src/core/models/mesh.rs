use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("Face {face} references vertex {index}, but the mesh has only {vertex_count} vertices")]
    FaceIndexOutOfBounds {
        face: usize,
        index: usize,
        vertex_count: usize,
    },
    #[error("Polygon {polygon} has {arity} vertices; at least 3 are required")]
    DegeneratePolygon { polygon: usize, arity: usize },
    #[error("Invalid rescale parameters: {0}")]
    InvalidRescale(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshSummary {
    pub vertex_count: usize,
    pub face_count: usize,
    pub bounding_box: Option<BoundingBox>,
    pub surface_area: f64,
    pub volume: f64,
}

/// A triangulated surface.
///
/// Faces index into `vertices` and are expected to be wound counter-clockwise when seen
/// from outside, so that face normals point outward and [`TriangleMesh::signed_volume`]
/// is positive for a closed surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self, MeshError> {
        let vertex_count = vertices.len();
        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(&index) = face.iter().find(|&&i| i >= vertex_count) {
                return Err(MeshError::FaceIndexOutOfBounds {
                    face: face_idx,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(Self { vertices, faces })
    }

    /// Builds a mesh from arbitrary polygons, fan-triangulating each one around its first vertex.
    pub fn from_polygons(
        vertices: Vec<Point3<f64>>,
        polygons: &[Vec<usize>],
    ) -> Result<Self, MeshError> {
        let mut faces = Vec::with_capacity(polygons.len());
        for (polygon_idx, polygon) in polygons.iter().enumerate() {
            if polygon.len() < 3 {
                return Err(MeshError::DegeneratePolygon {
                    polygon: polygon_idx,
                    arity: polygon.len(),
                });
            }
            let anchor = polygon[0];
            for pair in polygon[1..].windows(2) {
                faces.push([anchor, pair[0], pair[1]]);
            }
        }
        Self::new(vertices, faces)
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    #[inline]
    pub fn triangle(&self, face_idx: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[face_idx];
        [self.vertices[a], self.vertices[b], self.vertices[c]]
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        (0..self.faces.len()).map(move |i| self.triangle(i))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.vertices.first()?;
        let (min, max) = self
            .vertices
            .iter()
            .fold((*first, *first), |(min, max), v| {
                (min.coords.inf(&v.coords).into(), max.coords.sup(&v.coords).into())
            });
        Some(BoundingBox { min, max })
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for v in &mut self.vertices {
            *v += offset;
        }
    }

    pub fn scale_axes(&mut self, factors: &Vector3<f64>) {
        for v in &mut self.vertices {
            v.coords.component_mul_assign(factors);
        }
    }

    /// Converts z coordinates from slice indices to physical units.
    ///
    /// A stack of `extent / z_spacing` slices (rounded to the nearest integer) is assumed to
    /// cover `extent`; every z coordinate is multiplied by the effective slice spacing.
    pub fn rescale_z(&mut self, z_spacing: f64, extent: f64) -> Result<f64, MeshError> {
        if !(z_spacing > 0.0) || !(extent > 0.0) {
            return Err(MeshError::InvalidRescale(format!(
                "z-spacing ({}) and extent ({}) must both be positive",
                z_spacing, extent
            )));
        }
        let slice_count = (extent / z_spacing).round();
        if slice_count < 1.0 {
            return Err(MeshError::InvalidRescale(format!(
                "extent {} holds no slice at spacing {}",
                extent, z_spacing
            )));
        }
        let dz = extent / slice_count;
        for v in &mut self.vertices {
            v.z *= dz;
        }
        Ok(dz)
    }

    pub fn face_normal(&self, face_idx: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle(face_idx);
        (b - a).cross(&(c - a))
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len())
            .map(|i| self.face_normal(i).norm() * 0.5)
            .sum()
    }

    /// Volume enclosed by the surface via the divergence theorem.
    ///
    /// Only meaningful for closed meshes; negative when faces are wound inward.
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)))
            .sum::<f64>()
            / 6.0
    }

    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.coords);
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    pub fn summary(&self) -> MeshSummary {
        MeshSummary {
            vertex_count: self.vertices.len(),
            face_count: self.faces.len(),
            bounding_box: self.bounding_box(),
            surface_area: self.surface_area(),
            volume: self.signed_volume(),
        }
    }
}

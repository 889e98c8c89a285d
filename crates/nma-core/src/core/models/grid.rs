use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Grid dimensions must all be non-zero, got {0:?}")]
    ZeroDimension([usize; 3]),
    #[error("Grid spacing must be positive and finite, got {0:?}")]
    InvalidSpacing(Vector3<f64>),
    #[error("Grid dimensions {0:?} hold more voxels than can be addressed")]
    TooLarge([usize; 3]),
    #[error("Data length {actual} does not match grid of {expected} voxels")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Geometry of a regularly sampled 3D grid.
///
/// Sample `(i, j, k)` sits at `origin + (i * spacing.x, j * spacing.y, k * spacing.z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub dims: [usize; 3],
    pub spacing: Vector3<f64>,
    pub origin: Point3<f64>,
}

impl GridSpec {
    pub fn new(dims: [usize; 3]) -> Result<Self, GridError> {
        if dims.contains(&0) {
            return Err(GridError::ZeroDimension(dims));
        }
        if Self::checked_voxel_count(dims).is_none() {
            return Err(GridError::TooLarge(dims));
        }
        Ok(Self {
            dims,
            spacing: Vector3::new(1.0, 1.0, 1.0),
            origin: Point3::origin(),
        })
    }

    pub fn cubic(size: usize) -> Result<Self, GridError> {
        Self::new([size; 3])
    }

    pub fn with_spacing(mut self, spacing: Vector3<f64>) -> Result<Self, GridError> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(GridError::InvalidSpacing(spacing));
        }
        self.spacing = spacing;
        Ok(self)
    }

    pub fn with_z_spacing(self, dz: f64) -> Result<Self, GridError> {
        let spacing = Vector3::new(self.spacing.x, self.spacing.y, dz);
        self.with_spacing(spacing)
    }

    pub fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Grid sampling `[0, extent]` along z with `round(extent / dz)` evenly spread planes,
    /// the first on `z = 0` and the last on `z = extent`.
    pub fn z_planes_for_extent(
        xy_dims: [usize; 2],
        extent: f64,
        dz: f64,
    ) -> Result<Self, GridError> {
        let planes = if dz > 0.0 && extent > 0.0 {
            (extent / dz).round() as usize
        } else {
            0
        };
        let grid = Self::new([xy_dims[0], xy_dims[1], planes])?;
        let step = if planes > 1 {
            extent / (planes - 1) as f64
        } else {
            extent
        };
        grid.with_z_spacing(step)
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.dims[2]
    }

    pub fn checked_voxel_count(dims: [usize; 3]) -> Option<usize> {
        dims.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
    }

    pub fn voxel_count(&self) -> usize {
        self.dims.iter().fold(1usize, |acc, &n| acc.saturating_mul(n))
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.ny() + j) * self.nx() + i
    }

    #[inline]
    pub fn position(&self, i: usize, j: usize, k: usize) -> Point3<f64> {
        self.origin
            + Vector3::new(
                i as f64 * self.spacing.x,
                j as f64 * self.spacing.y,
                k as f64 * self.spacing.z,
            )
    }

    /// Physical extent covered between the first and last sample on each axis.
    pub fn extent(&self) -> Vector3<f64> {
        Vector3::new(
            self.nx().saturating_sub(1) as f64 * self.spacing.x,
            self.ny().saturating_sub(1) as f64 * self.spacing.y,
            self.nz().saturating_sub(1) as f64 * self.spacing.z,
        )
    }

    pub fn center(&self) -> Point3<f64> {
        self.origin + self.extent() / 2.0
    }
}

/// Dense scalar field on a [`GridSpec`], stored z-major, then y, then x.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid<T> {
    spec: GridSpec,
    data: Vec<T>,
}

pub type BinaryMask = VoxelGrid<u8>;
pub type MeanMask = VoxelGrid<f32>;

pub const MASK_INSIDE: u8 = 255;
pub const MASK_OUTSIDE: u8 = 0;

impl<T: Copy + Default> VoxelGrid<T> {
    pub fn zeros(spec: GridSpec) -> Self {
        Self {
            data: vec![T::default(); spec.voxel_count()],
            spec,
        }
    }
}

impl<T: Copy> VoxelGrid<T> {
    pub fn from_vec(spec: GridSpec, data: Vec<T>) -> Result<Self, GridError> {
        if data.len() != spec.voxel_count() {
            return Err(GridError::LengthMismatch {
                expected: spec.voxel_count(),
                actual: data.len(),
            });
        }
        Ok(Self { spec, data })
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn dims(&self) -> [usize; 3] {
        self.spec.dims
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> T {
        self.data[self.spec.index(i, j, k)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: T) {
        let idx = self.spec.index(i, j, k);
        self.data[idx] = value;
    }

    pub fn plane(&self, k: usize) -> &[T] {
        let len = self.spec.nx() * self.spec.ny();
        &self.data[k * len..(k + 1) * len]
    }

    pub fn plane_mut(&mut self, k: usize) -> &mut [T] {
        let len = self.spec.nx() * self.spec.ny();
        &mut self.data[k * len..(k + 1) * len]
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> VoxelGrid<U> {
        VoxelGrid {
            spec: self.spec,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn count_where(&self, predicate: impl Fn(T) -> bool) -> usize {
        self.data.iter().filter(|&&v| predicate(v)).count()
    }

    pub fn with_spec(mut self, spec: GridSpec) -> Result<Self, GridError> {
        if spec.voxel_count() != self.data.len() {
            return Err(GridError::LengthMismatch {
                expected: spec.voxel_count(),
                actual: self.data.len(),
            });
        }
        self.spec = spec;
        Ok(self)
    }
}

impl MeanMask {
    pub fn max_value(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::max)
    }
}

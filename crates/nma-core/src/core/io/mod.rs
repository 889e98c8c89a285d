//! Provides input/output functionality for mesh, mask and dataset files.
//!
//! Surface meshes are read from VTK legacy polydata files (the format the nucleus
//! segmentations are distributed in) and written as VTK or STL. Voxel masks are persisted
//! as NumPy `.npy` arrays so they can be inspected with the usual scientific tooling.
//! Datasets are described by CSV manifests listing one cell identifier per row.

pub mod manifest;
pub mod npy;
pub mod stl;
pub mod traits;
pub mod vtk;

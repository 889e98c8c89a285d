//! Data models shared across the library: surface meshes and sampled voxel grids.

pub mod grid;
pub mod mesh;

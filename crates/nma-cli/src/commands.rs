pub mod info;
pub mod mean_mesh;
pub mod slice;
pub mod surface;
pub mod voxelize;

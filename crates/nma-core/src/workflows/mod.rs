//! # Workflows Module
//!
//! High-level entry points that tie the [`engine`](crate::engine) and
//! [`core`](crate::core) layers together.
//!
//! - **Mean Mesh Workflow** ([`mean_mesh`]) - Averages a dataset of nucleus meshes into a mean
//!   occupancy mask and extracts the mean shape from it. Also exposes the single-step
//!   operations (voxelize one mesh, surface one mask, slice one mesh) used by the CLI.

pub mod mean_mesh;

//! # Engine Module
//!
//! Stateful orchestration of the mean-shape computation on top of the stateless
//! [`core`](crate::core) algorithms.
//!
//! - **Configuration** ([`config`]) - Dataset, grid, voxelization, surface and output settings
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting for front ends
//! - **Error Handling** ([`error`]) - Engine-level error type aggregating the core errors
//!
//! The computational units live in `tasks` and are driven by the
//! [`workflows`](crate::workflows) layer.

pub mod config;
pub mod error;
pub mod progress;
pub(crate) mod tasks;

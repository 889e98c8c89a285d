//! # normal_mode_analysis Core Library
//!
//! Computes the mean shape of a population of segmented cell nuclei. Every nucleus is
//! given as a closed triangulated surface; the library voxelizes each surface onto a common
//! grid, averages the resulting binary masks into an occupancy map, and extracts the
//! surface of that map as the mean nuclear mesh.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`TriangleMesh`, `VoxelGrid`),
//!   the geometry algorithms (voxelization, cross-sectioning, isosurface extraction), and
//!   file format readers and writers (VTK, STL, NPY, CSV manifests).
//!
//! - **[`engine`]: The Logic Core.** Configuration, progress reporting, error aggregation and
//!   the individual pipeline tasks such as mask accumulation and surface extraction.
//!
//! - **[`workflows`]: The Public API.** Complete procedures, most importantly the mean mesh
//!   workflow that runs from a dataset manifest to a written STL file.

pub mod core;
pub mod engine;
pub mod workflows;

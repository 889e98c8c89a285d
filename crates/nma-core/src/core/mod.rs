//! Foundational data models, geometry algorithms and file I/O.

pub mod geometry;
pub mod io;
pub mod models;

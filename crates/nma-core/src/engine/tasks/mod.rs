//! Computational units of the mean-shape pipeline.
//!
//! Each task drives one stage over core algorithms and reports its progress; the
//! workflows compose them into complete procedures.

pub mod mask_accumulation;
pub mod surface_extraction;

//! Geometry algorithms that move between surface and volume representations.
//!
//! - [`voxelize`] turns a closed surface into a binary mask on a grid.
//! - [`cross_section`] cuts a surface with a z-plane into contours.
//! - [`isosurface`] extracts a closed surface from a scalar field.
//!
//! [`voxelize`] and [`cross_section`] share the even-odd scanline fill defined here.

pub mod cross_section;
pub mod isosurface;
pub mod voxelize;

use crate::core::models::grid::{GridSpec, MASK_INSIDE};

/// Fills the samples of one grid row that lie strictly between successive pairs of
/// ray crossings (even-odd rule). `crossings` need not be sorted.
pub(crate) fn fill_row_between_crossings(
    row: &mut [u8],
    crossings: &mut [f64],
    spec: &GridSpec,
) -> usize {
    if crossings.len() < 2 {
        return 0;
    }
    crossings.sort_unstable_by(f64::total_cmp);

    let (origin, step) = (spec.origin.x, spec.spacing.x);
    let last = row.len() as isize - 1;
    let mut filled = 0;
    for pair in crossings.chunks_exact(2) {
        let first = ((pair[0] - origin) / step).floor() as isize + 1;
        let end = ((pair[1] - origin) / step).ceil() as isize - 1;
        let (first, end) = (first.max(0), end.min(last));
        for i in first..=end {
            row[i as usize] = MASK_INSIDE;
            filled += 1;
        }
    }
    filled
}

//! Geometric helpers for overlap checks between placed labels and support blocks.

use crate::labels::LabelPlacement;
use crate::types::{BoundingBox, EPSILON_GENERAL, Rect, Vec3};

/// Overlap length of two intervals along one axis.
///
/// # Example
/// ```
/// use wrap_it_now::geometry::overlap_1d;
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Shared area of two rectangles.
pub fn overlap_area(a: &Rect, b: &Rect) -> f64 {
    overlap_1d(a.x, a.right(), b.x, b.right()) * overlap_1d(a.y, a.bottom(), b.y, b.bottom())
}

/// Checks whether two placed labels share interior area on the same panel.
///
/// Labels that merely touch along an edge do not overlap.
pub fn placements_overlap(a: &LabelPlacement, b: &LabelPlacement) -> bool {
    a.panel_id == b.panel_id && overlap_area(&a.rect, &b.rect) > EPSILON_GENERAL
}

/// Index pairs of all overlapping placements, in ascending order.
pub fn find_overlaps(placements: &[LabelPlacement]) -> Vec<(usize, usize)> {
    let mut overlaps = Vec::new();
    for (i, a) in placements.iter().enumerate() {
        for (j, b) in placements.iter().enumerate().skip(i + 1) {
            if placements_overlap(a, b) {
                overlaps.push((i, j));
            }
        }
    }
    overlaps
}

/// Checks whether a point lies inside (or on the surface of) a box.
pub fn point_inside(point: Vec3, bounds: &BoundingBox) -> bool {
    point.x >= bounds.min.x
        && point.x <= bounds.max.x
        && point.y >= bounds.min.y
        && point.y <= bounds.max.y
        && point.z >= bounds.min.z
        && point.z <= bounds.max.z
}

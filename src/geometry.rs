//! Geometric predicates for 2D collision checks on the load bed.
//!
//! Everything the planner decides about a candidate rectangle goes through
//! these helpers: strict overlap, tolerant bounds, clamping and hit tests.

use crate::model::PlacedBox;
use crate::types::{Bed, Point, Rect};

/// Strict 2D overlap of two rectangles.
///
/// Two rectangles do NOT overlap if they are separated on at least one axis;
/// sharing an edge counts as separated.
///
/// # Example
/// ```
/// use truck_planner::geometry::overlaps;
/// use truck_planner::types::Rect;
///
/// let a = Rect::new(0.0, 0.0, 2.0, 1.0);
/// let b = Rect::new(1.0, 0.5, 2.0, 1.0);
/// assert!(overlaps(&a, &b));
/// ```
#[inline]
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.intersects(b)
}

/// Checks that a rectangle lies within `[0, bound_w] × [0, bound_h]`, up to `epsilon`.
#[inline]
pub fn within_bounds(r: &Rect, bound_w: f64, bound_h: f64, epsilon: f64) -> bool {
    r.x >= -epsilon
        && r.y >= -epsilon
        && r.right() <= bound_w + epsilon
        && r.bottom() <= bound_h + epsilon
}

/// [`within_bounds`] against a truck bed.
#[inline]
pub fn within_bed(r: &Rect, bed: &Bed, epsilon: f64) -> bool {
    within_bounds(r, bed.length, bed.width, epsilon)
}

/// Checks a candidate rectangle against every placed box, optionally ignoring one id.
///
/// The skipped id is the box being moved, which must not collide with itself.
pub fn overlaps_any<'a>(
    candidate: &Rect,
    placed: impl IntoIterator<Item = &'a PlacedBox>,
    skip_id: Option<&str>,
) -> bool {
    placed
        .into_iter()
        .filter(|p| skip_id != Some(p.id()))
        .any(|p| overlaps(candidate, &p.rect))
}

/// Pulls a rectangle back onto the bed, keeping its size.
///
/// A rectangle larger than the bed is pinned to the origin on that axis.
pub fn clamp_to_bed(r: &Rect, bed: &Bed) -> Rect {
    let max_x = (bed.length - r.width).max(0.0);
    let max_y = (bed.width - r.height).max(0.0);
    r.moved_to(r.x.clamp(0.0, max_x), r.y.clamp(0.0, max_y))
}

/// Finds the front-most box under a point.
///
/// Later entries are drawn on top, so the list is searched back to front.
pub fn hit_test<'a>(placed: &'a [PlacedBox], point: &Point) -> Option<&'a PlacedBox> {
    placed.iter().rev().find(|p| p.rect.contains_point(point))
}

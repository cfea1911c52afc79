//! First-free-spot search for a single box against an existing arrangement.
//!
//! The bed is sampled on a fixed grid, row by row from the origin, and the
//! first in-bounds, collision-free position wins. The grid step bounds the
//! resolution: a gap narrower than the step may be missed, and a result is
//! never guaranteed to reproduce an earlier manual placement.

use log::debug;

use crate::geometry::{overlaps_any, within_bed};
use crate::model::PlacedBox;
use crate::packer::LayoutConfig;
use crate::types::{Bed, Rect};

/// Upper bound on stepped offsets per axis.
///
/// A longer axis is sampled with a proportionally wider step, so a huge bed
/// costs no more than this many candidates per row.
pub const MAX_GRID_POSITIONS: usize = 10_000;

/// Candidate offsets along one axis, generated on demand.
///
/// Offsets run `0, step, 2·step, …` up to the last position where the object
/// still fits, which is always included so a box can sit flush against the far wall.
#[derive(Clone, Copy, Debug)]
struct AxisPositions {
    step: f64,
    steps: usize,
    max_pos: f64,
    far_wall: bool,
}

impl AxisPositions {
    /// Origin only, for objects that exactly fill the axis.
    const ORIGIN: Self = Self {
        step: 0.0,
        steps: 0,
        max_pos: 0.0,
        far_wall: false,
    };

    fn iter(self) -> impl Iterator<Item = f64> {
        (0..=self.steps)
            .map(move |i| (i as f64 * self.step).min(self.max_pos))
            .chain(self.far_wall.then_some(self.max_pos))
    }
}

/// Builds the candidate offsets along one axis.
///
/// # Parameters
/// * `bed_len` - Extent of the bed on this axis
/// * `object_len` - Extent of the object on this axis
/// * `step` - Grid step
/// * `epsilon` - Numerical tolerance
///
/// # Returns
/// `None` when the object is longer than the bed
fn axis_positions(bed_len: f64, object_len: f64, step: f64, epsilon: f64) -> Option<AxisPositions> {
    if !(object_len <= bed_len + epsilon) {
        return None;
    }
    let max_pos = (bed_len - object_len).max(0.0);
    if max_pos <= epsilon || !max_pos.is_finite() {
        return Some(AxisPositions::ORIGIN);
    }
    if !(step > 0.0) || !step.is_finite() {
        return Some(AxisPositions {
            step: 0.0,
            steps: 0,
            max_pos,
            far_wall: true,
        });
    }

    let (step, steps) = match (max_pos / step + epsilon).floor() {
        n if n > MAX_GRID_POSITIONS as f64 => {
            (max_pos / MAX_GRID_POSITIONS as f64, MAX_GRID_POSITIONS)
        }
        n => (step, n as usize),
    };
    let last = (steps as f64 * step).min(max_pos);
    Some(AxisPositions {
        step,
        steps,
        max_pos,
        far_wall: (last - max_pos).abs() > epsilon,
    })
}

/// Finds the first free position for a `width × height` rectangle.
///
/// # Parameters
/// * `width`, `height` - Footprint in the orientation to test
/// * `bed` - The load bed
/// * `placed` - Boxes already on this bed
/// * `skip_id` - A box to ignore, typically the one being re-placed
/// * `config` - Grid step and tolerance
///
/// # Returns
/// The placed rectangle, or `None` once the whole grid is exhausted
pub fn find_free_spot(
    width: f64,
    height: f64,
    bed: &Bed,
    placed: &[PlacedBox],
    skip_id: Option<&str>,
    config: &LayoutConfig,
) -> Option<Rect> {
    let xs = axis_positions(bed.length, width, config.grid_step, config.epsilon)?;
    let ys = axis_positions(bed.width, height, config.grid_step, config.epsilon)?;

    for y in ys.iter() {
        for x in xs.iter() {
            let candidate = Rect::new(x, y, width, height);
            if !within_bed(&candidate, bed, config.epsilon) {
                continue;
            }
            if overlaps_any(&candidate, placed, skip_id) {
                continue;
            }
            return Some(candidate);
        }
    }
    None
}

/// Places a footprint at the first free spot, trying it as given and then turned.
///
/// The turned orientation is only tried when rotation is allowed and the
/// footprint is not square.
pub fn place_first_free(
    footprint: (f64, f64),
    bed: &Bed,
    placed: &[PlacedBox],
    skip_id: Option<&str>,
    config: &LayoutConfig,
) -> Option<Rect> {
    let (w, h) = footprint;
    let mut orientations = vec![(w, h)];
    if config.allow_rotation && (w - h).abs() > config.epsilon {
        orientations.push((h, w));
    }

    let spot = orientations
        .into_iter()
        .find_map(|(ow, oh)| find_free_spot(ow, oh, bed, placed, skip_id, config));

    if spot.is_none() {
        debug!(
            "No free spot for {:.2} x {:.2} m among {} placed boxes",
            w,
            h,
            placed.len()
        );
    }
    spot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::overlaps;
    use crate::model::Cargo;
    use crate::types::EPSILON_GENERAL;

    fn placed(id: &str, rect: Rect) -> PlacedBox {
        PlacedBox::new(Cargo::new(id, id, rect.area(), 1.0), "t1", rect)
    }

    fn positions(bed_len: f64, object_len: f64, step: f64) -> Vec<f64> {
        axis_positions(bed_len, object_len, step, EPSILON_GENERAL)
            .map(|axis| axis.iter().collect())
            .unwrap_or_default()
    }

    #[test]
    fn axis_positions_include_far_wall() {
        assert_eq!(positions(1.0, 0.375, 0.25), vec![0.0, 0.25, 0.5, 0.625]);
    }

    #[test]
    fn axis_positions_for_exact_fit_and_oversize() {
        assert_eq!(positions(2.0, 2.0, 0.05), vec![0.0]);
        assert!(axis_positions(2.0, 2.5, 0.05, EPSILON_GENERAL).is_none());
    }

    #[test]
    fn axis_positions_do_not_drift() {
        let positions = positions(8.0, 1.0, 0.05);
        assert_eq!(positions.len(), 141);
        assert!((positions[140] - 7.0).abs() < 1e-12);
        assert!((positions[60] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn huge_axis_is_sampled_with_a_wider_step() {
        let axis = axis_positions(1.0e12, 1.0, 0.05, EPSILON_GENERAL).expect("object fits");
        let mut count = 0;
        let mut last = 0.0;
        for position in axis.iter() {
            count += 1;
            last = position;
        }
        assert!(count <= MAX_GRID_POSITIONS + 2);
        assert_eq!(last, 1.0e12 - 1.0);
    }

    #[test]
    fn huge_bed_still_finds_a_spot_next_to_a_box() {
        let bed = Bed::new(1.0e12, 2.5);
        let existing = vec![placed("a", Rect::new(0.0, 0.0, 1.0, 2.5))];
        let spot = find_free_spot(1.0, 2.5, &bed, &existing, None, &LayoutConfig::default())
            .expect("plenty of room");
        assert!(spot.x >= 1.0);
        assert!(!overlaps(&spot, &existing[0].rect));
    }

    #[test]
    fn empty_bed_places_at_origin() {
        let bed = Bed::new(8.0, 2.5);
        let spot = find_free_spot(1.0, 1.0, &bed, &[], None, &LayoutConfig::default());
        assert_eq!(spot, Some(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn scans_row_major_past_existing_boxes() {
        let bed = Bed::new(4.0, 2.0);
        let config = LayoutConfig::builder().grid_step(0.5).build();
        let existing = vec![placed("a", Rect::new(0.0, 0.0, 2.0, 1.0))];

        let spot = find_free_spot(1.0, 1.0, &bed, &existing, None, &config).expect("spot");
        assert_eq!(spot, Rect::new(2.0, 0.0, 1.0, 1.0));
        assert!(!overlaps(&spot, &existing[0].rect));
    }

    #[test]
    fn full_bed_exhausts_the_grid() {
        let bed = Bed::new(2.0, 2.0);
        let existing = vec![
            placed("a", Rect::new(0.0, 0.0, 2.0, 1.0)),
            placed("b", Rect::new(0.0, 1.0, 2.0, 1.0)),
        ];
        let spot = place_first_free((1.0, 1.0), &bed, &existing, None, &LayoutConfig::default());
        assert!(spot.is_none());
    }

    #[test]
    fn falls_back_to_turned_orientation() {
        let bed = Bed::new(3.0, 3.0);
        let config = LayoutConfig::builder().grid_step(0.5).build();
        // Only a 1 m wide, 3 m deep strip is left on the right.
        let existing = vec![placed("a", Rect::new(0.0, 0.0, 2.0, 3.0))];

        let spot = place_first_free((3.0, 1.0), &bed, &existing, None, &config);
        assert_eq!(spot, Some(Rect::new(2.0, 0.0, 1.0, 3.0)));

        let no_turn = LayoutConfig::builder().grid_step(0.5).allow_rotation(false).build();
        assert!(place_first_free((3.0, 1.0), &bed, &existing, None, &no_turn).is_none());
    }

    #[test]
    fn skipped_box_does_not_block_itself() {
        let bed = Bed::new(1.0, 1.0);
        let existing = vec![placed("self", Rect::new(0.0, 0.0, 1.0, 1.0))];
        let config = LayoutConfig::default();
        assert!(find_free_spot(1.0, 1.0, &bed, &existing, None, &config).is_none());
        assert_eq!(
            find_free_spot(1.0, 1.0, &bed, &existing, Some("self"), &config),
            Some(Rect::new(0.0, 0.0, 1.0, 1.0))
        );
    }

    #[test]
    fn coarse_grid_finds_flush_gap_through_far_wall_candidate() {
        let bed = Bed::new(2.25, 1.0);
        let config = LayoutConfig::builder().grid_step(1.0).build();
        let existing = vec![placed("a", Rect::new(0.0, 0.0, 1.25, 1.0))];
        let spot = find_free_spot(1.0, 1.0, &bed, &existing, None, &config);
        assert_eq!(spot, Some(Rect::new(1.25, 0.0, 1.0, 1.0)));
    }
}

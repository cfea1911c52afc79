//! Greedy shelf packing of boxes onto a truck bed.
//!
//! Boxes are sorted by footprint area (largest first) and laid out in rows
//! ("shelves") from the origin: left to right along the bed's length, wrapping
//! across its width when a row is full. Each box is tried as-is, then turned
//! by 90° if rotation is allowed.
//!
//! This is a first-fit heuristic. It is deterministic and linear after the
//! sort, and it leaves gaps an optimal packer would fill; the free-spot
//! scanner covers incremental placement into those gaps.

use std::cmp::Ordering;

use log::debug;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{PlacedBox, UnplacedBox};
use crate::types::{Bed, EPSILON_GENERAL, Footprint, Rect};

/// Tuning for packing, scanning and interactive edits.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Step of the free-spot search grid in meters (smaller = finer but slower)
    pub grid_step: f64,
    /// Tolerance for bounds checks
    pub epsilon: f64,
    /// Whether boxes may be turned by 90°
    pub allow_rotation: bool,
    /// Largest fleet the capacity solver will enumerate
    pub max_fleet_size: usize,
}

impl LayoutConfig {
    pub const DEFAULT_GRID_STEP: f64 = 0.05;
    pub const DEFAULT_EPSILON: f64 = EPSILON_GENERAL;
    pub const DEFAULT_ALLOW_ROTATION: bool = true;
    pub const DEFAULT_MAX_FLEET_SIZE: usize = 24;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> LayoutConfigBuilder {
        LayoutConfigBuilder::default()
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid_step: Self::DEFAULT_GRID_STEP,
            epsilon: Self::DEFAULT_EPSILON,
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
            max_fleet_size: Self::DEFAULT_MAX_FLEET_SIZE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LayoutConfigBuilder {
    config: LayoutConfig,
}

impl LayoutConfigBuilder {
    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    pub fn max_fleet_size(mut self, size: usize) -> Self {
        self.config.max_fleet_size = size;
        self
    }

    pub fn build(self) -> LayoutConfig {
        self.config
    }
}

/// Result of a packing run. Every input box ends up in exactly one list.
#[derive(Clone, Debug, Default)]
pub struct ShelfPackResult {
    pub packed: Vec<PlacedBox>,
    pub overflow: Vec<UnplacedBox>,
}

impl ShelfPackResult {
    pub fn is_complete(&self) -> bool {
        self.overflow.is_empty()
    }

    pub fn packed_count(&self) -> usize {
        self.packed.len()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow.len()
    }

    /// Fraction of the bed covered by packed boxes, in percent.
    pub fn utilization_percent(&self, bed: &Bed) -> f64 {
        let total = bed.area();
        if total <= 0.0 {
            return 0.0;
        }
        let used: f64 = self.packed.iter().map(|p| p.rect.area()).sum();
        used / total * 100.0
    }
}

/// Why a box went to overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub enum OverflowReason {
    /// The box is larger than the bed in every allowed orientation.
    ExceedsBed,
    /// The box would fit an empty bed, but not the space left.
    NoSpaceLeft,
}

impl OverflowReason {
    pub fn code(&self) -> &'static str {
        match self {
            OverflowReason::ExceedsBed => "exceeds_bed",
            OverflowReason::NoSpaceLeft => "no_space_left",
        }
    }

    pub fn classify(footprint: &impl Footprint, bed: &Bed, config: &LayoutConfig) -> Self {
        if footprint.fits_bed(bed, config.allow_rotation, config.epsilon) {
            OverflowReason::NoSpaceLeft
        } else {
            OverflowReason::ExceedsBed
        }
    }
}

impl std::fmt::Display for OverflowReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverflowReason::ExceedsBed => {
                write!(f, "Box is larger than the load bed in every orientation")
            }
            OverflowReason::NoSpaceLeft => {
                write!(f, "No free space left on the load bed")
            }
        }
    }
}

/// Events emitted while packing, e.g. for live visualization.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PackEvent {
    BoxPlaced {
        id: String,
        rect: Rect,
        rotated: bool,
    },
    BoxOverflowed {
        id: String,
        reason_code: &'static str,
    },
    Finished {
        packed: usize,
        overflow: usize,
    },
}

/// Packs boxes onto an empty bed.
///
/// # Parameters
/// * `boxes` - Boxes to pack; any previous placement is ignored
/// * `bed` - Target load bed
/// * `truck_id` - Assignment given to every packed box
/// * `config` - Rotation and tolerance settings
pub fn pack_shelves(
    boxes: Vec<UnplacedBox>,
    bed: &Bed,
    truck_id: &str,
    config: &LayoutConfig,
) -> ShelfPackResult {
    pack_shelves_with_progress(boxes, bed, truck_id, config, |_| {})
}

/// Shelf cursor: where the next box goes and how tall the current row is.
#[derive(Clone, Copy, Debug, Default)]
struct Shelf {
    x: f64,
    y: f64,
    row_height: f64,
}

impl Shelf {
    /// Tries one orientation, wrapping to a new row if the current one is full.
    ///
    /// The wrap sticks even if the orientation then fails, so the next
    /// orientation is tried on the new row.
    fn try_place(&mut self, w: f64, h: f64, bed: &Bed, eps: f64) -> Option<Rect> {
        if w > bed.length + eps {
            return None;
        }
        if self.x + w > bed.length + eps {
            self.x = 0.0;
            self.y += self.row_height;
            self.row_height = 0.0;
        }
        if self.y + h > bed.width + eps {
            return None;
        }

        let rect = Rect::new(self.x, self.y, w, h);
        self.x += w;
        self.row_height = self.row_height.max(h);
        Some(rect)
    }
}

/// Like [`pack_shelves`], reporting every decision to `on_event`.
pub fn pack_shelves_with_progress(
    boxes: Vec<UnplacedBox>,
    bed: &Bed,
    truck_id: &str,
    config: &LayoutConfig,
    mut on_event: impl FnMut(&PackEvent),
) -> ShelfPackResult {
    let mut boxes = boxes;
    // Stable sort: equal areas keep their input order.
    boxes.sort_by(|a, b| {
        b.footprint_area()
            .partial_cmp(&a.footprint_area())
            .unwrap_or(Ordering::Equal)
    });

    let mut shelf = Shelf::default();
    let mut result = ShelfPackResult::default();

    for item in boxes {
        let (w, h) = item.footprint();
        let mut orientations = vec![(w, h)];
        if config.allow_rotation {
            orientations.push((h, w));
        }

        let slot = orientations
            .into_iter()
            .find_map(|(ow, oh)| shelf.try_place(ow, oh, bed, config.epsilon));

        match slot {
            Some(rect) => {
                let placed = item.place(truck_id, rect);
                on_event(&PackEvent::BoxPlaced {
                    id: placed.id().to_string(),
                    rect,
                    rotated: placed.is_rotated(),
                });
                result.packed.push(placed);
            }
            None => {
                let reason = OverflowReason::classify(&item, bed, config);
                on_event(&PackEvent::BoxOverflowed {
                    id: item.id().to_string(),
                    reason_code: reason.code(),
                });
                result.overflow.push(item);
            }
        }
    }

    debug!(
        "Shelf packing on {:.2} x {:.2} m: {} packed, {} overflow",
        bed.length,
        bed.width,
        result.packed_count(),
        result.overflow_count()
    );
    on_event(&PackEvent::Finished {
        packed: result.packed_count(),
        overflow: result.overflow_count(),
    });
    result
}

//! Common types and traits for 2D load-bed geometry.
//!
//! All lengths are meters. A load bed spans `[0, length] × [0, width]`,
//! with `x` running along the truck's length and `y` across its width.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for bounds checks.
///
/// Absorbs the rounding that accumulates from repeated drags and rotations.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Gap below which two edges are treated as the same line in overlap tests.
pub const TOUCH_TOLERANCE: f64 = 1e-9;

/// Smallest footprint edge a box may have, in meters.
///
/// Degenerate dimensions are clamped to this value so every packing run terminates.
pub const MIN_FOOTPRINT_M: f64 = 0.01;

/// A point on the load bed, or a pointer position translated into bed coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Add for Point {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis-aligned rectangle, the value type behind every footprint and placement.
///
/// # Examples
/// ```
/// use truck_planner::types::Rect;
///
/// let a = Rect::new(0.0, 0.0, 2.0, 1.0);
/// let b = Rect::new(2.0, 0.0, 2.0, 1.0);
/// assert!(!a.intersects(&b)); // touching edges do not overlap
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle of the given size anchored at the origin.
    #[inline]
    pub const fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same size, new origin.
    #[inline]
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self::new(x, y, self.width, self.height)
    }

    /// Swaps width and height, keeping the origin.
    #[inline]
    pub fn rotated(&self) -> Self {
        Self::new(self.x, self.y, self.height, self.width)
    }

    /// Strict interval overlap on both axes; shared edges are not an overlap.
    ///
    /// Edges within [`TOUCH_TOLERANCE`] of each other still count as shared.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x + TOUCH_TOLERANCE < other.right()
            && other.x + TOUCH_TOLERANCE < self.right()
            && self.y + TOUCH_TOLERANCE < other.bottom()
            && other.y + TOUCH_TOLERANCE < self.bottom()
    }

    /// Edge-inclusive point containment.
    #[inline]
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Checks if all components are finite and the extent is positive.
    #[inline]
    pub fn is_valid_extent(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// The usable load surface of a truck.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Bed {
    /// Extent along x, meters.
    pub length: f64,
    /// Extent along y, meters.
    pub width: f64,
}

impl Bed {
    pub const DEFAULT_LENGTH: f64 = 8.0;
    pub const DEFAULT_WIDTH: f64 = 2.5;

    #[inline]
    pub const fn new(length: f64, width: f64) -> Self {
        Self { length, width }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    /// Checks whether a rectangle of this size could lie on the bed in the given orientation.
    #[inline]
    pub fn admits(&self, width: f64, height: f64, tolerance: f64) -> bool {
        width <= self.length + tolerance && height <= self.width + tolerance
    }
}

impl Default for Bed {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH, Self::DEFAULT_WIDTH)
    }
}

/// Objects with a 2D footprint on the load bed.
pub trait Footprint {
    /// Nominal (unrotated) footprint as `(width along x, height along y)`.
    fn footprint(&self) -> (f64, f64);

    fn footprint_area(&self) -> f64 {
        let (w, h) = self.footprint();
        w * h
    }

    /// Checks if the footprint fits the bed in at least one allowed orientation.
    fn fits_bed(&self, bed: &Bed, allow_rotation: bool, tolerance: f64) -> bool {
        let (w, h) = self.footprint();
        bed.admits(w, h, tolerance) || (allow_rotation && bed.admits(h, w, tolerance))
    }
}

/// Validation helpers shared by the model constructors.
pub mod validation {
    /// Validates a single strictly positive length.
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a weight; zero is allowed (unknown or unconstrained).
    pub fn validate_weight(value: f64) -> Result<(), String> {
        if value.is_nan() {
            return Err("Weight must not be NaN".to_string());
        }
        if value.is_infinite() {
            return Err("Weight must not be infinite".to_string());
        }
        if value < 0.0 {
            return Err(format!("Weight must not be negative, got: {}", value));
        }
        Ok(())
    }

    /// Clamps a possibly degenerate length to a usable footprint edge.
    pub fn clamp_extent(value: f64, minimum: f64) -> f64 {
        if value.is_finite() {
            value.max(minimum)
        } else {
            minimum
        }
    }
}

/// Rounds to millimeter precision, the resolution layouts are stored with.
#[inline]
pub fn round_mm(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Rounds to two decimals, the resolution areas and weights are displayed with.
#[inline]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

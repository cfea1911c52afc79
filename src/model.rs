//! Data models for truck load planning.
//!
//! This module defines the records the planner works with:
//! - `Truck`: a vehicle with a load bed and an optional weight limit
//! - `Cargo`: a discrete cargo unit with its footprint and weight
//! - `CargoBox`: the stored form of a box, with optional assignment and placement
//! - `PlacedBox` / `UnplacedBox`: the engine's view, where having a placement is a type
//! - `Article` / `Tour`: cargo declaration and the tour that owns the boxes

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{
    Bed, Footprint, MIN_FOOTPRINT_M, Rect, round_cents, round_mm, validation,
};

pub type BoxId = String;
pub type TruckId = String;

/// Validation error for incoming records.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// 0 counts as unset; the bed falls back to its defaults.
fn validate_optional_dimension(value: Option<f64>, name: &str) -> Result<(), ValidationError> {
    match value {
        Some(v) if v == 0.0 => Ok(()),
        Some(v) => validation::validate_dimension(v, name).map_err(ValidationError::InvalidDimension),
        None => Ok(()),
    }
}

fn validate_identifier(value: &str, name: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidIdentifier(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

/// A truck and its load bed.
///
/// Bed length may be omitted when `area` is known; it is then derived as `area / width`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"id": "t1", "name": "7.5t Koffer", "length": 6.2, "width": 2.4, "max_weight": 2800.0}))]
pub struct Truck {
    pub id: TruckId,
    pub name: String,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub area: Option<f64>,
    /// Weight limit in kg; absent or 0 means unconstrained.
    #[serde(default)]
    pub max_weight: Option<f64>,
}

impl Truck {
    /// Creates a truck with an explicit bed.
    pub fn new(id: impl Into<TruckId>, name: impl Into<String>, length: f64, width: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            length: Some(length),
            width: Some(width),
            area: None,
            max_weight: None,
        }
    }

    pub fn with_max_weight(mut self, max_weight: f64) -> Self {
        self.max_weight = Some(max_weight);
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.id, "Truck id")?;
        validate_optional_dimension(self.length, "Bed length")?;
        validate_optional_dimension(self.width, "Bed width")?;
        validate_optional_dimension(self.area, "Bed area")?;
        if let Some(weight) = self.max_weight {
            validation::validate_weight(weight).map_err(ValidationError::InvalidWeight)?;
        }
        Ok(())
    }

    /// Usable bed, falling back to the default 8 × 2.5 m.
    pub fn bed(&self) -> Bed {
        let width = self
            .width
            .filter(|w| *w > 0.0)
            .unwrap_or(Bed::DEFAULT_WIDTH);
        let length = match (self.length.filter(|l| *l > 0.0), self.area) {
            (Some(length), _) => length,
            (None, Some(area)) if area > 0.0 => area / width,
            _ => Bed::DEFAULT_LENGTH,
        };
        Bed::new(length, width)
    }

    /// Floor area available for capacity planning: `area`, else `length × width`, else 0.
    pub fn capacity_area(&self) -> f64 {
        self.area
            .unwrap_or_else(|| self.length.unwrap_or(0.0) * self.width.unwrap_or(0.0))
    }

    /// Weight limit, if the truck has one.
    pub fn weight_limit(&self) -> Option<f64> {
        self.max_weight.filter(|w| *w > 0.0)
    }
}

/// Identity, footprint and weight of one cargo unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Cargo {
    pub id: BoxId,
    pub display_name: String,
    #[serde(default = "default_piece_count")]
    pub piece_count: u32,
    #[serde(default)]
    pub weight_kg: f64,
    /// Nominal floor area, used when true dimensions are missing.
    #[serde(default)]
    pub area_m2: f64,
    #[serde(default)]
    pub length_m: Option<f64>,
    #[serde(default)]
    pub width_m: Option<f64>,
    /// Visual height only; the planner works on the floor plan.
    #[serde(default)]
    pub height_m: Option<f64>,
}

fn default_piece_count() -> u32 {
    1
}

impl Cargo {
    pub const DEFAULT_HEIGHT_M: f64 = 1.0;

    /// Creates a cargo unit known only by its floor area.
    pub fn new(
        id: impl Into<BoxId>,
        display_name: impl Into<String>,
        area_m2: f64,
        weight_kg: f64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            piece_count: 1,
            weight_kg,
            area_m2,
            length_m: None,
            width_m: None,
            height_m: None,
        }
    }

    /// Sets true dimensions; the nominal area follows them.
    pub fn with_dimensions(mut self, length_m: f64, width_m: f64) -> Self {
        self.length_m = Some(length_m);
        self.width_m = Some(width_m);
        self.area_m2 = length_m * width_m;
        self
    }

    /// Rejects records the planner cannot reason about at all.
    ///
    /// Degenerate dimensions are not rejected here; the footprint clamps them.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.id, "Box id")?;
        validation::validate_weight(self.weight_kg).map_err(ValidationError::InvalidWeight)?;
        if !self.area_m2.is_finite() {
            return Err(ValidationError::InvalidDimension(format!(
                "Area must be finite, got: {}",
                self.area_m2
            )));
        }
        Ok(())
    }

    fn has_true_dimensions(&self) -> bool {
        matches!((self.length_m, self.width_m), (Some(l), Some(w)) if l > 0.0 && w > 0.0)
    }
}

impl Footprint for Cargo {
    /// True dimensions when both are present, else a square of the nominal area
    /// (1 m² when the area is missing too).
    fn footprint(&self) -> (f64, f64) {
        let (w, h) = match (self.length_m, self.width_m) {
            (Some(l), Some(w)) if self.has_true_dimensions() => (l, w),
            _ => {
                let area = if self.area_m2 > 0.0 { self.area_m2 } else { 1.0 };
                let side = area.sqrt();
                (side, side)
            }
        };
        (
            validation::clamp_extent(w, MIN_FOOTPRINT_M),
            validation::clamp_extent(h, MIN_FOOTPRINT_M),
        )
    }
}

/// Realized footprint of a box within its truck's bed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Placement {
    pub x_m: f64,
    pub y_m: f64,
    pub w_m: f64,
    pub h_m: f64,
}

impl Placement {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            x_m: rect.x,
            y_m: rect.y,
            w_m: rect.width,
            h_m: rect.height,
        }
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x_m, self.y_m, self.w_m, self.h_m)
    }

    /// A saved placement is only worth validating if it has a real extent.
    pub fn is_usable(&self) -> bool {
        self.to_rect().is_valid_extent()
    }

    /// Millimeter-rounded copy for storage.
    ///
    /// Edges are rounded, not extents, so boxes that were apart or touching
    /// stay that way. Far edges never leave `bed`.
    pub fn rounded(&self, bed: &Bed) -> Self {
        let x = round_mm(self.x_m).max(0.0);
        let y = round_mm(self.y_m).max(0.0);
        let right = round_mm(self.x_m + self.w_m).min(bed.length);
        let bottom = round_mm(self.y_m + self.h_m).min(bed.width);
        Self {
            x_m: x,
            y_m: y,
            w_m: right - x,
            h_m: bottom - y,
        }
    }
}

/// A box as it is stored: cargo plus optional truck assignment and saved placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "b1", "display_name": "Palette Fliesen", "piece_count": 12,
    "weight_kg": 640.0, "area_m2": 0.96, "length_m": 1.2, "width_m": 0.8,
    "truck_id": "t1", "placement": {"x_m": 0.0, "y_m": 0.0, "w_m": 1.2, "h_m": 0.8}
}))]
pub struct CargoBox {
    #[serde(flatten)]
    pub cargo: Cargo,
    #[serde(default)]
    pub truck_id: Option<TruckId>,
    #[serde(default)]
    pub placement: Option<Placement>,
}

impl CargoBox {
    pub fn unassigned(cargo: Cargo) -> Self {
        Self {
            cargo,
            truck_id: None,
            placement: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.cargo.id
    }

    /// The saved placement, if it has a usable extent.
    pub fn saved_rect(&self) -> Option<Rect> {
        self.placement
            .filter(Placement::is_usable)
            .map(|p| p.to_rect())
    }
}

/// A box with a placement on a specific truck.
///
/// The rectangle is the realized footprint, already rotated if the box was turned.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct PlacedBox {
    pub cargo: Cargo,
    pub truck_id: TruckId,
    pub rect: Rect,
}

impl PlacedBox {
    pub fn new(cargo: Cargo, truck_id: impl Into<TruckId>, rect: Rect) -> Self {
        Self {
            cargo,
            truck_id: truck_id.into(),
            rect,
        }
    }

    pub fn id(&self) -> &str {
        &self.cargo.id
    }

    pub fn placement(&self) -> Placement {
        Placement::from_rect(&self.rect)
    }

    /// Whether the realized footprint is the nominal one turned by 90°.
    pub fn is_rotated(&self) -> bool {
        let (w, h) = self.cargo.footprint();
        (w - h).abs() > f64::EPSILON
            && (self.rect.width - h).abs() < 1e-9
            && (self.rect.height - w).abs() < 1e-9
    }

    /// Drops the placement, returning the box to the pool.
    pub fn into_unplaced(self) -> UnplacedBox {
        UnplacedBox { cargo: self.cargo }
    }

    pub fn into_record(self, bed: &Bed) -> CargoBox {
        let placement = Some(self.placement().rounded(bed));
        CargoBox {
            cargo: self.cargo,
            truck_id: Some(self.truck_id),
            placement,
        }
    }
}

/// A box without assignment or placement.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct UnplacedBox {
    pub cargo: Cargo,
}

impl UnplacedBox {
    pub fn new(cargo: Cargo) -> Self {
        Self { cargo }
    }

    pub fn id(&self) -> &str {
        &self.cargo.id
    }

    pub fn place(self, truck_id: impl Into<TruckId>, rect: Rect) -> PlacedBox {
        PlacedBox::new(self.cargo, truck_id, rect)
    }

    pub fn into_record(self) -> CargoBox {
        CargoBox::unassigned(self.cargo)
    }
}

impl Footprint for UnplacedBox {
    fn footprint(&self) -> (f64, f64) {
        self.cargo.footprint()
    }
}

/// Summed floor area and weight of a set of boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct LoadTotals {
    pub area_m2: f64,
    pub weight_kg: f64,
}

impl LoadTotals {
    pub fn of<'a>(cargo: impl IntoIterator<Item = &'a Cargo>) -> Self {
        cargo.into_iter().fold(Self::default(), |acc, c| Self {
            area_m2: acc.area_m2 + c.area_m2,
            weight_kg: acc.weight_kg + c.weight_kg,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.area_m2 <= 0.0 && self.weight_kg <= 0.0
    }
}

/// Catalogue article from which boxes are declared.
///
/// Dimensions are in centimeters, as they are maintained in the article master.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Article {
    pub name: String,
    #[serde(default)]
    pub weight_per_piece_kg: f64,
    #[serde(default)]
    pub pieces_per_box: Option<u32>,
    #[serde(default)]
    pub length_cm: f64,
    #[serde(default)]
    pub width_cm: f64,
    /// Tare weight of the crate itself.
    #[serde(default)]
    pub crate_weight_kg: f64,
}

impl Article {
    fn pieces_per_box(&self) -> u32 {
        self.pieces_per_box.filter(|p| *p > 0).unwrap_or(1)
    }

    /// Piece counts of the boxes `quantity` pieces fill: full boxes, then the remainder.
    fn box_fill(&self, quantity: u32) -> Vec<u32> {
        let per_box = self.pieces_per_box();
        let box_count = quantity.div_ceil(per_box);
        (0..box_count)
            .map(|i| {
                if i + 1 == box_count && quantity % per_box != 0 {
                    quantity % per_box
                } else {
                    per_box
                }
            })
            .collect()
    }

    fn box_weight(&self, pieces: u32) -> f64 {
        self.weight_per_piece_kg * pieces as f64 + self.crate_weight_kg
    }

    fn box_area_m2(&self) -> f64 {
        self.length_cm * self.width_cm / 10_000.0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.name, "Article name")?;
        validation::validate_weight(self.weight_per_piece_kg)
            .map_err(ValidationError::InvalidWeight)?;
        validation::validate_weight(self.crate_weight_kg).map_err(ValidationError::InvalidWeight)?;
        for (value, name) in [(self.length_cm, "Article length"), (self.width_cm, "Article width")] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidDimension(format!(
                    "{} must be a non-negative number, got: {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Totals the boxes for `quantity` pieces would add, without creating them.
    pub fn preview(&self, quantity: u32) -> LoadTotals {
        let fill = self.box_fill(quantity);
        let area = self.box_area_m2() * fill.len() as f64;
        let weight: f64 = fill.iter().map(|p| self.box_weight(*p)).sum();
        LoadTotals {
            area_m2: round_cents(area),
            weight_kg: round_cents(weight),
        }
    }

    /// Expands `quantity` pieces into discrete, unassigned boxes with fresh ids.
    pub fn expand(&self, quantity: u32) -> Vec<CargoBox> {
        let length_m = self.length_cm / 100.0;
        let width_m = self.width_cm / 100.0;
        let area = round_cents(self.box_area_m2());

        self.box_fill(quantity)
            .into_iter()
            .map(|pieces| {
                CargoBox::unassigned(Cargo {
                    id: uuid::Uuid::new_v4().to_string(),
                    display_name: self.name.clone(),
                    piece_count: pieces,
                    weight_kg: round_cents(self.box_weight(pieces)),
                    area_m2: area,
                    length_m: (length_m > 0.0).then(|| round_cents(length_m)),
                    width_m: (width_m > 0.0).then(|| round_cents(width_m)),
                    height_m: Some(Cargo::DEFAULT_HEIGHT_M),
                })
            })
            .collect()
    }
}

/// A delivery tour: the boxes it carries and the trucks confirmed for it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tour {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub boxes: Vec<CargoBox>,
    #[serde(default)]
    pub confirmed_truck_ids: Vec<TruckId>,
}

impl Tour {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn totals(&self) -> LoadTotals {
        LoadTotals::of(self.boxes.iter().map(|b| &b.cargo))
    }

    /// Boxes not assigned to any truck.
    pub fn pool(&self) -> impl Iterator<Item = &CargoBox> {
        self.boxes.iter().filter(|b| b.truck_id.is_none())
    }

    pub fn pool_totals(&self) -> LoadTotals {
        LoadTotals::of(self.pool().map(|b| &b.cargo))
    }

    pub fn boxes_for_truck<'a>(&'a self, truck_id: &'a str) -> impl Iterator<Item = &'a CargoBox> {
        self.boxes
            .iter()
            .filter(move |b| b.truck_id.as_deref() == Some(truck_id))
    }

    /// Moves a box to a truck or back to the pool; any saved placement is dropped.
    ///
    /// Returns `false` if the box is not part of the tour.
    pub fn assign_box(&mut self, box_id: &str, truck_id: Option<TruckId>) -> bool {
        match self.boxes.iter_mut().find(|b| b.id() == box_id) {
            Some(record) => {
                record.truck_id = truck_id;
                record.placement = None;
                true
            }
            None => false,
        }
    }

    pub fn remove_box(&mut self, box_id: &str) -> Option<CargoBox> {
        let idx = self.boxes.iter().position(|b| b.id() == box_id)?;
        Some(self.boxes.remove(idx))
    }

    /// Replaces boxes with the same id and appends unknown ones.
    pub fn merge_boxes(&mut self, records: impl IntoIterator<Item = CargoBox>) {
        for record in records {
            match self.boxes.iter_mut().find(|b| b.id() == record.id()) {
                Some(existing) => *existing = record,
                None => self.boxes.push(record),
            }
        }
    }

    /// Adds a truck to the confirmed list unless it is already there.
    pub fn confirm_truck(&mut self, truck_id: &str) {
        if !self.confirmed_truck_ids.iter().any(|id| id == truck_id) {
            self.confirmed_truck_ids.push(truck_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GENERAL;
    use test_case::test_case;

    #[test]
    fn truck_bed_prefers_explicit_length() {
        let truck = Truck::new("t1", "LKW", 7.0, 2.4).with_area(20.0);
        assert_eq!(truck.bed(), Bed::new(7.0, 2.4));
        assert!((truck.capacity_area() - 20.0).abs() < EPSILON_GENERAL);
    }

    #[test_case(None, Some(2.0), Some(10.0), Bed::new(5.0, 2.0); "length from area")]
    #[test_case(None, None, Some(10.0), Bed::new(4.0, 2.5); "length from area and default width")]
    #[test_case(None, None, None, Bed::new(8.0, 2.5); "full default")]
    #[test_case(Some(6.0), None, None, Bed::new(6.0, 2.5); "default width only")]
    fn truck_bed_derivation(length: Option<f64>, width: Option<f64>, area: Option<f64>, expected: Bed) {
        let truck = Truck {
            id: "t".into(),
            name: "t".into(),
            length,
            width,
            area,
            max_weight: None,
        };
        let bed = truck.bed();
        assert!((bed.length - expected.length).abs() < EPSILON_GENERAL);
        assert!((bed.width - expected.width).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn weight_limit_zero_means_unconstrained() {
        let truck = Truck::new("t1", "LKW", 8.0, 2.5).with_max_weight(0.0);
        assert_eq!(truck.weight_limit(), None);
        let truck = truck.with_max_weight(3500.0);
        assert_eq!(truck.weight_limit(), Some(3500.0));
    }

    #[test]
    fn truck_validation_rejects_negative_bed() {
        let truck = Truck::new("t1", "LKW", -1.0, 2.5);
        assert!(matches!(truck.validate(), Err(ValidationError::InvalidDimension(_))));
        assert!(Truck::new("t1", "LKW", 0.0, 2.5).validate().is_ok());
        let truck = Truck::new(" ", "LKW", 8.0, 2.5);
        assert!(matches!(truck.validate(), Err(ValidationError::InvalidIdentifier(_))));
    }

    #[test]
    fn footprint_uses_true_dimensions() {
        let cargo = Cargo::new("b1", "Kiste", 4.0, 10.0).with_dimensions(1.2, 0.8);
        assert_eq!(cargo.footprint(), (1.2, 0.8));
    }

    #[test]
    fn footprint_falls_back_to_square_of_area() {
        let cargo = Cargo::new("b1", "Kiste", 4.0, 10.0);
        assert_eq!(cargo.footprint(), (2.0, 2.0));

        let mut half = Cargo::new("b2", "Kiste", 4.0, 10.0);
        half.length_m = Some(1.5);
        assert_eq!(half.footprint(), (2.0, 2.0));

        let no_area = Cargo::new("b3", "Kiste", 0.0, 10.0);
        assert_eq!(no_area.footprint(), (1.0, 1.0));
    }

    #[test]
    fn degenerate_dimensions_are_clamped() {
        let mut cargo = Cargo::new("b1", "Kiste", 1.0, 10.0);
        cargo.length_m = Some(0.001);
        cargo.width_m = Some(0.5);
        assert_eq!(cargo.footprint(), (MIN_FOOTPRINT_M, 0.5));
    }

    #[test]
    fn placement_usability() {
        assert!(Placement { x_m: 0.0, y_m: 0.0, w_m: 1.0, h_m: 1.0 }.is_usable());
        assert!(!Placement { x_m: 0.0, y_m: 0.0, w_m: 0.0, h_m: 1.0 }.is_usable());
        assert!(!Placement { x_m: f64::NAN, y_m: 0.0, w_m: 1.0, h_m: 1.0 }.is_usable());
    }

    #[test]
    fn cargo_box_json_is_flat() {
        let json = r#"{
            "id": "b1", "display_name": "Kiste", "weight_kg": 12.5, "area_m2": 1.0,
            "truck_id": "t1", "placement": {"x_m": 0.5, "y_m": 0.0, "w_m": 1.0, "h_m": 1.0}
        }"#;
        let record: CargoBox = serde_json::from_str(json).expect("should parse flat box");
        assert_eq!(record.id(), "b1");
        assert_eq!(record.cargo.piece_count, 1);
        assert_eq!(record.truck_id.as_deref(), Some("t1"));
        assert_eq!(record.saved_rect(), Some(Rect::new(0.5, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn placed_box_record_rounds_to_millimeters() {
        let cargo = Cargo::new("b1", "Kiste", 1.0, 10.0);
        let placed = PlacedBox::new(cargo, "t1", Rect::new(0.123_456, 1.0, 1.0, 1.0));
        let record = placed.into_record(&Bed::default());
        assert_eq!(record.placement.map(|p| p.x_m), Some(0.123));
        assert_eq!(record.truck_id.as_deref(), Some("t1"));
    }

    #[test]
    fn rounding_keeps_neighbours_apart_and_on_the_bed() {
        let bed = Bed::new(2.4567, 2.5);
        let left = Placement { x_m: 0.0006, y_m: 0.0, w_m: 1.2346, h_m: 1.0 }.rounded(&bed);
        let right = Placement { x_m: 1.2353, y_m: 0.0, w_m: 1.2214, h_m: 1.0 }.rounded(&bed);

        assert_eq!(left.x_m, 0.001);
        assert_eq!(right.x_m, 1.235);
        assert!(!left.to_rect().intersects(&right.to_rect()));
        assert!(right.to_rect().right() <= bed.length + EPSILON_GENERAL);
    }

    #[test]
    fn rotation_is_detected_from_footprint() {
        let cargo = Cargo::new("b1", "Kiste", 2.0, 10.0).with_dimensions(2.0, 1.0);
        let upright = PlacedBox::new(cargo.clone(), "t1", Rect::sized(2.0, 1.0));
        let turned = PlacedBox::new(cargo, "t1", Rect::sized(1.0, 2.0));
        assert!(!upright.is_rotated());
        assert!(turned.is_rotated());
    }

    fn tiles() -> Article {
        Article {
            name: "Fliesen".into(),
            weight_per_piece_kg: 2.0,
            pieces_per_box: Some(10),
            length_cm: 120.0,
            width_cm: 80.0,
            crate_weight_kg: 5.0,
        }
    }

    #[test]
    fn article_expansion_splits_remainder_into_last_box() {
        let boxes = tiles().expand(25);
        assert_eq!(boxes.len(), 3);
        let pieces: Vec<u32> = boxes.iter().map(|b| b.cargo.piece_count).collect();
        assert_eq!(pieces, vec![10, 10, 5]);
        assert_eq!(boxes[0].cargo.weight_kg, 25.0);
        assert_eq!(boxes[2].cargo.weight_kg, 15.0);
        assert_eq!(boxes[0].cargo.area_m2, 0.96);
        assert_eq!(boxes[0].cargo.length_m, Some(1.2));
        assert_eq!(boxes[0].cargo.width_m, Some(0.8));
        assert!(boxes.iter().all(|b| b.truck_id.is_none() && b.placement.is_none()));
        assert_ne!(boxes[0].id(), boxes[1].id());
    }

    #[test]
    fn article_expansion_exact_multiple_fills_every_box() {
        let boxes = tiles().expand(20);
        let pieces: Vec<u32> = boxes.iter().map(|b| b.cargo.piece_count).collect();
        assert_eq!(pieces, vec![10, 10]);
    }

    #[test]
    fn article_expansion_of_nothing_is_empty() {
        assert!(tiles().expand(0).is_empty());
        assert_eq!(tiles().preview(0), LoadTotals::default());
    }

    #[test]
    fn article_without_dimensions_leaves_them_absent() {
        let article = Article {
            length_cm: 0.0,
            width_cm: 0.0,
            ..tiles()
        };
        let boxes = article.expand(1);
        assert_eq!(boxes[0].cargo.length_m, None);
        assert_eq!(boxes[0].cargo.area_m2, 0.0);
    }

    #[test]
    fn article_preview_matches_expansion() {
        let preview = tiles().preview(25);
        assert_eq!(preview.area_m2, 2.88);
        assert_eq!(preview.weight_kg, 65.0);
    }

    #[test]
    fn tour_assignment_moves_box_between_pool_and_truck() {
        let mut tour = Tour::new("tour-1", "Montag");
        tour.boxes = tiles().expand(20);
        let id = tour.boxes[0].id().to_string();

        assert!(tour.assign_box(&id, Some("t1".into())));
        assert_eq!(tour.pool().count(), 1);
        assert_eq!(tour.boxes_for_truck("t1").count(), 1);
        assert!((tour.pool_totals().weight_kg - 25.0).abs() < EPSILON_GENERAL);

        assert!(tour.assign_box(&id, None));
        assert_eq!(tour.pool().count(), 2);
        assert!(!tour.assign_box("missing", None));
    }

    #[test]
    fn tour_totals_sum_all_boxes() {
        let mut tour = Tour::new("tour-1", "Montag");
        tour.boxes = tiles().expand(25);
        let totals = tour.totals();
        assert!((totals.area_m2 - 2.88).abs() < EPSILON_GENERAL);
        assert!((totals.weight_kg - 65.0).abs() < EPSILON_GENERAL);
        let first = tour.boxes[0].id().to_string();
        assert!(tour.remove_box(&first).is_some());
        assert_eq!(tour.boxes.len(), 2);
    }

    #[test]
    fn merge_replaces_known_boxes_and_appends_new_ones() {
        let mut tour = Tour::new("tour-1", "Montag");
        tour.boxes = tiles().expand(20);
        let mut moved = tour.boxes[1].clone();
        moved.truck_id = Some("t1".into());
        let extra = CargoBox::unassigned(Cargo::new("extra", "Kiste", 1.0, 1.0));

        tour.merge_boxes(vec![moved.clone(), extra]);
        assert_eq!(tour.boxes.len(), 3);
        assert_eq!(tour.boxes[1], moved);
        assert_eq!(tour.boxes[2].id(), "extra");

        tour.confirm_truck("t1");
        tour.confirm_truck("t1");
        assert_eq!(tour.confirmed_truck_ids, vec!["t1".to_string()]);
    }
}

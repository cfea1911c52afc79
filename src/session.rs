//! Interactive layout editing for one truck.
//!
//! A `LayoutSession` owns every placement on one truck's bed for as long as
//! the editor is open. All changes go through its commands, and each command
//! either keeps the bed overlap-free and in bounds or changes nothing:
//!
//! ```text
//!            begin_drag            drag_to (accepted or ignored)
//!   Idle ───────────────▶ Dragging ◀───────┐
//!    ▲                       │  └──────────┘
//!    └────── end_drag ───────┘
//! ```
//!
//! `rotate`, `place_overflow` and `auto_layout` are valid in either state;
//! `auto_layout` cancels any running drag.

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::geometry::{clamp_to_bed, hit_test, overlaps_any, within_bed};
use crate::model::{BoxId, CargoBox, Placement, PlacedBox, Truck, TruckId, UnplacedBox};
use crate::packer::{LayoutConfig, pack_shelves};
use crate::scanner::place_first_free;
use crate::types::{Bed, Footprint, Point};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Box '{0}' is not part of this layout")]
    UnknownBox(BoxId),
    #[error("Box '{0}' has no placement")]
    NotPlaced(BoxId),
    #[error("Box '{0}' is not in overflow")]
    NotInOverflow(BoxId),
    #[error("No box is being dragged")]
    NoActiveDrag,
    #[error("No box is selected")]
    NoSelection,
}

/// Whether a mutation took effect.
///
/// Rejected moves are normal: the box simply stays where it was.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Applied,
    Rejected,
}

impl MoveOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MoveOutcome::Applied)
    }

    fn from_applied(applied: bool) -> Self {
        if applied {
            MoveOutcome::Applied
        } else {
            MoveOutcome::Rejected
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        box_id: BoxId,
        /// Pointer position relative to the box origin when the drag began.
        grab_offset: Point,
    },
}

/// Read-only copy of the session state, handed to renderers after every change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LayoutSnapshot {
    pub truck_id: TruckId,
    pub bed: Bed,
    /// Back to front: the last box is drawn on top.
    pub placed: Vec<PlacedBox>,
    pub overflow: Vec<UnplacedBox>,
    pub selection: Option<BoxId>,
    pub dragging: Option<BoxId>,
}

/// A placement as handed back for storage, rounded to millimeters.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CommittedPlacement {
    pub box_id: BoxId,
    #[serde(flatten)]
    pub placement: Placement,
}

/// Final state of an editing cycle.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommittedLayout {
    pub truck_id: TruckId,
    pub placements: Vec<CommittedPlacement>,
    /// Every box of the session: placed ones with truck and placement, overflow ones unassigned.
    pub boxes: Vec<CargoBox>,
}

#[derive(Debug, Clone)]
pub struct LayoutSession {
    truck: Truck,
    bed: Bed,
    config: LayoutConfig,
    placed: Vec<PlacedBox>,
    overflow: Vec<UnplacedBox>,
    selection: Option<BoxId>,
    drag: DragState,
}

impl LayoutSession {
    /// Builds the starting layout from stored boxes.
    ///
    /// Saved placements are hints. In input order, each one is kept if it lies
    /// on the bed and clears every saved placement kept before it; otherwise
    /// the box needs placement. Boxes needing placement are shelf-packed, and a
    /// packed position that collides with the kept set falls back to the
    /// free-spot scanner before the box is declared overflow.
    pub fn build_initial_layout(truck: Truck, boxes: Vec<CargoBox>, config: LayoutConfig) -> Self {
        let bed = truck.bed();
        let mut placed: Vec<PlacedBox> = Vec::new();
        let mut needs_placement: Vec<UnplacedBox> = Vec::new();

        for record in boxes {
            let saved = record
                .saved_rect()
                .filter(|_| record.truck_id.as_deref().is_none_or(|id| id == truck.id));
            let cargo = record.cargo;
            match saved {
                Some(rect)
                    if within_bed(&rect, &bed, config.epsilon)
                        && !overlaps_any(&rect, &placed, None) =>
                {
                    placed.push(PlacedBox::new(cargo, truck.id.clone(), rect));
                }
                Some(rect) => {
                    debug!("Saved placement of '{}' at {:?} is stale", cargo.id, rect);
                    needs_placement.push(UnplacedBox::new(cargo));
                }
                None => needs_placement.push(UnplacedBox::new(cargo)),
            }
        }
        let kept = placed.len();

        let packed = pack_shelves(needs_placement, &bed, &truck.id, &config);
        let mut overflow = packed.overflow;

        for candidate in packed.packed {
            if within_bed(&candidate.rect, &bed, config.epsilon)
                && !overlaps_any(&candidate.rect, &placed, None)
            {
                placed.push(candidate);
                continue;
            }
            let footprint = (candidate.rect.width, candidate.rect.height);
            match place_first_free(footprint, &bed, &placed, None, &config) {
                Some(rect) => placed.push(PlacedBox { rect, ..candidate }),
                None => overflow.push(candidate.into_unplaced()),
            }
        }

        info!(
            "Layout for truck '{}': {} saved placements kept, {} placed in total, {} overflow",
            truck.id,
            kept,
            placed.len(),
            overflow.len()
        );

        Self {
            truck,
            bed,
            config,
            placed,
            overflow,
            selection: None,
            drag: DragState::Idle,
        }
    }

    pub fn truck(&self) -> &Truck {
        &self.truck
    }

    pub fn bed(&self) -> &Bed {
        &self.bed
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn placed(&self) -> &[PlacedBox] {
        &self.placed
    }

    pub fn overflow(&self) -> &[UnplacedBox] {
        &self.overflow
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn placed_box(&self, box_id: &str) -> Option<&PlacedBox> {
        self.placed.iter().find(|p| p.id() == box_id)
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        let dragging = match &self.drag {
            DragState::Dragging { box_id, .. } => Some(box_id.clone()),
            DragState::Idle => None,
        };
        LayoutSnapshot {
            truck_id: self.truck.id.clone(),
            bed: self.bed,
            placed: self.placed.clone(),
            overflow: self.overflow.clone(),
            selection: self.selection.clone(),
            dragging,
        }
    }

    /// The front-most placed box under a point in bed coordinates.
    pub fn hit_test(&self, point: &Point) -> Option<&PlacedBox> {
        hit_test(&self.placed, point)
    }

    fn placed_index(&self, box_id: &str) -> Result<usize, SessionError> {
        match self.placed.iter().position(|p| p.id() == box_id) {
            Some(idx) => Ok(idx),
            None if self.overflow.iter().any(|o| o.id() == box_id) => {
                Err(SessionError::NotPlaced(box_id.to_string()))
            }
            None => Err(SessionError::UnknownBox(box_id.to_string())),
        }
    }

    /// Marks a placed box as the active one.
    pub fn select(&mut self, box_id: &str) -> Result<(), SessionError> {
        self.placed_index(box_id)?;
        self.selection = Some(box_id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Starts dragging a placed box grabbed at `pointer`.
    ///
    /// The box is selected and moved to the front of the z-order.
    pub fn begin_drag(&mut self, box_id: &str, pointer: Point) -> Result<(), SessionError> {
        let idx = self.placed_index(box_id)?;
        let grabbed = self.placed.remove(idx);
        let grab_offset = pointer - grabbed.rect.origin();
        self.placed.push(grabbed);

        self.selection = Some(box_id.to_string());
        self.drag = DragState::Dragging {
            box_id: box_id.to_string(),
            grab_offset,
        };
        Ok(())
    }

    /// Follows the pointer with the dragged box.
    ///
    /// The candidate position is clamped onto the bed; if it then collides with
    /// another box the move is ignored and the box stays at its last accepted position.
    pub fn drag_to(&mut self, pointer: Point) -> Result<MoveOutcome, SessionError> {
        let (box_id, grab_offset) = match &self.drag {
            DragState::Dragging { box_id, grab_offset } => (box_id.clone(), *grab_offset),
            DragState::Idle => return Err(SessionError::NoActiveDrag),
        };
        let idx = self.placed_index(&box_id)?;

        let target = pointer - grab_offset;
        let candidate = clamp_to_bed(&self.placed[idx].rect.moved_to(target.x, target.y), &self.bed);
        if overlaps_any(&candidate, &self.placed, Some(&box_id)) {
            return Ok(MoveOutcome::Rejected);
        }

        self.placed[idx].rect = candidate;
        Ok(MoveOutcome::Applied)
    }

    /// Releases the dragged box where it was last accepted. Returns its id, if any.
    pub fn end_drag(&mut self) -> Option<BoxId> {
        match std::mem::replace(&mut self.drag, DragState::Idle) {
            DragState::Dragging { box_id, .. } => Some(box_id),
            DragState::Idle => None,
        }
    }

    /// Turns a placed box by 90° about its origin, if it still fits there.
    pub fn rotate(&mut self, box_id: &str) -> Result<MoveOutcome, SessionError> {
        let idx = self.placed_index(box_id)?;
        if !self.config.allow_rotation {
            return Ok(MoveOutcome::Rejected);
        }

        let candidate = self.placed[idx].rect.rotated();
        let fits = within_bed(&candidate, &self.bed, self.config.epsilon)
            && !overlaps_any(&candidate, &self.placed, Some(box_id));
        if fits {
            self.placed[idx].rect = candidate;
        } else {
            debug!("Rotation of '{}' rejected", box_id);
        }
        Ok(MoveOutcome::from_applied(fits))
    }

    pub fn rotate_selected(&mut self) -> Result<MoveOutcome, SessionError> {
        let box_id = self.selection.clone().ok_or(SessionError::NoSelection)?;
        self.rotate(&box_id)
    }

    /// Discards every placement and shelf-packs all boxes from scratch.
    pub fn auto_layout(&mut self) {
        let pool: Vec<UnplacedBox> = self
            .placed
            .drain(..)
            .map(PlacedBox::into_unplaced)
            .chain(self.overflow.drain(..))
            .collect();

        let result = pack_shelves(pool, &self.bed, &self.truck.id, &self.config);
        self.placed = result.packed;
        self.overflow = result.overflow;
        self.selection = None;
        self.drag = DragState::Idle;
        debug!(
            "Auto layout for truck '{}': {} placed, {} overflow",
            self.truck.id,
            self.placed.len(),
            self.overflow.len()
        );
    }

    /// Moves one overflow box to the first free spot on the bed, if there is one.
    pub fn place_overflow(&mut self, box_id: &str) -> Result<MoveOutcome, SessionError> {
        let idx = match self.overflow.iter().position(|o| o.id() == box_id) {
            Some(idx) => idx,
            None if self.placed_box(box_id).is_some() => {
                return Err(SessionError::NotInOverflow(box_id.to_string()));
            }
            None => return Err(SessionError::UnknownBox(box_id.to_string())),
        };

        let footprint = self.overflow[idx].footprint();
        let Some(rect) = place_first_free(footprint, &self.bed, &self.placed, None, &self.config)
        else {
            return Ok(MoveOutcome::Rejected);
        };

        let rescued = self.overflow.remove(idx);
        self.placed.push(rescued.place(self.truck.id.clone(), rect));
        Ok(MoveOutcome::Applied)
    }

    /// Hands the current placements back for storage.
    pub fn commit(&self) -> CommittedLayout {
        let placements = self
            .placed
            .iter()
            .map(|p| CommittedPlacement {
                box_id: p.id().to_string(),
                placement: p.placement().rounded(&self.bed),
            })
            .collect();
        let boxes = self
            .placed
            .iter()
            .cloned()
            .map(|p| p.into_record(&self.bed))
            .chain(self.overflow.iter().cloned().map(UnplacedBox::into_record))
            .collect();

        info!(
            "Committing layout for truck '{}': {} placed, {} overflow",
            self.truck.id,
            self.placed.len(),
            self.overflow.len()
        );
        CommittedLayout {
            truck_id: self.truck.id.clone(),
            placements,
            boxes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::overlaps;
    use crate::model::Cargo;
    use crate::types::{EPSILON_GENERAL, Rect};

    fn truck(length: f64, width: f64) -> Truck {
        Truck::new("t1", "Testlaster", length, width)
    }

    fn record(id: &str, length: f64, width: f64) -> CargoBox {
        CargoBox::unassigned(Cargo::new(id, id, length * width, 10.0).with_dimensions(length, width))
    }

    fn saved(id: &str, rect: Rect) -> CargoBox {
        let mut record = record(id, rect.width, rect.height);
        record.truck_id = Some("t1".into());
        record.placement = Some(Placement::from_rect(&rect));
        record
    }

    fn coarse() -> LayoutConfig {
        LayoutConfig::builder().grid_step(0.5).build()
    }

    fn assert_consistent(session: &LayoutSession) {
        for (i, a) in session.placed().iter().enumerate() {
            assert!(within_bed(&a.rect, session.bed(), EPSILON_GENERAL), "{} off bed", a.id());
            for b in &session.placed()[i + 1..] {
                assert!(!overlaps(&a.rect, &b.rect), "{} overlaps {}", a.id(), b.id());
            }
        }
    }

    #[test]
    fn valid_saved_placements_are_kept() {
        let boxes = vec![
            saved("a", Rect::new(1.0, 0.5, 2.0, 1.0)),
            saved("b", Rect::new(5.0, 0.0, 1.0, 2.0)),
        ];
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(session.placed_box("a").map(|p| p.rect), Some(Rect::new(1.0, 0.5, 2.0, 1.0)));
        assert_eq!(session.placed_box("b").map(|p| p.rect), Some(Rect::new(5.0, 0.0, 1.0, 2.0)));
        assert!(session.overflow().is_empty());
    }

    #[test]
    fn colliding_saved_placement_is_demoted_first_come_first_served() {
        let boxes = vec![
            saved("first", Rect::new(0.0, 0.0, 2.0, 1.0)),
            saved("second", Rect::new(1.0, 0.0, 2.0, 1.0)),
        ];
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(
            session.placed_box("first").map(|p| p.rect),
            Some(Rect::new(0.0, 0.0, 2.0, 1.0))
        );
        let second = session.placed_box("second").expect("second box re-placed");
        assert_ne!(second.rect.origin(), Point::new(1.0, 0.0));
        assert_consistent(&session);
    }

    #[test]
    fn out_of_bounds_saved_placement_is_re_placed() {
        let boxes = vec![saved("a", Rect::new(7.0, 0.0, 2.0, 1.0))];
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(session.placed_box("a").map(|p| p.rect), Some(Rect::new(0.0, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn placement_saved_for_another_truck_is_ignored() {
        let mut other = saved("a", Rect::new(4.0, 1.0, 2.0, 1.0));
        other.truck_id = Some("t2".into());
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), vec![other], coarse());
        assert_eq!(session.placed_box("a").map(|p| p.rect.origin()), Some(Point::origin()));
    }

    #[test]
    fn packed_boxes_dodge_saved_ones_via_scanner() {
        // The saved box sits where the shelf packer would start.
        let boxes = vec![saved("kept", Rect::new(0.0, 0.0, 2.0, 2.5)), record("new", 2.0, 1.0)];
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        let new = session.placed_box("new").expect("new box placed");
        assert_eq!(new.rect, Rect::new(2.0, 0.0, 2.0, 1.0));
        assert_eq!(new.truck_id, "t1");
        assert_consistent(&session);
    }

    #[test]
    fn initial_layout_conserves_boxes() {
        let mut boxes: Vec<CargoBox> = (0..6).map(|i| record(&format!("b{i}"), 2.0, 1.0)).collect();
        boxes.push(saved("s", Rect::new(3.0, 1.0, 1.0, 1.0)));
        boxes.push(record("huge", 9.0, 9.0));
        let session = LayoutSession::build_initial_layout(truck(4.0, 2.0), boxes, coarse());
        assert_eq!(session.placed().len() + session.overflow().len(), 8);
        assert!(session.overflow().iter().any(|o| o.id() == "huge"));
        assert_consistent(&session);
    }

    #[test]
    fn drag_moves_box_and_clamps_to_bed() {
        let boxes = vec![saved("a", Rect::new(0.0, 0.0, 2.0, 1.0))];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());

        session.begin_drag("a", Point::new(0.5, 0.5)).unwrap();
        assert!(session.is_dragging());
        assert_eq!(session.selection(), Some("a"));

        assert_eq!(session.drag_to(Point::new(3.5, 1.0)).unwrap(), MoveOutcome::Applied);
        assert_eq!(session.placed_box("a").unwrap().rect, Rect::new(3.0, 0.5, 2.0, 1.0));

        assert_eq!(session.drag_to(Point::new(20.0, 20.0)).unwrap(), MoveOutcome::Applied);
        assert_eq!(session.placed_box("a").unwrap().rect, Rect::new(6.0, 1.5, 2.0, 1.0));

        assert_eq!(session.end_drag(), Some("a".to_string()));
        assert!(!session.is_dragging());
        assert_eq!(session.end_drag(), None);
    }

    #[test]
    fn drag_into_another_box_is_rejected() {
        let boxes = vec![
            saved("a", Rect::new(0.0, 0.0, 2.0, 1.0)),
            saved("b", Rect::new(4.0, 0.0, 2.0, 1.0)),
        ];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());

        session.begin_drag("a", Point::new(1.0, 0.5)).unwrap();
        // Center of the dragged box would land inside "b".
        let outcome = session.drag_to(Point::new(5.0, 0.5)).unwrap();
        assert_eq!(outcome, MoveOutcome::Rejected);
        assert_eq!(session.placed_box("a").unwrap().rect, Rect::new(0.0, 0.0, 2.0, 1.0));
        session.end_drag();
        assert_eq!(session.placed_box("a").unwrap().rect, Rect::new(0.0, 0.0, 2.0, 1.0));
    }

    #[test]
    fn begin_drag_brings_box_to_front() {
        let boxes = vec![
            saved("a", Rect::new(0.0, 0.0, 2.0, 1.0)),
            saved("b", Rect::new(4.0, 0.0, 2.0, 1.0)),
        ];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        session.begin_drag("a", Point::new(0.0, 0.0)).unwrap();
        assert_eq!(session.placed().last().map(|p| p.id()), Some("a"));
        assert_eq!(
            session.hit_test(&Point::new(1.0, 0.5)).map(|p| p.id()),
            Some("a")
        );
    }

    #[test]
    fn drag_requires_a_placed_box_and_an_active_drag() {
        let boxes = vec![record("huge", 10.0, 10.0)];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(
            session.begin_drag("huge", Point::origin()),
            Err(SessionError::NotPlaced("huge".into()))
        );
        assert_eq!(
            session.begin_drag("ghost", Point::origin()),
            Err(SessionError::UnknownBox("ghost".into()))
        );
        assert_eq!(session.drag_to(Point::origin()), Err(SessionError::NoActiveDrag));
    }

    #[test]
    fn rotate_swaps_extent_when_it_fits() {
        let boxes = vec![saved("a", Rect::new(0.0, 0.0, 2.0, 1.0))];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(session.rotate("a").unwrap(), MoveOutcome::Applied);
        assert_eq!(session.placed_box("a").unwrap().rect, Rect::new(0.0, 0.0, 1.0, 2.0));
    }

    #[test]
    fn rotate_is_a_no_op_when_blocked() {
        let boxes = vec![
            saved("a", Rect::new(0.0, 0.0, 2.0, 1.0)),
            saved("b", Rect::new(0.0, 1.0, 2.0, 1.0)),
            saved("edge", Rect::new(6.0, 0.0, 2.0, 2.0)),
            saved("wide", Rect::new(2.0, 2.0, 3.0, 0.5)),
        ];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        let before = session.placed_box("a").unwrap().rect;
        assert_eq!(session.rotate("a").unwrap(), MoveOutcome::Rejected);
        assert_eq!(session.placed_box("a").unwrap().rect, before);

        // Turned, "wide" would stick out past the bed edge.
        let before = session.placed_box("wide").unwrap().rect;
        assert_eq!(session.rotate("wide").unwrap(), MoveOutcome::Rejected);
        assert_eq!(session.placed_box("wide").unwrap().rect, before);
    }

    #[test]
    fn rotate_selected_needs_a_selection() {
        let boxes = vec![saved("a", Rect::new(0.0, 0.0, 2.0, 1.0))];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(session.rotate_selected(), Err(SessionError::NoSelection));
        session.select("a").unwrap();
        assert_eq!(session.rotate_selected(), Ok(MoveOutcome::Applied));
        session.clear_selection();
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn rotation_respects_configuration() {
        let boxes = vec![saved("a", Rect::new(0.0, 0.0, 2.0, 1.0))];
        let config = LayoutConfig::builder().allow_rotation(false).build();
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, config);
        assert_eq!(session.rotate("a").unwrap(), MoveOutcome::Rejected);
    }

    #[test]
    fn place_overflow_fails_on_a_full_bed() {
        let boxes = vec![
            saved("a", Rect::new(0.0, 0.0, 4.0, 1.0)),
            saved("b", Rect::new(0.0, 1.0, 4.0, 1.0)),
            record("late", 1.0, 1.0),
        ];
        let mut session = LayoutSession::build_initial_layout(truck(4.0, 2.0), boxes, coarse());
        assert_eq!(session.overflow().len(), 1);
        let placed_before: Vec<Rect> = session.placed().iter().map(|p| p.rect).collect();

        assert_eq!(session.place_overflow("late").unwrap(), MoveOutcome::Rejected);
        assert_eq!(session.overflow().len(), 1);
        let placed_after: Vec<Rect> = session.placed().iter().map(|p| p.rect).collect();
        assert_eq!(placed_before, placed_after);
    }

    #[test]
    fn leftover_strip_is_filled_during_build() {
        let boxes = vec![
            saved("a", Rect::new(0.0, 0.0, 2.0, 2.0)),
            saved("b", Rect::new(2.0, 0.0, 2.0, 2.0)),
            record("late", 1.0, 2.0),
        ];
        let session = LayoutSession::build_initial_layout(truck(5.0, 2.0), boxes, coarse());
        assert_eq!(session.overflow().len(), 0, "1 m strip on the right takes the late box");

        let mut tight = LayoutSession::build_initial_layout(
            truck(4.0, 2.0),
            vec![
                saved("a", Rect::new(0.0, 0.0, 2.0, 2.0)),
                saved("b", Rect::new(2.0, 0.0, 1.0, 2.0)),
                record("late", 1.0, 2.0),
            ],
            coarse(),
        );
        assert!(tight.overflow().is_empty());
        assert_eq!(tight.placed_box("late").unwrap().rect, Rect::new(3.0, 0.0, 1.0, 2.0));
        assert_eq!(
            tight.place_overflow("late"),
            Err(SessionError::NotInOverflow("late".into()))
        );
        assert_eq!(
            tight.place_overflow("ghost"),
            Err(SessionError::UnknownBox("ghost".into()))
        );
    }

    #[test]
    fn place_overflow_rescues_after_auto_layout_frees_room() {
        let mut session = LayoutSession::build_initial_layout(
            truck(4.0, 1.0),
            vec![
                saved("a", Rect::new(1.0, 0.0, 1.0, 1.0)),
                saved("b", Rect::new(2.5, 0.0, 1.0, 1.0)),
                record("c", 1.5, 1.0),
            ],
            coarse(),
        );
        // Gaps of 1.0, 0.5 and 0.5 m: nowhere for 1.5 m.
        assert_eq!(session.overflow().len(), 1);
        assert_eq!(session.place_overflow("c").unwrap(), MoveOutcome::Rejected);

        session.begin_drag("b", Point::new(2.5, 0.0)).unwrap();
        assert!(session.drag_to(Point::new(3.0, 0.0)).unwrap().is_applied());
        session.end_drag();
        session.begin_drag("a", Point::new(1.0, 0.0)).unwrap();
        assert!(session.drag_to(Point::new(2.0, 0.0)).unwrap().is_applied());
        session.end_drag();

        assert_eq!(session.place_overflow("c").unwrap(), MoveOutcome::Applied);
        assert!(session.overflow().is_empty());
        assert_eq!(session.placed_box("c").unwrap().rect, Rect::new(0.0, 0.0, 1.5, 1.0));
        assert_consistent(&session);
    }

    #[test]
    fn auto_layout_repacks_everything() {
        let boxes = vec![
            saved("a", Rect::new(3.0, 1.0, 1.0, 1.0)),
            record("b", 2.0, 1.0),
            record("huge", 10.0, 10.0),
        ];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        session.begin_drag("a", Point::origin()).unwrap();

        session.auto_layout();
        assert!(!session.is_dragging());
        assert_eq!(session.selection(), None);
        assert_eq!(session.placed_box("b").unwrap().rect, Rect::new(0.0, 0.0, 2.0, 1.0));
        assert_eq!(session.placed_box("a").unwrap().rect, Rect::new(2.0, 0.0, 1.0, 1.0));
        assert_eq!(session.overflow().len(), 1);
        assert_eq!(session.placed().len() + session.overflow().len(), 3);
    }

    #[test]
    fn commit_rounds_and_unassigns_overflow() {
        let boxes = vec![
            saved("a", Rect::new(0.123_456, 0.0, 2.0, 1.0)),
            record("huge", 10.0, 10.0),
        ];
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        let committed = session.commit();

        assert_eq!(committed.truck_id, "t1");
        assert_eq!(committed.placements.len(), 1);
        assert_eq!(committed.placements[0].placement.x_m, 0.123);
        assert_eq!(committed.boxes.len(), 2);
        let huge = committed.boxes.iter().find(|b| b.id() == "huge").unwrap();
        assert!(huge.truck_id.is_none() && huge.placement.is_none());
        let a = committed.boxes.iter().find(|b| b.id() == "a").unwrap();
        assert_eq!(a.truck_id.as_deref(), Some("t1"));
    }

    #[test]
    fn committed_layout_reloads_without_moving_touching_boxes() {
        let boxes = vec![
            saved("a", Rect::new(0.0006, 0.0, 1.2346, 1.0)),
            saved("b", Rect::new(1.2353, 0.0, 1.0, 1.0)),
            saved("c", Rect::new(0.0006, 1.0004, 1.2346, 1.0)),
        ];
        let session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        assert_eq!(session.placed().len(), 3);
        let committed = session.commit();

        let rects: Vec<Rect> = committed.boxes.iter().filter_map(|b| b.saved_rect()).collect();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!overlaps(a, b), "{:?} overlaps {:?}", a, b);
            }
        }

        let reloaded =
            LayoutSession::build_initial_layout(truck(8.0, 2.5), committed.boxes.clone(), coarse());
        assert!(reloaded.overflow().is_empty());
        for record in &committed.boxes {
            assert_eq!(
                reloaded.placed_box(record.id()).map(|p| p.rect),
                record.saved_rect(),
                "{} moved on reload",
                record.id()
            );
        }
    }

    #[test]
    fn snapshot_reports_drag_and_selection() {
        let boxes = vec![saved("a", Rect::new(0.0, 0.0, 2.0, 1.0))];
        let mut session = LayoutSession::build_initial_layout(truck(8.0, 2.5), boxes, coarse());
        session.begin_drag("a", Point::new(0.2, 0.2)).unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.dragging.as_deref(), Some("a"));
        assert_eq!(snapshot.selection.as_deref(), Some("a"));
        assert_eq!(snapshot.bed, Bed::new(8.0, 2.5));
        assert_eq!(snapshot.placed.len(), 1);
    }
}

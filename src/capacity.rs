//! Fleet capacity planning.
//!
//! Answers "how many trucks does this load need at least?" by exhaustive
//! subset enumeration. The search is exact and exponential, so fleets are
//! capped; larger fleets are rejected instead of enumerated.

use log::debug;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::{LoadTotals, Truck};
use crate::types::EPSILON_GENERAL;

/// Upper bound for any configured fleet cap (2^30 subsets).
pub const HARD_FLEET_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("Fleet of {size} trucks exceeds the solver limit of {limit}")]
    FleetTooLarge { size: usize, limit: usize },
}

/// A truck reduced to what the solver needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct TruckCapacity {
    pub area: f64,
    /// `None` means no weight limit.
    pub max_weight: Option<f64>,
}

impl TruckCapacity {
    pub fn new(area: f64, max_weight: Option<f64>) -> Self {
        Self {
            area: area.max(0.0),
            max_weight: max_weight.filter(|w| *w > 0.0),
        }
    }

    /// A truck with neither floor area nor a weight limit cannot carry anything.
    fn contributes(&self) -> bool {
        self.area > 0.0 || self.max_weight.is_some()
    }
}

impl From<&Truck> for TruckCapacity {
    fn from(truck: &Truck) -> Self {
        Self::new(truck.capacity_area(), truck.weight_limit())
    }
}

/// Minimum number of trucks whose combined area and weight capacity cover `demand`.
///
/// # Returns
/// * `Ok(Some(0))` - nothing to carry
/// * `Ok(Some(n))` - the smallest subset has `n` trucks
/// * `Ok(None)` - not even the whole fleet suffices
/// * `Err(FleetTooLarge)` - more usable trucks than `max_fleet` (capped at [`HARD_FLEET_LIMIT`])
pub fn min_trucks_needed(
    fleet: &[TruckCapacity],
    demand: &LoadTotals,
    max_fleet: usize,
) -> Result<Option<usize>, CapacityError> {
    if demand.is_zero() {
        return Ok(Some(0));
    }

    let trucks: Vec<&TruckCapacity> = fleet.iter().filter(|t| t.contributes()).collect();
    let limit = max_fleet.min(HARD_FLEET_LIMIT);
    if trucks.len() > limit {
        return Err(CapacityError::FleetTooLarge {
            size: trucks.len(),
            limit,
        });
    }

    let n = trucks.len();
    let mut best: Option<usize> = None;

    for mask in 1u64..(1u64 << n) {
        let count = mask.count_ones() as usize;
        if best.is_some_and(|b| count >= b) {
            continue;
        }

        let mut area = 0.0;
        let mut weight = 0.0;
        let mut unlimited_weight = false;
        for (i, truck) in trucks.iter().enumerate() {
            if mask & (1 << i) == 0 {
                continue;
            }
            area += truck.area;
            match truck.max_weight {
                Some(w) => weight += w,
                None => unlimited_weight = true,
            }
        }

        let area_ok = area + EPSILON_GENERAL >= demand.area_m2;
        let weight_ok = unlimited_weight || weight + EPSILON_GENERAL >= demand.weight_kg;
        if area_ok && weight_ok {
            best = Some(count);
        }
    }

    debug!(
        "Capacity search over {} trucks for {:.2} m² / {:.1} kg: {:?}",
        n, demand.area_m2, demand.weight_kg, best
    );
    Ok(best)
}

/// [`min_trucks_needed`] for full truck records.
pub fn min_trucks_for(
    trucks: &[Truck],
    demand: &LoadTotals,
    max_fleet: usize,
) -> Result<Option<usize>, CapacityError> {
    let fleet: Vec<TruckCapacity> = trucks.iter().map(TruckCapacity::from).collect();
    min_trucks_needed(&fleet, demand, max_fleet)
}

/// Combined capacity of a hand-picked selection of trucks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct SelectedCapacity {
    pub selected_area: f64,
    /// Sum of the weight limits of the trucks that have one.
    pub selected_weight: f64,
    /// At least one selected truck has no weight limit.
    pub weight_unlimited: bool,
    pub has_enough_area: bool,
    pub has_enough_weight: bool,
}

pub fn selected_capacity(selection: &[Truck], demand: &LoadTotals) -> SelectedCapacity {
    let selected_area: f64 = selection.iter().map(Truck::capacity_area).sum();
    let selected_weight: f64 = selection.iter().filter_map(Truck::weight_limit).sum();
    let weight_unlimited = selection.iter().any(|t| t.weight_limit().is_none());

    SelectedCapacity {
        selected_area,
        selected_weight,
        weight_unlimited,
        has_enough_area: selected_area + EPSILON_GENERAL >= demand.area_m2,
        has_enough_weight: weight_unlimited || selected_weight + EPSILON_GENERAL >= demand.weight_kg,
    }
}

/// Whether a truck carries more area or weight than it is rated for.
///
/// Unknown capacities (0 area, no weight limit) never count as overloaded.
pub fn is_overloaded(truck: &Truck, loaded: &LoadTotals) -> bool {
    let capacity_area = truck.capacity_area();
    let area_exceeded = capacity_area > 0.0 && loaded.area_m2 > capacity_area + EPSILON_GENERAL;
    let weight_exceeded = truck
        .weight_limit()
        .is_some_and(|limit| loaded.weight_kg > limit + EPSILON_GENERAL);
    area_exceeded || weight_exceeded
}

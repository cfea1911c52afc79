//! Distribution of a box pool over several confirmed trucks.

use log::info;
use serde::Serialize;
use utoipa::ToSchema;

use crate::capacity::is_overloaded;
use crate::model::{LoadTotals, PlacedBox, Tour, Truck, TruckId, UnplacedBox};
use crate::packer::{LayoutConfig, pack_shelves};
use crate::types::Bed;

/// What one truck ended up carrying.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct TruckLoad {
    pub truck_id: TruckId,
    pub truck_name: String,
    pub bed: Bed,
    pub boxes: Vec<PlacedBox>,
    pub totals: LoadTotals,
    /// Weight is not enforced while packing, only reported here.
    pub overloaded: bool,
    pub utilization_percent: f64,
}

#[derive(Clone, Debug, Default, Serialize, ToSchema)]
pub struct FleetAssignment {
    /// One entry per truck that was packed, in the order given.
    pub loads: Vec<TruckLoad>,
    /// Boxes left over after the last truck.
    pub unassignable: Vec<UnplacedBox>,
}

impl FleetAssignment {
    pub fn assigned_count(&self) -> usize {
        self.loads.iter().map(|l| l.boxes.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.unassignable.is_empty()
    }
}

/// Packs the pool truck by truck, in the order given.
///
/// Each truck gets a fresh shelf-packing run over whatever the trucks before
/// it left behind. Trucks after the pool runs dry are not visited.
pub fn apply_multi_truck(
    trucks: &[Truck],
    pool: Vec<UnplacedBox>,
    config: &LayoutConfig,
) -> FleetAssignment {
    let mut remaining = pool;
    let mut assignment = FleetAssignment::default();

    for truck in trucks {
        if remaining.is_empty() {
            break;
        }
        let bed = truck.bed();
        let result = pack_shelves(remaining, &bed, &truck.id, config);
        let utilization_percent = result.utilization_percent(&bed);
        remaining = result.overflow;

        let totals = LoadTotals::of(result.packed.iter().map(|p| &p.cargo));
        assignment.loads.push(TruckLoad {
            truck_id: truck.id.clone(),
            truck_name: truck.name.clone(),
            bed,
            overloaded: is_overloaded(truck, &totals),
            totals,
            boxes: result.packed,
            utilization_percent,
        });
    }

    assignment.unassignable = remaining;
    info!(
        "Distributed {} boxes over {} trucks, {} unassignable",
        assignment.assigned_count(),
        assignment.loads.len(),
        assignment.unassignable.len()
    );
    assignment
}

/// Re-plans a whole tour over the given trucks and writes the result back.
///
/// Every box of the tour is pooled first, so earlier assignments and
/// placements are replaced. Boxes that fit nowhere end up unassigned. The
/// trucks become the tour's confirmed trucks.
pub fn assign_tour(tour: &mut Tour, trucks: &[Truck], config: &LayoutConfig) -> FleetAssignment {
    let pool = std::mem::take(&mut tour.boxes)
        .into_iter()
        .map(|record| UnplacedBox::new(record.cargo))
        .collect();

    let assignment = apply_multi_truck(trucks, pool, config);

    tour.boxes = assignment
        .loads
        .iter()
        .flat_map(|load| load.boxes.iter().cloned().map(|b| b.into_record(&load.bed)))
        .chain(assignment.unassignable.iter().cloned().map(UnplacedBox::into_record))
        .collect();
    tour.confirmed_truck_ids = trucks.iter().map(|t| t.id.clone()).collect();
    assignment
}

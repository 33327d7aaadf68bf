//! Load planner.
//!
//! Runs a complete planning pass:
//! 1. expand orders into units
//! 2. assign units to suppliers and warehouses
//! 3. hand each supplier's units to a truck, round-robin, behind the gate
//! 4. pack every loaded truck

use std::collections::{BTreeMap, HashMap};
use std::mem;

use tracing::{error, info, warn};

use crate::assignment::{SupplyAssigner, UnmetDemand};
use crate::config::{AppConfig, AssignmentConfig};
use crate::error::{Result, ValidationError};
use crate::gate;
use crate::model::{ItemId, ItemSpec, ItemUnit, Order, Supplier, SupplierId, Truck, UnitKey, Warehouse};
use crate::oracle::{DistanceOracle, TravelCost};
use crate::packing::{CargoPacker, PackingConfig};
use crate::solver::{MicroLpSolver, MilpSolver};

/// Turns order lines into individual units.
///
/// Unit numbers start at 1 per catalog item and continue across orders in
/// the order the lines appear.
///
/// # Parameters
/// * `orders` - Active orders
/// * `catalog` - Item specifications by id
pub fn expand_orders(
    orders: &[Order],
    catalog: &BTreeMap<ItemId, ItemSpec>,
) -> std::result::Result<Vec<ItemUnit>, ValidationError> {
    let mut next_unit: HashMap<&ItemId, u32> = HashMap::new();
    let mut units = Vec::new();

    for order in orders {
        for line in &order.lines {
            let spec = catalog.get(&line.item_id).ok_or_else(|| {
                ValidationError::UnknownReference(format!(
                    "order for warehouse {} references unknown item {}",
                    order.warehouse_id, line.item_id
                ))
            })?;
            let counter = next_unit.entry(&line.item_id).or_insert(0);
            for _ in 0..line.quantity {
                *counter += 1;
                units.push(spec.unit(*counter));
            }
        }
    }
    Ok(units)
}

/// Units of one supplier that no truck could take.
#[derive(Clone, Debug, PartialEq)]
pub struct UnassignableGroup {
    pub supplier_id: SupplierId,
    pub units: Vec<ItemUnit>,
}

/// Result of a planning run.
///
/// Loaded trucks carry their placements in `cargo.placed` and units that did
/// not fit in `unplaced`.
#[derive(Clone, Debug)]
pub struct PlanOutcome {
    pub trucks: Vec<Truck>,
    pub unmet: Vec<UnmetDemand>,
    pub unassignable: Vec<UnassignableGroup>,
    /// Units the assignment could not route
    pub unassigned: Vec<UnitKey>,
}

impl PlanOutcome {
    pub fn placed_count(&self) -> usize {
        self.trucks.iter().map(|t| t.cargo.placed.len()).sum()
    }

    pub fn unplaced_count(&self) -> usize {
        self.trucks.iter().map(|t| t.unplaced.len()).sum()
    }
}

pub struct LoadPlanner<S: MilpSolver, T: TravelCost> {
    solver: S,
    travel: T,
    packing: PackingConfig,
    assignment: AssignmentConfig,
}

impl LoadPlanner<MicroLpSolver, DistanceOracle> {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            MicroLpSolver,
            DistanceOracle::from_config(&config.oracle),
            config.packing,
            config.assignment.clone(),
        )
    }
}

impl<S: MilpSolver, T: TravelCost> LoadPlanner<S, T> {
    pub fn new(solver: S, travel: T, packing: PackingConfig, assignment: AssignmentConfig) -> Self {
        Self {
            solver,
            travel,
            packing,
            assignment,
        }
    }

    /// Plans one run.
    ///
    /// Supplier inventory is committed for every assigned unit. Running out of
    /// stock, trucks or cargo space is reported in the outcome, not as an error.
    /// A truck whose packing solve fails keeps its whole load in `unplaced`;
    /// the other trucks are still packed.
    ///
    /// # Parameters
    /// * `suppliers` - Sources; inventory is decremented
    /// * `warehouses` - Destinations; demand is rebuilt from `orders`
    /// * `trucks` - Fleet, in round-robin order
    /// * `orders` - Active orders
    /// * `units` - Units expanded from `orders`
    pub fn plan(
        &self,
        suppliers: &mut [Supplier],
        warehouses: &mut [Warehouse],
        mut trucks: Vec<Truck>,
        orders: &[Order],
        mut units: Vec<ItemUnit>,
    ) -> Result<PlanOutcome> {
        let assigner = SupplyAssigner::new(&self.solver, &self.travel, self.assignment.clone());
        let assignment = assigner.assign(suppliers, warehouses, orders, &mut units)?;

        let mut groups: BTreeMap<SupplierId, Vec<ItemUnit>> = BTreeMap::new();
        for unit in units {
            if let Some(supplier_id) = unit.supplier_id.clone() {
                groups.entry(supplier_id).or_default().push(unit);
            }
        }

        let mut unassignable = Vec::new();
        let mut cursor = 0;
        for (supplier_id, group) in groups {
            match pick_truck(&trucks, cursor, &group) {
                Some(idx) => {
                    info!(
                        supplier = %supplier_id,
                        truck = %trucks[idx].id,
                        units = group.len(),
                        "supplier group loaded"
                    );
                    trucks[idx].assigned.extend(group);
                    cursor = idx + 1;
                }
                None => {
                    warn!(
                        supplier = %supplier_id,
                        units = group.len(),
                        "no truck can carry the supplier group"
                    );
                    unassignable.push(UnassignableGroup {
                        supplier_id,
                        units: group,
                    });
                }
            }
        }

        let packer = CargoPacker::new(&self.solver, self.packing);
        for truck in trucks.iter_mut().filter(|t| !t.assigned.is_empty()) {
            let load = mem::take(&mut truck.assigned);
            info!(truck = %truck.id, units = load.len(), cargo = %truck.cargo.dims, "packing truck");
            match packer.pack(&mut truck.cargo, load.clone()) {
                Ok(result) => {
                    truck.unplaced = result.unplaced.into_iter().map(|u| u.unit).collect();
                }
                Err(err) => {
                    error!(truck = %truck.id, error = %err, "packing failed; load left unplaced");
                    truck.unplaced = load;
                }
            }
        }

        Ok(PlanOutcome {
            trucks,
            unmet: assignment.unmet,
            unassignable,
            unassigned: assignment.unassigned,
        })
    }
}

/// First truck, starting at `cursor` and wrapping around, whose existing
/// load plus `group` passes the gate.
fn pick_truck(trucks: &[Truck], cursor: usize, group: &[ItemUnit]) -> Option<usize> {
    let count = trucks.len();
    (0..count).map(|offset| (cursor + offset) % count).find(|&idx| {
        let truck = &trucks[idx];
        let load = truck
            .cargo
            .placed
            .iter()
            .chain(&truck.assigned)
            .chain(group);
        gate::check(truck.cargo.dims, load).passes()
    })
}

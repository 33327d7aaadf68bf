//! Supply-assignment model.
//!
//! Routes every unit from one supplier to one warehouse at minimum total
//! travel cost. One binary variable exists per (supplier, warehouse, unit)
//! triple where the supplier stocks the unit's item and the warehouse needs
//! it; all other triples are fixed at zero by omission.
//!
//! When demand cannot be met exactly, a relaxed model assigns as many units
//! as possible and the shortfall is reported per (warehouse, item).

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AssignmentConfig;
use crate::error::ValidationError;
use crate::model::{Assignment, ItemId, ItemUnit, Order, Supplier, UnitKey, Warehouse, WarehouseId};
use crate::oracle::TravelCost;
use crate::solver::{LinearExpr, MilpModel, MilpSolution, MilpSolver, Sense, SolveStatus, SolverError, Var};

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("assignment solve ran out of time before finding any assignment")]
    TimedOut,

    #[error("could not commit inventory: {0}")]
    Commit(#[from] ValidationError),
}

/// Demand of one warehouse for one item that no supplier could cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnmetDemand {
    pub warehouse_id: WarehouseId,
    pub item_id: ItemId,
    pub missing: u32,
}

/// Result of one assignment run.
#[derive(Clone, Debug)]
pub struct AssignmentOutcome {
    pub assignments: Vec<Assignment>,
    pub unmet: Vec<UnmetDemand>,
    /// Units that received no (supplier, warehouse) pair
    pub unassigned: Vec<UnitKey>,
    pub status: SolveStatus,
    /// Whether the exact model was infeasible and the relaxed one was used
    pub relaxed: bool,
}

impl AssignmentOutcome {
    pub fn is_complete(&self) -> bool {
        self.unmet.is_empty() && self.unassigned.is_empty()
    }
}

/// Supply-assignment model bound to a solver and a travel cost.
pub struct SupplyAssigner<'a, S: MilpSolver + ?Sized, T: TravelCost + ?Sized> {
    solver: &'a S,
    travel: &'a T,
    config: AssignmentConfig,
}

struct Triple {
    supplier: usize,
    warehouse: usize,
    unit: usize,
    var: Var,
}

struct AssignmentModel {
    model: MilpModel,
    triples: Vec<Triple>,
}

impl<'a, S: MilpSolver + ?Sized, T: TravelCost + ?Sized> SupplyAssigner<'a, S, T> {
    pub fn new(solver: &'a S, travel: &'a T, config: AssignmentConfig) -> Self {
        Self {
            solver,
            travel,
            config,
        }
    }

    /// Assigns units to (supplier, warehouse) pairs and commits inventory.
    ///
    /// Warehouse demand is rebuilt from `orders` first. On success every
    /// assigned unit carries its `supplier_id` and `warehouse_id`, and each
    /// supplier's inventory has been decremented by what it ships. On error
    /// neither units nor inventories are touched.
    ///
    /// # Parameters
    /// * `suppliers` - Sources with their remaining inventory
    /// * `warehouses` - Destinations; demand is overwritten
    /// * `orders` - Active orders
    /// * `units` - Units to route
    pub fn assign(
        &self,
        suppliers: &mut [Supplier],
        warehouses: &mut [Warehouse],
        orders: &[Order],
        units: &mut [ItemUnit],
    ) -> Result<AssignmentOutcome, AssignmentError> {
        for warehouse in warehouses.iter_mut() {
            warehouse.rebuild_demand(orders);
        }

        let costs = self.pair_costs(suppliers, warehouses, units);
        let short_items = short_supply(suppliers, warehouses);
        let mut relaxed = !short_items.is_empty();
        for item in &short_items {
            warn!(item = %item, "total inventory is below total demand");
        }

        let mut built = AssignmentModel::build(suppliers, warehouses, units, &costs, relaxed);
        if !relaxed && built.has_orphans(units.len()) {
            warn!("some units have no supplier or no warehouse for their item");
            relaxed = true;
            built = AssignmentModel::build(suppliers, warehouses, units, &costs, true);
        }

        let mut solution = self.solve(&built)?;
        if solution.status == SolveStatus::Infeasible && !relaxed {
            warn!("exact assignment infeasible, assigning as much demand as possible");
            relaxed = true;
            built = AssignmentModel::build(suppliers, warehouses, units, &costs, true);
            solution = self.solve(&built)?;
        }
        if solution.status == SolveStatus::Infeasible {
            warn!("relaxed assignment reported infeasible, nothing is assigned");
        }

        let chosen: Vec<&Triple> = built
            .triples
            .iter()
            .filter(|t| solution.is_set(t.var))
            .collect();

        let mut shipped: BTreeMap<(usize, ItemId), u32> = BTreeMap::new();
        for triple in &chosen {
            *shipped
                .entry((triple.supplier, units[triple.unit].item_id().clone()))
                .or_insert(0) += 1;
        }
        // Check every commitment before touching any inventory.
        for ((supplier, item), qty) in &shipped {
            let available = suppliers[*supplier].available(item);
            if *qty > available {
                return Err(ValidationError::InvalidQuantity(format!(
                    "assignment ships {} of item {} from supplier {} holding {}",
                    qty, item, suppliers[*supplier].id, available
                ))
                .into());
            }
        }
        for ((supplier, item), qty) in &shipped {
            suppliers[*supplier].commit(item, *qty)?;
        }

        let mut assignments = Vec::with_capacity(chosen.len());
        let mut received: BTreeMap<(usize, ItemId), u32> = BTreeMap::new();
        let mut assigned = vec![false; units.len()];
        for triple in chosen {
            let unit = &mut units[triple.unit];
            let supplier_id = suppliers[triple.supplier].id.clone();
            let warehouse_id = warehouses[triple.warehouse].id.clone();
            unit.supplier_id = Some(supplier_id.clone());
            unit.warehouse_id = Some(warehouse_id.clone());
            assigned[triple.unit] = true;
            *received
                .entry((triple.warehouse, unit.item_id().clone()))
                .or_insert(0) += 1;
            assignments.push(Assignment {
                supplier_id,
                warehouse_id,
                unit: unit.key.clone(),
            });
        }

        let mut unmet = Vec::new();
        for (w_idx, warehouse) in warehouses.iter().enumerate() {
            for (item, required) in &warehouse.demand {
                let got = received.get(&(w_idx, item.clone())).copied().unwrap_or(0);
                if got < *required {
                    warn!(
                        warehouse = %warehouse.id,
                        item = %item,
                        missing = required - got,
                        "demand cannot be met"
                    );
                    unmet.push(UnmetDemand {
                        warehouse_id: warehouse.id.clone(),
                        item_id: item.clone(),
                        missing: required - got,
                    });
                }
            }
        }

        let unassigned: Vec<UnitKey> = units
            .iter()
            .zip(&assigned)
            .filter(|(_, done)| !**done)
            .map(|(unit, _)| unit.key.clone())
            .collect();

        info!(
            assigned = assignments.len(),
            unassigned = unassigned.len(),
            unmet = unmet.len(),
            relaxed,
            status = solution.status.code(),
            "supply assignment finished"
        );

        Ok(AssignmentOutcome {
            assignments,
            unmet,
            unassigned,
            status: solution.status,
            relaxed,
        })
    }

    fn solve(&self, built: &AssignmentModel) -> Result<MilpSolution, AssignmentError> {
        if built.triples.is_empty() {
            return Ok(MilpSolution::empty(SolveStatus::Optimal));
        }
        let solution = self.solver.solve(&built.model, self.config.time_limit)?;
        match solution.status {
            SolveStatus::TimeLimitNoIncumbent => Err(AssignmentError::TimedOut),
            SolveStatus::TimeLimitFeasible => {
                warn!("assignment solve timed out, using the best assignment found");
                Ok(solution)
            }
            _ => Ok(solution),
        }
    }

    /// Distances for the (supplier, warehouse) pairs that can exchange any unit.
    fn pair_costs(
        &self,
        suppliers: &[Supplier],
        warehouses: &[Warehouse],
        units: &[ItemUnit],
    ) -> HashMap<(usize, usize), f64> {
        let mut costs = HashMap::new();
        for (s_idx, supplier) in suppliers.iter().enumerate() {
            for (w_idx, warehouse) in warehouses.iter().enumerate() {
                let exchanges = units
                    .iter()
                    .any(|u| supplier.available(u.item_id()) > 0 && warehouse.required(u.item_id()) > 0);
                if exchanges {
                    let distance = self.travel.distance(supplier.location, warehouse.location);
                    debug!(supplier = %supplier.id, warehouse = %warehouse.id, distance, "pair cost");
                    costs.insert((s_idx, w_idx), distance);
                }
            }
        }
        costs
    }
}

/// Items whose total inventory is below their total demand.
fn short_supply(suppliers: &[Supplier], warehouses: &[Warehouse]) -> Vec<ItemId> {
    let mut demand: BTreeMap<&ItemId, u64> = BTreeMap::new();
    for warehouse in warehouses {
        for (item, qty) in &warehouse.demand {
            *demand.entry(item).or_insert(0) += u64::from(*qty);
        }
    }
    demand
        .into_iter()
        .filter(|(item, required)| {
            let stock: u64 = suppliers.iter().map(|s| u64::from(s.available(item))).sum();
            stock < *required
        })
        .map(|(item, _)| item.clone())
        .collect()
}

impl AssignmentModel {
    /// Builds the exact model, or with `relaxed` the maximum-coverage variant:
    /// demand and uniqueness become upper bounds and each assignment earns a
    /// reward larger than any possible total travel cost.
    fn build(
        suppliers: &[Supplier],
        warehouses: &[Warehouse],
        units: &[ItemUnit],
        costs: &HashMap<(usize, usize), f64>,
        relaxed: bool,
    ) -> Self {
        let name = if relaxed { "supply_assignment_relaxed" } else { "supply_assignment" };
        let mut model = MilpModel::new(name, Sense::Minimize);
        let mut triples = Vec::new();

        for (u_idx, unit) in units.iter().enumerate() {
            for (s_idx, supplier) in suppliers.iter().enumerate() {
                if supplier.available(unit.item_id()) == 0 {
                    continue;
                }
                for (w_idx, warehouse) in warehouses.iter().enumerate() {
                    if warehouse.required(unit.item_id()) == 0 {
                        continue;
                    }
                    triples.push(Triple {
                        supplier: s_idx,
                        warehouse: w_idx,
                        unit: u_idx,
                        var: model.add_binary(),
                    });
                }
            }
        }

        let max_cost = costs.values().copied().fold(0.0_f64, f64::max);
        let reward = max_cost * units.len() as f64 + 1.0;
        for triple in &triples {
            let cost = costs
                .get(&(triple.supplier, triple.warehouse))
                .copied()
                .unwrap_or(0.0);
            let coefficient = if relaxed { cost - reward } else { cost };
            model.add_objective_term(triple.var, coefficient);
        }

        let mut supply: BTreeMap<(usize, &ItemId), Vec<Var>> = BTreeMap::new();
        let mut demand: BTreeMap<(usize, &ItemId), Vec<Var>> = BTreeMap::new();
        let mut per_unit: Vec<Vec<Var>> = vec![Vec::new(); units.len()];
        for triple in &triples {
            let item = units[triple.unit].item_id();
            supply.entry((triple.supplier, item)).or_default().push(triple.var);
            demand.entry((triple.warehouse, item)).or_default().push(triple.var);
            per_unit[triple.unit].push(triple.var);
        }

        for ((s_idx, item), vars) in supply {
            let stock = f64::from(suppliers[s_idx].available(item));
            model.less_or_equal(LinearExpr::sum(vars), stock);
        }
        for ((w_idx, item), vars) in demand {
            let required = f64::from(warehouses[w_idx].required(item));
            if relaxed {
                model.less_or_equal(LinearExpr::sum(vars), required);
            } else {
                model.equal(LinearExpr::sum(vars), required);
            }
        }
        for vars in per_unit.into_iter().filter(|v| !v.is_empty()) {
            if relaxed {
                model.less_or_equal(LinearExpr::sum(vars), 1.0);
            } else {
                model.equal(LinearExpr::sum(vars), 1.0);
            }
        }

        debug!(
            model = name,
            variables = model.var_count(),
            constraints = model.constraint_count(),
            "assignment model built"
        );
        Self { model, triples }
    }

    /// Whether some unit has no candidate triple at all.
    fn has_orphans(&self, unit_count: usize) -> bool {
        let mut covered = vec![false; unit_count];
        for triple in &self.triples {
            covered[triple.unit] = true;
        }
        covered.iter().any(|c| !c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, ItemSpec, OrderLine, SupplierId};
    use crate::oracle::Haversine;
    use crate::solver::MicroLpSolver;
    use crate::types::Dims;

    fn supplier(id: &str, lat: f64, stock: &[(&str, u32)]) -> Supplier {
        Supplier {
            id: SupplierId::new(id),
            name: id.to_string(),
            location: GeoPoint::new(lat, 0.0).unwrap(),
            inventory: stock.iter().map(|(i, q)| (ItemId::new(*i), *q)).collect(),
        }
    }

    fn warehouse(id: &str, lat: f64) -> Warehouse {
        Warehouse::new(WarehouseId::new(id), id, GeoPoint::new(lat, 0.0).unwrap())
    }

    fn order(warehouse: &str, lines: &[(&str, u32)]) -> Order {
        Order {
            name: None,
            warehouse_id: WarehouseId::new(warehouse),
            lines: lines
                .iter()
                .map(|(i, q)| OrderLine {
                    item_id: ItemId::new(*i),
                    quantity: *q,
                })
                .collect(),
        }
    }

    fn units(item: &str, count: u32) -> Vec<ItemUnit> {
        let spec = ItemSpec::new(ItemId::new(item), Dims::new(1, 1, 1), 1.0, true, false).unwrap();
        (1..=count).map(|n| spec.unit(n)).collect()
    }

    fn run(
        suppliers: &mut [Supplier],
        warehouses: &mut [Warehouse],
        orders: &[Order],
        units: &mut [ItemUnit],
    ) -> AssignmentOutcome {
        SupplyAssigner::new(&MicroLpSolver, &Haversine, AssignmentConfig::default())
            .assign(suppliers, warehouses, orders, units)
            .unwrap()
    }

    #[test]
    fn test_single_stock_for_two_warehouses_leaves_one_unmet() {
        let mut suppliers = vec![supplier("S1", 0.0, &[("A", 1)])];
        let mut warehouses = vec![warehouse("near", 1.0), warehouse("far", 5.0)];
        let orders = vec![order("near", &[("A", 1)]), order("far", &[("A", 1)])];
        let mut batch = units("A", 2);

        let outcome = run(&mut suppliers, &mut warehouses, &orders, &mut batch);

        assert!(outcome.relaxed);
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(
            outcome.unmet,
            vec![UnmetDemand {
                warehouse_id: WarehouseId::new("far"),
                item_id: ItemId::new("A"),
                missing: 1,
            }]
        );
        assert_eq!(outcome.unassigned.len(), 1);
        assert_eq!(outcome.assignments[0].warehouse_id, WarehouseId::new("near"));
        assert_eq!(suppliers[0].available(&ItemId::new("A")), 0);
    }

    #[test]
    fn test_exact_assignment_conserves_inventory_and_meets_demand() {
        let mut suppliers = vec![
            supplier("S1", 0.0, &[("A", 2), ("B", 1)]),
            supplier("S2", 10.0, &[("A", 2)]),
        ];
        let mut warehouses = vec![warehouse("W1", 1.0), warehouse("W2", 9.0)];
        let orders = vec![
            order("W1", &[("A", 2)]),
            order("W2", &[("A", 1), ("B", 1)]),
            order("W1", &[("A", 1)]),
        ];
        let mut batch = units("A", 4);
        batch.extend(units("B", 1));

        let outcome = run(&mut suppliers, &mut warehouses, &orders, &mut batch);

        assert!(outcome.is_complete());
        assert!(!outcome.relaxed);
        assert_eq!(outcome.assignments.len(), 5);
        assert_eq!(warehouses[0].required(&ItemId::new("A")), 3);

        let into = |w: &str, i: &str| {
            outcome
                .assignments
                .iter()
                .filter(|a| a.warehouse_id.as_str() == w && a.item_id().as_str() == i)
                .count()
        };
        assert_eq!(into("W1", "A"), 3);
        assert_eq!(into("W2", "A"), 1);
        assert_eq!(into("W2", "B"), 1);

        let out_of = |s: &str| outcome.assignments.iter().filter(|a| a.supplier_id.as_str() == s).count();
        // S1 ships both of its A units to the nearby W1, S2 covers the rest.
        assert_eq!(out_of("S1"), 3);
        assert_eq!(out_of("S2"), 2);
        assert_eq!(suppliers[0].available(&ItemId::new("A")), 0);
        assert_eq!(suppliers[1].available(&ItemId::new("A")), 0);
        assert_eq!(suppliers[0].available(&ItemId::new("B")), 0);

        assert!(batch.iter().all(|u| u.supplier_id.is_some() && u.warehouse_id.is_some()));
    }

    #[test]
    fn test_unstocked_item_is_reported_without_blocking_others() {
        let mut suppliers = vec![supplier("S1", 0.0, &[("A", 1)])];
        let mut warehouses = vec![warehouse("W1", 1.0)];
        let orders = vec![order("W1", &[("A", 1), ("Z", 2)])];
        let mut batch = units("A", 1);
        batch.extend(units("Z", 2));

        let outcome = run(&mut suppliers, &mut warehouses, &orders, &mut batch);

        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].item_id(), &ItemId::new("A"));
        assert_eq!(
            outcome.unmet,
            vec![UnmetDemand {
                warehouse_id: WarehouseId::new("W1"),
                item_id: ItemId::new("Z"),
                missing: 2,
            }]
        );
        assert_eq!(outcome.unassigned.len(), 2);
        assert!(batch.iter().filter(|u| u.item_id().as_str() == "Z").all(|u| u.supplier_id.is_none()));
    }

    #[test]
    fn test_empty_run_is_trivially_complete() {
        let mut suppliers = vec![supplier("S1", 0.0, &[("A", 1)])];
        let mut warehouses = vec![warehouse("W1", 1.0)];
        let outcome = run(&mut suppliers, &mut warehouses, &[], &mut []);
        assert!(outcome.is_complete());
        assert_eq!(suppliers[0].available(&ItemId::new("A")), 1);
    }
}

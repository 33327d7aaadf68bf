//! Cargo packing model.
//!
//! Builds a binary model over the cargo lattice and lets the solver choose,
//! for every unit, at most one origin cell. The model encodes:
//! - at most one placement per unit
//! - no two units sharing a cell
//! - full support: a unit above the floor rests on a single non-fragile unit
//!   whose top face contains its whole footprint
//! - floor-only placement for non-stackable units
//! - nothing in the layer directly above a fragile unit
//!
//! The objective maximizes the number of placed units, with a small bonus for
//! positions further along the length axis so the hold fills from one end.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::geometry::{LayoutViolation, audit_layout};
use crate::model::{CargoVolume, ItemUnit, UnitKey};
use crate::solver::{LinearExpr, MicroLpSolver, MilpModel, MilpSolver, Sense, SolveStatus, SolverError, Var};
use crate::types::{Cell, Dims, GridBox};

/// Configuration for the packing model.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Wall-clock budget for one solve (`None` = unbounded)
    pub time_limit: Option<Duration>,
    /// Objective bonus for a unit placed at the far end of the length axis
    pub length_bonus: f64,
}

impl PackingConfig {
    pub const DEFAULT_TIME_LIMIT_SECS: u64 = 600;
    pub const DEFAULT_LENGTH_BONUS: f64 = 0.01;
    pub const MAX_LENGTH_BONUS: f64 = 0.01;

    /// Creates a builder for custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Bonus scale actually used for `unit_count` units.
    ///
    /// Capped at `1 / (unit_count + 1)` so the bonuses of all units together
    /// stay below the value of one additional placed unit.
    pub fn effective_length_bonus(&self, unit_count: usize) -> f64 {
        let cap = 1.0 / (unit_count as f64 + 1.0);
        self.length_bonus.clamp(0.0, Self::MAX_LENGTH_BONUS).min(cap)
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            time_limit: Some(Duration::from_secs(Self::DEFAULT_TIME_LIMIT_SECS)),
            length_bonus: Self::DEFAULT_LENGTH_BONUS,
        }
    }
}

/// Builder for `PackingConfig`.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the solve budget; `None` disables it.
    pub fn time_limit(mut self, limit: Option<Duration>) -> Self {
        self.config.time_limit = limit;
        self
    }

    /// Sets the length-axis bonus.
    pub fn length_bonus(mut self, bonus: f64) -> Self {
        self.config.length_bonus = bonus;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Reasons why a unit was left out of the cargo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    DimensionsExceedCargo,
    NoFeasiblePosition,
    SolverTimedOut,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::DimensionsExceedCargo => "dimensions_exceed_cargo",
            UnplacedReason::NoFeasiblePosition => "no_feasible_position",
            UnplacedReason::SolverTimedOut => "solver_timed_out",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::DimensionsExceedCargo => {
                write!(f, "Unit does not fit the cargo in at least one dimension")
            }
            UnplacedReason::NoFeasiblePosition => {
                write!(f, "No remaining position satisfies the loading rules")
            }
            UnplacedReason::SolverTimedOut => {
                write!(f, "Solver budget expired before a placement was found")
            }
        }
    }
}

/// A unit that could not be placed.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedUnit {
    pub unit: ItemUnit,
    pub reason: UnplacedReason,
}

/// Result of one packing run.
///
/// Placed units have been moved into the cargo; `placed` lists their keys.
#[derive(Clone, Debug)]
pub struct PlacementResult {
    pub status: SolveStatus,
    pub placed: Vec<UnitKey>,
    pub unplaced: Vec<UnplacedUnit>,
    pub violations: Vec<LayoutViolation>,
}

impl PlacementResult {
    /// Whether every unit was placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }
}

/// Packs units into a cargo volume with the default solver.
///
/// # Parameters
/// * `cargo` - Target volume; already placed units are kept as fixed obstacles
/// * `units` - Units to place
/// * `config` - Model parameters
pub fn pack_units(
    cargo: &mut CargoVolume,
    units: Vec<ItemUnit>,
    config: &PackingConfig,
) -> Result<PlacementResult, SolverError> {
    CargoPacker::new(&MicroLpSolver, *config).pack(cargo, units)
}

/// Cargo packing model bound to a solver backend.
pub struct CargoPacker<'s, S: MilpSolver + ?Sized> {
    solver: &'s S,
    config: PackingConfig,
}

impl<'s, S: MilpSolver + ?Sized> CargoPacker<'s, S> {
    pub fn new(solver: &'s S, config: PackingConfig) -> Self {
        Self { solver, config }
    }

    /// Places as many units as possible inside `cargo`.
    ///
    /// Units receive their `position` and move into `cargo.placed`; the rest
    /// are returned as unplaced. Running out of space is not an error.
    pub fn pack(
        &self,
        cargo: &mut CargoVolume,
        units: Vec<ItemUnit>,
    ) -> Result<PlacementResult, SolverError> {
        if units.is_empty() {
            return Ok(PlacementResult {
                status: SolveStatus::Optimal,
                placed: Vec::new(),
                unplaced: Vec::new(),
                violations: Vec::new(),
            });
        }

        let fixed: Vec<FixedBox> = cargo
            .placed
            .iter()
            .filter_map(|u| {
                u.placed_box().map(|bx| FixedBox {
                    bx,
                    fragile: u.fragile,
                })
            })
            .collect();

        let bonus = self.config.effective_length_bonus(units.len());
        let built = PackingModel::build(cargo.dims, &fixed, &units, bonus);
        debug!(
            units = units.len(),
            candidates = built.candidates.len(),
            constraints = built.model.constraint_count(),
            cargo = %cargo.dims,
            "packing model built"
        );

        let solution = if built.candidates.is_empty() {
            None
        } else {
            Some(self.solver.solve(&built.model, self.config.time_limit)?)
        };
        let mut status = solution
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(SolveStatus::Optimal);

        let mut origins: Vec<Option<Cell>> = vec![None; units.len()];
        if let Some(solution) = solution.as_ref().filter(|s| s.status.has_solution()) {
            for candidate in &built.candidates {
                if solution.is_set(candidate.var) && origins[candidate.unit].is_none() {
                    origins[candidate.unit] = Some(candidate.bx.min);
                }
            }
        }

        match status {
            SolveStatus::TimeLimitNoIncumbent | SolveStatus::TimeLimitFeasible => {
                let solved = origins.iter().flatten().count();
                if let Some(greedy) = built.first_fit(&fixed, &units, cargo) {
                    let fitted = greedy.iter().flatten().count();
                    if fitted > solved {
                        warn!(solved, fitted, "packing solve timed out; using first-fit placement");
                        origins = greedy;
                        status = SolveStatus::TimeLimitFeasible;
                    }
                }
                if status == SolveStatus::TimeLimitFeasible {
                    warn!("packing solve timed out; using the best placement found")
                } else {
                    warn!("packing solve timed out without a placement; all units stay unplaced")
                }
            }
            SolveStatus::Infeasible => {
                error!("packing model reported infeasible although leaving all units out is feasible")
            }
            SolveStatus::Optimal => {}
        }

        let mut placed = Vec::new();
        let mut unplaced = Vec::new();
        for (idx, mut unit) in units.into_iter().enumerate() {
            match origins[idx] {
                Some(origin) => {
                    unit.position = Some(origin);
                    placed.push(unit.key.clone());
                    cargo.placed.push(unit);
                }
                None => {
                    let reason = if !unit.dims.fits_within(&cargo.dims) {
                        UnplacedReason::DimensionsExceedCargo
                    } else if built.by_unit[idx].is_empty() {
                        UnplacedReason::NoFeasiblePosition
                    } else if matches!(
                        status,
                        SolveStatus::TimeLimitFeasible | SolveStatus::TimeLimitNoIncumbent
                    ) {
                        UnplacedReason::SolverTimedOut
                    } else {
                        UnplacedReason::NoFeasiblePosition
                    };
                    unit.position = None;
                    unplaced.push(UnplacedUnit { unit, reason });
                }
            }
        }

        let violations = audit_layout(cargo.dims, &cargo.placed);
        for violation in &violations {
            error!(%violation, "placement breaks a loading rule");
        }

        info!(
            placed = placed.len(),
            unplaced = unplaced.len(),
            status = status.code(),
            utilization = cargo.utilization_percent(),
            "packing finished"
        );
        for entry in &unplaced {
            info!(unit = %entry.unit.key, reason = entry.reason.code(), "unit left unplaced");
        }

        Ok(PlacementResult {
            status,
            placed,
            unplaced,
            violations,
        })
    }
}

/// A unit already in the cargo, treated as an immovable obstacle.
struct FixedBox {
    bx: GridBox,
    fragile: bool,
}

/// One (unit, origin) decision variable.
struct Candidate {
    unit: usize,
    bx: GridBox,
    var: Var,
}

struct PackingModel {
    model: MilpModel,
    candidates: Vec<Candidate>,
    by_unit: Vec<Vec<usize>>,
}

/// Whether `upper` occupies the cell layer directly on top of `lower` within
/// `lower`'s footprint.
fn occupies_layer_above(lower: &GridBox, upper: &GridBox) -> bool {
    let layer = lower.top_z();
    upper.min.z <= layer && layer < upper.top_z() && lower.footprint_intersects(upper)
}

impl PackingModel {
    fn build(bounds: Dims, fixed: &[FixedBox], units: &[ItemUnit], bonus: f64) -> Self {
        let mut model = MilpModel::new("cargo_packing", Sense::Maximize);

        // Enumerate in-bounds origins, dropping those that collide with fixed units.
        let mut raw: Vec<(usize, GridBox)> = Vec::new();
        for (idx, unit) in units.iter().enumerate() {
            if !unit.dims.fits_within(&bounds) {
                continue;
            }
            let max_z = if unit.stackable {
                bounds.height - unit.dims.height
            } else {
                0
            };
            for z in 0..=max_z {
                for y in 0..=(bounds.width - unit.dims.width) {
                    for x in 0..=(bounds.length - unit.dims.length) {
                        let bx = unit.footprint_at(Cell::new(x, y, z));
                        let blocked = fixed.iter().any(|f| {
                            f.bx.intersects(&bx)
                                || (f.fragile && occupies_layer_above(&f.bx, &bx))
                                || (unit.fragile && occupies_layer_above(&bx, &f.bx))
                        });
                        if !blocked {
                            raw.push((idx, bx));
                        }
                    }
                }
            }
        }
        // Supporters always sit lower, so visiting by height lets each
        // candidate see every possible supporter.
        raw.sort_by_key(|(idx, bx)| (bx.min.z, *idx, bx.min.y, bx.min.x));

        let mut candidates: Vec<Candidate> = Vec::with_capacity(raw.len());
        let mut by_unit: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
        let mut by_top: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut support_rows: Vec<(Var, Vec<Var>)> = Vec::new();

        for (unit_idx, bx) in raw {
            let mut supporters = Vec::new();
            if bx.min.z > 0 {
                let on_fixed = fixed.iter().any(|f| {
                    !f.fragile && f.bx.top_z() == bx.min.z && f.bx.footprint_contains(&bx)
                });
                if !on_fixed {
                    supporters = by_top
                        .get(&bx.min.z)
                        .into_iter()
                        .flatten()
                        .map(|&c| &candidates[c])
                        .filter(|c| c.unit != unit_idx && c.bx.footprint_contains(&bx))
                        .map(|c| c.var)
                        .collect();
                    if supporters.is_empty() {
                        continue;
                    }
                }
            }

            let var = model.add_binary();
            let position = candidates.len();
            candidates.push(Candidate {
                unit: unit_idx,
                bx,
                var,
            });
            by_unit[unit_idx].push(position);
            if !units[unit_idx].fragile {
                by_top.entry(bx.top_z()).or_default().push(position);
            }
            if !supporters.is_empty() {
                support_rows.push((var, supporters));
            }
        }

        for candidate in &candidates {
            let along = f64::from(candidate.bx.min.x) / f64::from(bounds.length);
            model.add_objective_term(candidate.var, 1.0 + bonus * along);
        }

        // At most one origin per unit.
        for positions in by_unit.iter().filter(|p| !p.is_empty()) {
            let expr = LinearExpr::sum(positions.iter().map(|&p| candidates[p].var));
            model.less_or_equal(expr, 1.0);
        }

        // No two placements share a cell.
        let mut cover: BTreeMap<Cell, Vec<Var>> = BTreeMap::new();
        for candidate in &candidates {
            for cell in candidate.bx.cells() {
                cover.entry(cell).or_default().push(candidate.var);
            }
        }
        for vars in cover.into_values().filter(|v| v.len() > 1) {
            model.less_or_equal(LinearExpr::sum(vars), 1.0);
        }

        // Placement above the floor implies a selected full supporter.
        for (var, supporters) in support_rows {
            let mut expr = LinearExpr::sum([var]);
            for supporter in supporters {
                expr.add(supporter, -1.0);
            }
            model.less_or_equal(expr, 0.0);
        }

        // Big-M: a selected fragile placement empties the layer above it.
        let mut by_layer: HashMap<u32, Vec<usize>> = HashMap::new();
        for (position, candidate) in candidates.iter().enumerate() {
            for z in candidate.bx.min.z..candidate.bx.top_z() {
                by_layer.entry(z).or_default().push(position);
            }
        }
        for candidate in candidates.iter().filter(|c| units[c.unit].fragile) {
            let layer = candidate.bx.top_z();
            if layer >= bounds.height {
                continue;
            }
            let above: Vec<&Candidate> = by_layer
                .get(&layer)
                .into_iter()
                .flatten()
                .map(|&p| &candidates[p])
                .filter(|other| {
                    other.unit != candidate.unit && occupies_layer_above(&candidate.bx, &other.bx)
                })
                .collect();
            if above.is_empty() {
                continue;
            }
            let mut distinct: Vec<usize> = above.iter().map(|c| c.unit).collect();
            distinct.sort_unstable();
            distinct.dedup();
            let big_m = distinct.len() as f64;

            let mut expr = LinearExpr::sum(above.iter().map(|c| c.var));
            expr.add(candidate.var, big_m);
            model.less_or_equal(expr, big_m);
        }

        Self {
            model,
            candidates,
            by_unit,
        }
    }

    /// Greedy placement over the model's candidates.
    ///
    /// Floor-only units go first, then the rest by decreasing volume with
    /// fragile units last; each takes its lowest free origin that keeps every
    /// loading rule. Returns `None` if the layout fails the audit.
    fn first_fit(
        &self,
        fixed: &[FixedBox],
        units: &[ItemUnit],
        cargo: &CargoVolume,
    ) -> Option<Vec<Option<Cell>>> {
        let mut order: Vec<usize> = (0..units.len()).collect();
        order.sort_by_key(|&idx| {
            let unit = &units[idx];
            (unit.fragile, unit.stackable, Reverse(unit.dims.volume()))
        });

        let mut taken: Vec<FixedBox> = fixed
            .iter()
            .map(|f| FixedBox {
                bx: f.bx,
                fragile: f.fragile,
            })
            .collect();
        let mut origins: Vec<Option<Cell>> = vec![None; units.len()];

        for idx in order {
            let fragile = units[idx].fragile;
            let slot = self.by_unit[idx].iter().map(|&p| &self.candidates[p]).find(|c| {
                let bx = &c.bx;
                let supported = bx.min.z == 0
                    || taken.iter().any(|t| {
                        !t.fragile && t.bx.top_z() == bx.min.z && t.bx.footprint_contains(bx)
                    });
                supported
                    && taken.iter().all(|t| {
                        !t.bx.intersects(bx)
                            && !(t.fragile && occupies_layer_above(&t.bx, bx))
                            && !(fragile && occupies_layer_above(bx, &t.bx))
                    })
            });
            if let Some(candidate) = slot {
                origins[idx] = Some(candidate.bx.min);
                taken.push(FixedBox {
                    bx: candidate.bx,
                    fragile,
                });
            }
        }

        let mut trial = cargo.placed.clone();
        for (unit, origin) in units.iter().zip(&origins) {
            if let Some(origin) = origin {
                let mut unit = unit.clone();
                unit.position = Some(*origin);
                trial.push(unit);
            }
        }
        if audit_layout(cargo.dims, &trial).is_empty() {
            Some(origins)
        } else {
            error!("first-fit placement breaks a loading rule; discarding it");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::full_supporter;
    use crate::model::{ItemId, ItemSpec};
    use crate::solver::MilpSolution;

    fn units(id: &str, dims: (u32, u32, u32), count: u32, stackable: bool, fragile: bool) -> Vec<ItemUnit> {
        let spec = ItemSpec::new(ItemId::new(id), Dims::from(dims), 10.0, stackable, fragile).unwrap();
        (1..=count).map(|n| spec.unit(n)).collect()
    }

    fn cargo(dims: (u32, u32, u32)) -> CargoVolume {
        CargoVolume::new(Dims::from(dims)).unwrap()
    }

    fn test_config() -> PackingConfig {
        PackingConfig::builder()
            .time_limit(Some(Duration::from_secs(120)))
            .build()
    }

    #[test]
    fn test_five_cubes_fit_a_ten_by_five_by_five_hold() {
        let mut hold = cargo((10, 5, 5));
        let result = pack_units(&mut hold, units("A", (2, 2, 2), 5, true, false), &test_config()).unwrap();

        assert!(result.is_complete());
        assert_eq!(hold.placed.len(), 5);
        assert!(result.violations.is_empty());
        assert!(audit_layout(hold.dims, &hold.placed).is_empty());

        // The length bonus pulls units to the far end, where the floor only
        // holds two of them, so the rest stack.
        let stacked: Vec<&ItemUnit> = hold
            .placed
            .iter()
            .filter(|u| u.position.is_some_and(|p| p.z > 0))
            .collect();
        assert!(!stacked.is_empty());
        for unit in stacked {
            assert!(full_supporter(unit, &hold.placed).is_some());
        }
    }

    #[test]
    fn test_stacking_is_used_when_the_floor_is_full() {
        let mut hold = cargo((4, 2, 4));
        let result = pack_units(&mut hold, units("A", (2, 2, 2), 4, true, false), &test_config()).unwrap();

        assert!(result.is_complete());
        let stacked: Vec<&ItemUnit> = hold
            .placed
            .iter()
            .filter(|u| u.position.is_some_and(|p| p.z > 0))
            .collect();
        assert_eq!(stacked.len(), 2);
        for unit in stacked {
            assert!(full_supporter(unit, &hold.placed).is_some());
        }
        assert!(audit_layout(hold.dims, &hold.placed).is_empty());
    }

    #[test]
    fn test_two_large_fragile_units_leave_one_out() {
        let mut hold = cargo((4, 4, 4));
        let result = pack_units(&mut hold, units("F", (3, 3, 3), 2, true, true), &test_config()).unwrap();

        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced_count(), 1);
        assert_eq!(result.unplaced[0].reason, UnplacedReason::NoFeasiblePosition);
        assert_eq!(hold.placed[0].position.map(|p| p.z), Some(0));
    }

    #[test]
    fn test_oversized_unit_is_reported_with_reason() {
        let mut hold = cargo((4, 4, 4));
        let mut batch = units("small", (1, 1, 1), 1, true, false);
        batch.extend(units("long", (5, 1, 1), 1, true, false));

        let result = pack_units(&mut hold, batch, &test_config()).unwrap();
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced.len(), 1);
        assert_eq!(result.unplaced[0].unit.item_id(), &ItemId::new("long"));
        assert_eq!(result.unplaced[0].reason, UnplacedReason::DimensionsExceedCargo);
        assert!(result.unplaced[0].unit.position.is_none());
    }

    #[test]
    fn test_non_stackable_units_stay_on_floor() {
        let mut flat_hold = cargo((2, 2, 4));
        let result =
            pack_units(&mut flat_hold, units("N", (2, 2, 1), 2, false, false), &test_config()).unwrap();
        assert_eq!(result.placed_count(), 1);

        let mut stack_hold = cargo((2, 2, 4));
        let result =
            pack_units(&mut stack_hold, units("S", (2, 2, 1), 2, true, false), &test_config()).unwrap();
        assert_eq!(result.placed_count(), 2);
        assert!(stack_hold.placed.iter().any(|u| u.position == Some(Cell::new(0, 0, 1))));
    }

    #[test]
    fn test_fragile_unit_ends_up_on_top() {
        let mut hold = cargo((2, 2, 4));
        let mut batch = units("glass", (2, 2, 1), 1, true, true);
        batch.extend(units("box", (2, 2, 1), 1, true, false));

        let result = pack_units(&mut hold, batch, &test_config()).unwrap();
        assert!(result.is_complete());

        let glass = hold.placed.iter().find(|u| u.fragile).unwrap();
        let crate_unit = hold.placed.iter().find(|u| !u.fragile).unwrap();
        assert_eq!(glass.position, Some(Cell::new(0, 0, 1)));
        assert_eq!(crate_unit.position, Some(Cell::new(0, 0, 0)));
    }

    #[test]
    fn test_single_unit_moves_to_far_end() {
        let mut hold = cargo((5, 1, 1));
        pack_units(&mut hold, units("A", (1, 1, 1), 1, true, false), &test_config()).unwrap();
        assert_eq!(hold.placed[0].position, Some(Cell::new(4, 0, 0)));
    }

    #[test]
    fn test_existing_units_are_obstacles() {
        let mut hold = cargo((2, 1, 2));
        let mut fixed = units("fixed", (1, 1, 2), 1, true, false).remove(0);
        fixed.position = Some(Cell::new(1, 0, 0));
        hold.placed.push(fixed);

        let result = pack_units(&mut hold, units("A", (1, 1, 1), 3, true, false), &test_config()).unwrap();
        assert_eq!(result.placed_count(), 2);
        assert!(audit_layout(hold.dims, &hold.placed).is_empty());
    }

    #[test]
    fn test_empty_batch_needs_no_solver() {
        let mut hold = cargo((2, 2, 2));
        let result = pack_units(&mut hold, Vec::new(), &test_config()).unwrap();
        assert!(result.is_complete());
        assert!(hold.placed.is_empty());
    }

    #[test]
    fn test_bonus_never_outweighs_an_extra_unit() {
        let config = PackingConfig::default();
        for n in [1usize, 10, 99, 100, 1000] {
            let bonus = config.effective_length_bonus(n);
            assert!(bonus * (n as f64) < 1.0);
            assert!(bonus <= PackingConfig::MAX_LENGTH_BONUS);
        }
    }

    struct ExpiredSolver;

    impl MilpSolver for ExpiredSolver {
        fn name(&self) -> &'static str {
            "expired"
        }

        fn solve(&self, _: &MilpModel, _: Option<Duration>) -> Result<MilpSolution, SolverError> {
            Ok(MilpSolution::empty(SolveStatus::TimeLimitNoIncumbent))
        }
    }

    #[test]
    fn test_timeout_without_incumbent_falls_back_to_first_fit() {
        let mut hold = cargo((4, 4, 4));
        let packer = CargoPacker::new(&ExpiredSolver, test_config());
        let result = packer.pack(&mut hold, units("A", (2, 2, 2), 2, true, false)).unwrap();

        assert_eq!(result.status, SolveStatus::TimeLimitFeasible);
        assert!(result.is_complete());
        assert_eq!(hold.placed.len(), 2);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_first_fit_leftovers_are_reported_as_timed_out() {
        let mut hold = cargo((2, 2, 2));
        let packer = CargoPacker::new(&ExpiredSolver, test_config());
        let result = packer.pack(&mut hold, units("A", (2, 2, 2), 3, true, false)).unwrap();

        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.unplaced_count(), 2);
        assert!(result
            .unplaced
            .iter()
            .all(|u| u.reason == UnplacedReason::SolverTimedOut));
    }

    #[test]
    fn test_first_fit_respects_loading_rules() {
        let mut hold = cargo((8, 4, 4));
        let mut batch = units("cube", (2, 2, 2), 6, true, false);
        batch.extend(units("glass", (1, 1, 1), 4, true, true));
        batch.extend(units("flat", (3, 2, 1), 3, false, false));

        let packer = CargoPacker::new(&ExpiredSolver, test_config());
        let result = packer.pack(&mut hold, batch).unwrap();

        assert!(result.violations.is_empty());
        assert!(result.placed_count() >= 9);
        assert_eq!(result.placed_count() + result.unplaced_count(), 13);
    }

    #[test]
    fn test_short_budget_returns_a_placement_promptly() {
        let mut hold = cargo((8, 4, 4));
        let mut batch = units("cube", (2, 2, 2), 6, true, false);
        batch.extend(units("glass", (1, 1, 1), 4, true, true));
        batch.extend(units("flat", (3, 2, 1), 3, false, false));
        let config = PackingConfig::builder()
            .time_limit(Some(Duration::from_secs(1)))
            .build();

        let started = std::time::Instant::now();
        let result = pack_units(&mut hold, batch, &config).unwrap();

        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(result.violations.is_empty());
        assert!(result.placed_count() >= 9);
    }

    #[test]
    fn test_larger_unit_never_rests_on_smaller_one() {
        let mut hold = cargo((3, 2, 2));
        let mut batch = units("small", (2, 2, 1), 1, true, false);
        batch.extend(units("large", (3, 2, 1), 1, true, false));

        let result = pack_units(&mut hold, batch, &test_config()).unwrap();
        assert!(result.is_complete());

        let large = hold.placed.iter().find(|u| u.dims.length == 3).unwrap();
        let small = hold.placed.iter().find(|u| u.dims.length == 2).unwrap();
        assert_eq!(large.position.map(|p| p.z), Some(0));
        assert_eq!(small.position.map(|p| p.z), Some(1));
        assert!(audit_layout(hold.dims, &hold.placed).is_empty());
    }

    #[test]
    fn test_wide_unit_never_bridges_a_fragile_unit() {
        let mut hold = cargo((2, 1, 2));
        let mut batch = units("glass", (1, 1, 1), 1, true, true);
        batch.extend(units("box", (1, 1, 1), 1, true, false));
        batch.extend(units("board", (2, 1, 1), 1, true, false));

        let result = pack_units(&mut hold, batch, &test_config()).unwrap();
        assert!(result.is_complete());

        let board = hold.placed.iter().find(|u| u.dims.length == 2).unwrap();
        let glass = hold.placed.iter().find(|u| u.fragile).unwrap();
        assert_eq!(board.position, Some(Cell::new(0, 0, 0)));
        assert_eq!(glass.position.map(|p| p.z), Some(1));
        assert!(audit_layout(hold.dims, &hold.placed).is_empty());
    }

    #[test]
    fn test_fixed_fragile_unit_blocks_a_bridge() {
        let mut hold = cargo((2, 1, 2));
        let mut glass = units("glass", (1, 1, 1), 1, true, true).remove(0);
        glass.position = Some(Cell::new(0, 0, 0));
        let mut block = units("box", (1, 1, 1), 1, true, false).remove(0);
        block.position = Some(Cell::new(1, 0, 0));
        hold.placed.extend([glass, block]);

        let result = pack_units(&mut hold, units("board", (2, 1, 1), 1, true, false), &test_config()).unwrap();
        assert_eq!(result.placed_count(), 0);
        assert_eq!(result.unplaced[0].reason, UnplacedReason::NoFeasiblePosition);
    }
}

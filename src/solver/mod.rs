//! Solver abstraction for the packing and assignment models.
//!
//! Models are built as plain data (variables, linear constraints, a linear
//! objective) and handed to a `MilpSolver`. The constraint-construction code
//! never touches a concrete optimization library, so backends can be swapped
//! without changing the models.

pub mod microlp;

use std::time::Duration;

use thiserror::Error;

pub use self::microlp::MicroLpSolver;

/// Handle of a decision variable inside one `MilpModel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Domain of a decision variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Integer { lower: i32, upper: i32 },
}

/// Sparse linear combination of variables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(Var, f64)>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit-coefficient sum of the given variables.
    pub fn sum(vars: impl IntoIterator<Item = Var>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
        }
    }

    /// Adds `coefficient * var`.
    pub fn add(&mut self, var: Var, coefficient: f64) -> &mut Self {
        self.terms.push((var, coefficient));
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluates the expression for a given assignment of variable values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coefficient)| coefficient * values.get(var.index()).copied().unwrap_or(0.0))
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

/// `expr <cmp> rhs`
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub expr: LinearExpr,
    pub cmp: Comparison,
    pub rhs: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

/// A mixed-integer linear model in backend-neutral form.
#[derive(Clone, Debug)]
pub struct MilpModel {
    name: String,
    sense: Sense,
    kinds: Vec<VarKind>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
}

impl MilpModel {
    pub fn new(name: impl Into<String>, sense: Sense) -> Self {
        Self {
            name: name.into(),
            sense,
            kinds: Vec::new(),
            constraints: Vec::new(),
            objective: LinearExpr::new(),
        }
    }

    /// Declares a 0/1 variable.
    pub fn add_binary(&mut self) -> Var {
        self.kinds.push(VarKind::Binary);
        Var(self.kinds.len() - 1)
    }

    /// Declares an integer variable bounded to `[lower, upper]`.
    pub fn add_integer(&mut self, lower: i32, upper: i32) -> Var {
        self.kinds.push(VarKind::Integer { lower, upper });
        Var(self.kinds.len() - 1)
    }

    pub fn add_constraint(&mut self, expr: LinearExpr, cmp: Comparison, rhs: f64) {
        self.constraints.push(Constraint { expr, cmp, rhs });
    }

    pub fn less_or_equal(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Comparison::LessOrEqual, rhs);
    }

    pub fn equal(&mut self, expr: LinearExpr, rhs: f64) {
        self.add_constraint(expr, Comparison::Equal, rhs);
    }

    /// Adds `coefficient * var` to the objective.
    pub fn add_objective_term(&mut self, var: Var, coefficient: f64) {
        self.objective.add(var, coefficient);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn kinds(&self) -> &[VarKind] {
        &self.kinds
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn var_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }
}

/// Outcome class of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Budget expired, the returned values are the best feasible incumbent.
    TimeLimitFeasible,
    /// Budget expired before any feasible solution was found.
    TimeLimitNoIncumbent,
    /// The model has no feasible solution.
    Infeasible,
}

impl SolveStatus {
    /// Whether variable values are meaningful.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::TimeLimitFeasible)
    }

    pub fn code(self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::TimeLimitFeasible => "time_limit_feasible",
            SolveStatus::TimeLimitNoIncumbent => "time_limit_no_incumbent",
            SolveStatus::Infeasible => "infeasible",
        }
    }
}

/// Variable values and status returned by a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct MilpSolution {
    pub status: SolveStatus,
    values: Vec<f64>,
}

impl MilpSolution {
    pub fn new(status: SolveStatus, values: Vec<f64>) -> Self {
        Self { status, values }
    }

    /// A solution without values (infeasible or timed out).
    pub fn empty(status: SolveStatus) -> Self {
        Self {
            status,
            values: Vec::new(),
        }
    }

    /// Value of a variable; 0 when the solve produced no values.
    pub fn value(&self, var: Var) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Reads a binary variable, rounding away solver noise.
    pub fn is_set(&self, var: Var) -> bool {
        self.value(var) > 0.5
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("model is unbounded")]
    Unbounded,

    #[error("solver backend failed: {0}")]
    Backend(String),
}

/// A mixed-integer programming backend.
///
/// Implementations declare the model's variables and constraints in their own
/// representation, solve within the optional wall-clock budget and report
/// variable values indexed by `Var`.
pub trait MilpSolver {
    fn name(&self) -> &'static str;

    fn solve(
        &self,
        model: &MilpModel,
        time_limit: Option<Duration>,
    ) -> Result<MilpSolution, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_are_indexed_in_declaration_order() {
        let mut model = MilpModel::new("test", Sense::Maximize);
        let a = model.add_binary();
        let b = model.add_integer(0, 4);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(model.kinds()[1], VarKind::Integer { lower: 0, upper: 4 });
    }

    #[test]
    fn test_expression_evaluation() {
        let mut model = MilpModel::new("test", Sense::Minimize);
        let a = model.add_binary();
        let b = model.add_binary();
        let mut expr = LinearExpr::sum([a]);
        expr.add(b, 2.5);
        assert!((expr.evaluate(&[1.0, 1.0]) - 3.5).abs() < 1e-9);
        assert!((expr.evaluate(&[0.0]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_solution_reads_as_unset() {
        let solution = MilpSolution::empty(SolveStatus::TimeLimitNoIncumbent);
        assert!(!solution.status.has_solution());
        assert!(!solution.is_set(Var(3)));
    }
}

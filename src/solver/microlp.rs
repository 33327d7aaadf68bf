//! `MilpSolver` backed by the pure-Rust `microlp` solver through `good_lp`.

use std::time::Duration;

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus, SolverModel,
    Variable, WithTimeLimit, constraint, microlp, variable,
};
use tracing::{debug, warn};

use super::{
    Comparison, LinearExpr, MilpModel, MilpSolution, MilpSolver, Sense, SolveStatus, SolverError,
    VarKind,
};

/// Branch-and-bound solver with a native deadline.
///
/// The budget is checked inside the search, so the solve stops on its own
/// once it expires. An expired budget returns the best incumbent as
/// `TimeLimitFeasible`, or `TimeLimitNoIncumbent` when none was found yet.
#[derive(Clone, Copy, Debug, Default)]
pub struct MicroLpSolver;

impl MilpSolver for MicroLpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(
        &self,
        model: &MilpModel,
        time_limit: Option<Duration>,
    ) -> Result<MilpSolution, SolverError> {
        debug!(
            model = model.name(),
            variables = model.var_count(),
            constraints = model.constraint_count(),
            ?time_limit,
            "solving with microlp"
        );

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .kinds()
            .iter()
            .map(|kind| match *kind {
                VarKind::Binary => vars.add(variable().binary()),
                VarKind::Integer { lower, upper } => {
                    vars.add(variable().integer().min(lower).max(upper))
                }
            })
            .collect();

        let objective = to_expression(model.objective(), &handles);
        let unsolved = match model.sense() {
            Sense::Maximize => vars.maximise(objective),
            Sense::Minimize => vars.minimise(objective),
        };

        let mut problem = unsolved.using(microlp);
        if let Some(limit) = time_limit {
            problem = problem.with_time_limit(limit.as_secs_f64());
        }
        for c in model.constraints() {
            let lhs = to_expression(&c.expr, &handles);
            let built = match c.cmp {
                Comparison::LessOrEqual => constraint::leq(lhs, c.rhs),
                Comparison::Equal => constraint::eq(lhs, c.rhs),
                Comparison::GreaterOrEqual => constraint::geq(lhs, c.rhs),
            };
            problem.add_constraint(built);
        }

        match problem.solve() {
            Ok(solution) => {
                let status = match solution.status() {
                    SolutionStatus::Optimal => SolveStatus::Optimal,
                    SolutionStatus::TimeLimit | SolutionStatus::GapLimit => {
                        warn!(model = model.name(), ?time_limit, "solver budget expired, keeping best incumbent");
                        SolveStatus::TimeLimitFeasible
                    }
                };
                let values = handles.iter().map(|v| solution.value(*v)).collect();
                Ok(MilpSolution::new(status, values))
            }
            Err(ResolutionError::Infeasible) => Ok(MilpSolution::empty(SolveStatus::Infeasible)),
            Err(ResolutionError::Unbounded) => Err(SolverError::Unbounded),
            Err(ResolutionError::Other(message))
                if time_limit.is_some() && message.starts_with("Time limit") =>
            {
                warn!(model = model.name(), ?time_limit, "solver budget expired before a solution was found");
                Ok(MilpSolution::empty(SolveStatus::TimeLimitNoIncumbent))
            }
            Err(other) => Err(SolverError::Backend(other.to_string())),
        }
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::with_capacity(expr.len());
    for &(var, coefficient) in expr.terms() {
        out.add_mul(coefficient, handles[var.index()]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_best_binary_combination() {
        // max 3a + 2b + 2c  s.t.  a + b <= 1,  b + c <= 1
        let mut model = MilpModel::new("knapsack", Sense::Maximize);
        let a = model.add_binary();
        let b = model.add_binary();
        let c = model.add_binary();
        model.add_objective_term(a, 3.0);
        model.add_objective_term(b, 2.0);
        model.add_objective_term(c, 2.0);
        model.less_or_equal(LinearExpr::sum([a, b]), 1.0);
        model.less_or_equal(LinearExpr::sum([b, c]), 1.0);

        let solution = MicroLpSolver.solve(&model, None).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!(solution.is_set(a));
        assert!(!solution.is_set(b));
        assert!(solution.is_set(c));
    }

    #[test]
    fn test_reports_infeasible_models() {
        let mut model = MilpModel::new("contradiction", Sense::Minimize);
        let a = model.add_binary();
        let b = model.add_binary();
        model.equal(LinearExpr::sum([a, b]), 2.0);
        model.less_or_equal(LinearExpr::sum([a]), 0.0);

        let solution = MicroLpSolver.solve(&model, None).unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert!(solution.values().is_empty());
    }

    #[test]
    fn test_integer_variables_respect_bounds() {
        let mut model = MilpModel::new("bounded", Sense::Maximize);
        let n = model.add_integer(0, 4);
        model.add_objective_term(n, 1.0);
        let mut expr = LinearExpr::new();
        expr.add(n, 2.0);
        model.less_or_equal(expr, 7.0);

        let solution = MicroLpSolver
            .solve(&model, Some(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.value(n) - 3.0).abs() < 1e-6);
    }
}

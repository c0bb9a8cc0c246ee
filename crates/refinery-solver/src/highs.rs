//! HiGHS backend via good_lp.

use std::time::Duration;

use good_lp::solvers::highs::highs;
use good_lp::Solution as _;
use good_lp::{constraint, variable, variables, Expression, ResolutionError, SolverModel, Variable};
use tracing::{debug, info, warn};

use crate::problem::{ConstraintOp, LpProblem, VariableBounds};
use crate::solution::{Analysis, ConstraintSlack, Solution, SolutionStatus};

/// LP solver delegating to HiGHS
#[derive(Debug, Clone)]
pub struct Solver {
    /// Tolerance for binding-constraint and violation checks
    tolerance: f64,
    /// Wall-clock limit handed to HiGHS
    time_limit: Option<Duration>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            time_limit: None,
        }
    }
}

/// Outcome of a single HiGHS run, before analysis
enum RunResult {
    Optimal(Vec<f64>),
    /// HiGHS hit the time limit before proving optimality
    Stopped,
    Infeasible,
    Unbounded,
    Failed(String),
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Solve the LP problem
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Some(err) = problem.shape_error() {
            warn!(error = %err, "malformed LP problem");
            return Solution::error();
        }

        debug!(
            variables = problem.num_variables(),
            constraints = problem.num_constraints(),
            minimize = problem.objective.minimize,
            "solving LP with HiGHS"
        );

        // HiGHS is never asked to make sense of min > max
        let conflicts = problem.bound_conflicts();
        if !conflicts.is_empty() {
            warn!(conflicts = conflicts.len(), "variable bounds conflict; problem is infeasible");
            return Solution::infeasible_with_violations(conflicts);
        }

        match self.run(problem) {
            RunResult::Optimal(values) => {
                let objective_value = problem.objective_value(&values);
                info!(objective = objective_value, "optimal solution found");
                let analysis = self.analyze(problem, &values);
                Solution {
                    status: SolutionStatus::Optimal,
                    values,
                    objective_value,
                    analysis,
                    violations: Vec::new(),
                }
            }
            RunResult::Stopped => {
                warn!("time limit reached before an optimal solution was proven");
                Solution::time_limit()
            }
            RunResult::Infeasible => {
                warn!("problem is infeasible");
                self.diagnose_infeasible(problem)
            }
            RunResult::Unbounded => {
                warn!("problem is unbounded");
                Solution::unbounded()
            }
            RunResult::Failed(reason) => {
                warn!(%reason, "solver failed");
                Solution::error()
            }
        }
    }

    /// When the problem is infeasible, solve it again with every lower
    /// requirement dropped and report which of them the relaxed optimum breaks
    fn diagnose_infeasible(&self, problem: &LpProblem) -> Solution {
        let mut relaxed = problem.clone();
        relaxed.constraints.retain(|c| c.op != ConstraintOp::Ge);
        for bounds in &mut relaxed.bounds {
            *bounds = VariableBounds {
                lower: bounds.lower.min(0.0),
                upper: bounds.upper,
            };
        }

        match self.run(&relaxed) {
            RunResult::Optimal(values) => {
                let violations = problem.violations(&values, self.tolerance);
                debug!(violations = violations.len(), "relaxed problem solved");
                Solution::infeasible_with_violations(violations)
            }
            _ => Solution::infeasible(),
        }
    }

    fn run(&self, problem: &LpProblem) -> RunResult {
        if problem.num_variables() == 0 {
            return RunResult::Optimal(Vec::new());
        }

        let mut vars = variables!();
        let var_list: Vec<Variable> = problem
            .bounds
            .iter()
            .map(|bounds| {
                let mut v = variable().min(bounds.lower);
                if let Some(upper) = bounds.upper {
                    v = v.max(upper);
                }
                vars.add(v)
            })
            .collect();

        let objective = linear_expression(&var_list, &problem.objective.coefficients);

        let mut model = if problem.objective.minimize {
            vars.minimise(&objective).using(highs)
        } else {
            vars.maximise(&objective).using(highs)
        };

        if let Some(limit) = self.time_limit {
            model = model.set_time_limit(limit.as_secs_f64());
        }

        for c in &problem.constraints {
            let lhs = linear_expression(&var_list, &c.coefficients);
            let rhs = c.rhs;
            model = match c.op {
                ConstraintOp::Le => model.with(constraint!(lhs <= rhs)),
                ConstraintOp::Ge => model.with(constraint!(lhs >= rhs)),
                ConstraintOp::Eq => model.with(constraint!(lhs == rhs)),
            };
        }

        match model.solve() {
            Ok(solution) => match solution.status() {
                good_lp::SolutionStatus::Optimal => {
                    RunResult::Optimal(var_list.iter().map(|v| solution.value(*v)).collect())
                }
                _ => RunResult::Stopped,
            },
            Err(ResolutionError::Infeasible) => RunResult::Infeasible,
            Err(ResolutionError::Unbounded) => RunResult::Unbounded,
            Err(e) => RunResult::Failed(e.to_string()),
        }
    }

    fn analyze(&self, problem: &LpProblem, values: &[f64]) -> Analysis {
        let mut binding_constraints = Vec::new();
        let mut slacks = Vec::with_capacity(problem.num_constraints());

        for c in &problem.constraints {
            let activity = c.activity(values);
            let slack = c.slack(values);
            let scale = 1.0
                + c.rhs.abs()
                + c.coefficients
                    .iter()
                    .zip(values)
                    .map(|(coef, value)| (coef * value).abs())
                    .sum::<f64>();

            if c.op != ConstraintOp::Eq && slack.abs() <= self.tolerance * scale {
                binding_constraints.push(c.name.clone());
            }

            slacks.push(ConstraintSlack {
                constraint: c.name.clone(),
                activity,
                rhs: c.rhs,
                slack,
            });
        }

        Analysis {
            binding_constraints,
            slacks,
        }
    }
}

fn linear_expression(vars: &[Variable], coefficients: &[f64]) -> Expression {
    vars.iter()
        .zip(coefficients)
        .filter(|(_, c)| **c != 0.0)
        .map(|(v, c)| *c * *v)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::LpProblem;

    #[test]
    fn test_simple_maximization() {
        // Maximize: 3x + 2y
        // Subject to:
        //   x + y <= 4
        //   x <= 3
        //   y <= 3
        //   x, y >= 0
        // Optimal: x=3, y=1, obj=11
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![3.0, 2.0], false); // maximize
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 4.0);
        problem.add_constraint("x_max", vec![1.0, 0.0], ConstraintOp::Le, 3.0);
        problem.add_constraint("y_max", vec![0.0, 1.0], ConstraintOp::Le, 3.0);

        let solver = Solver::new();
        let solution = solver.solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 11.0).abs() < 1e-6, "obj = {} (expected 11)", solution.objective_value);

        assert!(solution.analysis.binding_constraints.contains(&"sum".to_string()));
        assert!(solution.analysis.binding_constraints.contains(&"x_max".to_string()));
        assert!(!solution.analysis.binding_constraints.contains(&"y_max".to_string()));
    }

    #[test]
    fn test_minimization_with_ge() {
        // Minimize: 2x + 3y
        // Subject to:
        //   x + y >= 4
        //   x <= 3 (bound)
        //   y <= 3 (bound)
        // Optimal: x=3, y=1, obj=9
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![2.0, 3.0], true);
        problem.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Ge, 4.0);
        problem.set_bounds(0, VariableBounds::at_most(3.0));
        problem.set_bounds(1, VariableBounds::at_most(3.0));

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.values[0] - 3.0).abs() < 1e-6, "x = {} (expected 3)", solution.values[0]);
        assert!((solution.values[1] - 1.0).abs() < 1e-6, "y = {} (expected 1)", solution.values[1]);
        assert!((solution.objective_value - 9.0).abs() < 1e-6, "obj = {} (expected 9)", solution.objective_value);
    }

    #[test]
    fn test_infeasible_reports_violated_requirement() {
        // x >= 5
        // x <= 3
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], true);
        problem.add_constraint("lower", vec![1.0], ConstraintOp::Ge, 5.0);
        problem.add_constraint("upper", vec![1.0], ConstraintOp::Le, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
        assert_eq!(solution.violations[0].constraint, "lower");
    }

    #[test]
    fn test_conflicting_bounds_are_infeasible() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0], false);
        problem.set_bounds(0, VariableBounds::between(10.0, 5.0));

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert_eq!(solution.violations.len(), 1);
        assert!(solution.violations[0].description.contains("x requires >= 10.00"));
    }

    #[test]
    fn test_unbounded() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("diff", vec![1.0, -1.0], ConstraintOp::Le, 1.0);

        let solution = Solver::new().solve(&problem);

        // HiGHS presolve may only be able to say "unbounded or infeasible"
        assert!(
            matches!(solution.status, SolutionStatus::Unbounded | SolutionStatus::Infeasible),
            "status = {:?}",
            solution.status
        );
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_malformed_problem_is_error() {
        let mut problem = LpProblem::new(vec!["x".to_string()]);
        problem.set_objective(vec![1.0, 2.0], false);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Error);
    }

    #[test]
    fn test_repeated_solves_agree() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("sum", vec![1.0, 2.0], ConstraintOp::Le, 8.0);
        problem.add_constraint("cap", vec![3.0, 1.0], ConstraintOp::Le, 9.0);

        let solver = Solver::new().with_time_limit(Duration::from_secs(10));
        let first = solver.solve(&problem);
        let second = solver.solve(&problem);

        assert!(first.is_optimal());
        assert_eq!(first.objective_value, second.objective_value);
    }

    #[test]
    fn test_exhausted_time_limit_is_not_optimal() {
        let n = 60;
        let variables: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
        let mut problem = LpProblem::new(variables);
        problem.set_objective((0..n).map(|i| 1.0 + (i % 7) as f64).collect(), false);
        for row in 0..n {
            let coefficients = (0..n).map(|col| 1.0 + ((row * 31 + col * 17) % 11) as f64).collect();
            problem.add_constraint(format!("row{}", row), coefficients, ConstraintOp::Le, 100.0 + row as f64);
        }

        let solution = Solver::new().with_time_limit(Duration::from_nanos(1)).solve(&problem);

        assert!(!solution.is_optimal(), "status = {:?}", solution.status);
        assert!(solution.values.is_empty());
        assert!(solution.objective_value.is_nan());
    }
}

mod highs;
mod problem;
mod solution;

pub use highs::Solver;
pub use problem::{Constraint, ConstraintOp, LpProblem, Objective, VariableBounds};
pub use solution::{Analysis, ConstraintSlack, ConstraintViolation, Solution, SolutionStatus};

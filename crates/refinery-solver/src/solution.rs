/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable
    pub values: Vec<f64>,
    /// Optimal objective value
    pub objective_value: f64,
    /// Detailed analysis
    pub analysis: Analysis,
    /// Constraint violations (populated when infeasible)
    pub violations: Vec<ConstraintViolation>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The time limit ran out before an optimal solution was proven
    TimeLimit,
    /// Solver encountered an error
    Error,
}

/// Constraint activity at the optimum
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Which inequality constraints are binding (tight) at optimum
    pub binding_constraints: Vec<String>,

    /// Slack of every constraint
    pub slacks: Vec<ConstraintSlack>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct ConstraintSlack {
    /// Constraint name
    pub constraint: String,
    /// Left-hand side value
    pub activity: f64,
    /// Right-hand side value
    pub rhs: f64,
    /// Room left before the constraint binds
    pub slack: f64,
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Actual value achieved
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

impl Solution {
    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn infeasible() -> Self {
        Self::infeasible_with_violations(Vec::new())
    }

    pub fn infeasible_with_violations(violations: Vec<ConstraintViolation>) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::empty(),
            violations,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::empty(),
            violations: Vec::new(),
        }
    }

    pub fn time_limit() -> Self {
        Self {
            status: SolutionStatus::TimeLimit,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::empty(),
            violations: Vec::new(),
        }
    }

    pub fn error() -> Self {
        Self {
            status: SolutionStatus::Error,
            values: Vec::new(),
            objective_value: f64::NAN,
            analysis: Analysis::empty(),
            violations: Vec::new(),
        }
    }

    /// Value of variable `index`, or zero when no solution was found
    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}

impl Analysis {
    pub fn empty() -> Self {
        Self {
            binding_constraints: Vec::new(),
            slacks: Vec::new(),
        }
    }
}

use std::fmt;

use crate::solution::ConstraintViolation;

/// Represents a linear programming problem
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Lower/upper bound for each variable
    pub bounds: Vec<VariableBounds>,
    /// Objective function coefficients
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

/// Bounds on a single continuous variable. `upper: None` means unbounded above.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBounds {
    pub lower: f64,
    pub upper: Option<f64>,
}

impl VariableBounds {
    pub fn non_negative() -> Self {
        Self { lower: 0.0, upper: None }
    }

    pub fn between(lower: f64, upper: f64) -> Self {
        Self { lower, upper: Some(upper) }
    }

    pub fn at_most(upper: f64) -> Self {
        Self { lower: 0.0, upper: Some(upper) }
    }

    /// False when the lower bound sits above the upper bound.
    pub fn is_consistent(&self) -> bool {
        match self.upper {
            Some(upper) => self.lower <= upper,
            None => true,
        }
    }
}

impl Default for VariableBounds {
    fn default() -> Self {
        Self::non_negative()
    }
}

impl ConstraintOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ConstraintOp::Le => "<=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Eq => "=",
        }
    }
}

impl Constraint {
    /// Left-hand side value at `values`
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }

    /// Distance from the right-hand side in the feasible direction.
    /// Negative when violated; for equalities this is minus the absolute residual.
    pub fn slack(&self, values: &[f64]) -> f64 {
        let lhs = self.activity(values);
        match self.op {
            ConstraintOp::Le => self.rhs - lhs,
            ConstraintOp::Ge => lhs - self.rhs,
            ConstraintOp::Eq => -(lhs - self.rhs).abs(),
        }
    }
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            bounds: vec![VariableBounds::non_negative(); n],
            objective: Objective {
                coefficients: vec![0.0; n],
                minimize: true,
            },
            constraints: Vec::new(),
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, minimize: bool) {
        self.objective = Objective { coefficients, minimize };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            op,
            rhs,
        });
    }

    pub fn set_bounds(&mut self, index: usize, bounds: VariableBounds) {
        self.bounds[index] = bounds;
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value at `values`
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }

    /// Check that every coefficient vector matches the variable count.
    pub fn shape_error(&self) -> Option<String> {
        let n = self.num_variables();
        if self.bounds.len() != n {
            return Some(format!("{} bounds for {} variables", self.bounds.len(), n));
        }
        if self.objective.coefficients.len() != n {
            return Some(format!(
                "objective has {} coefficients for {} variables",
                self.objective.coefficients.len(),
                n
            ));
        }
        self.constraints
            .iter()
            .find(|c| c.coefficients.len() != n)
            .map(|c| format!("constraint {} has {} coefficients for {} variables", c.name, c.coefficients.len(), n))
    }

    /// Every constraint and bound violated at `values`, worst first
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &self.constraints {
            let lhs = c.activity(values);

            let violation = match c.op {
                ConstraintOp::Le if lhs > c.rhs + tolerance => {
                    let amt = lhs - c.rhs;
                    Some((amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, amt)))
                }
                ConstraintOp::Ge if lhs < c.rhs - tolerance => {
                    let amt = c.rhs - lhs;
                    Some((amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, amt)))
                }
                ConstraintOp::Eq if (lhs - c.rhs).abs() > tolerance => {
                    let diff = (lhs - c.rhs).abs();
                    Some((diff, format!("{} requires exactly {:.2} but got {:.2}", c.name, c.rhs, lhs)))
                }
                _ => None,
            };

            if let Some((violation_amount, description)) = violation {
                violations.push(ConstraintViolation {
                    constraint: c.name.clone(),
                    required: c.rhs,
                    actual: lhs,
                    violation_amount,
                    description,
                });
            }
        }

        for ((name, bounds), &value) in self.variables.iter().zip(&self.bounds).zip(values) {
            if value < bounds.lower - tolerance {
                violations.push(ConstraintViolation {
                    constraint: format!("{}_min", name),
                    required: bounds.lower,
                    actual: value,
                    violation_amount: bounds.lower - value,
                    description: format!("{} is below its lower bound of {:.2}", name, bounds.lower),
                });
            }
            if let Some(upper) = bounds.upper {
                if value > upper + tolerance {
                    violations.push(ConstraintViolation {
                        constraint: format!("{}_max", name),
                        required: upper,
                        actual: value,
                        violation_amount: value - upper,
                        description: format!("{} exceeds its upper bound of {:.2}", name, upper),
                    });
                }
            }
        }

        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));
        violations
    }

    /// Variables whose lower bound sits above the upper bound
    pub fn bound_conflicts(&self) -> Vec<ConstraintViolation> {
        self.variables
            .iter()
            .zip(&self.bounds)
            .filter(|(_, b)| !b.is_consistent())
            .map(|(name, b)| {
                let upper = b.upper.unwrap_or(f64::INFINITY);
                ConstraintViolation {
                    constraint: format!("{}_min vs {}_max", name, name),
                    required: b.lower,
                    actual: upper,
                    violation_amount: b.lower - upper,
                    description: format!(
                        "Conflict: {} requires >= {:.2} but also <= {:.2}",
                        name, b.lower, upper
                    ),
                }
            })
            .collect()
    }

    fn write_terms(&self, f: &mut fmt::Formatter<'_>, coefficients: &[f64]) -> fmt::Result {
        let mut first = true;
        for (name, &coef) in self.variables.iter().zip(coefficients) {
            if coef == 0.0 {
                continue;
            }
            let sign = if coef < 0.0 { "-" } else { "+" };
            if first {
                if coef < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {} ", sign)?;
            }
            if coef.abs() != 1.0 {
                write!(f, "{} ", coef.abs())?;
            }
            write!(f, "{}", name)?;
            first = false;
        }
        if first {
            write!(f, "0")?;
        }
        Ok(())
    }
}

/// LP-file style listing of the problem
impl fmt::Display for LpProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", if self.objective.minimize { "Minimize" } else { "Maximize" })?;
        write!(f, "  obj: ")?;
        self.write_terms(f, &self.objective.coefficients)?;
        writeln!(f)?;

        writeln!(f, "Subject To")?;
        for c in &self.constraints {
            write!(f, "  {}: ", c.name)?;
            self.write_terms(f, &c.coefficients)?;
            writeln!(f, " {} {}", c.op.symbol(), c.rhs)?;
        }

        writeln!(f, "Bounds")?;
        for (name, b) in self.variables.iter().zip(&self.bounds) {
            match b.upper {
                Some(upper) => writeln!(f, "  {} <= {} <= {}", b.lower, name, upper)?,
                None if b.lower != 0.0 => writeln!(f, "  {} >= {}", name, b.lower)?,
                None => {}
            }
        }
        write!(f, "End")
    }
}

//! Post-solve summary of a refinery run.

use refinery_solver::{ConstraintSlack, ConstraintViolation, Solution, SolutionStatus};
use serde::Serialize;

use crate::data::{MaterialKind, RefineryData};
use crate::model::RefineryModel;
use crate::params::Parameters;

/// Quantities at or below this are treated as not produced
pub const QUANTITY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub struct MaterialQuantity {
    pub material: String,
    pub kind: MaterialKind,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamFlow {
    pub source: String,
    pub destination: String,
    pub flow: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductProfit {
    pub product: String,
    pub quantity: f64,
    pub unit_profit: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefineryReport {
    pub status: SolutionStatus,
    /// Total profit, only for optimal runs
    pub profit: Option<f64>,
    /// Non-zero materials, largest first
    pub materials: Vec<MaterialQuantity>,
    /// Non-zero stream flows in model order
    pub streams: Vec<StreamFlow>,
    pub products: Vec<ProductProfit>,
    pub binding_constraints: Vec<String>,
    /// Activity and slack of every constraint, in model order
    pub slacks: Vec<ConstraintSlack>,
    pub violations: Vec<ConstraintViolation>,
    pub parameters: Parameters,
}

impl RefineryReport {
    pub fn new(data: &RefineryData, model: &RefineryModel, solution: &Solution) -> Self {
        let optimal = solution.is_optimal();

        let mut materials: Vec<MaterialQuantity> = if optimal {
            model
                .materials
                .iter()
                .filter_map(|m| {
                    let quantity = model.quantity(solution, m);
                    let kind = data.material_kind(m)?;
                    (quantity > QUANTITY_EPSILON).then(|| MaterialQuantity {
                        material: m.clone(),
                        kind,
                        quantity,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        materials.sort_by(|a, b| b.quantity.total_cmp(&a.quantity));

        let streams = if optimal {
            model
                .streams
                .iter()
                .map(|s| StreamFlow {
                    source: s.source.clone(),
                    destination: s.destination.clone(),
                    flow: model.flow(solution, &s.source, &s.destination),
                })
                .filter(|s| s.flow > QUANTITY_EPSILON)
                .collect()
        } else {
            Vec::new()
        };

        let products = if optimal {
            data.final_products
                .iter()
                .map(|p| {
                    let quantity = model.quantity(solution, p);
                    let unit_profit = data.product_profit.get(p).copied().unwrap_or(0.0);
                    ProductProfit {
                        product: p.clone(),
                        quantity,
                        unit_profit,
                        profit: quantity * unit_profit,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            status: solution.status,
            profit: optimal.then_some(solution.objective_value),
            materials,
            streams,
            products,
            binding_constraints: solution.analysis.binding_constraints.clone(),
            slacks: solution.analysis.slacks.clone(),
            violations: solution.violations.clone(),
            parameters: model.parameters.clone(),
        }
    }

    pub fn is_binding(&self, constraint: &str) -> bool {
        self.binding_constraints.iter().any(|c| c == constraint)
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Final products with a non-zero output
    pub fn produced(&self) -> impl Iterator<Item = &MaterialQuantity> {
        self.materials.iter().filter(|m| m.kind == MaterialKind::Product)
    }
}

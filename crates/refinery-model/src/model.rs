use std::collections::{BTreeMap, HashMap};

use refinery_solver::{ConstraintOp, LpProblem, Solution, Solver, VariableBounds};
use tracing::debug;

use crate::data::{DataError, RefineryData, YieldTable};
use crate::params::Parameters;

/// A flow from a material to the place it is used
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stream {
    pub source: String,
    pub destination: String,
}

impl Stream {
    pub fn variable_name(&self) -> String {
        format!("{}->{}", self.source, self.destination)
    }
}

/// The refinery LP ready for solving.
///
/// Variables are laid out as one quantity per material (`x`) followed by one
/// flow per declared stream (`y`).
#[derive(Debug, Clone)]
pub struct RefineryModel {
    pub materials: Vec<String>,
    pub streams: Vec<Stream>,
    pub parameters: Parameters,
    pub lp_problem: LpProblem,
    material_index: HashMap<String, usize>,
    stream_index: HashMap<(String, String), usize>,
}

impl RefineryModel {
    /// Build the product-mix LP for `data` under `params`
    pub fn build(data: &RefineryData, params: &Parameters) -> Result<Self, DataError> {
        data.validate()?;
        params.validate(&data.raw_materials)?;

        let materials: Vec<String> = data.all_materials().cloned().collect();
        let streams: Vec<Stream> = materials
            .iter()
            .filter_map(|m| data.used_in.get(m).map(|uses| (m, uses)))
            .flat_map(|(source, uses)| {
                uses.iter().map(move |destination| Stream {
                    source: source.clone(),
                    destination: destination.clone(),
                })
            })
            .collect();

        let material_index = materials
            .iter()
            .enumerate()
            .map(|(i, m)| (m.clone(), i))
            .collect();
        let stream_index = streams
            .iter()
            .enumerate()
            .map(|(i, s)| ((s.source.clone(), s.destination.clone()), materials.len() + i))
            .collect();

        let variables = materials
            .iter()
            .cloned()
            .chain(streams.iter().map(Stream::variable_name))
            .collect();

        let mut model = Self {
            materials,
            streams,
            parameters: params.clone(),
            lp_problem: LpProblem::new(variables),
            material_index,
            stream_index,
        };

        model.add_bounds(data, params)?;
        model.add_objective(data)?;
        model.add_capacity_constraints(data, params)?;
        model.add_yield_constraints(data)?;
        model.add_usage_constraints(data)?;
        model.add_blending_constraints(data)?;

        debug!(
            variables = model.lp_problem.num_variables(),
            constraints = model.lp_problem.num_constraints(),
            "built refinery model"
        );

        Ok(model)
    }

    pub fn solve(&self, solver: &Solver) -> Solution {
        solver.solve(&self.lp_problem)
    }

    /// LP column of a material
    pub fn material(&self, name: &str) -> Result<usize, DataError> {
        self.material_index
            .get(name)
            .copied()
            .ok_or_else(|| DataError::UnknownMaterial {
                table: "model",
                name: name.to_string(),
            })
    }

    /// LP column of a stream
    pub fn stream(&self, source: &str, destination: &str) -> Result<usize, DataError> {
        self.stream_index
            .get(&(source.to_string(), destination.to_string()))
            .copied()
            .ok_or_else(|| DataError::MissingStream {
                material: source.to_string(),
                destination: destination.to_string(),
            })
    }

    /// Solved quantity of a material, zero when unknown or unsolved
    pub fn quantity(&self, solution: &Solution, name: &str) -> f64 {
        self.material(name).map(|i| solution.value(i)).unwrap_or(0.0)
    }

    /// Solved flow along a stream, zero when unknown or unsolved
    pub fn flow(&self, solution: &Solution, source: &str, destination: &str) -> f64 {
        self.stream(source, destination)
            .map(|i| solution.value(i))
            .unwrap_or(0.0)
    }

    fn row(&self) -> Vec<f64> {
        vec![0.0; self.lp_problem.num_variables()]
    }

    fn add_bounds(&mut self, data: &RefineryData, params: &Parameters) -> Result<(), DataError> {
        for crude in &data.raw_materials {
            let cap = params.max_crude(crude).ok_or_else(|| DataError::MissingEntry {
                table: "maxCrude",
                key: crude.clone(),
            })?;
            let i = self.material(crude)?;
            self.lp_problem.set_bounds(i, VariableBounds::at_most(cap));
        }

        let lube = self.material(&data.lube_oil.product)?;
        self.lp_problem.set_bounds(
            lube,
            VariableBounds::between(params.min_lube_oil, params.max_lube_oil),
        );
        Ok(())
    }

    fn add_objective(&mut self, data: &RefineryData) -> Result<(), DataError> {
        let mut coefficients = self.row();
        for product in &data.final_products {
            let profit = data
                .product_profit
                .get(product)
                .copied()
                .ok_or_else(|| DataError::MissingEntry {
                    table: "productProfit",
                    key: product.clone(),
                })?;
            coefficients[self.material(product)?] = profit;
        }
        self.lp_problem.set_objective(coefficients, false);
        Ok(())
    }

    fn add_capacity_constraints(&mut self, data: &RefineryData, params: &Parameters) -> Result<(), DataError> {
        let mut distillation = self.row();
        for crude in &data.raw_materials {
            distillation[self.material(crude)?] = 1.0;
        }
        self.lp_problem
            .add_constraint("distillation", distillation, ConstraintOp::Le, params.max_distillation);

        let mut reforming = self.row();
        for naphtha in data.naphthas() {
            reforming[self.stream(naphtha, &data.reforming.feed_use)?] = 1.0;
        }
        self.lp_problem
            .add_constraint("reforming", reforming, ConstraintOp::Le, params.max_reforming);

        let mut cracking = self.row();
        for oil in data.oils() {
            cracking[self.stream(oil, &data.cracking.feed_use)?] = 1.0;
        }
        self.lp_problem
            .add_constraint("cracking", cracking, ConstraintOp::Le, params.max_cracking);
        Ok(())
    }

    /// Each unit output equals the yield-weighted sum of its inputs
    fn add_yield_constraints(&mut self, data: &RefineryData) -> Result<(), DataError> {
        for output in &data.distil_outputs {
            let mut coefficients = self.row();
            coefficients[self.material(output)?] = 1.0;
            for crude in &data.raw_materials {
                coefficients[self.material(crude)?] =
                    -yield_of(&data.distillation.yields, "distillation.yields", crude, output)?;
            }
            self.lp_problem
                .add_constraint(format!("dist_{}", output), coefficients, ConstraintOp::Eq, 0.0);
        }

        for output in &data.reform_outputs {
            let mut coefficients = self.row();
            coefficients[self.material(output)?] = 1.0;
            for naphtha in data.naphthas() {
                coefficients[self.stream(naphtha, &data.reforming.feed_use)?] =
                    -yield_of(&data.reforming.yields, "reforming.yields", naphtha, output)?;
            }
            self.lp_problem
                .add_constraint(format!("refo_{}", output), coefficients, ConstraintOp::Eq, 0.0);
        }

        for output in &data.cracking_outputs {
            let mut coefficients = self.row();
            coefficients[self.material(output)?] = 1.0;
            for oil in data.oils() {
                coefficients[self.stream(oil, &data.cracking.feed_use)?] =
                    -yield_of(&data.cracking.yields, "cracking.yields", oil, output)?;
            }
            self.lp_problem
                .add_constraint(format!("crack_{}", output), coefficients, ConstraintOp::Eq, 0.0);
        }

        let lube = &data.lube_oil;
        let mut coefficients = self.row();
        coefficients[self.material(&lube.product)?] = 1.0;
        coefficients[self.stream(&lube.feed, &lube.product)?] = -lube.yield_fraction;
        self.lp_problem
            .add_constraint("lube", coefficients, ConstraintOp::Eq, 0.0);
        Ok(())
    }

    /// Everything a material produces is sent somewhere: along its streams,
    /// plus its fixed share of the fuel oil recipe
    fn add_usage_constraints(&mut self, data: &RefineryData) -> Result<(), DataError> {
        let fuel_oil = self.material(&data.fuel_oil.product)?;
        let used: Vec<String> = self
            .materials
            .iter()
            .filter(|m| data.used_in.contains_key(*m) || data.fuel_oil.proportions.contains_key(*m))
            .cloned()
            .collect();

        for material in used {
            let mut coefficients = self.row();
            coefficients[self.material(&material)?] = 1.0;
            for destination in data.used_in.get(&material).into_iter().flatten() {
                coefficients[self.stream(&material, destination)?] = -1.0;
            }
            if let Some(&proportion) = data.fuel_oil.proportions.get(&material) {
                coefficients[fuel_oil] -= proportion;
            }
            self.lp_problem
                .add_constraint(format!("use_{}", material), coefficients, ConstraintOp::Eq, 0.0);
        }
        Ok(())
    }

    /// Blend volumes, the product ratio and the quality specifications.
    ///
    /// Octane targets are minimums (`target * x <= sum(octane * y)`) while
    /// vapor pressure limits are maximums (`limit * x >= sum(pressure * y)`).
    fn add_blending_constraints(&mut self, data: &RefineryData) -> Result<(), DataError> {
        for (product, ingredients) in &data.ingredients {
            let mut coefficients = self.row();
            coefficients[self.material(product)?] = 1.0;
            for ingredient in ingredients {
                coefficients[self.stream(ingredient, product)?] = -1.0;
            }
            self.lp_problem
                .add_constraint(format!("blend_{}", product), coefficients, ConstraintOp::Eq, 0.0);
        }

        let ratio = &data.product_ratio;
        let mut coefficients = self.row();
        coefficients[self.material(&ratio.product)?] = 1.0;
        coefficients[self.material(&ratio.reference)?] = -ratio.min_ratio;
        self.lp_problem.add_constraint(
            format!("ratio_{}", ratio.product),
            coefficients,
            ConstraintOp::Ge,
            0.0,
        );

        for (product, &target) in &data.quality {
            let mut coefficients = self.row();
            coefficients[self.material(product)?] = target;
            for ingredient in blend_of(data, product)? {
                let octane = lookup(&data.octane, "octane", ingredient)?;
                coefficients[self.stream(ingredient, product)?] = -octane;
            }
            self.lp_problem
                .add_constraint(format!("octane_{}", product), coefficients, ConstraintOp::Le, 0.0);
        }

        for (product, &limit) in &data.pressure_limits {
            let mut coefficients = self.row();
            coefficients[self.material(product)?] = limit;
            for ingredient in blend_of(data, product)? {
                let pressure = lookup(&data.pressures, "pressures", ingredient)?;
                coefficients[self.stream(ingredient, product)?] = -pressure;
            }
            self.lp_problem
                .add_constraint(format!("pressure_{}", product), coefficients, ConstraintOp::Ge, 0.0);
        }
        Ok(())
    }
}

fn yield_of(
    table: &YieldTable,
    name: &'static str,
    source: &str,
    output: &str,
) -> Result<f64, DataError> {
    table
        .get(source)
        .and_then(|outputs| outputs.get(output))
        .copied()
        .ok_or_else(|| DataError::MissingEntry {
            table: name,
            key: format!("{}.{}", source, output),
        })
}

fn lookup(table: &BTreeMap<String, f64>, name: &'static str, key: &str) -> Result<f64, DataError> {
    table.get(key).copied().ok_or_else(|| DataError::MissingEntry {
        table: name,
        key: key.to_string(),
    })
}

fn blend_of<'a>(data: &'a RefineryData, product: &str) -> Result<&'a [String], DataError> {
    data.ingredients
        .get(product)
        .map(Vec::as_slice)
        .ok_or_else(|| DataError::MissingEntry {
            table: "ingredients",
            key: product.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use approx::assert_abs_diff_eq;
    use refinery_solver::SolutionStatus;

    fn bundled() -> (RefineryData, Parameters) {
        let data = RefineryData::bundled().unwrap();
        let params = data.limits.clone();
        (data, params)
    }

    fn solve(data: &RefineryData, params: &Parameters) -> (RefineryModel, Solution) {
        let model = RefineryModel::build(data, params).unwrap();
        let solution = model.solve(&Solver::new());
        (model, solution)
    }

    #[test]
    fn test_model_structure() {
        let (data, params) = bundled();
        let model = RefineryModel::build(&data, &params).unwrap();

        assert_eq!(model.materials.len(), 16);
        // 3 naphthas x 3 + 2 oils x 2 + cracked oil + residuum x 2 + 2 gasolines x 2
        assert_eq!(model.streams.len(), 20);
        assert_eq!(model.lp_problem.num_variables(), 36);

        // 3 capacities, 6 distillation, 1 reforming, 2 cracking, 1 lube,
        // 9 usage, 3 blends, 1 ratio, 2 octane, 1 pressure
        assert_eq!(model.lp_problem.num_constraints(), 29);

        for name in [
            "distillation",
            "reforming",
            "cracking",
            "dist_Residuum",
            "refo_ReformedGasoline",
            "crack_CrackedGasoline",
            "lube",
            "use_LightOil",
            "use_CrackedGasoline",
            "blend_JetFuel",
            "ratio_PremiumPetrol",
            "octane_RegularPetrol",
            "pressure_JetFuel",
        ] {
            assert!(model.lp_problem.constraint(name).is_some(), "missing constraint {}", name);
        }
    }

    #[test]
    fn test_bounds_follow_parameters() {
        let (data, mut params) = bundled();
        params.max_crude.insert("CrudeOil1".to_string(), 12000.0);
        params.min_lube_oil = 700.0;
        let model = RefineryModel::build(&data, &params).unwrap();

        let crude1 = model.material("CrudeOil1").unwrap();
        let lube = model.material("LubeOil").unwrap();
        assert_eq!(model.lp_problem.bounds[crude1], VariableBounds::at_most(12000.0));
        assert_eq!(model.lp_problem.bounds[lube], VariableBounds::between(700.0, 1000.0));
    }

    #[test]
    fn test_quality_constraint_directions() {
        let (data, params) = bundled();
        let model = RefineryModel::build(&data, &params).unwrap();
        let problem = &model.lp_problem;

        let octane = problem.constraint("octane_PremiumPetrol").unwrap();
        assert_eq!(octane.op, ConstraintOp::Le);
        assert_eq!(octane.coefficients[model.material("PremiumPetrol").unwrap()], 94.0);
        assert_eq!(
            octane.coefficients[model.stream("ReformedGasoline", "PremiumPetrol").unwrap()],
            -115.0
        );

        let pressure = problem.constraint("pressure_JetFuel").unwrap();
        assert_eq!(pressure.op, ConstraintOp::Ge);
        assert_eq!(pressure.coefficients[model.stream("CrackedOil", "JetFuel").unwrap()], -1.5);
    }

    #[test]
    fn test_default_data_solves_to_known_profit() {
        let (data, params) = bundled();
        let (model, solution) = solve(&data, &params);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value, 211365.13, epsilon = 1.0);

        let produced: Vec<&String> = data
            .final_products
            .iter()
            .filter(|p| model.quantity(&solution, p) > 1e-6)
            .collect();
        assert!(!produced.is_empty());
    }

    #[test]
    fn test_solution_respects_constraints_and_bounds() {
        let (data, params) = bundled();
        let (model, solution) = solve(&data, &params);

        assert!(solution.values.iter().all(|v| *v >= -1e-6));
        let violations = model.lp_problem.violations(&solution.values, 1e-4);
        assert!(violations.is_empty(), "{:?}", violations);

        let lube = model.quantity(&solution, "LubeOil");
        assert!(lube >= 500.0 - 1e-6 && lube <= 1000.0 + 1e-6);
        assert!(model.quantity(&solution, "CrudeOil1") <= 20000.0 + 1e-6);
    }

    #[test]
    fn test_distillation_mass_balance() {
        let (data, params) = bundled();
        let (model, solution) = solve(&data, &params);

        for output in &data.distil_outputs {
            let expected: f64 = data
                .raw_materials
                .iter()
                .map(|crude| data.distillation.yields[crude][output] * model.quantity(&solution, crude))
                .sum();
            assert_abs_diff_eq!(model.quantity(&solution, output), expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_repeated_solves_are_deterministic() {
        let (data, params) = bundled();
        let (_, first) = solve(&data, &params);
        let (_, second) = solve(&data, &params);

        assert_abs_diff_eq!(first.objective_value, second.objective_value, epsilon = 1e-6);
    }

    #[test]
    fn test_tightening_bounds_never_increases_profit() {
        let (data, params) = bundled();
        let (_, base) = solve(&data, &params);

        let mut tight = params.clone();
        tight.max_crude.insert("CrudeOil1".to_string(), 10000.0);
        tight.max_cracking = 4000.0;
        let (_, tightened) = solve(&data, &tight);
        assert!(tightened.is_optimal());
        assert!(tightened.objective_value <= base.objective_value + 1e-6);

        let mut loose = params.clone();
        loose.max_distillation = 60000.0;
        loose.max_reforming = 15000.0;
        let (_, loosened) = solve(&data, &loose);
        assert!(loosened.is_optimal());
        assert!(loosened.objective_value >= base.objective_value - 1e-6);
    }

    #[test]
    fn test_inverted_lube_bounds_are_infeasible() {
        let (data, mut params) = bundled();
        params.min_lube_oil = 1200.0;
        params.max_lube_oil = 800.0;

        let (_, solution) = solve(&data, &params);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
        assert!(solution.violations[0].description.contains("LubeOil"));
    }

    #[test]
    fn test_missing_crude_reports_lube_shortfall() {
        let (data, mut params) = bundled();
        for cap in params.max_crude.values_mut() {
            *cap = 0.0;
        }
        params.min_lube_oil = 500.0;

        let (_, solution) = solve(&data, &params);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.values.is_empty());
        let shortfall = solution
            .violations
            .iter()
            .find(|v| v.constraint == "LubeOil_min")
            .unwrap_or_else(|| panic!("no lube oil violation in {:?}", solution.violations));
        assert_abs_diff_eq!(shortfall.required, 500.0);
        assert_abs_diff_eq!(shortfall.actual, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_exhausted_time_limit_is_not_optimal() {
        let (data, params) = bundled();
        let model = RefineryModel::build(&data, &params).unwrap();

        let solution = model.solve(&Solver::new().with_time_limit(Duration::from_nanos(1)));

        assert_ne!(solution.status, SolutionStatus::Optimal);
        assert!(solution.values.is_empty());
    }

    #[test]
    fn test_negative_parameter_fails_fast() {
        let (data, mut params) = bundled();
        params.max_distillation = -5.0;

        let err = RefineryModel::build(&data, &params).unwrap_err();
        assert!(matches!(err, DataError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_stream_lookup() {
        let (data, params) = bundled();
        let model = RefineryModel::build(&data, &params).unwrap();

        assert!(model.stream("LightNaphtha", "JetFuel").is_err());
        assert!(model.material("Kerosene").is_err());
    }
}

//! Refinery problem data: materials, yield tables, prices and quality targets.
//!
//! The data is read once from a JSON file (camelCase keys) and validated as a
//! whole before any model is built, so a malformed file fails with an error
//! naming the table and key at fault.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::params::Parameters;

/// The data set shipped with the crate (Williams, problem 12.6)
pub const BUNDLED_DATA: &str = include_str!("../../../data/refinery.json");

/// `source -> (output -> fraction)`
pub type YieldTable = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed refinery data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed parameter file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0} must list at least one material")]
    EmptyList(&'static str),
    #[error("Material {0} is declared more than once")]
    DuplicateMaterial(String),
    #[error("Unknown material {name} in {table}")]
    UnknownMaterial { table: &'static str, name: String },
    #[error("Missing {table} entry for {key}")]
    MissingEntry { table: &'static str, key: String },
    #[error("{material} feeds {destination} but usedIn declares no such stream")]
    MissingStream { material: String, destination: String },
    #[error("Invalid value {value} for {field}: {reason}")]
    InvalidValue {
        field: String,
        value: f64,
        reason: &'static str,
    },
}

/// Role of a material in the refinery flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Crude,
    Distillate,
    Reformed,
    Cracked,
    Product,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefineryData {
    pub raw_materials: Vec<String>,
    pub distil_outputs: Vec<String>,
    pub reform_outputs: Vec<String>,
    pub cracking_outputs: Vec<String>,
    pub final_products: Vec<String>,
    pub product_profit: BTreeMap<String, f64>,
    pub distillation: Distillation,
    pub reforming: ConversionUnit,
    pub cracking: ConversionUnit,
    pub lube_oil: LubeOilUnit,
    /// Destinations each material may flow to
    pub used_in: BTreeMap<String, Vec<String>>,
    /// Blended products and the materials they are mixed from
    pub ingredients: BTreeMap<String, Vec<String>>,
    pub fuel_oil: FuelOilRecipe,
    pub product_ratio: ProductRatio,
    /// Minimum octane number per petrol
    pub quality: BTreeMap<String, f64>,
    pub octane: BTreeMap<String, f64>,
    /// Maximum vapor pressure per blended product
    pub pressure_limits: BTreeMap<String, f64>,
    pub pressures: BTreeMap<String, f64>,
    /// Default values for the adjustable parameters
    pub limits: Parameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Distillation {
    pub yields: YieldTable,
}

/// A unit that converts some intermediates into others
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConversionUnit {
    /// Destination name used in `usedIn` for material sent to this unit
    #[serde(rename = "use")]
    pub feed_use: String,
    pub yields: YieldTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LubeOilUnit {
    pub product: String,
    pub feed: String,
    #[serde(rename = "yield")]
    pub yield_fraction: f64,
}

/// Fixed-proportion recipe of the fuel oil blend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FuelOilRecipe {
    pub product: String,
    pub proportions: BTreeMap<String, f64>,
}

/// `product >= min_ratio * reference`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductRatio {
    pub product: String,
    pub reference: String,
    pub min_ratio: f64,
}

impl RefineryData {
    /// Load and validate a data file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading refinery data");
        Self::from_json_str(&source)
    }

    pub fn from_json_str(source: &str) -> Result<Self, DataError> {
        let data: RefineryData = serde_json::from_str(source)?;
        data.validate()?;
        Ok(data)
    }

    pub fn bundled() -> Result<Self, DataError> {
        Self::from_json_str(BUNDLED_DATA)
    }

    /// Every material in variable order: crudes, products, distillates,
    /// reformed and cracked intermediates
    pub fn all_materials(&self) -> impl Iterator<Item = &String> {
        self.raw_materials
            .iter()
            .chain(&self.final_products)
            .chain(&self.distil_outputs)
            .chain(&self.reform_outputs)
            .chain(&self.cracking_outputs)
    }

    pub fn material_kind(&self, name: &str) -> Option<MaterialKind> {
        let has = |list: &Vec<String>| list.iter().any(|m| m == name);
        if has(&self.raw_materials) {
            Some(MaterialKind::Crude)
        } else if has(&self.final_products) {
            Some(MaterialKind::Product)
        } else if has(&self.distil_outputs) {
            Some(MaterialKind::Distillate)
        } else if has(&self.reform_outputs) {
            Some(MaterialKind::Reformed)
        } else if has(&self.cracking_outputs) {
            Some(MaterialKind::Cracked)
        } else {
            None
        }
    }

    /// Distillates sent to the reformer, in distillation order
    pub fn naphthas(&self) -> Vec<&str> {
        self.distil_outputs
            .iter()
            .filter(|m| self.reforming.yields.contains_key(*m))
            .map(String::as_str)
            .collect()
    }

    /// Distillates sent to the cracker, in distillation order
    pub fn oils(&self) -> Vec<&str> {
        self.distil_outputs
            .iter()
            .filter(|m| self.cracking.yields.contains_key(*m))
            .map(String::as_str)
            .collect()
    }

    pub fn validate(&self) -> Result<(), DataError> {
        self.validate_materials()?;
        self.validate_profits()?;
        self.validate_yields()?;
        self.validate_streams()?;
        self.validate_blends()?;
        self.limits.validate(&self.raw_materials)?;
        Ok(())
    }

    fn is_material(&self, name: &str) -> bool {
        self.material_kind(name).is_some()
    }

    fn require_material(&self, table: &'static str, name: &str) -> Result<(), DataError> {
        if self.is_material(name) {
            Ok(())
        } else {
            Err(unknown(table, name))
        }
    }

    fn require_product(&self, table: &'static str, name: &str) -> Result<(), DataError> {
        if self.final_products.iter().any(|p| p == name) {
            Ok(())
        } else {
            Err(unknown(table, name))
        }
    }

    fn validate_materials(&self) -> Result<(), DataError> {
        let lists: [(&'static str, &[String]); 5] = [
            ("rawMaterials", &self.raw_materials),
            ("distilOutputs", &self.distil_outputs),
            ("reformOutputs", &self.reform_outputs),
            ("crackingOutputs", &self.cracking_outputs),
            ("finalProducts", &self.final_products),
        ];
        for (name, list) in lists {
            if list.is_empty() {
                return Err(DataError::EmptyList(name));
            }
        }

        let mut seen = HashSet::new();
        for material in self.all_materials() {
            if !seen.insert(material.as_str()) {
                return Err(DataError::DuplicateMaterial(material.clone()));
            }
        }
        Ok(())
    }

    fn validate_profits(&self) -> Result<(), DataError> {
        for name in self.product_profit.keys() {
            self.require_product("productProfit", name)?;
        }
        for product in &self.final_products {
            let profit = *self
                .product_profit
                .get(product)
                .ok_or_else(|| missing("productProfit", product))?;
            finite(format!("productProfit.{}", product), profit)?;
        }
        Ok(())
    }

    fn validate_yields(&self) -> Result<(), DataError> {
        check_yield_table(
            "distillation.yields",
            &self.distillation.yields,
            &self.raw_materials,
            &self.raw_materials,
            &self.distil_outputs,
        )?;

        if self.reforming.yields.is_empty() {
            return Err(DataError::EmptyList("reforming.yields"));
        }
        let naphthas: Vec<String> = self.naphthas().into_iter().map(str::to_string).collect();
        check_yield_table(
            "reforming.yields",
            &self.reforming.yields,
            &naphthas,
            &self.distil_outputs,
            &self.reform_outputs,
        )?;

        if self.cracking.yields.is_empty() {
            return Err(DataError::EmptyList("cracking.yields"));
        }
        let oils: Vec<String> = self.oils().into_iter().map(str::to_string).collect();
        check_yield_table(
            "cracking.yields",
            &self.cracking.yields,
            &oils,
            &self.distil_outputs,
            &self.cracking_outputs,
        )?;

        self.require_product("lubeOil.product", &self.lube_oil.product)?;
        self.require_material("lubeOil.feed", &self.lube_oil.feed)?;
        non_negative("lubeOil.yield".to_string(), self.lube_oil.yield_fraction)?;
        Ok(())
    }

    fn validate_streams(&self) -> Result<(), DataError> {
        let units = [self.reforming.feed_use.as_str(), self.cracking.feed_use.as_str()];
        for (source, destinations) in &self.used_in {
            self.require_material("usedIn", source)?;
            for destination in destinations {
                if !units.contains(&destination.as_str()) && !self.is_material(destination) {
                    return Err(unknown("usedIn", destination));
                }
            }
        }

        for naphtha in self.naphthas() {
            self.require_stream(naphtha, &self.reforming.feed_use)?;
        }
        for oil in self.oils() {
            self.require_stream(oil, &self.cracking.feed_use)?;
        }
        self.require_stream(&self.lube_oil.feed, &self.lube_oil.product)?;

        self.require_product("fuelOil.product", &self.fuel_oil.product)?;
        for (material, &proportion) in &self.fuel_oil.proportions {
            self.require_material("fuelOil.proportions", material)?;
            non_negative(format!("fuelOil.proportions.{}", material), proportion)?;
        }
        Ok(())
    }

    fn validate_blends(&self) -> Result<(), DataError> {
        for (product, ingredients) in &self.ingredients {
            self.require_product("ingredients", product)?;
            for ingredient in ingredients {
                self.require_stream(ingredient, product)?;
            }
        }

        let ratio = &self.product_ratio;
        self.require_product("productRatio.product", &ratio.product)?;
        self.require_product("productRatio.reference", &ratio.reference)?;
        non_negative("productRatio.minRatio".to_string(), ratio.min_ratio)?;

        for (product, &target) in &self.quality {
            let ingredients = self.ingredients.get(product).ok_or_else(|| missing("ingredients", product))?;
            finite(format!("quality.{}", product), target)?;
            for ingredient in ingredients {
                let value = *self.octane.get(ingredient).ok_or_else(|| missing("octane", ingredient))?;
                finite(format!("octane.{}", ingredient), value)?;
            }
        }

        for (product, &limit) in &self.pressure_limits {
            let ingredients = self
                .ingredients
                .get(product)
                .ok_or_else(|| missing("ingredients", product))?;
            non_negative(format!("pressureLimits.{}", product), limit)?;
            for ingredient in ingredients {
                let value = *self
                    .pressures
                    .get(ingredient)
                    .ok_or_else(|| missing("pressures", ingredient))?;
                finite(format!("pressures.{}", ingredient), value)?;
            }
        }
        Ok(())
    }

    fn require_stream(&self, source: &str, destination: &str) -> Result<(), DataError> {
        let declared = self
            .used_in
            .get(source)
            .is_some_and(|uses| uses.iter().any(|u| u == destination));
        if declared {
            Ok(())
        } else {
            Err(DataError::MissingStream {
                material: source.to_string(),
                destination: destination.to_string(),
            })
        }
    }
}

/// Every `rows` entry must carry a yield for every `columns` entry, and no
/// key may fall outside `allowed_rows`/`columns`
fn check_yield_table(
    table: &'static str,
    yields: &YieldTable,
    rows: &[String],
    allowed_rows: &[String],
    columns: &[String],
) -> Result<(), DataError> {
    for (row, outputs) in yields {
        if !allowed_rows.contains(row) {
            return Err(unknown(table, row));
        }
        if let Some(extra) = outputs.keys().find(|k| !columns.contains(k)) {
            return Err(unknown(table, extra));
        }
    }

    for row in rows {
        let outputs = yields.get(row).ok_or_else(|| missing(table, row))?;
        for column in columns {
            let fraction = *outputs
                .get(column)
                .ok_or_else(|| missing(table, &format!("{}.{}", row, column)))?;
            non_negative(format!("{}.{}.{}", table, row, column), fraction)?;
        }
    }
    Ok(())
}

fn unknown(table: &'static str, name: &str) -> DataError {
    DataError::UnknownMaterial {
        table,
        name: name.to_string(),
    }
}

fn missing(table: &'static str, key: &str) -> DataError {
    DataError::MissingEntry {
        table,
        key: key.to_string(),
    }
}

fn finite(field: String, value: f64) -> Result<(), DataError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DataError::InvalidValue {
            field,
            value,
            reason: "must be a finite number",
        })
    }
}

pub(crate) fn non_negative(field: String, value: f64) -> Result<(), DataError> {
    finite(field.clone(), value)?;
    if value < 0.0 {
        return Err(DataError::InvalidValue {
            field,
            value,
            reason: "must not be negative",
        });
    }
    Ok(())
}

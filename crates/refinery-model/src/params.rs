//! User-adjustable bounds and capacities.
//!
//! Defaults come from the `limits` table of the data file. A TOML file may
//! override any subset of them, and the CLI applies its own flags last.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{non_negative, DataError};

/// Bounds and capacities of one optimization run, in barrels per day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Parameters {
    /// Availability of each crude
    pub max_crude: BTreeMap<String, f64>,
    pub min_lube_oil: f64,
    pub max_lube_oil: f64,
    pub max_distillation: f64,
    pub max_reforming: f64,
    pub max_cracking: f64,
}

/// Partial set of parameter values
///
/// ```toml
/// min_lube_oil = 600
/// max_cracking = 9000
///
/// [max_crude]
/// CrudeOil1 = 25000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterOverrides {
    #[serde(default)]
    pub max_crude: BTreeMap<String, f64>,
    pub min_lube_oil: Option<f64>,
    pub max_lube_oil: Option<f64>,
    pub max_distillation: Option<f64>,
    pub max_reforming: Option<f64>,
    pub max_cracking: Option<f64>,
}

impl Parameters {
    /// Every value must be a non-negative number and every crude must have a cap.
    ///
    /// `min_lube_oil > max_lube_oil` is accepted: it makes the model
    /// infeasible, which the solver reports.
    pub fn validate(&self, raw_materials: &[String]) -> Result<(), DataError> {
        for crude in self.max_crude.keys() {
            if !raw_materials.contains(crude) {
                return Err(DataError::UnknownMaterial {
                    table: "maxCrude",
                    name: crude.clone(),
                });
            }
        }
        for crude in raw_materials {
            let cap = *self.max_crude.get(crude).ok_or_else(|| DataError::MissingEntry {
                table: "maxCrude",
                key: crude.clone(),
            })?;
            non_negative(format!("maxCrude.{}", crude), cap)?;
        }

        non_negative("minLubeOil".to_string(), self.min_lube_oil)?;
        non_negative("maxLubeOil".to_string(), self.max_lube_oil)?;
        non_negative("maxDistillation".to_string(), self.max_distillation)?;
        non_negative("maxReforming".to_string(), self.max_reforming)?;
        non_negative("maxCracking".to_string(), self.max_cracking)?;
        Ok(())
    }

    /// Apply `overrides` on top of these values. Crudes must already be known.
    pub fn apply(&mut self, overrides: &ParameterOverrides) -> Result<(), DataError> {
        for (crude, &cap) in &overrides.max_crude {
            let slot = self.max_crude.get_mut(crude).ok_or_else(|| DataError::UnknownMaterial {
                table: "max_crude",
                name: crude.clone(),
            })?;
            *slot = cap;
        }

        let scalars = [
            (&mut self.min_lube_oil, overrides.min_lube_oil),
            (&mut self.max_lube_oil, overrides.max_lube_oil),
            (&mut self.max_distillation, overrides.max_distillation),
            (&mut self.max_reforming, overrides.max_reforming),
            (&mut self.max_cracking, overrides.max_cracking),
        ];
        for (slot, value) in scalars {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(())
    }

    pub fn max_crude(&self, crude: &str) -> Option<f64> {
        self.max_crude.get(crude).copied()
    }
}

impl ParameterOverrides {
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, DataError> {
        Ok(toml::from_str(source)?)
    }

    /// Layer `other` on top of `self`; values set in `other` win
    pub fn merge(mut self, other: ParameterOverrides) -> Self {
        self.max_crude.extend(other.max_crude);
        self.min_lube_oil = other.min_lube_oil.or(self.min_lube_oil);
        self.max_lube_oil = other.max_lube_oil.or(self.max_lube_oil);
        self.max_distillation = other.max_distillation.or(self.max_distillation);
        self.max_reforming = other.max_reforming.or(self.max_reforming);
        self.max_cracking = other.max_cracking.or(self.max_cracking);
        self
    }
}

//! Likelihood configuration and the parameter validation gate.
//!
//! A [`LikelihoodConfig`] is built once (in code or from JSON) and handed to
//! [`crate::modules::likelihood::MapLike::new`], which refuses to proceed unless
//! the fixed and variable spectral parameters cover exactly what the spectral
//! model requires.

use crate::domain::ConfigError;
use crate::numerics::healpix::is_valid_nside;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikelihoodConfig {
    /// Observing frequencies, in the order of the first axis of the data maps.
    #[serde(alias = "nus")]
    pub frequencies: Vec<f64>,
    /// Spectral parameters held at a fixed value.
    #[serde(default)]
    pub fixed_pars: BTreeMap<String, f64>,
    /// Spectral parameters supplied positionally on every evaluation.
    #[serde(default)]
    pub var_pars: Vec<String>,
    /// Resolution at which spectral parameters are held constant.
    pub nside_spec: u32,
}

impl LikelihoodConfig {
    pub fn new(frequencies: Vec<f64>, nside_spec: u32) -> Self {
        Self {
            frequencies,
            fixed_pars: BTreeMap::new(),
            var_pars: Vec::new(),
            nside_spec,
        }
    }

    pub fn with_fixed(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fixed_pars.insert(name.into(), value);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.var_pars.push(name.into());
        self
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(|error| ConfigError::Parse {
            message: error.to_string(),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::from_json_str(&source)
    }

    pub fn frequency_count(&self) -> usize {
        self.frequencies.len()
    }

    pub fn variable_count(&self) -> usize {
        self.var_pars.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequencies.is_empty() {
            return Err(ConfigError::EmptyFrequencies);
        }
        if let Some(index) = self.frequencies.iter().position(|nu| !nu.is_finite()) {
            return Err(ConfigError::NonFiniteFrequency { index });
        }
        if !is_valid_nside(self.nside_spec) {
            return Err(ConfigError::InvalidNside {
                nside: self.nside_spec,
            });
        }
        Ok(())
    }

    /// Checks that fixed and variable parameters partition `required` exactly.
    pub fn validate_parameters(&self, required: &BTreeSet<String>) -> Result<(), ConfigError> {
        let mut duplicates = BTreeSet::new();
        let mut variables = BTreeSet::new();
        for name in &self.var_pars {
            if self.fixed_pars.contains_key(name) || !variables.insert(name.clone()) {
                duplicates.insert(name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateParameters {
                names: duplicates.into_iter().collect(),
            });
        }

        let configured: BTreeSet<String> =
            self.fixed_pars.keys().cloned().chain(variables).collect();
        if &configured != required {
            return Err(ConfigError::ParameterMismatch {
                missing: required.difference(&configured).cloned().collect(),
                extra: configured.difference(required).cloned().collect(),
            });
        }
        Ok(())
    }
}

//! Physical constants for a simulation session and the file they load from.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Constants of the force law, fixed for one simulation run.
///
/// Replaced as a whole on reload, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicalConstants {
    /// Coulomb-like coupling constant (6.33e4 matches Earth-scale play)
    pub coulomb_constant: f64,
    
    /// Per-axis range beyond which a pair does not interact
    pub max_distance: f64,
    
    /// Euclidean distance floor used in the inverse-square term
    pub min_distance: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            coulomb_constant: 6.33e4,
            max_distance: 10.0,
            min_distance: 0.3,
        }
    }
}

impl PhysicalConstants {
    /// Creates validated constants.
    pub fn new(coulomb_constant: f64, max_distance: f64, min_distance: f64) -> Result<Self, CoreError> {
        Self {
            coulomb_constant,
            max_distance,
            min_distance,
        }
        .validate()
    }
    
    /// Checks `0 <= min_distance <= max_distance` and finiteness.
    pub fn validate(self) -> Result<Self, CoreError> {
        if !(self.coulomb_constant.is_finite() && self.max_distance.is_finite() && self.min_distance.is_finite()) {
            return Err(CoreError::InvalidConstants(format!("non-finite value in {:?}", self)));
        }
        if self.min_distance < 0.0 {
            return Err(CoreError::InvalidConstants(format!(
                "min_distance {} is negative",
                self.min_distance
            )));
        }
        if self.max_distance < self.min_distance {
            return Err(CoreError::InvalidConstants(format!(
                "max_distance {} is below min_distance {}",
                self.max_distance, self.min_distance
            )));
        }
        Ok(self)
    }
}

/// JSON-backed store for `PhysicalConstants`.
pub struct ConfigStore;

impl ConfigStore {
    /// Parses and validates constants from a JSON string.
    pub fn from_json(json: &str) -> Result<PhysicalConstants, CoreError> {
        let constants: PhysicalConstants = serde_json::from_str(json)?;
        constants.validate()
    }
    
    /// Loads constants from `path`, writing the defaults there first if
    /// the file does not exist yet.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<PhysicalConstants, CoreError> {
        let path = path.as_ref();
        let io_err = |source| CoreError::ConfigIo {
            path: path.display().to_string(),
            source,
        };
        
        if path.exists() {
            let json = fs::read_to_string(path).map_err(io_err)?;
            let constants = Self::from_json(&json)?;
            info!("Loaded physical constants from {}", path.display());
            return Ok(constants);
        }
        
        let constants = PhysicalConstants::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, serde_json::to_string_pretty(&constants)?).map_err(io_err)?;
        info!("Created {} with default physical constants", path.display());
        Ok(constants)
    }
}

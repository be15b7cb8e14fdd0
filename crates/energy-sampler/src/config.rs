// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Sampling configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! target_pid = 4242
//! duration_secs = 30
//! assumed_draw_watts = 30.0      # optional
//! grid_emission_factor = 708.0   # optional, g CO2e per kWh
//! ```

use crate::estimator::{EstimatorParams, DEFAULT_DRAW_WATTS, DEFAULT_GRID_EMISSION_FACTOR};
use crate::SamplingError;
use std::path::Path;
use std::time::Duration;

/// Shortest accepted sampling window, in seconds.
pub const MIN_DURATION_SECS: u64 = 10;

/// Configuration for one sampling session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SamplingConfig {
    /// Process to sample.
    pub target_pid: u32,
    /// Length of the sampling window in seconds (at least 10).
    pub duration_secs: u64,
    /// Power the machine is assumed to draw at 100 % CPU, in watts.
    #[serde(default = "default_draw_watts")]
    pub assumed_draw_watts: f64,
    /// Grams of CO2 equivalent per kWh of grid electricity.
    #[serde(default = "default_grid_emission_factor")]
    pub grid_emission_factor: f64,
}

fn default_draw_watts() -> f64 {
    DEFAULT_DRAW_WATTS
}

fn default_grid_emission_factor() -> f64 {
    DEFAULT_GRID_EMISSION_FACTOR
}

impl SamplingConfig {
    /// Creates a configuration with default estimator parameters.
    pub fn new(target_pid: u32, duration_secs: u64) -> Self {
        Self {
            target_pid,
            duration_secs,
            assumed_draw_watts: DEFAULT_DRAW_WATTS,
            grid_emission_factor: DEFAULT_GRID_EMISSION_FACTOR,
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SamplingError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SamplingError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SamplingError> {
        toml::from_str(toml_str)
            .map_err(|e| SamplingError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, SamplingError> {
        toml::to_string_pretty(self)
            .map_err(|e| SamplingError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks the configuration before a session is created.
    pub fn validate(&self) -> Result<(), SamplingError> {
        if self.duration_secs < MIN_DURATION_SECS {
            return Err(SamplingError::Validation(format!(
                "duration must be at least {MIN_DURATION_SECS} seconds, got {}",
                self.duration_secs
            )));
        }
        check_non_negative("assumed_draw_watts", self.assumed_draw_watts)?;
        check_non_negative("grid_emission_factor", self.grid_emission_factor)?;
        Ok(())
    }

    /// The sampling window as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Estimator inputs carried by this configuration.
    pub fn estimator_params(&self) -> EstimatorParams {
        EstimatorParams {
            assumed_draw_watts: self.assumed_draw_watts,
            grid_emission_factor: self.grid_emission_factor,
        }
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), SamplingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SamplingError::Validation(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )))
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU utilisation, energy, and CO2 estimation.
//!
//! ```text
//! utilisation % = Δcpu_time / (logical_cores × window) × 100
//! energy kWh    = (utilisation / 100) × draw_watts × (window / 3600 s)
//! CO2 g         = energy kWh × grid_emission_factor
//! ```
//!
//! Everything here is pure arithmetic: no I/O, no clamping. Identical
//! inputs always give bit-identical outputs.

use std::time::Duration;

/// Default assumed power draw at full CPU, in watts.
pub const DEFAULT_DRAW_WATTS: f64 = 30.0;

/// Default grid emission factor in g CO2e/kWh (rough regional average).
pub const DEFAULT_GRID_EMISSION_FACTOR: f64 = 708.0;

/// Caller-tunable estimator inputs.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EstimatorParams {
    pub assumed_draw_watts: f64,
    pub grid_emission_factor: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            assumed_draw_watts: DEFAULT_DRAW_WATTS,
            grid_emission_factor: DEFAULT_GRID_EMISSION_FACTOR,
        }
    }
}

/// Derived figures for one sampling window.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct EnergyEstimate {
    pub cpu_utilization_percent: f64,
    pub energy_kwh: f64,
    pub co2_grams: f64,
}

/// Share of total machine CPU capacity the process used, in percent.
///
/// A negative CPU-time delta yields a negative result. A zero-length window
/// or zero cores has no capacity and yields 0.
pub fn cpu_utilization_percent(
    start_cpu: Duration,
    end_cpu: Duration,
    window: Duration,
    logical_cores: u32,
) -> f64 {
    let delta = end_cpu.as_secs_f64() - start_cpu.as_secs_f64();
    let capacity = f64::from(logical_cores) * window.as_secs_f64();
    if capacity <= 0.0 {
        return 0.0;
    }
    delta / capacity * 100.0
}

/// Energy drawn over `window` at the given utilisation, in kWh.
pub fn energy_kwh(cpu_utilization_percent: f64, window: Duration, params: &EstimatorParams) -> f64 {
    (cpu_utilization_percent / 100.0) * params.assumed_draw_watts * (window.as_secs_f64() / 3600.0)
}

/// Emissions for `energy_kwh`, in grams of CO2 equivalent.
pub fn co2_grams(energy_kwh: f64, params: &EstimatorParams) -> f64 {
    energy_kwh * params.grid_emission_factor
}

/// Derives utilisation, energy, and CO2 from two CPU-time readings.
pub fn estimate(
    start_cpu: Duration,
    end_cpu: Duration,
    window: Duration,
    logical_cores: u32,
    params: &EstimatorParams,
) -> EnergyEstimate {
    let cpu_utilization_percent = cpu_utilization_percent(start_cpu, end_cpu, window, logical_cores);
    from_utilization(cpu_utilization_percent, window, params)
}

/// Derives energy and CO2 from an already-computed utilisation.
pub fn from_utilization(
    cpu_utilization_percent: f64,
    window: Duration,
    params: &EstimatorParams,
) -> EnergyEstimate {
    let energy_kwh = energy_kwh(cpu_utilization_percent, window, params);
    EnergyEstimate {
        cpu_utilization_percent,
        energy_kwh,
        co2_grams: co2_grams(energy_kwh, params),
    }
}

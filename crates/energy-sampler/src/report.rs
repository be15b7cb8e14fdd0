// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The immutable result of a sampling session.
//!
//! An [`EnergyReport`] is built once, after the window closes, and is the
//! only value handed to a presentation layer. Fields are read through
//! accessors; nothing can change a report after construction.

use crate::estimator::{self, EstimatorParams};
use resource_monitor::{BatteryStatus, ProcessHandle, ResourceSnapshot, SensorKind, SensorReading};
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize)]
pub struct EnergyReport {
    process: ProcessHandle,
    start: ResourceSnapshot,
    end: ResourceSnapshot,
    requested_duration: Duration,
    elapsed: Duration,
    cancelled: bool,
    logical_cores: u32,
    sensors: Vec<SensorReading>,
    battery: BatteryStatus,
    params: EstimatorParams,
    cpu_utilization_percent: f64,
    energy_kwh: f64,
    co2_grams: f64,
}

/// Inputs gathered by the session for [`EnergyReport::compute`].
#[derive(Debug)]
pub(crate) struct ReportInputs {
    pub process: ProcessHandle,
    pub start: ResourceSnapshot,
    pub end: ResourceSnapshot,
    pub requested_duration: Duration,
    pub cancelled: bool,
    pub logical_cores: u32,
    pub sensors: Vec<SensorReading>,
    pub battery: BatteryStatus,
    pub params: EstimatorParams,
}

impl EnergyReport {
    /// Runs the estimator over the measured window and freezes the result.
    ///
    /// Utilisation is clamped to `[0, 100 × logical_cores]` before energy is
    /// derived from it, so clock skew cannot produce negative energy.
    pub(crate) fn compute(inputs: ReportInputs) -> Self {
        let ReportInputs {
            process,
            start,
            end,
            requested_duration,
            cancelled,
            logical_cores,
            sensors,
            battery,
            params,
        } = inputs;

        let elapsed = end.elapsed_since(&start);
        let raw = estimator::cpu_utilization_percent(start.cpu_time, end.cpu_time, elapsed, logical_cores);
        let ceiling = 100.0 * f64::from(logical_cores.max(1));
        let clamped = raw.clamp(0.0, ceiling);
        if clamped != raw {
            tracing::debug!(raw, clamped, "cpu utilisation clamped");
        }
        let estimate = estimator::from_utilization(clamped, elapsed, &params);

        Self {
            process,
            start,
            end,
            requested_duration,
            elapsed,
            cancelled,
            logical_cores,
            sensors: complete_readings(sensors),
            battery,
            params,
            cpu_utilization_percent: estimate.cpu_utilization_percent,
            energy_kwh: estimate.energy_kwh,
            co2_grams: estimate.co2_grams,
        }
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    /// Snapshot taken when the window opened.
    pub fn start(&self) -> &ResourceSnapshot {
        &self.start
    }

    /// Snapshot taken when the window closed, with disk readings.
    pub fn end(&self) -> &ResourceSnapshot {
        &self.end
    }

    pub fn requested_duration(&self) -> Duration {
        self.requested_duration
    }

    /// Measured window length, used for all derived figures.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// `true` if the window was cut short by cancellation.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn logical_cores(&self) -> u32 {
        self.logical_cores
    }

    /// One reading per [`SensorKind`], in [`SensorKind::ALL`] order.
    pub fn sensors(&self) -> &[SensorReading] {
        &self.sensors
    }

    /// The value for `kind`, or `None` if unknown.
    pub fn sensor(&self, kind: SensorKind) -> Option<f32> {
        self.sensors.iter().find(|r| r.kind == kind).and_then(|r| r.value)
    }

    pub fn battery(&self) -> &BatteryStatus {
        &self.battery
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    pub fn cpu_utilization_percent(&self) -> f64 {
        self.cpu_utilization_percent
    }

    pub fn energy_kwh(&self) -> f64 {
        self.energy_kwh
    }

    pub fn co2_grams(&self) -> f64 {
        self.co2_grams
    }

    /// Returns a one-line summary suitable for logging.
    ///
    /// # Example output
    /// ```text
    /// firefox (pid 4242): 10.0s, CPU 5.00%, 312.45 MB, 0.004167 kWh, 2.95 g CO2e
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "{} (pid {}): {:.1}s{}, CPU {:.2}%, {:.2} MB, {:.6} kWh, {:.2} g CO2e",
            self.process.name,
            self.process.pid,
            self.elapsed.as_secs_f64(),
            if self.cancelled { " (cancelled)" } else { "" },
            self.cpu_utilization_percent,
            self.end.memory_mb(),
            self.energy_kwh,
            self.co2_grams,
        )
    }
}

/// Fills in an unknown reading for every kind the sensor poll did not report.
fn complete_readings(readings: Vec<SensorReading>) -> Vec<SensorReading> {
    SensorKind::ALL
        .iter()
        .map(|&kind| {
            readings
                .iter()
                .find(|r| r.kind == kind)
                .copied()
                .unwrap_or(SensorReading { kind, value: None })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_monitor::ProcessSample;
    use std::time::Instant;

    fn snapshot(cpu_secs: u64, at: Instant) -> ResourceSnapshot {
        ResourceSnapshot::new(
            ProcessSample {
                cpu_time: Duration::from_secs(cpu_secs),
                resident_memory_bytes: 64 * 1024 * 1024,
            },
            at,
        )
    }

    fn inputs(start_cpu: u64, end_cpu: u64, window: u64, cores: u32) -> ReportInputs {
        let t0 = Instant::now();
        ReportInputs {
            process: ProcessHandle {
                pid: 4242,
                name: "worker".into(),
                start_time: 1,
            },
            start: snapshot(start_cpu, t0),
            end: snapshot(end_cpu, t0 + Duration::from_secs(window)),
            requested_duration: Duration::from_secs(window),
            cancelled: false,
            logical_cores: cores,
            sensors: Vec::new(),
            battery: BatteryStatus::unknown(),
            params: EstimatorParams::default(),
        }
    }

    #[test]
    fn test_compute_reference() {
        let r = EnergyReport::compute(inputs(0, 2, 10, 4));
        assert!((r.cpu_utilization_percent() - 5.0).abs() < 1e-9);
        assert!((r.co2_grams() - 2.95).abs() < 0.001);
        assert_eq!(r.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_negative_delta_clamped_to_zero() {
        let r = EnergyReport::compute(inputs(5, 3, 10, 2));
        assert_eq!(r.cpu_utilization_percent(), 0.0);
        assert_eq!(r.energy_kwh(), 0.0);
    }

    #[test]
    fn test_utilisation_capped_at_all_cores() {
        let r = EnergyReport::compute(inputs(0, 200, 10, 4));
        assert_eq!(r.cpu_utilization_percent(), 400.0);
    }

    #[test]
    fn test_missing_sensors_filled_as_unknown() {
        let mut i = inputs(0, 1, 10, 1);
        i.sensors = vec![SensorReading {
            kind: SensorKind::GpuLoad,
            value: Some(12.0),
        }];
        let r = EnergyReport::compute(i);
        assert_eq!(r.sensors().len(), 4);
        assert_eq!(r.sensor(SensorKind::GpuLoad), Some(12.0));
        assert_eq!(r.sensor(SensorKind::CpuTemperature), None);
    }

    #[test]
    fn test_summary() {
        let r = EnergyReport::compute(inputs(0, 2, 10, 4));
        let s = r.summary();
        assert!(s.contains("worker (pid 4242)"));
        assert!(s.contains("CPU 5.00%"));
        assert!(s.contains("2.95 g CO2e"));
        assert!(!s.contains("cancelled"));
    }

    #[test]
    fn test_serialises() {
        let r = EnergyReport::compute(inputs(0, 2, 10, 4));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["process"]["pid"], 4242);
        assert_eq!(json["logical_cores"], 4);
        assert!(json["sensors"].as_array().unwrap().len() == 4);
    }
}

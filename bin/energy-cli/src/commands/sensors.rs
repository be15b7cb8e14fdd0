// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `energy-probe sensors` command: one poll of the hardware sensors.
//!
//! Readings the platform cannot provide are shown as `N/A`; the command
//! still succeeds on machines with no sensors at all.

use super::or_na;
use resource_monitor::{
    BatteryReader, HardwareSensorReader, SensorKind, SensorReading, SysfsBatteryReader,
};

pub fn execute(json: bool) -> anyhow::Result<()> {
    let (readings, devices) = match HardwareSensorReader::platform().open() {
        Ok(mut handle) => {
            let readings = handle.poll();
            let devices: Vec<String> = handle
                .devices()
                .iter()
                .map(|d| format!("{} ({})", d.name, d.backend))
                .collect();
            handle.close();
            (readings, devices)
        }
        Err(e) => {
            tracing::warn!("hardware sensors unavailable: {e}");
            (SensorReading::unknown_all(), Vec::new())
        }
    };
    let battery = SysfsBatteryReader::new().read_battery();

    if json {
        let value = serde_json::json!({
            "devices": devices,
            "sensors": readings,
            "battery": battery,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("===== Sensor Status =====");
    if devices.is_empty() {
        println!("Devices           : none detected");
    } else {
        println!("Devices           : {}", devices.join(", "));
    }
    for reading in &readings {
        println!(
            "{:<18}: {} {}",
            label(reading.kind),
            or_na(reading.value, 1),
            reading.kind.unit()
        );
    }
    println!("Battery Status    : {battery}");
    println!("=========================");
    Ok(())
}

pub(crate) fn label(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::CpuTemperature => "CPU Temp",
        SensorKind::CpuClock => "CPU Clock Speed",
        SensorKind::GpuTemperature => "GPU Temp",
        SensorKind::GpuLoad => "GPU Load",
    }
}

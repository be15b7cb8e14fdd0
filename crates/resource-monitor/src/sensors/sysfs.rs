// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Linux sysfs sensor backend.
//!
//! - CPU temperatures: `/sys/class/hwmon/hwmonN` chips named `coretemp`,
//!   `k10temp`, `zenpower` or `cpu_thermal` (`tempK_input` in millidegrees,
//!   `tempK_label` for the label).
//! - CPU clocks: `/sys/devices/system/cpu/cpuN/cpufreq/scaling_cur_freq`,
//!   labelled `CPU Core #N+1`.
//! - GPUs: `/sys/class/drm/cardN/device` with the PCI `vendor` id, hwmon
//!   temperatures, and `gpu_busy_percent` (amdgpu, some i915) as core load.

use super::{
    GpuVendor, HardwareDevice, HardwareKind, Sensor, SensorSource, SensorType,
    GPU_CORE_LOAD_LABEL,
};
use crate::cpu::read_freq_mhz;
use crate::sysfs::{read_sysfs_file, read_sysfs_i64, sorted_entries};
use crate::MonitorError;
use std::path::{Path, PathBuf};

const BACKEND: &str = "sysfs";

/// hwmon chip names that report CPU temperatures.
const CPU_HWMON_CHIPS: [&str; 5] = ["coretemp", "k10temp", "zenpower", "cpu_thermal", "cpu-thermal"];

/// Sensor backend reading `/sys`.
pub struct SysfsSensorSource {
    root: PathBuf,
}

impl SysfsSensorSource {
    pub fn new() -> Self {
        Self::with_root("/sys")
    }

    /// Reads from an alternative sysfs root (for testing).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn cpu_hwmon_devices(&self) -> Vec<HardwareDevice> {
        sorted_entries(&self.root.join("class/hwmon"), "hwmon")
            .into_iter()
            .filter_map(|dir| {
                let chip = read_sysfs_file(&dir.join("name")).ok()?;
                CPU_HWMON_CHIPS.contains(&chip.as_str()).then(|| HardwareDevice {
                    kind: HardwareKind::Cpu,
                    name: chip,
                    backend: BACKEND.to_string(),
                    sensors: temperature_sensors(&dir),
                })
            })
            .filter(|d| !d.sensors.is_empty())
            .collect()
    }

    fn cpu_clock_device(&self) -> Option<HardwareDevice> {
        let sensors: Vec<Sensor> = sorted_entries(&self.root.join("devices/system/cpu"), "cpu")
            .into_iter()
            .filter_map(|dir| {
                let name = dir.file_name()?.to_string_lossy().into_owned();
                let index: usize = name.strip_prefix("cpu")?.parse().ok()?;
                let freq = dir.join("cpufreq/scaling_cur_freq");
                freq.exists().then(|| Sensor {
                    sensor_type: SensorType::Clock,
                    label: format!("CPU Core #{}", index + 1),
                    value: None,
                    source: freq.display().to_string(),
                })
            })
            .collect();
        (!sensors.is_empty()).then(|| HardwareDevice {
            kind: HardwareKind::Cpu,
            name: "cpufreq".to_string(),
            backend: BACKEND.to_string(),
            sensors,
        })
    }

    fn gpu_devices(&self) -> Vec<HardwareDevice> {
        sorted_entries(&self.root.join("class/drm"), "card")
            .into_iter()
            .filter_map(|card| {
                let name = card.file_name()?.to_string_lossy().into_owned();
                // Skip connector entries such as `card0-HDMI-A-1`.
                let index = name.strip_prefix("card")?;
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let device = card.join("device");
                let vendor = read_pci_vendor(&device.join("vendor"))?;

                let mut sensors: Vec<Sensor> = sorted_entries(&device.join("hwmon"), "hwmon")
                    .iter()
                    .flat_map(|dir| temperature_sensors(dir))
                    .collect();
                let busy = device.join("gpu_busy_percent");
                if busy.exists() {
                    sensors.push(Sensor {
                        sensor_type: SensorType::Load,
                        label: GPU_CORE_LOAD_LABEL.to_string(),
                        value: None,
                        source: busy.display().to_string(),
                    });
                }
                (!sensors.is_empty()).then(|| HardwareDevice {
                    kind: HardwareKind::Gpu(vendor),
                    name,
                    backend: BACKEND.to_string(),
                    sensors,
                })
            })
            .collect()
    }
}

impl Default for SysfsSensorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SysfsSensorSource {
    fn name(&self) -> &str {
        BACKEND
    }

    fn acquire(&self) -> Result<(), MonitorError> {
        if self.root.join("class").exists() {
            Ok(())
        } else {
            Err(MonitorError::unavailable(
                "sysfs sensors",
                format!("{} is not a sysfs mount", self.root.display()),
            ))
        }
    }

    fn enumerate(&self) -> Result<Vec<HardwareDevice>, MonitorError> {
        let mut devices = self.cpu_hwmon_devices();
        devices.extend(self.cpu_clock_device());
        devices.extend(self.gpu_devices());
        Ok(devices)
    }

    fn update(&self, device: &mut HardwareDevice) -> Result<(), MonitorError> {
        for sensor in &mut device.sensors {
            let path = Path::new(&sensor.source);
            sensor.value = match read_value(sensor.sensor_type, path) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!(label = %sensor.label, "sensor read failed: {e}");
                    None
                }
            };
        }
        Ok(())
    }
}

fn read_value(sensor_type: SensorType, path: &Path) -> Result<f32, MonitorError> {
    match sensor_type {
        SensorType::Temperature => Ok(read_sysfs_i64(path)? as f32 / 1000.0),
        SensorType::Clock => read_freq_mhz(path),
        SensorType::Load => Ok(read_sysfs_i64(path)? as f32),
    }
}

/// Lists `tempK_input` files in an hwmon directory, ordered by `K`.
fn temperature_sensors(dir: &Path) -> Vec<Sensor> {
    let mut indexed: Vec<(u32, Sensor)> = sorted_entries(dir, "temp")
        .into_iter()
        .filter_map(|input| {
            let file = input.file_name()?.to_string_lossy().into_owned();
            let index: u32 = file.strip_prefix("temp")?.strip_suffix("_input")?.parse().ok()?;
            let label = read_sysfs_file(&dir.join(format!("temp{index}_label")))
                .unwrap_or_else(|_| format!("temp{index}"));
            Some((
                index,
                Sensor {
                    sensor_type: SensorType::Temperature,
                    label,
                    value: None,
                    source: input.display().to_string(),
                },
            ))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, s)| s).collect()
}

fn read_pci_vendor(path: &Path) -> Option<GpuVendor> {
    let raw = read_sysfs_file(path).ok()?;
    let id = u32::from_str_radix(raw.trim_start_matches("0x"), 16).ok()?;
    Some(GpuVendor::from_pci_id(id))
}

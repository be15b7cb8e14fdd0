// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! NVIDIA GPU sensors through NVML (`nvidia` feature).
//!
//! The proprietary driver exposes no hwmon entries, so temperature and
//! core utilisation come from `libnvidia-ml`. The library handle lives
//! only between [`SensorSource::acquire`] and [`SensorSource::release`].

use super::{
    GpuVendor, HardwareDevice, HardwareKind, Sensor, SensorSource, SensorType,
    GPU_CORE_LOAD_LABEL,
};
use crate::MonitorError;
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::Nvml;
use std::sync::{Mutex, MutexGuard};

const BACKEND: &str = "nvml";

pub struct NvmlSensorSource {
    nvml: Mutex<Option<Nvml>>,
}

impl NvmlSensorSource {
    pub fn new() -> Self {
        Self {
            nvml: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Nvml>> {
        self.nvml.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for NvmlSensorSource {
    fn default() -> Self {
        Self::new()
    }
}

fn nvml_error(e: impl std::fmt::Display) -> MonitorError {
    MonitorError::unavailable("NVML", e.to_string())
}

impl SensorSource for NvmlSensorSource {
    fn name(&self) -> &str {
        BACKEND
    }

    fn acquire(&self) -> Result<(), MonitorError> {
        let nvml = Nvml::init().map_err(nvml_error)?;
        *self.lock() = Some(nvml);
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<HardwareDevice>, MonitorError> {
        let guard = self.lock();
        let nvml = guard
            .as_ref()
            .ok_or_else(|| nvml_error("library not initialised"))?;
        let count = nvml.device_count().map_err(nvml_error)?;

        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let device = nvml.device_by_index(index).map_err(nvml_error)?;
            let name = device
                .name()
                .unwrap_or_else(|_| format!("NVIDIA GPU {index}"));
            let sensor = |sensor_type| Sensor {
                sensor_type,
                label: GPU_CORE_LOAD_LABEL.to_string(),
                value: None,
                source: index.to_string(),
            };
            devices.push(HardwareDevice {
                kind: HardwareKind::Gpu(GpuVendor::Nvidia),
                name,
                backend: BACKEND.to_string(),
                sensors: vec![sensor(SensorType::Temperature), sensor(SensorType::Load)],
            });
        }
        Ok(devices)
    }

    fn update(&self, device: &mut HardwareDevice) -> Result<(), MonitorError> {
        let guard = self.lock();
        let nvml = guard
            .as_ref()
            .ok_or_else(|| nvml_error("library not initialised"))?;
        for sensor in &mut device.sensors {
            let index: u32 = sensor
                .source
                .parse()
                .map_err(|_| nvml_error(format!("bad device index '{}'", sensor.source)))?;
            let gpu = nvml.device_by_index(index).map_err(nvml_error)?;
            sensor.value = match sensor.sensor_type {
                SensorType::Temperature => {
                    gpu.temperature(TemperatureSensor::Gpu).ok().map(|t| t as f32)
                }
                SensorType::Load => gpu.utilization_rates().ok().map(|u| u.gpu as f32),
                SensorType::Clock => None,
            };
        }
        Ok(())
    }

    fn release(&self) {
        // Dropping the handle calls nvmlShutdown.
        self.lock().take();
    }
}

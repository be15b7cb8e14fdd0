// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # resource-monitor
//!
//! Readers for the counters an energy sampling session needs: one
//! process's CPU time and memory, its disk throughput, the system disk
//! queue, hardware sensors, and the battery.
//!
//! # Readers
//! - [`ProcessReader`]: cumulative CPU time and resident memory.
//! - [`IoCounterReader`]: primed per-process disk rate and queue depth.
//! - [`HardwareSensorReader`]: scoped, exclusive access to sensor backends.
//! - [`BatteryReader`]: charge and charging state.
//!
//! Each reader is a trait with a platform implementation beside it, so
//! callers can substitute fakes.
//!
//! # Graceful Degradation
//! Only process lookups are fatal ([`MonitorError::NotFound`]). Missing
//! counters and sensors surface as [`MonitorError::Unavailable`] or as
//! `None` values, never as zero.
//!
//! # Example
//! ```no_run
//! use resource_monitor::{HardwareSensorReader, SensorKind};
//!
//! let reader = HardwareSensorReader::platform();
//! let mut handle = reader.open().expect("no sensor backend");
//! for reading in handle.poll() {
//!     println!("{:?}: {:?} {}", reading.kind, reading.value, reading.kind.unit());
//! }
//! handle.close();
//! ```

mod battery;
mod cpu;
mod error;
mod io;
mod process;
mod sensors;
mod snapshot;
mod sysfs;

pub use battery::{BatteryReader, BatteryStatus, SysfsBatteryReader};
pub use cpu::logical_core_count;
pub use error::MonitorError;
pub use io::{DiskCounter, IoCounterReader, SysinfoIoReader};
pub use process::{
    list_processes, ProcessEntry, ProcessHandle, ProcessReader, ProcessSample, SysinfoProcessReader,
};
pub use sensors::{
    select_readings, CompositeSensorSource, GpuVendor, HardwareDevice, HardwareKind,
    HardwareSensorReader, Sensor, SensorHandle, SensorKind, SensorReading, SensorSource,
    SensorType, SysfsSensorSource, GPU_CORE_LOAD_LABEL, PRIMARY_CORE_CLOCK_LABEL,
};
pub use snapshot::ResourceSnapshot;

#[cfg(feature = "nvidia")]
pub use sensors::NvmlSensorSource;

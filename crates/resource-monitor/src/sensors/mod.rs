// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Hardware sensor reading (CPU/GPU temperature, clock, load).
//!
//! A [`SensorSource`] is one monitoring backend (sysfs hwmon, NVML, ...).
//! [`HardwareSensorReader::open`] acquires the backend exclusively and
//! returns a [`SensorHandle`]; the handle releases the backend when closed
//! or dropped, so early returns and panics cannot leak the acquisition.
//!
//! ```text
//! HardwareSensorReader::open() ──► SensorHandle ──► poll() ──► [SensorReading; 4]
//!                                       │
//!                                       └── close() / drop ──► SensorSource::release()
//! ```
//!
//! Each poll reports exactly one reading per [`SensorKind`], chosen by a
//! fixed label match so the same hardware always yields the same sensor.

mod sysfs;

#[cfg(feature = "nvidia")]
mod nvml;

pub use self::sysfs::SysfsSensorSource;

#[cfg(feature = "nvidia")]
pub use self::nvml::NvmlSensorSource;

use crate::MonitorError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// CPU temperature label fragments, in priority order.
///
/// Intel `coretemp` exposes `Core N`; AMD `k10temp` only exposes `Tctl`/`Tdie`.
const CPU_TEMP_LABELS: [&str; 4] = ["core", "package", "tctl", "tdie"];

/// Label of the clock sensor for the first logical core.
pub const PRIMARY_CORE_CLOCK_LABEL: &str = "CPU Core #1";

/// Label of the GPU core utilisation sensor.
pub const GPU_CORE_LOAD_LABEL: &str = "GPU Core";

/// The four readings reported per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SensorKind {
    CpuTemperature,
    CpuClock,
    GpuTemperature,
    GpuLoad,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::CpuTemperature,
        SensorKind::CpuClock,
        SensorKind::GpuTemperature,
        SensorKind::GpuLoad,
    ];

    /// Unit suffix for display.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::CpuTemperature | SensorKind::GpuTemperature => "°C",
            SensorKind::CpuClock => "MHz",
            SensorKind::GpuLoad => "%",
        }
    }
}

/// A selected sensor value. `None` means the sensor is absent or unreadable.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    pub value: Option<f32>,
}

impl SensorReading {
    /// One unknown reading per kind.
    pub fn unknown_all() -> Vec<SensorReading> {
        SensorKind::ALL
            .iter()
            .map(|&kind| SensorReading { kind, value: None })
            .collect()
    }
}

/// Physical quantity measured by a raw sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Temperature,
    Clock,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Other,
}

impl GpuVendor {
    /// Maps a PCI vendor id to a vendor.
    pub fn from_pci_id(id: u32) -> Self {
        match id {
            0x10de => GpuVendor::Nvidia,
            0x1002 => GpuVendor::Amd,
            0x8086 => GpuVendor::Intel,
            _ => GpuVendor::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareKind {
    Cpu,
    Gpu(GpuVendor),
}

/// A raw sensor exposed by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub sensor_type: SensorType,
    pub label: String,
    pub value: Option<f32>,
    /// Backend-specific locator used to refresh the value.
    pub source: String,
}

/// A hardware component and its sensors.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareDevice {
    pub kind: HardwareKind,
    pub name: String,
    /// Name of the [`SensorSource`] that enumerated this device.
    pub backend: String,
    pub sensors: Vec<Sensor>,
}

/// A hardware monitoring backend.
pub trait SensorSource: Send + Sync {
    /// Backend name, used to route updates back to it.
    fn name(&self) -> &str;

    /// Acquires driver handles. Called once per [`SensorHandle`].
    fn acquire(&self) -> Result<(), MonitorError> {
        Ok(())
    }

    /// Discovers devices and their sensors. Values may be unset.
    fn enumerate(&self) -> Result<Vec<HardwareDevice>, MonitorError>;

    /// Refreshes every sensor value of `device`.
    fn update(&self, device: &mut HardwareDevice) -> Result<(), MonitorError>;

    /// Releases whatever [`SensorSource::acquire`] obtained.
    fn release(&self) {}
}

/// Picks one reading per [`SensorKind`] from the enumerated devices.
pub fn select_readings(devices: &[HardwareDevice]) -> Vec<SensorReading> {
    let cpu_sensors = || {
        devices
            .iter()
            .filter(|d| d.kind == HardwareKind::Cpu)
            .flat_map(|d| d.sensors.iter())
    };
    let gpu_sensors = || {
        devices
            .iter()
            .filter(|d| matches!(d.kind, HardwareKind::Gpu(_)))
            .flat_map(|d| d.sensors.iter())
    };

    // A matched sensor with no value is still the selected identity.
    let cpu_temp = CPU_TEMP_LABELS
        .iter()
        .find_map(|fragment| {
            cpu_sensors().find(|s| {
                s.sensor_type == SensorType::Temperature
                    && s.label.to_lowercase().contains(fragment)
            })
        })
        .and_then(|s| s.value);
    let cpu_clock = cpu_sensors()
        .find(|s| s.sensor_type == SensorType::Clock && s.label == PRIMARY_CORE_CLOCK_LABEL)
        .and_then(|s| s.value);
    let gpu_temp = gpu_sensors()
        .find(|s| s.sensor_type == SensorType::Temperature)
        .and_then(|s| s.value);
    let gpu_load = gpu_sensors()
        .find(|s| s.sensor_type == SensorType::Load && s.label == GPU_CORE_LOAD_LABEL)
        .and_then(|s| s.value);

    vec![
        SensorReading { kind: SensorKind::CpuTemperature, value: cpu_temp },
        SensorReading { kind: SensorKind::CpuClock, value: cpu_clock },
        SensorReading { kind: SensorKind::GpuTemperature, value: gpu_temp },
        SensorReading { kind: SensorKind::GpuLoad, value: gpu_load },
    ]
}

/// Opens scoped, exclusive handles on a [`SensorSource`].
///
/// Clones share the exclusivity flag: while one clone's handle is open,
/// every other `open()` fails with [`MonitorError::Unavailable`] instead
/// of waiting. Every [`HardwareSensorReader::platform`] reader also shares
/// one flag, since they all drive the same host backends.
#[derive(Clone)]
pub struct HardwareSensorReader {
    source: Arc<dyn SensorSource>,
    in_use: Arc<AtomicBool>,
}

impl HardwareSensorReader {
    pub fn new(source: Arc<dyn SensorSource>) -> Self {
        Self {
            source,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reader over every backend compiled in for this platform.
    pub fn platform() -> Self {
        static PLATFORM_IN_USE: OnceLock<Arc<AtomicBool>> = OnceLock::new();

        #[allow(unused_mut)]
        let mut sources: Vec<Arc<dyn SensorSource>> = vec![Arc::new(SysfsSensorSource::new())];
        #[cfg(feature = "nvidia")]
        sources.push(Arc::new(NvmlSensorSource::new()));
        Self {
            source: Arc::new(CompositeSensorSource::new(sources)),
            in_use: Arc::clone(PLATFORM_IN_USE.get_or_init(|| Arc::new(AtomicBool::new(false)))),
        }
    }

    /// Acquires the backend and enumerates its devices.
    pub fn open(&self) -> Result<SensorHandle, MonitorError> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MonitorError::unavailable(
                "hardware sensor backend",
                "already held by another session",
            ));
        }
        if let Err(e) = self.source.acquire() {
            self.in_use.store(false, Ordering::Release);
            return Err(e);
        }

        let mut handle = SensorHandle {
            source: Arc::clone(&self.source),
            in_use: Arc::clone(&self.in_use),
            devices: Vec::new(),
            open: true,
        };
        // On error the handle drops here and releases the backend.
        handle.devices = handle.source.enumerate()?;
        tracing::debug!(
            backend = handle.source.name(),
            devices = handle.devices.len(),
            "hardware sensor backend opened"
        );
        Ok(handle)
    }
}

/// An open, exclusively held sensor backend.
pub struct SensorHandle {
    source: Arc<dyn SensorSource>,
    in_use: Arc<AtomicBool>,
    devices: Vec<HardwareDevice>,
    open: bool,
}

impl SensorHandle {
    /// Updates every device and returns one reading per kind.
    pub fn poll(&mut self) -> Vec<SensorReading> {
        for device in &mut self.devices {
            if let Err(e) = self.source.update(device) {
                tracing::warn!(device = %device.name, "sensor update failed: {e}");
                for sensor in &mut device.sensors {
                    sensor.value = None;
                }
            }
        }
        select_readings(&self.devices)
    }

    /// The devices discovered when the handle was opened.
    pub fn devices(&self) -> &[HardwareDevice] {
        &self.devices
    }

    /// Releases the backend. Equivalent to dropping the handle.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.source.release();
            self.in_use.store(false, Ordering::Release);
            tracing::debug!(backend = self.source.name(), "hardware sensor backend closed");
        }
    }
}

impl Drop for SensorHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SensorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorHandle")
            .field("backend", &self.source.name())
            .field("devices", &self.devices.len())
            .field("open", &self.open)
            .finish()
    }
}

/// Fans out to several backends as if they were one.
///
/// Acquisition succeeds if at least one backend can be acquired; backends
/// that fail are skipped for the lifetime of that acquisition.
pub struct CompositeSensorSource {
    sources: Vec<Arc<dyn SensorSource>>,
    acquired: Mutex<Vec<bool>>,
}

impl CompositeSensorSource {
    pub fn new(sources: Vec<Arc<dyn SensorSource>>) -> Self {
        let acquired = Mutex::new(vec![false; sources.len()]);
        Self { sources, acquired }
    }

    fn acquired_flags(&self) -> Vec<bool> {
        self.acquired
            .lock()
            .map(|flags| flags.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl SensorSource for CompositeSensorSource {
    fn name(&self) -> &str {
        "composite"
    }

    fn acquire(&self) -> Result<(), MonitorError> {
        let mut flags = vec![false; self.sources.len()];
        let mut failures = Vec::new();
        for (i, source) in self.sources.iter().enumerate() {
            match source.acquire() {
                Ok(()) => flags[i] = true,
                Err(e) => {
                    tracing::warn!(backend = source.name(), "sensor backend unavailable: {e}");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }
        if !flags.iter().any(|&f| f) && !self.sources.is_empty() {
            return Err(MonitorError::unavailable(
                "hardware sensor backend",
                failures.join("; "),
            ));
        }
        match self.acquired.lock() {
            Ok(mut guard) => *guard = flags,
            Err(poisoned) => *poisoned.into_inner() = flags,
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<HardwareDevice>, MonitorError> {
        let flags = self.acquired_flags();
        let mut devices = Vec::new();
        for (source, _) in self.sources.iter().zip(flags).filter(|(_, f)| *f) {
            match source.enumerate() {
                Ok(found) => devices.extend(found),
                Err(e) => tracing::warn!(backend = source.name(), "enumeration failed: {e}"),
            }
        }
        Ok(devices)
    }

    /// Routes to the first acquired backend named by `device.backend`.
    fn update(&self, device: &mut HardwareDevice) -> Result<(), MonitorError> {
        let flags = self.acquired_flags();
        let (source, _) = self
            .sources
            .iter()
            .zip(flags)
            .find(|(s, acquired)| *acquired && s.name() == device.backend)
            .ok_or_else(|| {
                MonitorError::unavailable(device.backend.clone(), "sensor backend not acquired")
            })?;
        source.update(device)
    }

    fn release(&self) {
        let flags = self.acquired_flags();
        for (source, _) in self.sources.iter().zip(flags).filter(|(_, f)| *f) {
            source.release();
        }
        match self.acquired.lock() {
            Ok(mut guard) => guard.iter_mut().for_each(|f| *f = false),
            Err(poisoned) => poisoned.into_inner().iter_mut().for_each(|f| *f = false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sensor(sensor_type: SensorType, label: &str, value: f32) -> Sensor {
        Sensor {
            sensor_type,
            label: label.to_string(),
            value: Some(value),
            source: label.to_string(),
        }
    }

    fn device(kind: HardwareKind, sensors: Vec<Sensor>) -> HardwareDevice {
        HardwareDevice {
            kind,
            name: format!("{kind:?}"),
            backend: "fake".to_string(),
            sensors,
        }
    }

    fn reading(readings: &[SensorReading], kind: SensorKind) -> Option<f32> {
        readings.iter().find(|r| r.kind == kind).and_then(|r| r.value)
    }

    fn sample_devices() -> Vec<HardwareDevice> {
        vec![
            device(
                HardwareKind::Cpu,
                vec![
                    sensor(SensorType::Temperature, "Package id 0", 61.0),
                    sensor(SensorType::Temperature, "Core 0", 55.0),
                    sensor(SensorType::Temperature, "Core 1", 57.0),
                    sensor(SensorType::Clock, "CPU Core #2", 3100.0),
                    sensor(SensorType::Clock, "CPU Core #1", 2900.0),
                ],
            ),
            device(
                HardwareKind::Gpu(GpuVendor::Amd),
                vec![
                    sensor(SensorType::Load, "GPU Memory", 10.0),
                    sensor(SensorType::Temperature, "edge", 48.0),
                    sensor(SensorType::Temperature, "junction", 52.0),
                    sensor(SensorType::Load, "GPU Core", 23.0),
                ],
            ),
        ]
    }

    #[test]
    fn test_select_by_label() {
        let readings = select_readings(&sample_devices());
        assert_eq!(readings.len(), 4);
        assert_eq!(reading(&readings, SensorKind::CpuTemperature), Some(55.0));
        assert_eq!(reading(&readings, SensorKind::CpuClock), Some(2900.0));
        assert_eq!(reading(&readings, SensorKind::GpuTemperature), Some(48.0));
        assert_eq!(reading(&readings, SensorKind::GpuLoad), Some(23.0));
    }

    #[test]
    fn test_select_amd_cpu_falls_back_to_tctl() {
        let devices = vec![device(
            HardwareKind::Cpu,
            vec![
                sensor(SensorType::Temperature, "Tccd1", 49.0),
                sensor(SensorType::Temperature, "Tctl", 63.5),
            ],
        )];
        let readings = select_readings(&devices);
        assert_eq!(reading(&readings, SensorKind::CpuTemperature), Some(63.5));
    }

    #[test]
    fn test_selected_sensor_without_value_is_unknown() {
        let mut devices = sample_devices();
        devices[0].sensors[1].value = None; // Core 0
        let readings = select_readings(&devices);
        // Core 1 is not substituted for the selected Core 0.
        assert_eq!(reading(&readings, SensorKind::CpuTemperature), None);
    }

    #[test]
    fn test_no_devices_all_unknown() {
        let readings = select_readings(&[]);
        assert_eq!(readings, SensorReading::unknown_all());
    }

    #[test]
    fn test_gpu_sensors_ignored_for_cpu() {
        let devices = vec![device(
            HardwareKind::Gpu(GpuVendor::Nvidia),
            vec![sensor(SensorType::Temperature, "GPU Core", 70.0)],
        )];
        let readings = select_readings(&devices);
        assert_eq!(reading(&readings, SensorKind::CpuTemperature), None);
        assert_eq!(reading(&readings, SensorKind::GpuTemperature), Some(70.0));
    }

    #[test]
    fn test_selection_is_stable() {
        let devices = sample_devices();
        assert_eq!(select_readings(&devices), select_readings(&devices));
    }

    #[test]
    fn test_vendor_from_pci_id() {
        assert_eq!(GpuVendor::from_pci_id(0x10de), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_pci_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_pci_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_pci_id(0x1234), GpuVendor::Other);
    }

    /// Backend that counts acquire/update/release calls.
    #[derive(Default)]
    struct CountingSource {
        name: &'static str,
        acquires: AtomicUsize,
        updates: AtomicUsize,
        releases: AtomicUsize,
        fail_acquire: bool,
        fail_enumerate: bool,
    }

    impl SensorSource for CountingSource {
        fn name(&self) -> &str {
            if self.name.is_empty() {
                "fake"
            } else {
                self.name
            }
        }

        fn acquire(&self) -> Result<(), MonitorError> {
            if self.fail_acquire {
                return Err(MonitorError::unavailable("fake", "no driver"));
            }
            self.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn enumerate(&self) -> Result<Vec<HardwareDevice>, MonitorError> {
            if self.fail_enumerate {
                return Err(MonitorError::unavailable("fake", "enumeration failed"));
            }
            let mut devices = sample_devices();
            for d in &mut devices {
                d.backend = self.name().to_string();
                d.sensors.iter_mut().for_each(|s| s.value = None);
            }
            Ok(devices)
        }

        fn update(&self, device: &mut HardwareDevice) -> Result<(), MonitorError> {
            let fresh = sample_devices()
                .into_iter()
                .find(|d| d.kind == device.kind)
                .expect("known device");
            self.updates.fetch_add(1, Ordering::SeqCst);
            device.sensors = fresh.sensors;
            Ok(())
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_poll_updates_before_selecting() {
        let reader = HardwareSensorReader::new(Arc::new(CountingSource::default()));
        let mut handle = reader.open().unwrap();
        let readings = handle.poll();
        assert_eq!(reading(&readings, SensorKind::CpuClock), Some(2900.0));
    }

    #[test]
    fn test_open_is_exclusive() {
        let source = Arc::new(CountingSource::default());
        let reader = HardwareSensorReader::new(source.clone());
        let other = reader.clone();

        let handle = reader.open().unwrap();
        let err = other.open().unwrap_err();
        assert!(matches!(err, MonitorError::Unavailable { .. }));

        handle.close();
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
        let again = other.open().unwrap();
        drop(again);
        assert_eq!(source.acquires.load(Ordering::SeqCst), 2);
        assert_eq!(source.releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_platform_readers_share_exclusivity() {
        let first = HardwareSensorReader::platform();
        let second = HardwareSensorReader::platform();
        assert!(Arc::ptr_eq(&first.in_use, &second.in_use));

        let independent = HardwareSensorReader::new(Arc::new(CountingSource::default()));
        assert!(!Arc::ptr_eq(&first.in_use, &independent.in_use));
    }

    #[test]
    fn test_enumerate_failure_releases() {
        let source = Arc::new(CountingSource {
            fail_enumerate: true,
            ..Default::default()
        });
        let reader = HardwareSensorReader::new(source.clone());
        assert!(reader.open().is_err());
        assert_eq!(source.acquires.load(Ordering::SeqCst), 1);
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
        // The exclusivity flag was cleared too.
        assert!(reader.open().is_err());
        assert_eq!(source.acquires.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_acquire_failure_clears_flag() {
        let source = Arc::new(CountingSource {
            fail_acquire: true,
            ..Default::default()
        });
        let reader = HardwareSensorReader::new(source.clone());
        assert!(reader.open().is_err());
        assert!(!reader.in_use.load(Ordering::SeqCst));
        assert_eq!(source.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_composite_skips_failed_backend() {
        let good = Arc::new(CountingSource {
            name: "good",
            ..Default::default()
        });
        let bad = Arc::new(CountingSource {
            name: "bad",
            fail_acquire: true,
            ..Default::default()
        });
        let composite = CompositeSensorSource::new(vec![bad.clone(), good.clone()]);
        let reader = HardwareSensorReader::new(Arc::new(composite));
        let mut handle = reader.open().unwrap();
        assert_eq!(handle.devices().len(), 2);
        assert_eq!(reading(&handle.poll(), SensorKind::GpuLoad), Some(23.0));
        assert_eq!(good.updates.load(Ordering::SeqCst), 2);
        assert_eq!(bad.updates.load(Ordering::SeqCst), 0);
        drop(handle);
        assert_eq!(good.releases.load(Ordering::SeqCst), 1);
        assert_eq!(bad.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_composite_never_updates_unacquired_namesake() {
        let unacquired = Arc::new(CountingSource {
            name: "dup",
            fail_acquire: true,
            ..Default::default()
        });
        let acquired = Arc::new(CountingSource {
            name: "dup",
            ..Default::default()
        });
        let composite = CompositeSensorSource::new(vec![unacquired.clone(), acquired.clone()]);
        let reader = HardwareSensorReader::new(Arc::new(composite));
        let mut handle = reader.open().unwrap();
        assert_eq!(reading(&handle.poll(), SensorKind::CpuClock), Some(2900.0));
        assert_eq!(unacquired.updates.load(Ordering::SeqCst), 0);
        assert_eq!(acquired.updates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_composite_update_after_release_is_unavailable() {
        let source = Arc::new(CountingSource {
            name: "solo",
            ..Default::default()
        });
        let composite = CompositeSensorSource::new(vec![source.clone()]);
        composite.acquire().unwrap();
        let mut devices = composite.enumerate().unwrap();
        composite.release();
        let err = composite.update(&mut devices[0]).unwrap_err();
        assert!(matches!(err, MonitorError::Unavailable { .. }));
        assert_eq!(source.updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_composite_all_failed_is_unavailable() {
        let bad = Arc::new(CountingSource {
            fail_acquire: true,
            ..Default::default()
        });
        let reader = HardwareSensorReader::new(Arc::new(CompositeSensorSource::new(vec![bad])));
        assert!(matches!(reader.open(), Err(MonitorError::Unavailable { .. })));
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Battery charge and state via `/sys/class/power_supply/`.
//!
//! Desktops and servers have no battery; every failure collapses to
//! [`BatteryStatus::unknown`] rather than an error.

use crate::sysfs::{read_sysfs_file, sorted_entries};
use std::path::PathBuf;

/// Charge level and charging state. Either field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatteryStatus {
    /// Remaining charge, 0–100.
    pub charge_percent: Option<u8>,
    /// Kernel status string, e.g. `Charging`, `Discharging`, `Full`.
    pub state: Option<String>,
}

impl BatteryStatus {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.charge_percent.is_some() || self.state.is_some()
    }
}

impl std::fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.is_known() {
            return write!(f, "Battery info not available");
        }
        let charge = self
            .charge_percent
            .map(|c| format!("{c}%"))
            .unwrap_or_else(|| "N/A".to_string());
        let state = self.state.as_deref().unwrap_or("N/A");
        write!(f, "Charge: {charge} | Status: {state}")
    }
}

/// Reads platform battery state.
pub trait BatteryReader: Send {
    fn read_battery(&self) -> BatteryStatus;
}

/// [`BatteryReader`] over the Linux power-supply class.
pub struct SysfsBatteryReader {
    power_supply: PathBuf,
}

impl SysfsBatteryReader {
    pub fn new() -> Self {
        Self::with_path("/sys/class/power_supply")
    }

    /// Reads from an alternative power-supply directory (for testing).
    pub fn with_path(power_supply: impl Into<PathBuf>) -> Self {
        Self {
            power_supply: power_supply.into(),
        }
    }
}

impl Default for SysfsBatteryReader {
    fn default() -> Self {
        Self::new()
    }
}

impl BatteryReader for SysfsBatteryReader {
    fn read_battery(&self) -> BatteryStatus {
        let battery = sorted_entries(&self.power_supply, "")
            .into_iter()
            .find(|dir| {
                read_sysfs_file(&dir.join("type"))
                    .map(|t| t == "Battery")
                    .unwrap_or(false)
            });
        let Some(dir) = battery else {
            tracing::debug!("no battery found");
            return BatteryStatus::unknown();
        };

        let charge_percent = read_sysfs_file(&dir.join("capacity"))
            .ok()
            .and_then(|c| c.parse::<u8>().ok())
            .map(|c| c.min(100));
        let state = read_sysfs_file(&dir.join("status"))
            .ok()
            .filter(|s| !s.is_empty());
        BatteryStatus {
            charge_percent,
            state,
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Point-in-time resource snapshot of the target process.
//!
//! A sampling window owns exactly two of these (start and end). Neither is
//! mutated after capture; the disk fields are only populated on the end
//! snapshot, since a rate read at the start of the window is meaningless.

use crate::process::ProcessSample;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ResourceSnapshot {
    /// Cumulative processor time consumed since process start.
    pub cpu_time: Duration,
    /// Resident set size in bytes.
    pub resident_memory_bytes: u64,
    /// Process disk throughput over the window, if readable.
    pub disk_bytes_per_second: Option<f64>,
    /// Requests in flight across all disks, if readable.
    pub disk_queue_length: Option<f64>,
    /// Monotonic capture instant, used for window arithmetic.
    #[serde(skip)]
    pub taken_at: Instant,
    /// Unix timestamp in milliseconds when the snapshot was taken.
    pub timestamp_ms: u64,
}

impl ResourceSnapshot {
    /// Builds a snapshot from a process sample captured at `taken_at`.
    pub fn new(sample: ProcessSample, taken_at: Instant) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            cpu_time: sample.cpu_time,
            resident_memory_bytes: sample.resident_memory_bytes,
            disk_bytes_per_second: None,
            disk_queue_length: None,
            taken_at,
            timestamp_ms,
        }
    }

    /// Attaches the end-of-window disk readings.
    pub fn with_disk(mut self, bytes_per_second: Option<f64>, queue_length: Option<f64>) -> Self {
        self.disk_bytes_per_second = bytes_per_second;
        self.disk_queue_length = queue_length;
        self
    }

    /// Resident memory in mebibytes.
    pub fn memory_mb(&self) -> f64 {
        self.resident_memory_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Disk throughput in KiB/s.
    pub fn disk_kb_per_second(&self) -> Option<f64> {
        self.disk_bytes_per_second.map(|b| b / 1024.0)
    }

    /// Time between `earlier` and this snapshot (zero if out of order).
    pub fn elapsed_since(&self, earlier: &ResourceSnapshot) -> Duration {
        self.taken_at.saturating_duration_since(earlier.taken_at)
    }
}

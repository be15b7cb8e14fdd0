// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Process identity, listing, and CPU/memory snapshots.
//!
//! Backed by `sysinfo`, which reads `/proc/<pid>` on Linux and the native
//! process APIs elsewhere. Reading a process never signals or otherwise
//! touches it, so [`ProcessReader::capture`] may be called any number of
//! times.

use crate::MonitorError;
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// A target process, resolved once from the live process table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProcessHandle {
    /// Numeric process identifier.
    pub pid: u32,
    /// Display name (executable name).
    pub name: String,
    /// Process start time in seconds since the epoch. Used to tell the
    /// original process apart from a later one that reused its pid.
    pub start_time: u64,
}

/// Cumulative CPU time and resident memory of a process at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSample {
    /// Processor time consumed since the process started (user + system).
    pub cpu_time: Duration,
    /// Resident set size in bytes.
    pub resident_memory_bytes: u64,
}

/// One row of the live process table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProcessEntry {
    pub name: String,
    pub pid: u32,
}

/// Reads a single process's cumulative counters.
pub trait ProcessReader: Send {
    /// Resolves `pid` to a live process.
    fn resolve(&mut self, pid: u32) -> Result<ProcessHandle, MonitorError>;

    /// Captures the current CPU time and resident memory of `handle`.
    ///
    /// Fails with [`MonitorError::NotFound`] if the process has exited.
    fn capture(&mut self, handle: &ProcessHandle) -> Result<ProcessSample, MonitorError>;
}

/// [`ProcessReader`] backed by a private `sysinfo::System`.
pub struct SysinfoProcessReader {
    system: System,
}

impl SysinfoProcessReader {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    fn refresh(&mut self, pid: Pid, kind: ProcessRefreshKind) {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, kind);
    }
}

impl Default for SysinfoProcessReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessReader for SysinfoProcessReader {
    fn resolve(&mut self, pid: u32) -> Result<ProcessHandle, MonitorError> {
        let sys_pid = Pid::from_u32(pid);
        self.refresh(sys_pid, ProcessRefreshKind::nothing());
        let process = live_process(&self.system, sys_pid).ok_or(MonitorError::NotFound { pid })?;
        let handle = ProcessHandle {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            start_time: process.start_time(),
        };
        tracing::debug!(pid, name = %handle.name, "resolved target process");
        Ok(handle)
    }

    fn capture(&mut self, handle: &ProcessHandle) -> Result<ProcessSample, MonitorError> {
        let sys_pid = Pid::from_u32(handle.pid);
        self.refresh(sys_pid, ProcessRefreshKind::nothing().with_cpu().with_memory());
        let process = same_process(&self.system, handle)?;
        Ok(ProcessSample {
            cpu_time: Duration::from_millis(process.accumulated_cpu_time()),
            resident_memory_bytes: process.memory(),
        })
    }
}

/// Looks up `pid`, treating zombie and dead entries as gone.
fn live_process(system: &System, pid: Pid) -> Option<&Process> {
    system
        .process(pid)
        .filter(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

/// Looks up the process behind `handle`, rejecting a recycled pid.
pub(crate) fn same_process<'a>(
    system: &'a System,
    handle: &ProcessHandle,
) -> Result<&'a Process, MonitorError> {
    live_process(system, Pid::from_u32(handle.pid))
        .filter(|p| p.start_time() == handle.start_time)
        .ok_or(MonitorError::NotFound { pid: handle.pid })
}

/// Lists live processes ordered by name (case-insensitive), then pid.
pub fn list_processes() -> Vec<ProcessEntry> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    let mut entries: Vec<ProcessEntry> = system
        .processes()
        .iter()
        .filter(|(_, p)| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .map(|(pid, p)| ProcessEntry {
            name: p.name().to_string_lossy().into_owned(),
            pid: pid.as_u32(),
        })
        .collect();
    sort_entries(&mut entries);
    entries
}

fn sort_entries(entries: &mut [ProcessEntry]) {
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.pid.cmp(&b.pid))
    });
}

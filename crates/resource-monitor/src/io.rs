// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-process disk byte rate and system-wide disk queue depth.
//!
//! Rate counters report an average since the previous read. The very first
//! read has no previous read to compare against and yields the total since
//! process start, so a [`DiskCounter`] must be primed before the sampling
//! window opens; only reads taken after priming are meaningful.
//!
//! Queue depth is the number of requests currently in flight across all
//! whole block devices, read from `/proc/diskstats`.

use crate::process::{same_process, ProcessHandle};
use crate::sysfs::read_sysfs_file;
use crate::MonitorError;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const PROC_ROOT: &str = "/proc";
const DISKSTATS_PATH: &str = "/proc/diskstats";
const BLOCK_DIR: &str = "/sys/block";

/// Column of "I/Os currently in progress" in `/proc/diskstats`.
const IN_FLIGHT_FIELD: usize = 11;

/// Virtual block devices that never represent physical storage.
const VIRTUAL_PREFIXES: [&str; 3] = ["loop", "ram", "zram"];

/// A primed per-process disk byte counter.
#[derive(Debug, Clone)]
pub struct DiskCounter {
    handle: ProcessHandle,
    last_read: Instant,
}

impl DiskCounter {
    /// Creates a counter whose next rate is measured from `last_read`.
    pub fn new(handle: ProcessHandle, last_read: Instant) -> Self {
        Self { handle, last_read }
    }

    /// The process this counter tracks.
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Instant of the previous read (the priming read, initially).
    pub fn last_read(&self) -> Instant {
        self.last_read
    }
}

/// Reads disk throughput counters.
pub trait IoCounterReader: Send {
    /// Takes and discards the first rate sample for `handle`.
    fn prime_disk_counter(&mut self, handle: &ProcessHandle) -> Result<DiskCounter, MonitorError>;

    /// Returns the process's disk bytes/sec since the previous read of `counter`.
    fn read_disk_rate(&mut self, counter: &mut DiskCounter) -> Result<f64, MonitorError>;

    /// Returns the number of I/O requests in flight across all disks.
    fn read_queue_depth(&mut self) -> Result<f64, MonitorError>;
}

/// [`IoCounterReader`] backed by `sysinfo` process disk usage and
/// `/proc/diskstats`.
pub struct SysinfoIoReader {
    system: System,
    proc_root: PathBuf,
    diskstats: PathBuf,
    block_dir: PathBuf,
}

impl SysinfoIoReader {
    pub fn new() -> Self {
        Self::with_paths(DISKSTATS_PATH, BLOCK_DIR)
    }

    /// Reads queue depth from alternative diskstats/block paths (for testing).
    pub fn with_paths(diskstats: impl Into<PathBuf>, block_dir: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            proc_root: PathBuf::from(PROC_ROOT),
            diskstats: diskstats.into(),
            block_dir: block_dir.into(),
        }
    }

    /// Looks for `<pid>/io` under an alternative procfs root (for testing).
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }

    /// Refreshes disk usage for `handle` and returns bytes read+written
    /// since the previous refresh.
    fn refresh_bytes(&mut self, handle: &ProcessHandle) -> Result<u64, MonitorError> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[Pid::from_u32(handle.pid)]),
            true,
            ProcessRefreshKind::nothing().with_disk_usage(),
        );
        let usage = same_process(&self.system, handle)?.disk_usage();
        Ok(usage.read_bytes + usage.written_bytes)
    }
}

impl Default for SysinfoIoReader {
    fn default() -> Self {
        Self::new()
    }
}

impl IoCounterReader for SysinfoIoReader {
    fn prime_disk_counter(&mut self, handle: &ProcessHandle) -> Result<DiskCounter, MonitorError> {
        if cfg!(target_os = "linux") {
            check_io_access(&self.proc_root, handle.pid)?;
        }
        let discarded = self.refresh_bytes(handle)?;
        tracing::debug!(pid = handle.pid, discarded, "primed disk counter");
        Ok(DiskCounter::new(handle.clone(), Instant::now()))
    }

    fn read_disk_rate(&mut self, counter: &mut DiskCounter) -> Result<f64, MonitorError> {
        let bytes = self.refresh_bytes(&counter.handle)?;
        let now = Instant::now();
        let secs = now.duration_since(counter.last_read).as_secs_f64();
        counter.last_read = now;
        if secs <= 0.0 {
            return Ok(0.0);
        }
        Ok(bytes as f64 / secs)
    }

    fn read_queue_depth(&mut self) -> Result<f64, MonitorError> {
        let content = read_sysfs_file(&self.diskstats)?;
        let block_dir = self.block_dir.clone();
        parse_in_flight(&content, |name| is_whole_disk(&block_dir, name)).ok_or_else(|| {
            MonitorError::ParseError {
                path: self.diskstats.display().to_string(),
                detail: "no whole-disk entries found".to_string(),
            }
        })
    }
}

/// Without read access to `/proc/<pid>/io` the kernel hides the counters
/// and sysinfo silently reports zero, so check it up front.
fn check_io_access(proc_root: &Path, pid: u32) -> Result<(), MonitorError> {
    let path = proc_root.join(pid.to_string()).join("io");
    match std::fs::File::open(&path) {
        Ok(_) => Ok(()),
        Err(e) => {
            let alive = proc_root.join(pid.to_string()).is_dir();
            Err(io_access_error(&path, pid, e, alive))
        }
    }
}

/// Maps a failed open of `/proc/<pid>/io`. Only a vanished `/proc/<pid>`
/// means the process is gone; a missing `io` file on a live process is a
/// kernel built without task I/O accounting.
fn io_access_error(path: &Path, pid: u32, error: std::io::Error, alive: bool) -> MonitorError {
    match error.kind() {
        std::io::ErrorKind::PermissionDenied => MonitorError::unavailable(
            "disk I/O counter",
            format!("no permission to read {}", path.display()),
        ),
        std::io::ErrorKind::NotFound if !alive => MonitorError::NotFound { pid },
        std::io::ErrorKind::NotFound => MonitorError::unavailable(
            "disk I/O counter",
            format!("{} missing, task I/O accounting disabled", path.display()),
        ),
        _ => MonitorError::ReadError {
            path: path.display().to_string(),
            source: error,
        },
    }
}

/// `/sys/block` spells `/` in device names as `!`.
fn is_whole_disk(block_dir: &Path, name: &str) -> bool {
    block_dir.join(name.replace('/', "!")).exists()
}

/// Sums in-flight requests over whole physical disks in diskstats content.
fn parse_in_flight(content: &str, is_whole_disk: impl Fn(&str) -> bool) -> Option<f64> {
    let mut total = 0u64;
    let mut seen = false;
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= IN_FLIGHT_FIELD {
            continue;
        }
        let name = fields[2];
        if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) || !is_whole_disk(name) {
            continue;
        }
        if let Ok(in_flight) = fields[IN_FLIGHT_FIELD].parse::<u64>() {
            total += in_flight;
            seen = true;
        }
    }
    seen.then_some(total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessReader, SysinfoProcessReader};
    use crate::sysfs::testing::{fixture_root, write_file};

    const SAMPLE_DISKSTATS: &str = "\
   7       0 loop0 52 0 2124 11 0 0 0 0 3 24 11 0 0 0 0
 259       0 nvme0n1 183443 61297 12285046 38470 402561 312498 20446128 488735 2 322916 531015 0 0 0 0
 259       1 nvme0n1p1 320 1152 14638 91 2 0 2 4 0 136 95 0 0 0 0
 259       2 nvme0n1p2 183038 60145 12266056 38361 402559 312498 20446126 488731 2 322844 527092 0 0 0 0
   8       0 sda 9123 11 812233 4012 1204 88 92211 3021 3 7001 7033 0 0 0 0
 252       0 zram0 200 0 1600 1 100 0 800 0 0 4 1 0 0 0 0
";

    fn whole_disks(name: &str) -> bool {
        matches!(name, "nvme0n1" | "sda" | "loop0" | "zram0")
    }

    #[test]
    fn test_parse_in_flight_whole_disks_only() {
        let depth = parse_in_flight(SAMPLE_DISKSTATS, whole_disks).unwrap();
        assert!((depth - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_in_flight_no_disks() {
        assert_eq!(parse_in_flight(SAMPLE_DISKSTATS, |_| false), None);
        assert_eq!(parse_in_flight("", |_| true), None);
    }

    #[test]
    fn test_queue_depth_from_fixture() {
        let root = fixture_root("io_queue");
        write_file(&root, "diskstats", SAMPLE_DISKSTATS);
        for disk in ["nvme0n1", "sda"] {
            std::fs::create_dir_all(root.join("block").join(disk)).unwrap();
        }
        let mut reader = SysinfoIoReader::with_paths(root.join("diskstats"), root.join("block"));
        let depth = reader.read_queue_depth().unwrap();
        assert!((depth - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_queue_depth_missing_diskstats() {
        let mut reader = SysinfoIoReader::with_paths("/nonexistent/diskstats", "/nonexistent/block");
        let err = reader.read_queue_depth().unwrap_err();
        assert!(matches!(err, MonitorError::Unavailable { .. }));
    }

    #[test]
    fn test_io_access_present() {
        let root = fixture_root("io_access_ok");
        write_file(&root, "4242/io", "rchar: 0\nwchar: 0\n");
        assert!(check_io_access(&root, 4242).is_ok());
    }

    #[test]
    fn test_io_access_missing_file_on_live_process_is_unavailable() {
        let root = fixture_root("io_access_no_accounting");
        write_file(&root, "4242/stat", "4242 (worker) S\n");
        let err = check_io_access(&root, 4242).unwrap_err();
        assert!(matches!(err, MonitorError::Unavailable { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_io_access_missing_process_is_not_found() {
        let root = fixture_root("io_access_gone");
        std::fs::create_dir_all(&root).unwrap();
        let err = check_io_access(&root, 4242).unwrap_err();
        assert!(matches!(err, MonitorError::NotFound { pid: 4242 }));
    }

    #[test]
    fn test_io_access_permission_denied_is_unavailable() {
        let path = Path::new("/proc/4242/io");
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err = io_access_error(path, 4242, denied, true);
        assert!(matches!(err, MonitorError::Unavailable { .. }));
    }

    #[test]
    fn test_prime_without_io_accounting_is_unavailable() {
        let root = fixture_root("io_prime_no_accounting");
        let me = std::process::id();
        write_file(&root, &format!("{me}/stat"), "\n");
        let handle = SysinfoProcessReader::new().resolve(me).unwrap();
        let mut reader = SysinfoIoReader::new().with_proc_root(&root);
        let result = reader.prime_disk_counter(&handle);
        if cfg!(target_os = "linux") {
            assert!(matches!(result, Err(MonitorError::Unavailable { .. })));
        }
    }

    #[test]
    fn test_prime_then_read_self() {
        let handle = SysinfoProcessReader::new()
            .resolve(std::process::id())
            .unwrap();
        let mut reader = SysinfoIoReader::new();
        let mut counter = reader.prime_disk_counter(&handle).unwrap();
        let rate = reader.read_disk_rate(&mut counter).unwrap();
        assert!(rate >= 0.0);
    }
}

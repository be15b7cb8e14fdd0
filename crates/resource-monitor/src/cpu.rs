// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Logical core count and per-core clock speed.
//!
//! Reads CPU state from:
//! - `/sys/devices/system/cpu/online`: online core range (e.g. `0-7`).
//! - `/sys/devices/system/cpu/cpuN/cpufreq/scaling_cur_freq`: clock in kHz.

use crate::sysfs::{read_sysfs_file, read_sysfs_i64, sorted_entries};
use crate::MonitorError;
use std::path::Path;

/// Base sysfs path for CPU information.
pub(crate) const CPU_BASE: &str = "/sys/devices/system/cpu";

/// Returns the number of logical cores the estimator divides CPU time by.
///
/// Sources, first match wins: the `online` range list, the number of
/// `cpuN` directories, then `available_parallelism()`. Never less than 1.
pub fn logical_core_count() -> u32 {
    let base = Path::new(CPU_BASE);
    let count = online_core_count(base)
        .or_else(|| core_dir_count(base))
        .or_else(|| {
            std::thread::available_parallelism()
                .ok()
                .and_then(|n| u32::try_from(n.get()).ok())
        });
    match count {
        Some(n) => n.max(1),
        None => {
            tracing::warn!("cannot determine logical core count, assuming 1");
            1
        }
    }
}

fn online_core_count(base: &Path) -> Option<u32> {
    read_sysfs_file(&base.join("online"))
        .ok()
        .and_then(|list| count_cpu_list(&list))
}

fn core_dir_count(base: &Path) -> Option<u32> {
    let cores = sorted_entries(base, "cpu")
        .iter()
        .filter_map(|p| p.file_name()?.to_str()?.strip_prefix("cpu"))
        .filter(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        .count();
    u32::try_from(cores).ok().filter(|&n| n > 0)
}

/// Counts the CPUs in a kernel cpu list such as `0-3,8,10-11`.
///
/// Returns `None` for an empty or malformed list, including descending ranges.
fn count_cpu_list(list: &str) -> Option<u32> {
    let total = list
        .trim()
        .split(',')
        .map(|item| match item.trim().split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.trim().parse().ok()?;
                let hi: u32 = hi.trim().parse().ok()?;
                hi.checked_sub(lo).map(|span| span + 1)
            }
            None => item.trim().parse::<u32>().ok().map(|_| 1),
        })
        .sum::<Option<u32>>()?;
    (total > 0).then_some(total)
}

/// Reads a cpufreq value (kHz) as MHz.
pub(crate) fn read_freq_mhz(path: &Path) -> Result<f32, MonitorError> {
    let khz = read_sysfs_i64(path)?;
    Ok(khz as f32 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::testing::{fixture_root, write_file};

    #[test]
    fn test_cpu_list_ranges_and_singles() {
        assert_eq!(count_cpu_list("0-15"), Some(16));
        assert_eq!(count_cpu_list("3"), Some(1));
        assert_eq!(count_cpu_list("0-3,8,10-11\n"), Some(7));
    }

    #[test]
    fn test_cpu_list_rejects_garbage() {
        assert_eq!(count_cpu_list(""), None);
        assert_eq!(count_cpu_list("x-y"), None);
        assert_eq!(count_cpu_list("7-4"), None);
        assert_eq!(count_cpu_list("0,,2"), None);
    }

    #[test]
    fn test_online_list_wins_over_dirs() {
        let root = fixture_root("cpu_online");
        write_file(&root, "online", "0-11\n");
        std::fs::create_dir_all(root.join("cpu0")).unwrap();
        assert_eq!(online_core_count(&root), Some(12));
    }

    #[test]
    fn test_counts_numbered_cpu_dirs_only() {
        let root = fixture_root("cpu_dirs");
        for name in ["cpu0", "cpu1", "cpu2", "cpufreq", "cpuidle"] {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
        assert_eq!(online_core_count(&root), None);
        assert_eq!(core_dir_count(&root), Some(3));
    }

    #[test]
    fn test_logical_core_count_at_least_one() {
        assert!(logical_core_count() >= 1);
    }

    #[test]
    fn test_freq_khz_to_mhz() {
        let root = fixture_root("cpu_freq");
        write_file(&root, "scaling_cur_freq", "2400000\n");
        let mhz = read_freq_mhz(&root.join("scaling_cur_freq")).unwrap();
        assert!((mhz - 2400.0).abs() < 0.001);
    }
}

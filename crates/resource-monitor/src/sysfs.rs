// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Small helpers for reading sysfs/procfs attribute files.

use crate::MonitorError;
use std::path::{Path, PathBuf};

/// Reads a sysfs/procfs file and returns its trimmed content.
pub(crate) fn read_sysfs_file(path: &Path) -> Result<String, MonitorError> {
    if !path.exists() {
        return Err(MonitorError::unavailable(
            path.display().to_string(),
            "path does not exist",
        ));
    }
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })
}

/// Reads a sysfs attribute holding a single integer.
pub(crate) fn read_sysfs_i64(path: &Path) -> Result<i64, MonitorError> {
    let content = read_sysfs_file(path)?;
    content.parse::<i64>().map_err(|_| MonitorError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected integer value, got '{content}'"),
    })
}

/// Lists the entries of `dir` whose file name starts with `prefix`,
/// sorted by name so repeated enumerations visit them in the same order.
///
/// A missing directory yields an empty list.
pub(crate) fn sorted_entries(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect();
    paths.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));
    paths
}

/// Sort key that orders `hwmon2` before `hwmon10`.
fn natural_key(path: &Path) -> (String, u64) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits_at = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(name.len());
    let number = name[digits_at..].parse().unwrap_or(0);
    (name[..digits_at].to_string(), number)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    /// Creates a fresh fixture directory under the system temp dir.
    pub(crate) fn fixture_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("energy_sampler_test")
            .join(format!("{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes `content` to `root/rel`, creating parent directories.
    pub(crate) fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_read_trims() {
        let root = fixture_root("sysfs_trim");
        write_file(&root, "value", "  42\n");
        assert_eq!(read_sysfs_file(&root.join("value")).unwrap(), "42");
        assert_eq!(read_sysfs_i64(&root.join("value")).unwrap(), 42);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let result = read_sysfs_file(Path::new("/nonexistent/sysfs/attr"));
        assert!(matches!(result, Err(MonitorError::Unavailable { .. })));
    }

    #[test]
    fn test_invalid_integer() {
        let root = fixture_root("sysfs_invalid");
        write_file(&root, "value", "hot");
        let result = read_sysfs_i64(&root.join("value"));
        assert!(matches!(result, Err(MonitorError::ParseError { .. })));
    }

    #[test]
    fn test_sorted_entries_natural_order() {
        let root = fixture_root("sysfs_sorted");
        for name in ["hwmon10", "hwmon2", "hwmon0", "other"] {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
        let names: Vec<String> = sorted_entries(&root, "hwmon")
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["hwmon0", "hwmon2", "hwmon10"]);
    }

    #[test]
    fn test_sorted_entries_missing_dir() {
        assert!(sorted_entries(Path::new("/nonexistent/dir"), "x").is_empty());
    }
}

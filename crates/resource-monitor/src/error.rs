// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for resource monitoring.

/// Errors that can occur when reading process, disk, or hardware state.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The process identifier no longer resolves to a live process.
    #[error("process {pid} not found (it may have exited)")]
    NotFound { pid: u32 },

    /// A counter, sensor, or backend cannot be read on this host.
    #[error("{what} unavailable: {detail}")]
    Unavailable { what: String, detail: String },

    /// Failed to read a sysfs or procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse a numeric value from a system file.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },
}

impl MonitorError {
    /// Shorthand for [`MonitorError::Unavailable`].
    pub fn unavailable(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unavailable {
            what: what.into(),
            detail: detail.into(),
        }
    }

    /// Returns `true` if the target process has vanished.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

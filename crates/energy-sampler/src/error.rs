// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for sampling sessions.

use resource_monitor::MonitorError;

/// Errors that end a sampling session without a report.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    /// The configuration was rejected before any counter was touched.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A reader failed fatally (the target process vanished).
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl SamplingError {
    /// Returns `true` if the session failed because the process exited.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Monitor(e) if e.is_not_found())
    }
}

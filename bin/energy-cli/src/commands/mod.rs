// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared output helpers.

pub mod list;
pub mod sample;
pub mod sensors;

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Formats an optional value with `decimals` places, or `N/A`.
pub(crate) fn or_na<T: Into<f64>>(value: Option<T>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v.into()),
        None => "N/A".to_string(),
    }
}

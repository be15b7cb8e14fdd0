// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # energy-probe
//!
//! Command-line interface for the process energy sampler.
//!
//! ## Usage
//! ```bash
//! # Pick a target
//! energy-probe list --filter firefox
//!
//! # Sample it for 30 seconds (Ctrl-C ends the window early)
//! energy-probe sample --pid 4242 --duration 30
//!
//! # Current sensor and battery readings
//! energy-probe sensors
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "energy-probe",
    about = "Estimate the energy use and CO2 footprint of a running process",
    version,
    author
)]
struct Cli {
    /// Path to a TOML sampling configuration (CLI arguments override it).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List running processes, sorted by name.
    List {
        /// Only show processes whose name contains this text (case-insensitive).
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Sample one process and print an energy report.
    Sample {
        /// Process id to sample.
        #[arg(short, long)]
        pid: Option<u32>,

        /// Sampling window in seconds (minimum 10).
        #[arg(short, long)]
        duration: Option<u64>,

        /// Assumed power draw at full CPU load, in watts.
        #[arg(long)]
        watts: Option<f64>,

        /// Grid emission factor in g CO2e per kWh.
        #[arg(long)]
        factor: Option<f64>,
    },

    /// Display current hardware sensor and battery readings.
    Sensors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::List { filter } => commands::list::execute(filter.as_deref(), cli.json),
        Commands::Sample {
            pid,
            duration,
            watts,
            factor,
        } => {
            let overrides = commands::sample::Overrides {
                pid,
                duration,
                watts,
                factor,
            };
            commands::sample::execute(cli.config.as_deref(), overrides, cli.json).await
        }
        Commands::Sensors => commands::sensors::execute(cli.json),
    }
}

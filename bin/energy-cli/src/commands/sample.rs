// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `energy-probe sample` command: run one sampling session.
//!
//! ```text
//! SamplingSession<Idle> → prime → capture_start → wait (Ctrl-C) → finish
//! ```

use super::{or_na, sensors::label};
use anyhow::Context;
use energy_sampler::{EnergyReport, Probes, SamplingConfig, SamplingSession};
use resource_monitor::SensorKind;
use std::fmt::Write;
use std::path::Path;

/// Window used when neither `--duration` nor a config file gives one.
const DEFAULT_DURATION_SECS: u64 = 30;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub pid: Option<u32>,
    pub duration: Option<u64>,
    pub watts: Option<f64>,
    pub factor: Option<f64>,
}

pub async fn execute(
    config_path: Option<&Path>,
    overrides: Overrides,
    json: bool,
) -> anyhow::Result<()> {
    let config = build_config(config_path, overrides)?;
    let pid = config.target_pid;

    let primed = SamplingSession::new(config, Probes::platform())?
        .prime()
        .with_context(|| format!("cannot sample process {pid}"))?;
    eprintln!(
        "Monitoring {} (PID {pid}) for {}s. Press Ctrl-C to stop early.",
        primed.process().name,
        primed.config().duration_secs
    );

    let started = primed.capture_start()?;
    let cancel = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    let report = started
        .wait(cancel)
        .await
        .finish()
        .with_context(|| format!("sampling process {pid} failed"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mut text = String::new();
        render(&mut text, &report)?;
        print!("{text}");
    }
    Ok(())
}

/// Loads the config file if given, then applies command-line overrides.
fn build_config(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<SamplingConfig> {
    let mut config = match path {
        Some(path) => SamplingConfig::from_file(path)?,
        None => {
            let pid = overrides
                .pid
                .ok_or_else(|| anyhow::anyhow!("--pid is required when no --config is given"))?;
            SamplingConfig::new(pid, DEFAULT_DURATION_SECS)
        }
    };
    if let Some(pid) = overrides.pid {
        config.target_pid = pid;
    }
    if let Some(duration) = overrides.duration {
        config.duration_secs = duration;
    }
    if let Some(watts) = overrides.watts {
        config.assumed_draw_watts = watts;
    }
    if let Some(factor) = overrides.factor {
        config.grid_emission_factor = factor;
    }
    Ok(config)
}

/// Writes the text report.
fn render(out: &mut impl Write, report: &EnergyReport) -> std::fmt::Result {
    let end = report.end();
    let sensor = |kind: SensorKind| or_na(report.sensor(kind), 1);

    writeln!(out, "\n===== Energy Report =====")?;
    writeln!(
        out,
        "Process           : {} (PID {})",
        report.process().name,
        report.process().pid
    )?;
    if report.cancelled() {
        writeln!(
            out,
            "Window            : {:.1}s of {}s (cancelled)",
            report.elapsed().as_secs_f64(),
            report.requested_duration().as_secs()
        )?;
    } else {
        writeln!(out, "Window            : {:.1}s", report.elapsed().as_secs_f64())?;
    }
    writeln!(out, "CPU Usage         : {:.2}%", report.cpu_utilization_percent())?;
    for kind in [SensorKind::CpuTemperature, SensorKind::CpuClock] {
        writeln!(out, "{:<18}: {} {}", label(kind), sensor(kind), kind.unit())?;
    }
    writeln!(out, "Memory Usage      : {:.2} MB", end.memory_mb())?;
    writeln!(out, "Disk I/O          : {} KB/sec", or_na(end.disk_kb_per_second(), 2))?;
    writeln!(out, "Disk Queue Len    : {}", or_na(end.disk_queue_length, 2))?;
    for kind in [SensorKind::GpuTemperature, SensorKind::GpuLoad] {
        writeln!(out, "{:<18}: {} {}", label(kind), sensor(kind), kind.unit())?;
    }
    writeln!(out, "Battery Status    : {}", report.battery())?;
    writeln!(out, "Energy (kWh)      : {:.6}", report.energy_kwh())?;
    writeln!(out, "CO₂ Emissions     : {:.2} g", report.co2_grams())?;
    writeln!(out, "============================")
}

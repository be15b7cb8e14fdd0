// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The sampling session with a type-state pipeline.
//!
//! ```text
//! SamplingSession<Idle>
//!     │  .prime()           resolve pid, open sensors, discard first disk rate
//!     ▼
//! SamplingSession<Primed>
//!     │  .capture_start()   start snapshot
//!     ▼
//! SamplingSession<Started>
//!     │  .wait(cancel)      sleep for the window, or until `cancel` resolves
//!     ▼
//! SamplingSession<Elapsed>
//!     │  .finish()          end snapshot, sensors, battery, estimate
//!     ▼
//!   EnergyReport
//! ```
//!
//! Any transition may fail instead (the `Failed` state): the error is
//! returned and the consumed session is dropped, which closes the hardware
//! sensor handle. Only a vanished process is fatal; unreadable counters and
//! sensors are logged and reported as unknown.

use crate::report::{EnergyReport, ReportInputs};
use crate::{SamplingConfig, SamplingError};
use resource_monitor::{
    logical_core_count, BatteryReader, DiskCounter, HardwareSensorReader, IoCounterReader,
    MonitorError, ProcessHandle, ProcessReader, ResourceSnapshot, SensorHandle,
    SysfsBatteryReader, SysinfoIoReader, SysinfoProcessReader,
};
use std::future::Future;
use std::time::Instant;

/// Session lifecycle, as recorded in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    PrimingCounters,
    CapturingStart,
    Waiting,
    CapturingEnd,
    Reporting,
    Done,
    Failed,
}

// ── Readers ────────────────────────────────────────────────────

/// The readers a session samples through.
pub struct Probes {
    pub process: Box<dyn ProcessReader>,
    pub io: Box<dyn IoCounterReader>,
    pub hardware: HardwareSensorReader,
    pub battery: Box<dyn BatteryReader>,
    /// Divisor for CPU utilisation.
    pub logical_cores: u32,
}

impl Probes {
    /// Platform readers for this host.
    pub fn platform() -> Self {
        Self {
            process: Box::new(SysinfoProcessReader::new()),
            io: Box::new(SysinfoIoReader::new()),
            hardware: HardwareSensorReader::platform(),
            battery: Box::new(SysfsBatteryReader::new()),
            logical_cores: logical_core_count(),
        }
    }
}

// ── Type-state markers ─────────────────────────────────────────

/// Configuration validated; nothing opened yet.
#[derive(Debug)]
pub struct Idle;

/// Process resolved, sensors opened, disk counter primed.
#[derive(Debug)]
pub struct Primed {
    process: ProcessHandle,
    disk: Option<DiskCounter>,
    sensors: Option<SensorHandle>,
}

/// Start snapshot taken; the window is open.
#[derive(Debug)]
pub struct Started {
    primed: Primed,
    start: ResourceSnapshot,
}

/// The window has closed (elapsed or cancelled).
#[derive(Debug)]
pub struct Elapsed {
    started: Started,
    cancelled: bool,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::Primed {}
    impl Sealed for super::Started {}
    impl Sealed for super::Elapsed {}
}

/// Sealed trait for session stages. Only the four stages above implement it:
///
/// ```compile_fail
/// use energy_sampler::{SessionStage, SessionState};
///
/// #[derive(Debug)]
/// struct Skipped;
///
/// impl SessionStage for Skipped {
///     const STATE: SessionState = SessionState::Done;
/// }
/// ```
pub trait SessionStage: sealed::Sealed + std::fmt::Debug {
    /// The last state this stage completed.
    const STATE: SessionState;
}
impl SessionStage for Idle {
    const STATE: SessionState = SessionState::Idle;
}
impl SessionStage for Primed {
    const STATE: SessionState = SessionState::PrimingCounters;
}
impl SessionStage for Started {
    const STATE: SessionState = SessionState::CapturingStart;
}
impl SessionStage for Elapsed {
    const STATE: SessionState = SessionState::Waiting;
}

// ── Session ────────────────────────────────────────────────────

/// One sampling run over one process.
///
/// # Example
/// ```no_run
/// use energy_sampler::{Probes, SamplingConfig, SamplingSession};
///
/// # async fn example() -> Result<(), energy_sampler::SamplingError> {
/// let started = SamplingSession::new(SamplingConfig::new(4242, 30), Probes::platform())?
///     .prime()?
///     .capture_start()?;
/// let report = started.wait(std::future::pending()).await.finish()?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub struct SamplingSession<S: SessionStage = Idle> {
    config: SamplingConfig,
    probes: Probes,
    stage: S,
}

impl<S: SessionStage> SamplingSession<S> {
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// The last state this session completed.
    pub fn state(&self) -> SessionState {
        S::STATE
    }

    /// Moves to the next stage, carrying the current stage's data forward.
    fn advance<T, F>(self, next: SessionState, build: F) -> SamplingSession<T>
    where
        T: SessionStage,
        F: FnOnce(S) -> T,
    {
        tracing::debug!(from = ?S::STATE, to = ?next, pid = self.config.target_pid, "session transition");
        SamplingSession {
            config: self.config,
            probes: self.probes,
            stage: build(self.stage),
        }
    }
}

// ── Idle → Primed ──────────────────────────────────────────────

impl SamplingSession<Idle> {
    /// Validates `config` and creates a session. Nothing is opened or
    /// primed if validation fails.
    pub fn new(config: SamplingConfig, probes: Probes) -> Result<Self, SamplingError> {
        config.validate()?;
        tracing::info!(
            pid = config.target_pid,
            duration_secs = config.duration_secs,
            "sampling session created"
        );
        Ok(Self {
            config,
            probes,
            stage: Idle,
        })
    }

    /// Resolves the target process, opens the sensor backend, and takes
    /// and discards the first disk-rate sample.
    pub fn prime(mut self) -> Result<SamplingSession<Primed>, SamplingError> {
        let stage = SessionState::PrimingCounters;
        let process = self
            .probes
            .process
            .resolve(self.config.target_pid)
            .map_err(|e| failed(stage, e))?;

        let sensors = match self.probes.hardware.open() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("hardware sensors unavailable: {e}");
                None
            }
        };

        let disk = match self.probes.io.prime_disk_counter(&process) {
            Ok(counter) => Some(counter),
            Err(e) if e.is_not_found() => return Err(failed(stage, e)),
            Err(e) => {
                tracing::warn!("disk I/O counter unavailable: {e}");
                None
            }
        };

        tracing::info!(pid = process.pid, name = %process.name, "counters primed");
        Ok(self.advance(stage, |_| Primed {
            process,
            disk,
            sensors,
        }))
    }
}

// ── Primed → Started ───────────────────────────────────────────

impl SamplingSession<Primed> {
    pub fn process(&self) -> &ProcessHandle {
        &self.stage.process
    }

    /// Takes the start snapshot, opening the window.
    pub fn capture_start(mut self) -> Result<SamplingSession<Started>, SamplingError> {
        let stage = SessionState::CapturingStart;
        let sample = self
            .probes
            .process
            .capture(&self.stage.process)
            .map_err(|e| failed(stage, e))?;
        let start = ResourceSnapshot::new(sample, now());
        Ok(self.advance(stage, |primed| Started { primed, start }))
    }
}

// ── Started → Elapsed ──────────────────────────────────────────

impl SamplingSession<Started> {
    pub fn start_snapshot(&self) -> &ResourceSnapshot {
        &self.stage.start
    }

    /// Suspends for the configured window, or until `cancel` resolves.
    ///
    /// Cancellation does not abort the session: the returned session still
    /// captures the end snapshot and closes every resource in `finish()`.
    pub async fn wait<F>(self, cancel: F) -> SamplingSession<Elapsed>
    where
        F: Future<Output = ()>,
    {
        let window = self.config.duration();
        tracing::info!(secs = window.as_secs(), "sampling window open");

        let cancelled = tokio::select! {
            _ = tokio::time::sleep(window) => false,
            _ = cancel => true,
        };
        if cancelled {
            tracing::info!("sampling window cancelled early");
        }

        self.advance(SessionState::Waiting, |started| Elapsed { started, cancelled })
    }
}

// ── Elapsed → Done ─────────────────────────────────────────────

impl SamplingSession<Elapsed> {
    pub fn cancelled(&self) -> bool {
        self.stage.cancelled
    }

    /// Captures the end snapshot, sensors and battery, releases the
    /// sensor backend, and computes the report.
    pub fn finish(self) -> Result<EnergyReport, SamplingError> {
        let SamplingSession {
            config,
            mut probes,
            stage,
        } = self;
        let Elapsed { started, cancelled } = stage;
        let Started { primed, start } = started;
        let Primed {
            process,
            mut disk,
            sensors,
        } = primed;

        tracing::debug!(from = ?SessionState::Waiting, to = ?SessionState::CapturingEnd, "session transition");
        // `sensors` is dropped (and released) if the process is gone.
        let sample = probes
            .process
            .capture(&process)
            .map_err(|e| failed(SessionState::CapturingEnd, e))?;
        let taken_at = now();

        let disk_rate = disk
            .as_mut()
            .and_then(|counter| recover("disk I/O rate", probes.io.read_disk_rate(counter)));
        let queue_depth = recover("disk queue depth", probes.io.read_queue_depth());
        let end = ResourceSnapshot::new(sample, taken_at).with_disk(disk_rate, queue_depth);

        let readings = match sensors {
            Some(mut handle) => {
                let readings = handle.poll();
                handle.close();
                readings
            }
            None => Vec::new(),
        };
        let battery = probes.battery.read_battery();

        tracing::debug!(from = ?SessionState::CapturingEnd, to = ?SessionState::Reporting, "session transition");
        let report = EnergyReport::compute(ReportInputs {
            process,
            start,
            end,
            requested_duration: config.duration(),
            cancelled,
            logical_cores: probes.logical_cores,
            sensors: readings,
            battery,
            params: config.estimator_params(),
        });

        tracing::debug!(from = ?SessionState::Reporting, to = ?SessionState::Done, "session transition");
        tracing::info!("{}", report.summary());
        Ok(report)
    }
}

/// Runs a complete session: prime, capture, wait (cancellable), finish.
pub async fn run<F>(config: SamplingConfig, probes: Probes, cancel: F) -> Result<EnergyReport, SamplingError>
where
    F: Future<Output = ()>,
{
    let started = SamplingSession::new(config, probes)?.prime()?.capture_start()?;
    started.wait(cancel).await.finish()
}

/// Monotonic now, following tokio's clock so paused-time tests see the
/// window they asked for.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn failed(stage: SessionState, error: MonitorError) -> SamplingError {
    tracing::warn!(at = ?stage, state = ?SessionState::Failed, "sampling session failed: {error}");
    SamplingError::from(error)
}

/// Turns a non-fatal reader error into an unknown value.
fn recover<T>(what: &str, result: Result<T, MonitorError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("{what} unavailable: {e}");
            None
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # energy-sampler
//!
//! Samples one process over a fixed window and estimates the energy and
//! CO2 its CPU time represents.
//!
//! The sampler takes:
//! - A [`SamplingConfig`] (target pid, window ≥ 10 s, estimator inputs).
//! - A set of [`Probes`] from `resource-monitor` (or fakes).
//!
//! And produces one immutable [`EnergyReport`] with the start/end
//! snapshots, disk readings, hardware sensors, battery state, and the
//! derived utilisation, kWh, and grams of CO2e.
//!
//! # Type-State Pipeline
//! ```text
//! SamplingSession<Idle> → <Primed> → <Started> → <Elapsed> → EnergyReport
//! ```
//! Transitions are compile-time checked.
//!
//! # Async Waiting
//! The window is a `tokio` sleep raced against a caller-supplied
//! cancellation future. Cancelling closes the window early; the end
//! snapshot is still captured and every resource is released.

mod config;
mod error;
pub mod estimator;
mod report;
mod session;

pub use config::{SamplingConfig, MIN_DURATION_SECS};
pub use error::SamplingError;
pub use estimator::{EnergyEstimate, EstimatorParams};
pub use report::EnergyReport;
pub use session::{
    run, Elapsed, Idle, Primed, Probes, SamplingSession, SessionStage, SessionState, Started,
};

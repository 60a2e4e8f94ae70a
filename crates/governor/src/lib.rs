// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # governor
//!
//! Watches CPU, memory and GPU health in the background and tells the rest
//! of the process how hard it may push: whether to throttle, how fast to
//! run, and how much GPU memory it may still reserve.
//!
//! # Key Components
//!
//! - [`classify`] — one ordered rule set for every domain, parameterised by
//!   a [`Thresholds`] implementation ([`SystemThresholds`], [`GpuThresholds`]).
//! - [`MetricsHistory`] — bounded FIFO of snapshots with windowed averages
//!   and trends.
//! - [`CooldownController`] / [`IdleDetector`] — time-based hysteresis on
//!   top of the live classification.
//! - [`SpeedAdvisor`] — state and cooldown to a `[0, 1]` multiplier.
//! - [`CallbackDispatcher`] — fault-isolated event subscriptions.
//! - [`Governor`] — the facade: owns the monitor thread, the per-domain
//!   state and the GPU memory ledgers.
//!
//! # Degradation Policy
//!
//! A domain that cannot be observed is `UNAVAILABLE`. It never throttles
//! and its multiplier is `1.0`: missing telemetry does not block work.
//!
//! # Example
//! ```no_run
//! use governor::{EventType, Governor, GovernorConfig};
//!
//! let governor = Governor::new(GovernorConfig::default()).unwrap();
//! governor.register_callback(EventType::Critical, |event| {
//!     eprintln!("{} is critical", event.domain);
//!     Ok(())
//! });
//! governor.start().unwrap();
//!
//! if governor.should_throttle_processing() {
//!     // back off
//! }
//! let batch = (64.0 * governor.speed_multiplier()) as usize;
//! # let _ = batch;
//! governor.stop();
//! ```

mod callbacks;
mod classifier;
mod clock;
mod config;
mod cooldown;
mod domain;
mod error;
mod governor;
mod history;
mod idle;
mod speed;
mod state;
mod status;
mod thresholds;

pub use callbacks::{
    transition_events, CallbackDispatcher, CallbackId, DispatchReport, EventType, GovernorEvent, HandlerResult,
};
pub use classifier::classify;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigPatch, GovernorConfig, GpuDomainConfig, GpuThresholdsPatch, SystemDomainConfig, SystemThresholdsPatch,
};
pub use cooldown::{CooldownController, CooldownPhase, CooldownState, CooldownTimings};
pub use error::{ConfigError, GovernorError};
pub use governor::{Governor, GovernorBuilder, StopOutcome};
pub use history::{MetricsHistory, TrendDirection, TrendSummary};
pub use idle::IdleDetector;
pub use speed::SpeedAdvisor;
pub use state::ResourceState;
pub use status::{AverageMetrics, DomainStatus, GovernorStatus};
pub use thresholds::{GpuThresholds, SystemThresholds, Thresholds};

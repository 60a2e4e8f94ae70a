// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime state of one governed domain.
//!
//! Each domain owns two locks: one for its history and one for its
//! classification trackers. They are never held together, and neither is
//! held while the metrics source or a callback runs.

use crate::callbacks::{panic_message, transition_events};
use crate::{
    classify, CallbackDispatcher, CooldownController, DomainStatus, EventType, GovernorConfig, GovernorEvent,
    IdleDetector, MetricsHistory, ResourceState, SpeedAdvisor,
};
use memory_ledger::{GpuMemoryLedger, MemoryBudget};
use resource_monitor::{DomainId, MetricsSource, ResourceSnapshot, Sample};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug)]
struct DomainTracker {
    state: ResourceState,
    /// Last state backed by a reading; edge events are taken against it.
    last_available: ResourceState,
    cooldown: CooldownController,
    idle: IdleDetector,
    /// Temperature at or above the throttle bound on the last reading.
    overheated: bool,
    latest: Option<ResourceSnapshot>,
    last_sample_ms: Option<u64>,
    last_failure: Option<String>,
}

pub(crate) struct DomainRuntime {
    id: DomainId,
    source: Box<dyn MetricsSource>,
    history: Mutex<MetricsHistory>,
    tracker: Mutex<DomainTracker>,
    ledger: OnceLock<GpuMemoryLedger>,
    ledger_fraction: f64,
}

impl DomainRuntime {
    pub(crate) fn new(id: DomainId, source: Box<dyn MetricsSource>, config: &GovernorConfig) -> Self {
        let gpu = match &id {
            DomainId::Gpu(index) => config.gpu(*index),
            DomainId::System => None,
        };
        let runtime = Self {
            id,
            source,
            history: Mutex::new(MetricsHistory::new(config.history_capacity)),
            tracker: Mutex::new(DomainTracker {
                state: ResourceState::Unavailable,
                last_available: ResourceState::Unavailable,
                cooldown: CooldownController::new(config.cooldown_timings()),
                idle: IdleDetector::new(config.idle_threshold()),
                overheated: false,
                latest: None,
                last_sample_ms: None,
                last_failure: None,
            }),
            ledger: OnceLock::new(),
            ledger_fraction: gpu.map_or(1.0, |g| g.memory_limit_fraction),
        };
        // A configured total was validated with the config.
        if let Some(Ok(Some(total))) = gpu.map(|g| g.memory_total_budget()) {
            runtime.init_ledger(total);
        }
        runtime
    }

    pub(crate) fn id(&self) -> &DomainId {
        &self.id
    }

    pub(crate) fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Samples, classifies and dispatches events for one tick.
    pub(crate) fn tick(&self, config: &GovernorConfig, now_ms: u64, dispatcher: &CallbackDispatcher) -> ResourceState {
        let sample = panic::catch_unwind(AssertUnwindSafe(|| self.source.sample(&self.id, now_ms)))
            .unwrap_or_else(|payload| Sample::error(format!("metrics source panicked: {}", panic_message(&*payload))));

        let (snapshot, failure) = match sample {
            Sample::Snapshot(mut snap) => {
                snap.domain = self.id.clone();
                (Some(snap), None)
            }
            Sample::Unavailable { reason } => (None, Some((reason, false))),
            Sample::Error { reason } => (None, Some((reason, true))),
        };

        if let Some(snap) = &snapshot {
            self.lock_history().push(snap.clone());
            if let Some(total_mb) = snap.gpu_memory_total_mb.filter(|_| self.id.is_gpu()) {
                if self.ledger.get().is_none() && total_mb > 0 {
                    self.init_ledger(MemoryBudget::from_mb(total_mb));
                }
            }
        }

        let Some(thresholds) = config.thresholds_for(&self.id) else {
            return ResourceState::Unavailable;
        };
        let state = classify(snapshot.as_ref(), thresholds);

        let (previous, baseline, overheat) = {
            let mut t = self.lock_tracker();
            let previous = t.state;
            let baseline = t.last_available;
            let first_tick = t.last_sample_ms.is_none();

            t.cooldown.observe(state, now_ms);
            t.idle.observe(snapshot.as_ref(), thresholds, now_ms);

            let mut overheat = false;
            if let Some(snap) = &snapshot {
                let hot = thresholds.overheating(snap);
                overheat = hot && !t.overheated;
                t.overheated = hot;
            }

            match &failure {
                Some((reason, is_error)) => {
                    if previous != ResourceState::Unavailable || first_tick {
                        warn!(domain = %self.id, source = self.source.name(), reason = %reason, "domain unavailable");
                    } else if *is_error {
                        debug!(domain = %self.id, reason = %reason, "metrics read failed");
                    }
                    t.last_failure = Some(reason.clone());
                }
                None => {
                    t.last_failure = None;
                    t.latest = snapshot.clone();
                }
            }
            if state != ResourceState::Unavailable {
                if baseline != state {
                    info!(domain = %self.id, from = ?baseline, to = ?state, "state transition");
                }
                t.last_available = state;
            }

            t.state = state;
            t.last_sample_ms = Some(now_ms);
            (previous, baseline, overheat)
        };

        let mut kinds = transition_events(previous, baseline, state);
        if overheat {
            warn!(domain = %self.id, "temperature crossed throttle bound");
            kinds.push(EventType::Overheat);
        }
        for kind in kinds {
            dispatcher.dispatch(&GovernorEvent {
                kind,
                domain: self.id.clone(),
                previous,
                current: state,
                snapshot: snapshot.clone(),
                timestamp_ms: now_ms,
            });
        }
        state
    }

    /// Pushes new window lengths and history capacity into the trackers.
    pub(crate) fn apply_config(&self, config: &GovernorConfig) {
        let evicted = self.lock_history().set_capacity(config.history_capacity);
        if evicted > 0 {
            debug!(domain = %self.id, evicted, "history shrunk");
        }
        let mut t = self.lock_tracker();
        t.cooldown.set_timings(config.cooldown_timings());
        t.idle.set_dwell(config.idle_threshold());
    }

    pub(crate) fn status(&self, now_ms: u64) -> DomainStatus {
        let t = self.lock_tracker();
        let phase = t.cooldown.phase(now_ms);
        DomainStatus {
            domain: self.id.clone(),
            state: t.state,
            label: t.state.label(self.id.is_gpu()),
            metrics: t.latest.clone(),
            is_idle: t.idle.is_idle(now_ms),
            idle_duration_secs: t.idle.idle_duration(now_ms).as_secs_f64(),
            should_throttle: t.cooldown.is_throttle_active(now_ms),
            speed_multiplier: SpeedAdvisor::multiplier(t.state, phase),
            cooldown: phase,
            timestamp_ms: now_ms,
            last_sample_ms: t.last_sample_ms,
            last_error: t.last_failure.clone(),
            gpu_memory: self.ledger.get().map(GpuMemoryLedger::stats),
        }
    }

    pub(crate) fn ledger(&self) -> Option<&GpuMemoryLedger> {
        self.ledger.get()
    }

    pub(crate) fn lock_history(&self) -> MutexGuard<'_, MetricsHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tracker(&self) -> MutexGuard<'_, DomainTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_ledger(&self, total: MemoryBudget) {
        let ledger = self
            .ledger
            .get_or_init(|| GpuMemoryLedger::with_fraction(self.id.to_string(), total, self.ledger_fraction));
        info!(
            domain = %self.id,
            total_mb = ledger.total_mb(),
            limit_mb = ledger.limit_mb(),
            "memory ledger ready"
        );
    }
}

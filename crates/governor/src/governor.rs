// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The governor facade and its monitor thread.
//!
//! ```text
//!            ┌──────────── monitor thread ────────────┐
//!            │ loop { poll_once(); wait(interval) }   │
//!            └───────────────┬────────────────────────┘
//!                            │ per domain
//!      MetricsSource ─► history ─► classify ─► cooldown / idle ─► callbacks
//!                            │
//!   callers ◄── status / should_throttle / speed_multiplier / ledgers
//! ```
//!
//! Readers never touch a metrics source: they only see state the monitor
//! thread has already recorded. The configuration is an immutable value
//! behind an `RwLock<Arc<_>>` and is replaced wholesale on update.

use crate::domain::DomainRuntime;
use crate::{
    AverageMetrics, CallbackDispatcher, CallbackId, Clock, ConfigError, ConfigPatch, DomainStatus, EventType,
    GovernorConfig, GovernorError, GovernorEvent, GovernorStatus, HandlerResult, ResourceState, SystemClock,
    TrendSummary,
};
use memory_ledger::{GpuMemoryLedger, Reservation};
use resource_monitor::{DomainId, Metric, MetricsSource, ResourceSnapshot, SysfsGpuSource, SystemSource, UnavailableSource};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of [`Governor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The monitor thread exited and was joined.
    Stopped,
    /// The thread did not exit within `stop_timeout_secs`. It has been
    /// told to stop and will exit after its current sample.
    TimedOut,
    /// The governor was not running.
    NotRunning,
}

struct Shared {
    config: RwLock<Arc<GovernorConfig>>,
    domains: Vec<DomainRuntime>,
    dispatcher: CallbackDispatcher,
    clock: Arc<dyn Clock>,
    paused: AtomicBool,
}

impl Shared {
    fn config(&self) -> Arc<GovernorConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn poll_once(&self) -> Vec<(DomainId, ResourceState)> {
        let config = self.config();
        self.domains
            .iter()
            .map(|d| {
                let state = d.tick(&config, self.clock.now_ms(), &self.dispatcher);
                (d.id().clone(), state)
            })
            .collect()
    }

    fn domain(&self, id: &DomainId) -> Option<&DomainRuntime> {
        self.domains.iter().find(|d| d.id() == id)
    }
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Builder for [`Governor`], used to inject metrics sources and a clock.
///
/// Domains without an explicit source get an [`UnavailableSource`].
pub struct GovernorBuilder {
    config: GovernorConfig,
    sources: BTreeMap<DomainId, Box<dyn MetricsSource>>,
    clock: Arc<dyn Clock>,
}

impl GovernorBuilder {
    /// Sets the metrics source for `domain`.
    pub fn source(mut self, domain: DomainId, source: impl MetricsSource + 'static) -> Self {
        self.sources.insert(domain, Box::new(source));
        self
    }

    /// Sets an already boxed metrics source for `domain`.
    pub fn boxed_source(mut self, domain: DomainId, source: Box<dyn MetricsSource>) -> Self {
        self.sources.insert(domain, source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates the configuration and constructs the governor, stopped.
    pub fn build(mut self) -> Result<Governor, GovernorError> {
        self.config.validate()?;
        let ids = self.config.domain_ids();
        if ids.is_empty() {
            return Err(GovernorError::NoDomains);
        }
        if let Some(unknown) = self.sources.keys().find(|k| !ids.contains(k)) {
            return Err(GovernorError::UnknownDomain(unknown.clone()));
        }

        let domains: Vec<DomainRuntime> = ids
            .into_iter()
            .map(|id| {
                let source = self.sources.remove(&id).unwrap_or_else(|| {
                    warn!(domain = %id, "no metrics source supplied; domain will report UNAVAILABLE");
                    Box::new(UnavailableSource::new("no metrics source configured"))
                });
                DomainRuntime::new(id, source, &self.config)
            })
            .collect();

        for d in &domains {
            debug!(domain = %d.id(), source = d.source_name(), "domain registered");
        }
        info!(
            domains = domains.len(),
            interval_secs = self.config.monitor_interval_secs,
            "governor created"
        );

        Ok(Governor {
            shared: Arc::new(Shared {
                config: RwLock::new(Arc::new(self.config)),
                domains,
                dispatcher: CallbackDispatcher::new(),
                clock: self.clock,
                paused: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        })
    }
}

/// Resource governor for one process.
///
/// Owns the runtime state of every governed domain and, while running, one
/// background monitor thread. `Governor` is `Send + Sync`; share it by
/// reference or wrap it in an `Arc`.
///
/// # Example
/// ```
/// use governor::{Governor, GovernorConfig};
/// use resource_monitor::{DomainId, ResourceSnapshot, Sample};
///
/// let governor = Governor::builder(GovernorConfig::default())
///     .source(DomainId::System, |id: &DomainId, now_ms: u64| {
///         Sample::Snapshot(ResourceSnapshot::new(id.clone(), now_ms).with_cpu(90.0))
///     })
///     .build()
///     .unwrap();
///
/// governor.poll_once();
/// assert!(governor.should_throttle_processing());
/// assert_eq!(governor.speed_multiplier(), 0.5);
/// ```
pub struct Governor {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for Governor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governor")
            .field("domains", &self.domains())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Governor {
    pub fn builder(config: GovernorConfig) -> GovernorBuilder {
        GovernorBuilder {
            config,
            sources: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// A governor reading the local host: `/proc` for the system domain
    /// and DRM sysfs for each configured GPU.
    pub fn new(config: GovernorConfig) -> Result<Self, GovernorError> {
        let mut builder = Self::builder(config);
        if builder.config.system.enabled {
            builder = builder.source(DomainId::System, SystemSource::new());
        }
        let gpus: Vec<u32> = builder.config.gpus.iter().map(|g| g.index).collect();
        for index in gpus {
            builder = builder.source(DomainId::Gpu(index), SysfsGpuSource::new(index));
        }
        builder.build()
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Spawns the monitor thread. Calling this while running is a no-op.
    pub fn start(&self) -> Result<(), GovernorError> {
        let mut worker = self.lock_worker();
        if let Some(w) = worker.as_ref() {
            if !w.handle.is_finished() {
                warn!("governor already running; start() ignored");
                return Ok(());
            }
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("governor-monitor".into())
            .spawn(move || monitor_loop(&shared, &stop_rx, done_tx))
            .map_err(GovernorError::Spawn)?;

        *worker = Some(Worker {
            stop_tx,
            done_rx,
            handle,
        });
        info!("governor started");
        Ok(())
    }

    /// Signals the monitor thread and waits up to `stop_timeout_secs`.
    ///
    /// An in-flight metrics read is allowed to finish; on timeout the
    /// thread is detached and exits on its own afterwards.
    pub fn stop(&self) -> StopOutcome {
        let Some(worker) = self.lock_worker().take() else {
            return StopOutcome::NotRunning;
        };
        let timeout = self.shared.config().stop_timeout();

        // Err means the thread already exited.
        let _ = worker.stop_tx.send(());
        match worker.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!("monitor thread panicked");
                }
                info!("governor stopped");
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_secs = timeout.as_secs_f64(), "monitor thread did not stop in time; detaching");
                StopOutcome::TimedOut
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().as_ref().is_some_and(|w| !w.handle.is_finished())
    }

    /// Runs one sampling pass over every domain on the calling thread.
    pub fn poll_once(&self) -> Vec<(DomainId, ResourceState)> {
        self.shared.poll_once()
    }

    // ── Derived state ──────────────────────────────────────────

    /// Governor-wide status with one entry per domain.
    pub fn status(&self) -> GovernorStatus {
        let now_ms = self.shared.clock.now_ms();
        let paused = self.is_paused();
        let domains: Vec<DomainStatus> = self.shared.domains.iter().map(|d| d.status(now_ms)).collect();

        let state = domains
            .iter()
            .map(|d| d.state)
            .max_by_key(|s| s.severity())
            .unwrap_or(ResourceState::Unavailable);
        let should_throttle = paused || domains.iter().any(|d| d.should_throttle);
        let speed_multiplier = if paused {
            0.0
        } else {
            domains.iter().map(|d| d.speed_multiplier).fold(1.0, f64::min)
        };

        GovernorStatus {
            running: self.is_running(),
            state,
            should_throttle,
            speed_multiplier,
            paused,
            config_version: self.shared.config().version,
            timestamp_ms: now_ms,
            domains,
        }
    }

    /// Status of a single domain, `None` if it is not governed.
    pub fn domain_status(&self, domain: &DomainId) -> Option<DomainStatus> {
        self.shared
            .domain(domain)
            .map(|d| d.status(self.shared.clock.now_ms()))
    }

    /// `true` if any domain is throttling or cooling down, or the governor
    /// is paused. Unavailable domains never contribute.
    pub fn should_throttle_processing(&self) -> bool {
        self.status().should_throttle
    }

    /// Throughput hint in `[0, 1]`: the minimum over domains.
    pub fn speed_multiplier(&self) -> f64 {
        self.status().speed_multiplier
    }

    /// Holds processing: multiplier `0.0` and throttle on until
    /// [`resume_processing`](Self::resume_processing).
    pub fn pause(&self) {
        if !self.shared.paused.swap(true, Ordering::AcqRel) {
            info!("processing paused by operator");
        }
    }

    pub fn resume_processing(&self) {
        if self.shared.paused.swap(false, Ordering::AcqRel) {
            info!("processing resumed by operator");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    // ── GPU memory ─────────────────────────────────────────────

    /// Reserves `mb` on `domain`. Returns `false` if the request is
    /// refused for any reason, including an unknown domain or a GPU whose
    /// memory total is not known yet.
    pub fn allocate_gpu_memory(&self, id: &str, mb: u64, domain: &DomainId) -> bool {
        match self.try_allocate_gpu_memory(id, mb, domain) {
            Ok(()) => true,
            Err(e) => {
                debug!(domain = %domain, id, mb, reason = %e, "allocation denied");
                false
            }
        }
    }

    pub fn try_allocate_gpu_memory(&self, id: &str, mb: u64, domain: &DomainId) -> Result<(), GovernorError> {
        let now_ms = self.shared.clock.now_ms();
        Ok(self.ledger_for(domain)?.try_allocate_at(id, mb, now_ms)?)
    }

    /// Like [`try_allocate_gpu_memory`](Self::try_allocate_gpu_memory) but
    /// returns a guard that releases the reservation on drop.
    pub fn reserve_gpu_memory(&self, id: &str, mb: u64, domain: &DomainId) -> Result<Reservation, GovernorError> {
        let now_ms = self.shared.clock.now_ms();
        Ok(self.ledger_for(domain)?.reserve_at(id, mb, now_ms)?)
    }

    pub fn deallocate_gpu_memory(&self, id: &str, domain: &DomainId) -> bool {
        self.try_deallocate_gpu_memory(id, domain).is_ok()
    }

    pub fn try_deallocate_gpu_memory(&self, id: &str, domain: &DomainId) -> Result<(), GovernorError> {
        self.ledger_for(domain)?.try_deallocate(id)?;
        Ok(())
    }

    /// A handle to the ledger of `domain`, once it exists.
    pub fn gpu_ledger(&self, domain: &DomainId) -> Option<GpuMemoryLedger> {
        self.shared.domain(domain)?.ledger().cloned()
    }

    fn ledger_for(&self, domain: &DomainId) -> Result<&GpuMemoryLedger, GovernorError> {
        self.shared
            .domain(domain)
            .ok_or_else(|| GovernorError::UnknownDomain(domain.clone()))?
            .ledger()
            .ok_or_else(|| GovernorError::NoLedger(domain.clone()))
    }

    // ── Callbacks ──────────────────────────────────────────────

    /// Subscribes `handler` to `kind`. Handlers run on the monitor thread
    /// (or the `poll_once` caller) and must not block for long.
    pub fn register_callback<F>(&self, kind: EventType, handler: F) -> CallbackId
    where
        F: Fn(&GovernorEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.shared.dispatcher.register(kind, handler)
    }

    pub fn unregister_callback(&self, id: CallbackId) -> bool {
        self.shared.dispatcher.unregister(id)
    }

    // ── History ────────────────────────────────────────────────

    /// The newest `limit` snapshots of `domain` (all if `None`), oldest first.
    pub fn metrics_history(&self, domain: &DomainId, limit: Option<usize>) -> Vec<ResourceSnapshot> {
        self.shared
            .domain(domain)
            .map(|d| d.lock_history().recent(limit))
            .unwrap_or_default()
    }

    pub fn average_metrics(&self, domain: &DomainId, window: Duration) -> Option<AverageMetrics> {
        let d = self.shared.domain(domain)?;
        let now_ms = self.shared.clock.now_ms();
        let history = d.lock_history();
        Some(AverageMetrics {
            domain: domain.clone(),
            window_secs: window.as_secs_f64(),
            sample_count: history.window(window, now_ms).len(),
            avg_cpu: history.average(Metric::CpuPercent, window, now_ms),
            avg_memory: history.average(Metric::MemoryPercent, window, now_ms),
            avg_gpu_temp: history.average(Metric::GpuTemperatureC, window, now_ms),
            avg_gpu_load: history.average(Metric::GpuLoadPercent, window, now_ms),
        })
    }

    /// Trend of `metric` over `window` using the configured stability epsilon.
    pub fn trend(&self, domain: &DomainId, metric: Metric, window: Duration) -> Option<TrendSummary> {
        let d = self.shared.domain(domain)?;
        let epsilon = self.shared.config().trend_stability_epsilon;
        let now_ms = self.shared.clock.now_ms();
        let history = d.lock_history();
        history.trend(metric, window, now_ms, epsilon)
    }

    // ── Configuration ──────────────────────────────────────────

    /// The active configuration.
    pub fn config(&self) -> Arc<GovernorConfig> {
        self.shared.config()
    }

    /// Applies `patch` atomically, returning the new config version.
    ///
    /// On error the active configuration is unchanged.
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<u64, ConfigError> {
        let mut current = self.shared.config.write().unwrap_or_else(PoisonError::into_inner);
        let next = match current.apply(patch) {
            Ok(next) => Arc::new(next),
            Err(e) => {
                warn!(error = %e, version = current.version, "config update rejected");
                return Err(e);
            }
        };
        for d in &self.shared.domains {
            d.apply_config(&next);
        }
        *current = Arc::clone(&next);
        info!(version = next.version, "config updated");
        Ok(next.version)
    }

    /// Governed domains in evaluation order.
    pub fn domains(&self) -> Vec<DomainId> {
        self.shared.domains.iter().map(|d| d.id().clone()).collect()
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Governor {
    fn drop(&mut self) {
        self.stop();
        let released: usize = self
            .shared
            .domains
            .iter()
            .filter_map(DomainRuntime::ledger)
            .map(GpuMemoryLedger::clear)
            .sum();
        if released > 0 {
            info!(released, "released outstanding GPU reservations");
        }
    }
}

fn monitor_loop(shared: &Shared, stop_rx: &mpsc::Receiver<()>, done_tx: mpsc::Sender<()>) {
    debug!("monitor thread running");
    loop {
        shared.poll_once();
        let interval = shared.config().monitor_interval();
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("monitor thread exiting");
    // The receiver is gone if stop() already timed out.
    let _ = done_tx.send(());
}

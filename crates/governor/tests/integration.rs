// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: the governor end to end.
//!
//! Domains are fed by scripted sources whose next reading the test sets
//! directly, and time is driven by a `ManualClock`, so every cooldown and
//! dwell assertion is exact. One test runs the real monitor thread.

use governor::{
    ConfigPatch, EventType, Governor, GovernorConfig, GovernorError, GpuDomainConfig, ManualClock, ResourceState,
    StopOutcome, TrendDirection,
};
use memory_ledger::LedgerError;
use resource_monitor::{DomainId, Metric, MetricsSource, ResourceSnapshot, Sample};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

/// A source that returns whatever reading the test last set.
#[derive(Clone, Default)]
struct Scripted {
    next: Arc<Mutex<Option<Sample>>>,
}

impl Scripted {
    fn set(&self, snapshot: ResourceSnapshot) {
        *self.next.lock().unwrap() = Some(Sample::Snapshot(snapshot));
    }

    fn fail(&self, reason: &str) {
        *self.next.lock().unwrap() = Some(Sample::error(reason));
    }
}

impl MetricsSource for Scripted {
    fn sample(&self, _domain: &DomainId, timestamp_ms: u64) -> Sample {
        match self.next.lock().unwrap().clone() {
            Some(Sample::Snapshot(mut snap)) => {
                snap.timestamp_ms = timestamp_ms;
                Sample::Snapshot(snap)
            }
            Some(other) => other,
            None => Sample::unavailable("nothing scripted"),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn cpu(percent: f64) -> ResourceSnapshot {
    ResourceSnapshot::new(DomainId::System, 0)
        .with_cpu(percent)
        .with_memory(40.0, 4096)
}

struct Harness {
    governor: Governor,
    clock: Arc<ManualClock>,
    system: Scripted,
}

impl Harness {
    fn new(config: GovernorConfig) -> Self {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let system = Scripted::default();
        let governor = Governor::builder(config)
            .source(DomainId::System, system.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Self { governor, clock, system }
    }

    /// Sets the next CPU reading, advances the clock and ticks once.
    fn tick_cpu(&self, percent: f64, after: Duration) {
        self.clock.advance(after);
        self.system.set(cpu(percent));
        self.governor.poll_once();
    }

    /// Makes the next reading fail, advances the clock and ticks once.
    fn tick_error(&self, after: Duration) {
        self.clock.advance(after);
        self.system.fail("sensor timeout");
        self.governor.poll_once();
    }

    fn counter(&self, kind: EventType) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        self.governor.register_callback(kind, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        hits
    }
}

fn gpu_governor(memory_total: &str) -> Governor {
    let mut config = GovernorConfig::default();
    config.system.enabled = false;
    let mut gpu = GpuDomainConfig::new(0).with_memory_total(memory_total);
    gpu.memory_limit_fraction = 1.0;
    config.gpus.push(gpu);
    Governor::builder(config).build().unwrap()
}

const SEC: Duration = Duration::from_secs(1);

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_busy_cpu_halves_speed() {
    let h = Harness::new(GovernorConfig::default());
    h.tick_cpu(90.0, SEC);

    let status = h.governor.status();
    assert_eq!(status.state, ResourceState::Busy);
    assert_eq!(h.governor.speed_multiplier(), 0.5);
    assert!(h.governor.should_throttle_processing());
}

#[test]
fn test_critical_fires_once_per_entry() {
    let h = Harness::new(GovernorConfig::default());
    let critical = h.counter(EventType::Critical);
    let throttle = h.counter(EventType::Throttle);

    h.tick_cpu(50.0, SEC);
    h.tick_cpu(97.0, SEC);
    assert_eq!(h.governor.status().state, ResourceState::Critical);
    assert_eq!(h.governor.speed_multiplier(), 0.0);
    assert_eq!(critical.load(Ordering::SeqCst), 1);

    h.tick_cpu(98.0, SEC);
    h.tick_cpu(99.0, SEC);
    assert_eq!(critical.load(Ordering::SeqCst), 1);
    assert_eq!(throttle.load(Ordering::SeqCst), 1);
}

#[test]
fn test_duplicate_allocation_denied() {
    let g = gpu_governor("1000M");
    let gpu = DomainId::Gpu(0);

    assert!(g.allocate_gpu_memory("a", 500, &gpu));
    assert!(!g.allocate_gpu_memory("a", 200, &gpu));

    let stats = g.gpu_ledger(&gpu).unwrap().stats();
    assert_eq!(stats.allocated_mb, 500);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.allocations[0].id, "a");
    assert_eq!(stats.allocations[0].requested_mb, 500);
}

#[test]
fn test_over_capacity_denied() {
    let g = gpu_governor("1000M");
    let gpu = DomainId::Gpu(0);

    assert!(g.allocate_gpu_memory("a", 700, &gpu));
    assert!(!g.allocate_gpu_memory("b", 400, &gpu));
    assert_eq!(g.gpu_ledger(&gpu).unwrap().available_mb(), 300);
    assert!(matches!(
        g.try_allocate_gpu_memory("b", 400, &gpu),
        Err(GovernorError::Ledger(LedgerError::CapacityExceeded { available_mb: 300, .. }))
    ));

    assert!(g.deallocate_gpu_memory("a", &gpu));
    assert!(!g.deallocate_gpu_memory("a", &gpu));
    assert!(g.allocate_gpu_memory("b", 400, &gpu));
}

#[test]
fn test_gpu_without_provider_never_blocks() {
    let g = gpu_governor("8G");
    g.poll_once();
    g.poll_once();

    let status = g.status();
    assert_eq!(status.state, ResourceState::Unavailable);
    let gpu = status.domain(&DomainId::Gpu(0)).unwrap();
    assert_eq!(gpu.state, ResourceState::Unavailable);
    assert_eq!(gpu.label, "UNAVAILABLE");
    assert!(gpu.last_error.is_some());
    assert!(!g.should_throttle_processing());
    assert_eq!(g.speed_multiplier(), 1.0);
}

#[test]
fn test_history_keeps_most_recent() {
    let config = GovernorConfig {
        history_capacity: 5,
        ..Default::default()
    };
    let h = Harness::new(config);
    for n in 1..=8 {
        h.tick_cpu(n as f64, SEC);
    }

    let history = h.governor.metrics_history(&DomainId::System, None);
    let values: Vec<f64> = history.iter().filter_map(|s| s.cpu_percent).collect();
    assert_eq!(values, vec![4.0, 5.0, 6.0, 7.0, 8.0]);

    let last_two = h.governor.metrics_history(&DomainId::System, Some(2));
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[1].cpu_percent, Some(8.0));
    assert!(h.governor.metrics_history(&DomainId::Gpu(0), None).is_empty());
}

// ── Hysteresis ─────────────────────────────────────────────────

#[test]
fn test_cooldown_runs_from_entry() {
    let h = Harness::new(GovernorConfig::default());
    h.tick_cpu(50.0, SEC);
    h.tick_cpu(90.0, SEC); // entry at t0
    h.tick_cpu(50.0, 2 * SEC); // recovered at t0 + 2s

    assert_eq!(h.governor.status().state, ResourceState::Normal);
    assert!(h.governor.should_throttle_processing());
    assert_eq!(h.governor.speed_multiplier(), 0.5);

    h.clock.advance(27 * SEC); // t0 + 29s
    assert!(h.governor.should_throttle_processing());

    h.clock.advance(SEC); // t0 + 30s
    assert!(!h.governor.should_throttle_processing());
    assert_eq!(h.governor.speed_multiplier(), 0.8);
}

#[test]
fn test_critical_pause_outlasts_recovery() {
    let h = Harness::new(GovernorConfig::default());
    h.tick_cpu(97.0, SEC);
    h.tick_cpu(30.0, SEC);

    assert_eq!(h.governor.status().state, ResourceState::Normal);
    assert_eq!(h.governor.speed_multiplier(), 0.0);

    // Pause runs 60s from the critical reading, one second before recovery.
    h.clock.advance(58 * SEC);
    assert_eq!(h.governor.speed_multiplier(), 0.0);
    h.clock.advance(SEC);
    assert_eq!(h.governor.speed_multiplier(), 0.8);
}

#[test]
fn test_idle_dwell() {
    let config = GovernorConfig {
        idle_threshold_secs: 10.0,
        ..Default::default()
    };
    let h = Harness::new(config);
    h.tick_cpu(5.0, SEC);
    h.tick_cpu(8.0, 5 * SEC);
    assert!(!h.governor.domain_status(&DomainId::System).unwrap().is_idle);

    h.tick_cpu(3.0, 5 * SEC);
    let status = h.governor.domain_status(&DomainId::System).unwrap();
    assert!(status.is_idle);
    assert_eq!(status.idle_duration_secs, 10.0);
    assert_eq!(status.state, ResourceState::Idle);

    h.tick_cpu(60.0, SEC);
    let status = h.governor.domain_status(&DomainId::System).unwrap();
    assert!(!status.is_idle);
    assert_eq!(status.idle_duration_secs, 0.0);
}

// ── Callbacks ──────────────────────────────────────────────────

#[test]
fn test_failing_callback_does_not_block_others() {
    let h = Harness::new(GovernorConfig::default());
    h.governor
        .register_callback(EventType::Throttle, |_| Err("downstream unavailable".into()));
    h.governor
        .register_callback(EventType::Throttle, |_| panic!("bad handler"));
    let reached = h.counter(EventType::Throttle);

    h.tick_cpu(90.0, SEC);
    assert_eq!(reached.load(Ordering::SeqCst), 1);

    // Monitor state is intact after the failures.
    h.tick_cpu(20.0, 60 * SEC);
    assert_eq!(h.governor.status().state, ResourceState::Idle);
}

#[test]
fn test_throttle_and_resume_edges() {
    let h = Harness::new(GovernorConfig::default());
    let throttle = h.counter(EventType::Throttle);
    let resume = h.counter(EventType::Resume);
    let changes = h.counter(EventType::StateChange);

    for pct in [50.0, 85.0, 88.0, 97.0, 60.0, 65.0] {
        h.tick_cpu(pct, SEC);
    }
    assert_eq!(throttle.load(Ordering::SeqCst), 1);
    assert_eq!(resume.load(Ordering::SeqCst), 1);
    // UNAVAILABLE→NORMAL, NORMAL→BUSY, BUSY→CRITICAL, CRITICAL→NORMAL
    assert_eq!(changes.load(Ordering::SeqCst), 4);
}

#[test]
fn test_read_error_between_busy_ticks_keeps_throttle_edge() {
    let h = Harness::new(GovernorConfig::default());
    let throttle = h.counter(EventType::Throttle);
    let resume = h.counter(EventType::Resume);

    h.tick_cpu(50.0, SEC);
    h.tick_cpu(90.0, SEC);
    h.tick_error(SEC);
    h.tick_cpu(90.0, SEC);
    assert_eq!(throttle.load(Ordering::SeqCst), 1);
    assert_eq!(resume.load(Ordering::SeqCst), 0);

    // Cooldown still counts from the first BUSY tick at t=2s.
    h.tick_cpu(50.0, 27 * SEC);
    assert!(h.governor.should_throttle_processing());
    h.tick_cpu(50.0, SEC);
    assert!(!h.governor.should_throttle_processing());
}

#[test]
fn test_recovery_through_read_error_fires_resume() {
    let h = Harness::new(GovernorConfig::default());
    let throttle = h.counter(EventType::Throttle);
    let resume = h.counter(EventType::Resume);
    let critical = h.counter(EventType::Critical);

    for step in [Some(50.0), Some(90.0), None, Some(90.0), None, Some(50.0)] {
        match step {
            Some(pct) => h.tick_cpu(pct, SEC),
            None => h.tick_error(SEC),
        }
    }
    assert_eq!(throttle.load(Ordering::SeqCst), 1);
    assert_eq!(resume.load(Ordering::SeqCst), 1);

    // CRITICAL, failed read, CRITICAL is one critical entry.
    h.tick_cpu(97.0, SEC);
    h.tick_error(SEC);
    h.tick_cpu(97.0, SEC);
    assert_eq!(critical.load(Ordering::SeqCst), 1);
    assert_eq!(throttle.load(Ordering::SeqCst), 2);
}

#[test]
fn test_event_payload() {
    let h = Harness::new(GovernorConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    h.governor.register_callback(EventType::StateChange, move |event| {
        s.lock().unwrap().push((event.previous, event.current, event.snapshot.is_some()));
        Ok(())
    });

    h.tick_cpu(50.0, SEC);
    h.system.fail("sensor timeout");
    h.clock.advance(SEC);
    h.governor.poll_once();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            (ResourceState::Unavailable, ResourceState::Normal, true),
            (ResourceState::Normal, ResourceState::Unavailable, false),
        ]
    );
}

#[test]
fn test_unregistered_callback_not_called() {
    let h = Harness::new(GovernorConfig::default());
    let hits = Arc::new(AtomicUsize::new(0));
    let hh = Arc::clone(&hits);
    let id = h.governor.register_callback(EventType::StateChange, move |_| {
        hh.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    assert!(h.governor.unregister_callback(id));
    h.tick_cpu(50.0, SEC);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_gpu_overheat_and_throttled_label() {
    let mut config = GovernorConfig::default();
    config.system.enabled = false;
    config.gpus.push(GpuDomainConfig::new(0));
    let gpu = Scripted::default();
    let clock = Arc::new(ManualClock::new(0));
    let g = Governor::builder(config)
        .source(DomainId::Gpu(0), gpu.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    let overheats = Arc::new(AtomicUsize::new(0));
    let o = Arc::clone(&overheats);
    g.register_callback(EventType::Overheat, move |_| {
        o.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let reading = |temp: f64| {
        ResourceSnapshot::new(DomainId::Gpu(0), 0)
            .with_gpu_temperature(temp)
            .with_gpu_load(90.0)
            .with_gpu_memory(2048, 8192)
    };

    gpu.set(reading(50.0));
    g.poll_once();
    assert_eq!(g.status().state, ResourceState::Optimal);
    assert_eq!(g.speed_multiplier(), 1.0);

    gpu.set(reading(82.0));
    clock.advance(SEC);
    g.poll_once();
    let status = g.domain_status(&DomainId::Gpu(0)).unwrap();
    assert_eq!(status.state, ResourceState::Busy);
    assert_eq!(status.label, "THROTTLED");
    assert_eq!(overheats.load(Ordering::SeqCst), 1);

    // Ledger learned from the sample: 8192 MB at the default 0.9 fraction.
    let ledger = status.gpu_memory.unwrap();
    assert_eq!(ledger.total_mb, 8192);
    assert_eq!(ledger.limit_mb, 7372);
}

// ── Degradation ────────────────────────────────────────────────

#[test]
fn test_provider_error_recovers() {
    let h = Harness::new(GovernorConfig::default());
    h.system.fail("read /proc/stat: interrupted");
    h.governor.poll_once();
    let status = h.governor.domain_status(&DomainId::System).unwrap();
    assert_eq!(status.state, ResourceState::Unavailable);
    assert_eq!(status.last_error.as_deref(), Some("read /proc/stat: interrupted"));

    h.tick_cpu(50.0, SEC);
    let status = h.governor.domain_status(&DomainId::System).unwrap();
    assert_eq!(status.state, ResourceState::Normal);
    assert!(status.last_error.is_none());
    assert_eq!(status.metrics.unwrap().cpu_percent, Some(50.0));
}

#[test]
fn test_unavailable_after_throttle_releases() {
    let h = Harness::new(GovernorConfig::default());
    h.tick_cpu(90.0, SEC);
    assert!(h.governor.should_throttle_processing());

    h.system.fail("gone");
    h.governor.poll_once();
    assert!(!h.governor.should_throttle_processing());
    assert_eq!(h.governor.speed_multiplier(), 1.0);
}

// ── Queries and configuration ──────────────────────────────────

#[test]
fn test_average_and_trend() {
    let h = Harness::new(GovernorConfig::default());
    for pct in [10.0, 20.0, 30.0, 40.0] {
        h.tick_cpu(pct, SEC);
    }

    let avg = h.governor.average_metrics(&DomainId::System, 60 * SEC).unwrap();
    assert_eq!(avg.sample_count, 4);
    assert_eq!(avg.avg_cpu, Some(25.0));
    assert_eq!(avg.avg_memory, Some(40.0));
    assert_eq!(avg.avg_gpu_temp, None);

    // Window of 2s covers the last three samples (t-2s, t-1s, t).
    let recent = h.governor.average_metrics(&DomainId::System, 2 * SEC).unwrap();
    assert_eq!(recent.sample_count, 3);
    assert_eq!(recent.avg_cpu, Some(30.0));

    let trend = h
        .governor
        .trend(&DomainId::System, Metric::CpuPercent, 60 * SEC)
        .unwrap();
    assert_eq!(trend.direction, TrendDirection::Rising);
    assert!(!trend.stable);
    assert!(h.governor.average_metrics(&DomainId::Gpu(0), SEC).is_none());
}

#[test]
fn test_update_config_resizes_history() {
    let h = Harness::new(GovernorConfig::default());
    for n in 0..10 {
        h.tick_cpu(n as f64, SEC);
    }
    let patch = ConfigPatch {
        history_capacity: Some(4),
        ..Default::default()
    };
    assert_eq!(h.governor.update_config(&patch).unwrap(), 1);
    assert_eq!(h.governor.metrics_history(&DomainId::System, None).len(), 4);
    assert_eq!(h.governor.config().history_capacity, 4);
}

#[test]
fn test_update_config_shortens_cooldown() {
    let h = Harness::new(GovernorConfig::default());
    h.tick_cpu(90.0, SEC);
    h.tick_cpu(50.0, SEC);
    assert!(h.governor.should_throttle_processing());

    let patch = ConfigPatch {
        throttle_cooldown_secs: Some(1.0),
        ..Default::default()
    };
    h.governor.update_config(&patch).unwrap();
    assert!(!h.governor.should_throttle_processing());
}

#[test]
fn test_concurrent_allocations_respect_limit() {
    let g = Arc::new(gpu_governor("1000M"));
    let gpu = DomainId::Gpu(0);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let g = Arc::clone(&g);
            let gpu = gpu.clone();
            thread::spawn(move || {
                (0..50)
                    .filter(|i| g.allocate_gpu_memory(&format!("t{t}-{i}"), 7, &gpu))
                    .count()
            })
        })
        .collect();
    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let ledger = g.gpu_ledger(&gpu).unwrap();
    assert_eq!(admitted, 1000 / 7);
    assert_eq!(ledger.allocated_mb(), admitted as u64 * 7);
    assert!(ledger.allocated_mb() <= ledger.limit_mb());
}

// ── Monitor thread ─────────────────────────────────────────────

#[test]
fn test_monitor_thread_start_stop() {
    let config = GovernorConfig {
        monitor_interval_secs: 0.01,
        ..Default::default()
    };
    let samples = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&samples);
    let g = Governor::builder(config)
        .source(DomainId::System, move |id: &DomainId, ts: u64| {
            s.fetch_add(1, Ordering::SeqCst);
            Sample::Snapshot(ResourceSnapshot::new(id.clone(), ts).with_cpu(40.0))
        })
        .build()
        .unwrap();

    g.start().unwrap();
    g.start().unwrap();
    assert!(g.is_running());

    for _ in 0..500 {
        if samples.load(Ordering::SeqCst) >= 3 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(samples.load(Ordering::SeqCst) >= 3);
    assert_eq!(g.status().state, ResourceState::Normal);
    assert!(g.status().running);

    assert_eq!(g.stop(), StopOutcome::Stopped);
    assert!(!g.is_running());
    let after_stop = samples.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(samples.load(Ordering::SeqCst), after_stop);
    assert_eq!(g.stop(), StopOutcome::NotRunning);
}

#[test]
fn test_stop_is_bounded_by_timeout() {
    let config = GovernorConfig {
        monitor_interval_secs: 0.01,
        stop_timeout_secs: 0.05,
        ..Default::default()
    };
    let g = Governor::builder(config)
        .source(DomainId::System, |id: &DomainId, ts: u64| {
            thread::sleep(Duration::from_millis(400));
            Sample::Snapshot(ResourceSnapshot::new(id.clone(), ts).with_cpu(40.0))
        })
        .build()
        .unwrap();

    g.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(g.stop(), StopOutcome::TimedOut);
    assert!(!g.is_running());
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded per-domain snapshot history.
//!
//! A FIFO ring over [`VecDeque`]: pushes are O(1) amortised and the oldest
//! snapshot is evicted once the capacity is reached. Timestamps are kept
//! non-decreasing so window queries can binary-search for their start.

use resource_monitor::{Metric, ResourceSnapshot};
use std::collections::VecDeque;
use std::time::Duration;

/// Direction of a metric across a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
}

/// Aggregate of one metric over a time window.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrendSummary {
    pub metric: Metric,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub first: f64,
    pub last: f64,
    /// Samples in the window that carried the metric.
    pub samples: usize,
    /// `Rising` iff `last > first`.
    pub direction: TrendDirection,
    /// `max - min < epsilon`.
    pub stable: bool,
}

/// Fixed-capacity history of snapshots for a single domain.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    capacity: usize,
    entries: VecDeque<ResourceSnapshot>,
}

impl MetricsHistory {
    /// Creates an empty history. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a snapshot, returning the one evicted to make room, if any.
    ///
    /// A snapshot stamped earlier than the newest entry is re-stamped to the
    /// newest entry's time, so readers always see sampling order.
    pub fn push(&mut self, mut snapshot: ResourceSnapshot) -> Option<ResourceSnapshot> {
        if let Some(newest) = self.entries.back() {
            if snapshot.timestamp_ms < newest.timestamp_ms {
                snapshot.timestamp_ms = newest.timestamp_ms;
            }
        }
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(snapshot);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, evicting the oldest entries if it shrank.
    /// Returns the number evicted.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        let excess = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..excess);
        excess
    }

    pub fn latest(&self) -> Option<&ResourceSnapshot> {
        self.entries.back()
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceSnapshot> {
        self.entries.iter()
    }

    /// The newest `limit` entries (all of them for `None`), oldest first.
    pub fn recent(&self, limit: Option<usize>) -> Vec<ResourceSnapshot> {
        let skip = limit.map_or(0, |n| self.entries.len().saturating_sub(n));
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// The suffix of entries with `timestamp >= now - duration`.
    pub fn window(&self, duration: Duration, now_ms: u64) -> Vec<&ResourceSnapshot> {
        let start = self.window_start(duration, now_ms);
        self.entries.range(start..).collect()
    }

    /// Mean of `metric` over the window, ignoring entries without it.
    pub fn average(&self, metric: Metric, duration: Duration, now_ms: u64) -> Option<f64> {
        let (sum, count) = self
            .window_values(metric, duration, now_ms)
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Min/max/avg and direction of `metric` over the window.
    ///
    /// Returns `None` when no entry in the window carries the metric.
    pub fn trend(&self, metric: Metric, duration: Duration, now_ms: u64, epsilon: f64) -> Option<TrendSummary> {
        let mut values = self.window_values(metric, duration, now_ms);
        let first = values.next()?;

        let (mut min, mut max, mut sum, mut last, mut samples) = (first, first, first, first, 1usize);
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            last = v;
            samples += 1;
        }

        Some(TrendSummary {
            metric,
            min,
            max,
            avg: sum / samples as f64,
            first,
            last,
            samples,
            direction: if last > first {
                TrendDirection::Rising
            } else {
                TrendDirection::Falling
            },
            stable: max - min < epsilon,
        })
    }

    fn window_start(&self, duration: Duration, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(duration.as_millis() as u64);
        self.entries.partition_point(|s| s.timestamp_ms < cutoff)
    }

    fn window_values(&self, metric: Metric, duration: Duration, now_ms: u64) -> impl Iterator<Item = f64> + '_ {
        let start = self.window_start(duration, now_ms);
        self.entries.range(start..).filter_map(move |s| s.value(metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use resource_monitor::DomainId;

    fn cpu_at(ts: u64, cpu: f64) -> ResourceSnapshot {
        ResourceSnapshot::new(DomainId::System, ts).with_cpu(cpu)
    }

    #[test]
    fn test_fifo_eviction() {
        let mut h = MetricsHistory::new(5);
        for i in 1..=8u64 {
            h.push(cpu_at(i, i as f64));
        }
        assert_eq!(h.len(), 5);
        let kept: Vec<u64> = h.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(kept, vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut h = MetricsHistory::new(2);
        assert!(h.push(cpu_at(1, 1.0)).is_none());
        assert!(h.push(cpu_at(2, 2.0)).is_none());
        let evicted = h.push(cpu_at(3, 3.0)).unwrap();
        assert_eq!(evicted.timestamp_ms, 1);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut h = MetricsHistory::new(0);
        assert_eq!(h.capacity(), 1);
        h.push(cpu_at(1, 1.0));
        h.push(cpu_at(2, 2.0));
        assert_eq!(h.len(), 1);
        assert_eq!(h.latest().unwrap().timestamp_ms, 2);
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let mut h = MetricsHistory::new(4);
        h.push(cpu_at(100, 1.0));
        h.push(cpu_at(50, 2.0));
        assert_eq!(h.latest().unwrap().timestamp_ms, 100);
    }

    #[test]
    fn test_shrink_evicts_oldest() {
        let mut h = MetricsHistory::new(5);
        for i in 1..=5u64 {
            h.push(cpu_at(i, 0.0));
        }
        assert_eq!(h.set_capacity(2), 3);
        let kept: Vec<u64> = h.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(kept, vec![4, 5]);
        assert_eq!(h.set_capacity(10), 0);
    }

    #[test]
    fn test_recent_limit() {
        let mut h = MetricsHistory::new(10);
        for i in 1..=4u64 {
            h.push(cpu_at(i, 0.0));
        }
        let last_two: Vec<u64> = h.recent(Some(2)).iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(last_two, vec![3, 4]);
        assert_eq!(h.recent(None).len(), 4);
        assert_eq!(h.recent(Some(100)).len(), 4);
    }

    #[test]
    fn test_window_and_average() {
        let mut h = MetricsHistory::new(10);
        h.push(cpu_at(1_000, 10.0));
        h.push(cpu_at(5_000, 20.0));
        h.push(cpu_at(9_000, 30.0));

        let w = h.window(Duration::from_secs(5), 10_000);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].timestamp_ms, 5_000);

        let avg = h.average(Metric::CpuPercent, Duration::from_secs(5), 10_000).unwrap();
        assert!((avg - 25.0).abs() < 1e-9);
        assert!(h.average(Metric::GpuTemperatureC, Duration::from_secs(60), 10_000).is_none());
        assert!(h.average(Metric::CpuPercent, Duration::from_secs(1), 100_000).is_none());
    }

    #[test]
    fn test_trend() {
        let mut h = MetricsHistory::new(10);
        for (i, temp) in [60.0, 62.0, 61.0, 63.0].into_iter().enumerate() {
            h.push(ResourceSnapshot::new(DomainId::Gpu(0), i as u64 * 1000).with_gpu_temperature(temp));
        }
        let t = h
            .trend(Metric::GpuTemperatureC, Duration::from_secs(60), 4_000, 5.0)
            .unwrap();
        assert_eq!(t.direction, TrendDirection::Rising);
        assert!(t.stable);
        assert_eq!(t.samples, 4);
        assert_eq!((t.min, t.max), (60.0, 63.0));

        h.push(ResourceSnapshot::new(DomainId::Gpu(0), 5_000).with_gpu_temperature(50.0));
        let t = h
            .trend(Metric::GpuTemperatureC, Duration::from_secs(60), 5_000, 5.0)
            .unwrap();
        assert_eq!(t.direction, TrendDirection::Falling);
        assert!(!t.stable);
    }

    #[test]
    fn test_flat_trend_is_falling() {
        let mut h = MetricsHistory::new(3);
        h.push(cpu_at(1, 40.0));
        h.push(cpu_at(2, 40.0));
        let t = h.trend(Metric::CpuPercent, Duration::from_secs(1), 2, 5.0).unwrap();
        assert_eq!(t.direction, TrendDirection::Falling);
        assert!(t.stable);
    }

    proptest! {
        /// After `capacity + k` pushes only the newest `capacity` remain, oldest first.
        #[test]
        fn prop_history_keeps_most_recent(capacity in 1usize..64, k in 0usize..64) {
            let mut h = MetricsHistory::new(capacity);
            let total = (capacity + k) as u64;
            for ts in 1..=total {
                h.push(cpu_at(ts, 1.0));
            }
            prop_assert_eq!(h.len(), capacity);
            let kept: Vec<u64> = h.iter().map(|s| s.timestamp_ms).collect();
            let expected: Vec<u64> = (total - capacity as u64 + 1..=total).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Continuous low-load dwell tracking.

use crate::clock::elapsed;
use crate::Thresholds;
use resource_monitor::ResourceSnapshot;
use std::time::Duration;

/// Tracks how long a domain's primary load has stayed at or below its idle
/// bound. Leaving idle has no grace period: one sample above the bound
/// resets the dwell.
#[derive(Debug, Clone)]
pub struct IdleDetector {
    idle_since_ms: Option<u64>,
    dwell: Duration,
}

impl IdleDetector {
    /// `dwell` is how long load must stay low before [`is_idle`](Self::is_idle).
    pub fn new(dwell: Duration) -> Self {
        Self {
            idle_since_ms: None,
            dwell,
        }
    }

    pub fn set_dwell(&mut self, dwell: Duration) {
        self.dwell = dwell;
    }

    /// Feeds one tick. `None` (no reading) counts as leaving idle.
    pub fn observe(&mut self, snapshot: Option<&ResourceSnapshot>, thresholds: &dyn Thresholds, now_ms: u64) {
        let low = match (snapshot, thresholds.idle_bound()) {
            (Some(snap), Some(bound)) => thresholds.primary_load(snap).is_some_and(|load| load <= bound),
            _ => false,
        };

        if !low {
            self.idle_since_ms = None;
        } else if self.idle_since_ms.is_none() {
            self.idle_since_ms = Some(now_ms);
        }
    }

    pub fn idle_since_ms(&self) -> Option<u64> {
        self.idle_since_ms
    }

    pub fn is_idle(&self, now_ms: u64) -> bool {
        self.idle_since_ms
            .is_some_and(|since| elapsed(since, now_ms) >= self.dwell)
    }

    /// Zero unless a dwell is in progress.
    pub fn idle_duration(&self, now_ms: u64) -> Duration {
        self.idle_since_ms
            .map_or(Duration::ZERO, |since| elapsed(since, now_ms))
    }
}

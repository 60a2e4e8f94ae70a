// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Throttle hysteresis.
//!
//! Two independent timers keep a domain throttled after its raw metrics
//! recover:
//!
//! - the throttle cooldown runs from the moment the domain *entered* `BUSY`
//!   (an `Unavailable` tick in between does not count as leaving it);
//! - the critical pause runs from the most recent `CRITICAL` observation.
//!
//! Each timer is cleared only once its window elapses with no re-trigger.

use crate::clock::elapsed;
use crate::ResourceState;
use std::time::Duration;

/// Window lengths for the two timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownTimings {
    pub throttle_cooldown: Duration,
    pub critical_pause: Duration,
}

/// Raw timer state for one domain. Reset when the governor is rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CooldownState {
    pub throttle_entered_at_ms: Option<u64>,
    pub last_critical_at_ms: Option<u64>,
}

/// What, if anything, keeps a domain throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPhase {
    /// No timer is running and the live state is relaxed.
    Clear,
    /// Busy, or inside the throttle cooldown window.
    Cooldown,
    /// Critical, or inside the critical pause window.
    Paused,
}

/// Per-domain cooldown tracker.
#[derive(Debug, Clone)]
pub struct CooldownController {
    timings: CooldownTimings,
    state: CooldownState,
    current: ResourceState,
    /// Last state backed by a reading.
    last_available: ResourceState,
}

impl CooldownController {
    pub fn new(timings: CooldownTimings) -> Self {
        Self {
            timings,
            state: CooldownState::default(),
            current: ResourceState::Unavailable,
            last_available: ResourceState::Unavailable,
        }
    }

    /// Applies new window lengths. Running timers keep their start times.
    pub fn set_timings(&mut self, timings: CooldownTimings) {
        self.timings = timings;
    }

    pub fn timings(&self) -> CooldownTimings {
        self.timings
    }

    pub fn state(&self) -> CooldownState {
        self.state
    }

    /// Feeds one classified tick.
    pub fn observe(&mut self, state: ResourceState, now_ms: u64) {
        self.expire(now_ms);

        if state == ResourceState::Busy && self.last_available != ResourceState::Busy {
            self.state.throttle_entered_at_ms = Some(now_ms);
        }
        if state == ResourceState::Critical {
            self.state.last_critical_at_ms = Some(now_ms);
        }
        if state != ResourceState::Unavailable {
            self.last_available = state;
        }
        self.current = state;
    }

    /// The strongest condition currently holding the domain back.
    pub fn phase(&self, now_ms: u64) -> CooldownPhase {
        match self.current {
            ResourceState::Unavailable => return CooldownPhase::Clear,
            ResourceState::Critical => return CooldownPhase::Paused,
            _ => {}
        }
        if within(self.state.last_critical_at_ms, self.timings.critical_pause, now_ms) {
            return CooldownPhase::Paused;
        }
        if self.current == ResourceState::Busy
            || within(self.state.throttle_entered_at_ms, self.timings.throttle_cooldown, now_ms)
        {
            return CooldownPhase::Cooldown;
        }
        CooldownPhase::Clear
    }

    /// `true` while throttled live or inside either timer window.
    pub fn is_throttle_active(&self, now_ms: u64) -> bool {
        self.phase(now_ms) != CooldownPhase::Clear
    }

    fn expire(&mut self, now_ms: u64) {
        if !within(self.state.throttle_entered_at_ms, self.timings.throttle_cooldown, now_ms) {
            self.state.throttle_entered_at_ms = None;
        }
        if !within(self.state.last_critical_at_ms, self.timings.critical_pause, now_ms) {
            self.state.last_critical_at_ms = None;
        }
    }
}

fn within(started_ms: Option<u64>, window: Duration, now_ms: u64) -> bool {
    started_ms.is_some_and(|t| elapsed(t, now_ms) < window)
}

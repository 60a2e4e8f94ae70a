// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! State classification.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! ```text
//! no snapshot             → UNAVAILABLE
//! any critical breach     → CRITICAL
//! any busy/throttle breach→ BUSY
//! all metrics optimal     → OPTIMAL   (domains with an optimal tier)
//! primary load ≤ idle     → IDLE      (domains with an idle tier)
//! otherwise               → NORMAL
//! ```
//!
//! Critical is tested first so that a host that is simultaneously lightly
//! loaded and overheating is never reported as idle.

use crate::{ResourceState, Thresholds};
use resource_monitor::ResourceSnapshot;

/// Classifies `snapshot` against `thresholds`.
///
/// `None` means the domain could not be sampled this tick.
pub fn classify<T: Thresholds + ?Sized>(snapshot: Option<&ResourceSnapshot>, thresholds: &T) -> ResourceState {
    let Some(snap) = snapshot else {
        return ResourceState::Unavailable;
    };

    if thresholds.critical_breached(snap) {
        ResourceState::Critical
    } else if thresholds.busy_breached(snap) {
        ResourceState::Busy
    } else if thresholds.all_optimal(snap) == Some(true) {
        ResourceState::Optimal
    } else if is_idle_load(snap, thresholds) {
        ResourceState::Idle
    } else {
        ResourceState::Normal
    }
}

fn is_idle_load<T: Thresholds + ?Sized>(snap: &ResourceSnapshot, thresholds: &T) -> bool {
    match (thresholds.idle_bound(), thresholds.primary_load(snap)) {
        (Some(bound), Some(load)) => load <= bound,
        _ => false,
    }
}

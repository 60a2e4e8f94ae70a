// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Processing-speed advice.

use crate::{CooldownPhase, ResourceState};

/// Maps a domain's state and cooldown phase to a throughput hint in `[0, 1]`.
///
/// | condition                     | multiplier |
/// |-------------------------------|-----------:|
/// | paused (critical or operator) | 0.0        |
/// | busy or in cooldown           | 0.5        |
/// | normal                        | 0.8        |
/// | optimal, idle, unavailable    | 1.0        |
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedAdvisor;

impl SpeedAdvisor {
    pub const PAUSED: f64 = 0.0;
    pub const THROTTLED: f64 = 0.5;
    pub const NORMAL: f64 = 0.8;
    pub const FULL: f64 = 1.0;

    pub fn multiplier(state: ResourceState, phase: CooldownPhase) -> f64 {
        // A domain that cannot be observed never slows work down.
        if state == ResourceState::Unavailable {
            return Self::FULL;
        }
        if state == ResourceState::Critical || phase == CooldownPhase::Paused {
            return Self::PAUSED;
        }
        if state == ResourceState::Busy || phase == CooldownPhase::Cooldown {
            return Self::THROTTLED;
        }
        match state {
            ResourceState::Normal => Self::NORMAL,
            _ => Self::FULL,
        }
    }
}

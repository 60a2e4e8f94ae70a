// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Classified health states.

use std::fmt;

/// The health label derived from a snapshot and a domain's thresholds.
///
/// Shared by every domain even though not every domain reaches every
/// value: GPUs never report `Idle`, the system domain never reports
/// `Optimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceState {
    /// No reading could be taken this tick.
    Unavailable,
    Idle,
    Optimal,
    Normal,
    /// Throttle tier breached. Reported as `THROTTLED` for GPUs.
    Busy,
    Critical,
}

impl ResourceState {
    /// Orders states by how much they should slow processing down.
    ///
    /// `Idle` and `Optimal` share a rank: they never coexist in one domain.
    pub const fn severity(self) -> u8 {
        match self {
            Self::Unavailable => 0,
            Self::Idle | Self::Optimal => 1,
            Self::Normal => 2,
            Self::Busy => 3,
            Self::Critical => 4,
        }
    }

    /// `Busy` or `Critical`.
    pub const fn is_throttling(self) -> bool {
        matches!(self, Self::Busy | Self::Critical)
    }

    /// `Idle`, `Optimal` or `Normal`.
    pub const fn is_relaxed(self) -> bool {
        matches!(self, Self::Idle | Self::Optimal | Self::Normal)
    }

    /// Display label, aliasing `Busy` to `THROTTLED` on GPU domains.
    pub const fn label(self, gpu: bool) -> &'static str {
        match self {
            Self::Unavailable => "UNAVAILABLE",
            Self::Idle => "IDLE",
            Self::Optimal => "OPTIMAL",
            Self::Normal => "NORMAL",
            Self::Busy if gpu => "THROTTLED",
            Self::Busy => "BUSY",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(ResourceState::Critical.severity() > ResourceState::Busy.severity());
        assert!(ResourceState::Busy.severity() > ResourceState::Normal.severity());
        assert!(ResourceState::Normal.severity() > ResourceState::Idle.severity());
        assert_eq!(ResourceState::Idle.severity(), ResourceState::Optimal.severity());
        assert_eq!(ResourceState::Unavailable.severity(), 0);
    }

    #[test]
    fn test_predicates() {
        assert!(ResourceState::Busy.is_throttling());
        assert!(ResourceState::Critical.is_throttling());
        assert!(!ResourceState::Normal.is_throttling());
        assert!(ResourceState::Idle.is_relaxed());
        assert!(!ResourceState::Unavailable.is_relaxed());
        assert!(!ResourceState::Unavailable.is_throttling());
    }

    #[test]
    fn test_labels() {
        assert_eq!(ResourceState::Busy.label(true), "THROTTLED");
        assert_eq!(ResourceState::Busy.label(false), "BUSY");
        assert_eq!(ResourceState::Unavailable.to_string(), "UNAVAILABLE");
    }

    #[test]
    fn test_serde_uppercase() {
        let json = serde_json::to_string(&ResourceState::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}

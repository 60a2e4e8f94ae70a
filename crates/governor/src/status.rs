// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Read-only status views for the job pipeline and dashboard.
//!
//! Every type here derives `Serialize`; the dashboard emits them as JSON
//! unchanged.

use crate::{CooldownPhase, ResourceState};
use memory_ledger::LedgerStats;
use resource_monitor::{DomainId, ResourceSnapshot};

/// Status of one governed domain.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DomainStatus {
    pub domain: DomainId,
    pub state: ResourceState,
    /// Display label (`THROTTLED` instead of `BUSY` on GPUs).
    pub label: &'static str,
    /// Most recent successful reading.
    pub metrics: Option<ResourceSnapshot>,
    pub is_idle: bool,
    pub idle_duration_secs: f64,
    pub should_throttle: bool,
    pub speed_multiplier: f64,
    pub cooldown: CooldownPhase,
    /// When this status was computed.
    pub timestamp_ms: u64,
    /// When the domain was last sampled, successfully or not.
    pub last_sample_ms: Option<u64>,
    /// Reason of the most recent unavailable/error tick, cleared by a
    /// successful one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory: Option<LedgerStats>,
}

impl DomainStatus {
    /// Returns a one-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{:<7} {:<11} x{:.1}{}",
            self.domain.to_string(),
            self.label,
            self.speed_multiplier,
            if self.should_throttle { " throttle" } else { "" },
        );
        match (&self.metrics, &self.last_error) {
            (_, Some(reason)) if self.state == ResourceState::Unavailable => {
                line.push_str(&format!("  ({reason})"));
            }
            (Some(snap), _) => {
                line.push_str("  ");
                line.push_str(&snap.summary());
            }
            _ => {}
        }
        if self.is_idle {
            line.push_str(&format!("  idle {:.0}s", self.idle_duration_secs));
        }
        line
    }
}

/// Governor-wide status plus every domain.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GovernorStatus {
    pub running: bool,
    /// Most severe domain state.
    pub state: ResourceState,
    /// Any domain throttling, or the governor paused by an operator.
    pub should_throttle: bool,
    /// Minimum over domains, `0.0` while paused.
    pub speed_multiplier: f64,
    pub paused: bool,
    pub config_version: u64,
    pub timestamp_ms: u64,
    pub domains: Vec<DomainStatus>,
}

impl GovernorStatus {
    pub fn domain(&self, id: &DomainId) -> Option<&DomainStatus> {
        self.domains.iter().find(|d| &d.domain == id)
    }

    /// Returns a multi-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "governor: {} (v{}), state {}, multiplier {:.1}{}{}\n",
            if self.running { "running" } else { "stopped" },
            self.config_version,
            self.state.label(false),
            self.speed_multiplier,
            if self.should_throttle { ", throttling" } else { "" },
            if self.paused { ", paused" } else { "" },
        );
        for d in &self.domains {
            out.push_str("  ");
            out.push_str(&d.summary());
            out.push('\n');
            if let Some(ledger) = &d.gpu_memory {
                out.push_str("          ");
                out.push_str(&ledger.summary());
                out.push('\n');
            }
        }
        out
    }
}

/// Windowed averages for one domain. Fields are `None` when no sample in
/// the window carried the metric.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AverageMetrics {
    pub domain: DomainId,
    pub window_secs: f64,
    pub sample_count: usize,
    pub avg_cpu: Option<f64>,
    pub avg_memory: Option<f64>,
    pub avg_gpu_temp: Option<f64>,
    pub avg_gpu_load: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: ResourceState) -> DomainStatus {
        DomainStatus {
            domain: DomainId::Gpu(0),
            state,
            label: state.label(true),
            metrics: None,
            is_idle: false,
            idle_duration_secs: 0.0,
            should_throttle: state.is_throttling(),
            speed_multiplier: 0.5,
            cooldown: CooldownPhase::Cooldown,
            timestamp_ms: 1,
            last_sample_ms: Some(1),
            last_error: None,
            gpu_memory: None,
        }
    }

    #[test]
    fn test_domain_summary() {
        let s = status(ResourceState::Busy).summary();
        assert!(s.contains("gpu0"));
        assert!(s.contains("THROTTLED"));
        assert!(s.contains("throttle"));

        let mut u = status(ResourceState::Unavailable);
        u.last_error = Some("no driver".into());
        assert!(u.summary().contains("(no driver)"));
    }

    #[test]
    fn test_status_json() {
        let g = GovernorStatus {
            running: true,
            state: ResourceState::Busy,
            should_throttle: true,
            speed_multiplier: 0.5,
            paused: false,
            config_version: 3,
            timestamp_ms: 1,
            domains: vec![status(ResourceState::Busy)],
        };
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["state"], "BUSY");
        assert_eq!(json["domains"][0]["domain"], "gpu0");
        assert_eq!(json["domains"][0]["label"], "THROTTLED");
        assert_eq!(json["domains"][0]["cooldown"], "cooldown");
        assert!(json["domains"][0].get("gpu_memory").is_none());
        assert!(g.domain(&DomainId::Gpu(0)).is_some());
        assert!(g.summary().contains("governor: running (v3)"));
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-domain threshold sets.
//!
//! A domain is described entirely by which tiers its metrics breach; the
//! evaluation order lives in [`classify`](crate::classify) and is the same
//! for every domain. Adding a new kind of domain means implementing
//! [`Thresholds`], not writing another state machine.
//!
//! Every bound set is validated as strictly increasing from the lowest tier
//! to `critical` before it can take effect.

use crate::ConfigError;
use resource_monitor::ResourceSnapshot;

/// The tier tests a domain exposes to the classifier.
pub trait Thresholds: Send + Sync {
    /// Checks the ordering and range invariants.
    fn validate(&self, domain: &str) -> Result<(), ConfigError>;

    /// Any metric at or above its critical bound.
    fn critical_breached(&self, snap: &ResourceSnapshot) -> bool;

    /// Any metric at or above its busy/throttle bound.
    fn busy_breached(&self, snap: &ResourceSnapshot) -> bool;

    /// `Some(true)` if every present metric is below its optimal bound.
    /// `None` for domains without an optimal tier.
    fn all_optimal(&self, _snap: &ResourceSnapshot) -> Option<bool> {
        None
    }

    /// Upper bound of the idle tier on the primary load metric.
    /// `None` for domains without an idle tier.
    fn idle_bound(&self) -> Option<f64> {
        None
    }

    /// The metric idle detection watches.
    fn primary_load(&self, snap: &ResourceSnapshot) -> Option<f64>;

    /// Temperature at or above its throttle bound.
    fn overheating(&self, _snap: &ResourceSnapshot) -> bool {
        false
    }
}

/// Bounds for the host CPU/memory domain.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SystemThresholds {
    /// CPU at or below this is idle.
    pub cpu_idle_percent: f64,
    pub cpu_busy_percent: f64,
    pub cpu_critical_percent: f64,
    pub memory_busy_percent: f64,
    pub memory_critical_percent: f64,
    /// CPU package temperature at which the host throttles work.
    pub temperature_throttle_c: f64,
    pub temperature_critical_c: f64,
}

impl Default for SystemThresholds {
    fn default() -> Self {
        Self {
            cpu_idle_percent: 20.0,
            cpu_busy_percent: 80.0,
            cpu_critical_percent: 95.0,
            memory_busy_percent: 85.0,
            memory_critical_percent: 95.0,
            temperature_throttle_c: 80.0,
            temperature_critical_c: 85.0,
        }
    }
}

impl Thresholds for SystemThresholds {
    fn validate(&self, domain: &str) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cpu_idle_percent", self.cpu_idle_percent),
            ("cpu_busy_percent", self.cpu_busy_percent),
            ("cpu_critical_percent", self.cpu_critical_percent),
            ("memory_busy_percent", self.memory_busy_percent),
            ("memory_critical_percent", self.memory_critical_percent),
        ] {
            ensure_percent(domain, field, value)?;
        }
        ensure_non_negative(domain, "temperature_throttle_c", self.temperature_throttle_c)?;
        ensure_non_negative(domain, "temperature_critical_c", self.temperature_critical_c)?;

        ensure_ascending(
            domain,
            "cpu",
            &[
                ("idle", self.cpu_idle_percent),
                ("busy", self.cpu_busy_percent),
                ("critical", self.cpu_critical_percent),
            ],
        )?;
        ensure_ascending(
            domain,
            "memory",
            &[
                ("busy", self.memory_busy_percent),
                ("critical", self.memory_critical_percent),
            ],
        )?;
        ensure_ascending(
            domain,
            "temperature",
            &[
                ("throttle", self.temperature_throttle_c),
                ("critical", self.temperature_critical_c),
            ],
        )
    }

    fn critical_breached(&self, snap: &ResourceSnapshot) -> bool {
        at_or_above(snap.cpu_percent, self.cpu_critical_percent)
            || at_or_above(snap.memory_percent, self.memory_critical_percent)
            || at_or_above(snap.cpu_temperature_c, self.temperature_critical_c)
    }

    fn busy_breached(&self, snap: &ResourceSnapshot) -> bool {
        at_or_above(snap.cpu_percent, self.cpu_busy_percent)
            || at_or_above(snap.memory_percent, self.memory_busy_percent)
            || self.overheating(snap)
    }

    fn idle_bound(&self) -> Option<f64> {
        Some(self.cpu_idle_percent)
    }

    fn primary_load(&self, snap: &ResourceSnapshot) -> Option<f64> {
        snap.cpu_percent
    }

    fn overheating(&self, snap: &ResourceSnapshot) -> bool {
        at_or_above(snap.cpu_temperature_c, self.temperature_throttle_c)
    }
}

/// Bounds for one GPU domain.
///
/// The `normal` bounds mark the top of the normal band; classification
/// only tests `optimal`, `throttle` and `critical`, but `normal` takes part
/// in the ordering check so a misplaced band is caught at load time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GpuThresholds {
    pub temp_optimal_c: f64,
    pub temp_normal_c: f64,
    pub temp_throttle_c: f64,
    pub temp_critical_c: f64,
    pub memory_optimal_percent: f64,
    pub memory_normal_percent: f64,
    pub memory_throttle_percent: f64,
    pub memory_critical_percent: f64,
}

impl Default for GpuThresholds {
    fn default() -> Self {
        Self {
            temp_optimal_c: 65.0,
            temp_normal_c: 75.0,
            temp_throttle_c: 80.0,
            temp_critical_c: 85.0,
            memory_optimal_percent: 70.0,
            memory_normal_percent: 80.0,
            memory_throttle_percent: 85.0,
            memory_critical_percent: 95.0,
        }
    }
}

impl Thresholds for GpuThresholds {
    fn validate(&self, domain: &str) -> Result<(), ConfigError> {
        for (field, value) in [
            ("memory_optimal_percent", self.memory_optimal_percent),
            ("memory_normal_percent", self.memory_normal_percent),
            ("memory_throttle_percent", self.memory_throttle_percent),
            ("memory_critical_percent", self.memory_critical_percent),
        ] {
            ensure_percent(domain, field, value)?;
        }
        for (field, value) in [
            ("temp_optimal_c", self.temp_optimal_c),
            ("temp_normal_c", self.temp_normal_c),
            ("temp_throttle_c", self.temp_throttle_c),
            ("temp_critical_c", self.temp_critical_c),
        ] {
            ensure_non_negative(domain, field, value)?;
        }

        ensure_ascending(
            domain,
            "temperature",
            &[
                ("optimal", self.temp_optimal_c),
                ("normal", self.temp_normal_c),
                ("throttle", self.temp_throttle_c),
                ("critical", self.temp_critical_c),
            ],
        )?;
        ensure_ascending(
            domain,
            "memory",
            &[
                ("optimal", self.memory_optimal_percent),
                ("normal", self.memory_normal_percent),
                ("throttle", self.memory_throttle_percent),
                ("critical", self.memory_critical_percent),
            ],
        )
    }

    fn critical_breached(&self, snap: &ResourceSnapshot) -> bool {
        at_or_above(snap.gpu_temperature_c, self.temp_critical_c)
            || at_or_above(snap.gpu_memory_percent(), self.memory_critical_percent)
    }

    fn busy_breached(&self, snap: &ResourceSnapshot) -> bool {
        self.overheating(snap) || at_or_above(snap.gpu_memory_percent(), self.memory_throttle_percent)
    }

    fn all_optimal(&self, snap: &ResourceSnapshot) -> Option<bool> {
        let checks = [
            snap.gpu_temperature_c.map(|t| t < self.temp_optimal_c),
            snap.gpu_memory_percent().map(|m| m < self.memory_optimal_percent),
        ];
        let mut present = checks.iter().flatten().peekable();
        // With nothing to judge by, the GPU is merely normal.
        if present.peek().is_none() {
            return Some(false);
        }
        Some(present.all(|ok| *ok))
    }

    fn primary_load(&self, snap: &ResourceSnapshot) -> Option<f64> {
        snap.gpu_load_percent
    }

    fn overheating(&self, snap: &ResourceSnapshot) -> bool {
        at_or_above(snap.gpu_temperature_c, self.temp_throttle_c)
    }
}

fn at_or_above(value: Option<f64>, bound: f64) -> bool {
    value.is_some_and(|v| v >= bound)
}

fn ensure_percent(domain: &str, field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: format!("{domain}.{field}"),
            value,
            expected: "a percentage in [0, 100]",
        })
    }
}

fn ensure_non_negative(domain: &str, field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: format!("{domain}.{field}"),
            value,
            expected: "a finite, non-negative number",
        })
    }
}

fn ensure_ascending(domain: &str, metric: &'static str, tiers: &[(&str, f64)]) -> Result<(), ConfigError> {
    for pair in tiers.windows(2) {
        let ((lo_name, lo), (hi_name, hi)) = (pair[0], pair[1]);
        if lo >= hi {
            return Err(ConfigError::NonMonotonic {
                domain: domain.to_string(),
                metric,
                detail: format!("{lo_name} = {lo} must be below {hi_name} = {hi}"),
            });
        }
    }
    Ok(())
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Governor configuration, loaded from TOML or built programmatically.
//!
//! # TOML Format
//! ```toml
//! monitor_interval_secs = 3.0
//! history_capacity = 120
//! idle_threshold_secs = 300.0
//! throttle_cooldown_secs = 30.0
//! critical_pause_secs = 60.0
//!
//! [system]
//! cpu_busy_percent = 80.0
//! cpu_critical_percent = 95.0
//!
//! [[gpus]]
//! index = 0
//! memory_total = "8G"
//! temp_throttle_c = 80.0
//! ```
//!
//! Every field is optional and falls back to [`GovernorConfig::default`].
//! A configuration value is never mutated in place once a governor holds
//! it: [`GovernorConfig::apply`] builds a validated successor with a
//! higher [`version`](GovernorConfig::version).

use crate::{ConfigError, CooldownTimings, GpuThresholds, SystemThresholds, Thresholds};
use memory_ledger::MemoryBudget;
use resource_monitor::DomainId;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Settings for the host CPU/memory domain.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SystemDomainConfig {
    /// Whether the system domain is governed at all.
    pub enabled: bool,
    #[serde(flatten)]
    pub thresholds: SystemThresholds,
}

impl Default for SystemDomainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: SystemThresholds::default(),
        }
    }
}

/// Settings for one GPU domain.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GpuDomainConfig {
    /// Device index, as in `/sys/class/drm/card<index>`.
    pub index: u32,
    /// Total device memory (human-readable, e.g. `"8G"`). When absent the
    /// total is learned from the first sample that reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_total: Option<String>,
    /// Fraction of total memory the ledger may hand out.
    #[serde(default = "default_limit_fraction")]
    pub memory_limit_fraction: f64,
    #[serde(flatten)]
    pub thresholds: GpuThresholds,
}

fn default_limit_fraction() -> f64 {
    0.9
}

impl GpuDomainConfig {
    /// A GPU with default thresholds and no configured memory total.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            memory_total: None,
            memory_limit_fraction: default_limit_fraction(),
            thresholds: GpuThresholds::default(),
        }
    }

    pub fn with_memory_total(mut self, total: impl Into<String>) -> Self {
        self.memory_total = Some(total.into());
        self
    }

    pub fn domain_id(&self) -> DomainId {
        DomainId::Gpu(self.index)
    }

    /// Parses `memory_total`.
    pub fn memory_total_budget(&self) -> Result<Option<MemoryBudget>, ConfigError> {
        self.memory_total
            .as_deref()
            .map(|s| {
                MemoryBudget::parse(s).map_err(|source| ConfigError::InvalidMemoryTotal {
                    index: self.index,
                    source,
                })
            })
            .transpose()
    }
}

/// Complete governor configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Bumped on every successful update; not read from files.
    #[serde(skip)]
    pub version: u64,
    /// Seconds between monitor ticks.
    pub monitor_interval_secs: f64,
    /// Snapshots kept per domain.
    pub history_capacity: usize,
    /// Dwell below the idle bound before a domain counts as idle.
    pub idle_threshold_secs: f64,
    pub throttle_cooldown_secs: f64,
    pub critical_pause_secs: f64,
    /// `max - min` below this makes a trend stable.
    pub trend_stability_epsilon: f64,
    /// Upper bound on how long `stop()` waits for the monitor thread.
    pub stop_timeout_secs: f64,
    pub system: SystemDomainConfig,
    pub gpus: Vec<GpuDomainConfig>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            version: 0,
            monitor_interval_secs: 3.0,
            history_capacity: 120,
            idle_threshold_secs: 300.0,
            throttle_cooldown_secs: 30.0,
            critical_pause_secs: 60.0,
            trend_stability_epsilon: 5.0,
            stop_timeout_secs: 5.0,
            system: SystemDomainConfig::default(),
            gpus: Vec::new(),
        }
    }
}

/// Copies every `Some` field of `$patch` onto the same-named field of `$target`.
macro_rules! set_if_some {
    ($target:expr, $patch:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $patch.$field {
                $target.$field = v;
            }
        )+
    };
}

impl GovernorConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialise(e.to_string()))
    }

    /// Checks every range and ordering invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("monitor_interval_secs", self.monitor_interval_secs)?;
        ensure_positive("stop_timeout_secs", self.stop_timeout_secs)?;
        for (field, value) in [
            ("idle_threshold_secs", self.idle_threshold_secs),
            ("throttle_cooldown_secs", self.throttle_cooldown_secs),
            ("critical_pause_secs", self.critical_pause_secs),
            ("trend_stability_epsilon", self.trend_stability_epsilon),
        ] {
            ensure_non_negative(field, value)?;
        }
        for (field, value) in [
            ("monitor_interval_secs", self.monitor_interval_secs),
            ("stop_timeout_secs", self.stop_timeout_secs),
            ("idle_threshold_secs", self.idle_threshold_secs),
            ("throttle_cooldown_secs", self.throttle_cooldown_secs),
            ("critical_pause_secs", self.critical_pause_secs),
        ] {
            ensure_duration(field, value)?;
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "history_capacity".into(),
                value: 0.0,
                expected: "at least 1",
            });
        }

        self.system.thresholds.validate("system")?;

        let mut seen = BTreeSet::new();
        for gpu in &self.gpus {
            if !seen.insert(gpu.index) {
                return Err(ConfigError::DuplicateGpu(gpu.index));
            }
            let f = gpu.memory_limit_fraction;
            if !(f.is_finite() && f > 0.0 && f <= 1.0) {
                return Err(ConfigError::OutOfRange {
                    field: format!("gpu{}.memory_limit_fraction", gpu.index),
                    value: f,
                    expected: "a fraction in (0, 1]",
                });
            }
            gpu.memory_total_budget()?;
            gpu.thresholds.validate(&gpu.domain_id().to_string())?;
        }
        Ok(())
    }

    /// Domains this configuration governs: system first, then GPUs in
    /// configuration order.
    pub fn domain_ids(&self) -> Vec<DomainId> {
        let system = self.system.enabled.then_some(DomainId::System);
        system
            .into_iter()
            .chain(self.gpus.iter().map(GpuDomainConfig::domain_id))
            .collect()
    }

    pub fn gpu(&self, index: u32) -> Option<&GpuDomainConfig> {
        self.gpus.iter().find(|g| g.index == index)
    }

    /// The threshold set governing `domain`, if it is configured.
    pub fn thresholds_for(&self, domain: &DomainId) -> Option<&dyn Thresholds> {
        match domain {
            DomainId::System if self.system.enabled => Some(&self.system.thresholds),
            DomainId::System => None,
            DomainId::Gpu(index) => self.gpu(*index).map(|g| &g.thresholds as &dyn Thresholds),
        }
    }

    pub fn monitor_interval(&self) -> Duration {
        secs(self.monitor_interval_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        secs(self.idle_threshold_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        secs(self.stop_timeout_secs)
    }

    pub fn cooldown_timings(&self) -> CooldownTimings {
        CooldownTimings {
            throttle_cooldown: secs(self.throttle_cooldown_secs),
            critical_pause: secs(self.critical_pause_secs),
        }
    }

    /// Builds the successor of this configuration with `patch` applied.
    ///
    /// The result is validated as a whole and carries `version + 1`; on
    /// error `self` is untouched and nothing from the patch takes effect.
    pub fn apply(&self, patch: &ConfigPatch) -> Result<Self, ConfigError> {
        let mut next = self.clone();

        set_if_some!(next, patch;
            monitor_interval_secs,
            history_capacity,
            idle_threshold_secs,
            throttle_cooldown_secs,
            critical_pause_secs,
            trend_stability_epsilon,
            stop_timeout_secs,
        );

        if let Some(p) = &patch.system {
            let t = &mut next.system.thresholds;
            set_if_some!(t, p;
                cpu_idle_percent,
                cpu_busy_percent,
                cpu_critical_percent,
                memory_busy_percent,
                memory_critical_percent,
                temperature_throttle_c,
                temperature_critical_c,
            );
        }

        if let Some(p) = &patch.gpus {
            for gpu in &mut next.gpus {
                let t = &mut gpu.thresholds;
                set_if_some!(t, p;
                    temp_optimal_c,
                    temp_normal_c,
                    temp_throttle_c,
                    temp_critical_c,
                    memory_optimal_percent,
                    memory_normal_percent,
                    memory_throttle_percent,
                    memory_critical_percent,
                );
            }
        }

        next.validate()?;
        next.version = self.version + 1;
        Ok(next)
    }
}

/// A partial configuration update. `None` leaves a value unchanged.
///
/// The set of governed domains cannot be changed by a patch.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub monitor_interval_secs: Option<f64>,
    pub history_capacity: Option<usize>,
    pub idle_threshold_secs: Option<f64>,
    pub throttle_cooldown_secs: Option<f64>,
    pub critical_pause_secs: Option<f64>,
    pub trend_stability_epsilon: Option<f64>,
    pub stop_timeout_secs: Option<f64>,
    pub system: Option<SystemThresholdsPatch>,
    /// Applied to every configured GPU.
    pub gpus: Option<GpuThresholdsPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SystemThresholdsPatch {
    pub cpu_idle_percent: Option<f64>,
    pub cpu_busy_percent: Option<f64>,
    pub cpu_critical_percent: Option<f64>,
    pub memory_busy_percent: Option<f64>,
    pub memory_critical_percent: Option<f64>,
    pub temperature_throttle_c: Option<f64>,
    pub temperature_critical_c: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GpuThresholdsPatch {
    pub temp_optimal_c: Option<f64>,
    pub temp_normal_c: Option<f64>,
    pub temp_throttle_c: Option<f64>,
    pub temp_critical_c: Option<f64>,
    pub memory_optimal_percent: Option<f64>,
    pub memory_normal_percent: Option<f64>,
    pub memory_throttle_percent: Option<f64>,
    pub memory_critical_percent: Option<f64>,
}

impl ConfigPatch {
    /// Parses a patch from TOML using the same keys as the config file.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Validated values always convert; anything else saturates.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

fn ensure_duration(field: &str, value: f64) -> Result<(), ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            expected: "a number of seconds representable as a duration",
        }),
    }
}

fn ensure_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            expected: "a finite number greater than zero",
        })
    }
}

fn ensure_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            expected: "a finite, non-negative number",
        })
    }
}

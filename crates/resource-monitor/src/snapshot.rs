// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Point-in-time resource readings.
//!
//! A [`ResourceSnapshot`] is an immutable value describing one domain at one
//! instant. Fields that do not apply to a domain (GPU fields on the system
//! domain, CPU fields on a GPU) are `None`, never zero.

use crate::MonitorError;
use std::fmt;
use std::str::FromStr;

/// Identifies a governed resource domain.
///
/// Serialised as `"system"` or `"gpu<N>"` so it can be used directly as a
/// JSON object key by the dashboard layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DomainId {
    /// Host CPU and memory.
    System,
    /// A GPU, by device index.
    Gpu(u32),
}

impl DomainId {
    /// Returns `true` for GPU domains.
    pub fn is_gpu(&self) -> bool {
        matches!(self, Self::Gpu(_))
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Gpu(index) => write!(f, "gpu{index}"),
        }
    }
}

impl FromStr for DomainId {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("system") {
            return Ok(Self::System);
        }
        s.strip_prefix("gpu")
            .and_then(|n| n.parse::<u32>().ok())
            .map(Self::Gpu)
            .ok_or_else(|| MonitorError::InvalidDomain(s.to_string()))
    }
}

impl From<DomainId> for String {
    fn from(id: DomainId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DomainId {
    type Error = MonitorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A scalar field of a [`ResourceSnapshot`] that can be averaged or trended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CpuPercent,
    MemoryPercent,
    MemoryAvailableMb,
    CpuTemperatureC,
    GpuLoadPercent,
    GpuMemoryUsedMb,
    /// Derived: `gpu_memory_used_mb / gpu_memory_total_mb * 100`.
    GpuMemoryPercent,
    GpuTemperatureC,
    DiskPercent,
}

/// A single timestamped read of one domain's raw metrics.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceSnapshot {
    /// Unix timestamp in milliseconds when the sample was taken.
    pub timestamp_ms: u64,
    /// The domain this snapshot describes.
    pub domain: DomainId,
    /// Aggregate CPU utilisation in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    /// Per-core CPU utilisation in percent, indexed by core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_core_percent: Option<Vec<f64>>,
    /// Memory in use, in percent of total.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    /// Memory available to new allocations, in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_available_mb: Option<u64>,
    /// SoC / package temperature in degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_load_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_memory_used_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_memory_total_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_percent: Option<f64>,
}

impl ResourceSnapshot {
    /// Creates an empty snapshot for `domain` with every metric absent.
    pub fn new(domain: DomainId, timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            domain,
            cpu_percent: None,
            per_core_percent: None,
            memory_percent: None,
            memory_available_mb: None,
            cpu_temperature_c: None,
            gpu_load_percent: None,
            gpu_memory_used_mb: None,
            gpu_memory_total_mb: None,
            gpu_temperature_c: None,
            disk_percent: None,
        }
    }

    pub fn with_cpu(mut self, percent: f64) -> Self {
        self.cpu_percent = Some(percent);
        self
    }

    pub fn with_per_core(mut self, per_core: Vec<f64>) -> Self {
        self.per_core_percent = Some(per_core);
        self
    }

    pub fn with_memory(mut self, percent: f64, available_mb: u64) -> Self {
        self.memory_percent = Some(percent);
        self.memory_available_mb = Some(available_mb);
        self
    }

    pub fn with_cpu_temperature(mut self, celsius: f64) -> Self {
        self.cpu_temperature_c = Some(celsius);
        self
    }

    pub fn with_gpu_load(mut self, percent: f64) -> Self {
        self.gpu_load_percent = Some(percent);
        self
    }

    pub fn with_gpu_memory(mut self, used_mb: u64, total_mb: u64) -> Self {
        self.gpu_memory_used_mb = Some(used_mb);
        self.gpu_memory_total_mb = Some(total_mb);
        self
    }

    pub fn with_gpu_temperature(mut self, celsius: f64) -> Self {
        self.gpu_temperature_c = Some(celsius);
        self
    }

    pub fn with_disk(mut self, percent: f64) -> Self {
        self.disk_percent = Some(percent);
        self
    }

    /// GPU memory in use as a percentage of total.
    ///
    /// `None` unless both used and (non-zero) total are known.
    pub fn gpu_memory_percent(&self) -> Option<f64> {
        match (self.gpu_memory_used_mb, self.gpu_memory_total_mb) {
            (Some(used), Some(total)) if total > 0 => Some(used as f64 / total as f64 * 100.0),
            _ => None,
        }
    }

    /// Returns the value of `metric`, if this snapshot carries it.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::CpuPercent => self.cpu_percent,
            Metric::MemoryPercent => self.memory_percent,
            Metric::MemoryAvailableMb => self.memory_available_mb.map(|v| v as f64),
            Metric::CpuTemperatureC => self.cpu_temperature_c,
            Metric::GpuLoadPercent => self.gpu_load_percent,
            Metric::GpuMemoryUsedMb => self.gpu_memory_used_mb.map(|v| v as f64),
            Metric::GpuMemoryPercent => self.gpu_memory_percent(),
            Metric::GpuTemperatureC => self.gpu_temperature_c,
            Metric::DiskPercent => self.disk_percent,
        }
    }

    /// Returns a one-line summary suitable for logging or CLI display.
    ///
    /// # Example output
    /// ```text
    /// system: CPU 42.0%, Mem 61.3% (2456 MB avail), Temp 54.3°C
    /// gpu0: Load 87.0%, VRAM 6144/8192 MB (75.0%), Temp 71.0°C
    /// ```
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(cpu) = self.cpu_percent {
            parts.push(format!("CPU {cpu:.1}%"));
        }
        if let (Some(pct), Some(avail)) = (self.memory_percent, self.memory_available_mb) {
            parts.push(format!("Mem {pct:.1}% ({avail} MB avail)"));
        }
        if let Some(load) = self.gpu_load_percent {
            parts.push(format!("Load {load:.1}%"));
        }
        if let (Some(used), Some(total)) = (self.gpu_memory_used_mb, self.gpu_memory_total_mb) {
            let pct = self.gpu_memory_percent().unwrap_or(0.0);
            parts.push(format!("VRAM {used}/{total} MB ({pct:.1}%)"));
        }
        if let Some(temp) = self.cpu_temperature_c.or(self.gpu_temperature_c) {
            parts.push(format!("Temp {temp:.1}°C"));
        }
        if let Some(disk) = self.disk_percent {
            parts.push(format!("Disk {disk:.1}%"));
        }
        if parts.is_empty() {
            parts.push("no metrics".to_string());
        }
        format!("{}: {}", self.domain, parts.join(", "))
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host CPU/memory source backed by procfs and the thermal sysfs tree.

use crate::cpu::{CpuTimes, CpuUsage, STAT_PATH};
use crate::memory::MEMINFO_PATH;
use crate::thermal::{find_cpu_thermal_zone, read_millidegrees};
use crate::{DomainId, MemoryInfo, MetricsSource, ResourceSnapshot, Sample};
use std::path::PathBuf;
use std::sync::Mutex;

/// Reads the `system` domain from `/proc/stat`, `/proc/meminfo` and the
/// CPU thermal zone.
///
/// CPU utilisation is the delta against the previous call, so the first
/// sample after construction carries no CPU fields. Memory is required:
/// if `/proc/meminfo` cannot be read the sample is an error. Temperature
/// is optional and silently absent on hosts without thermal zones.
#[derive(Debug)]
pub struct SystemSource {
    stat_path: PathBuf,
    meminfo_path: PathBuf,
    thermal_path: Option<PathBuf>,
    last_cpu: Mutex<Option<CpuTimes>>,
}

impl SystemSource {
    /// Creates a source over the live procfs/sysfs paths.
    pub fn new() -> Self {
        Self::with_paths(
            PathBuf::from(STAT_PATH),
            PathBuf::from(MEMINFO_PATH),
            find_cpu_thermal_zone(),
        )
    }

    /// Creates a source over explicit file paths.
    pub fn with_paths(stat_path: PathBuf, meminfo_path: PathBuf, thermal_path: Option<PathBuf>) -> Self {
        Self {
            stat_path,
            meminfo_path,
            thermal_path,
            last_cpu: Mutex::new(None),
        }
    }

    fn cpu_usage(&self) -> Option<CpuUsage> {
        let current = match CpuTimes::read_from(&self.stat_path) {
            Ok(times) => times,
            Err(e) => {
                tracing::debug!("cpu counters unavailable: {e}");
                return None;
            }
        };
        let mut last = self.last_cpu.lock().ok()?;
        let usage = last.as_ref().and_then(|prev| CpuUsage::between(prev, &current));
        *last = Some(current);
        usage
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SystemSource {
    fn sample(&self, domain: &DomainId, timestamp_ms: u64) -> Sample {
        let memory = match MemoryInfo::read_from(&self.meminfo_path) {
            Ok(info) => info,
            Err(e) => return Sample::error(e.to_string()),
        };

        let mut snap = ResourceSnapshot::new(domain.clone(), timestamp_ms)
            .with_memory(memory.used_percent(), memory.available_mb);

        if let Some(usage) = self.cpu_usage() {
            snap = snap.with_cpu(usage.percent);
            if !usage.per_core.is_empty() {
                snap = snap.with_per_core(usage.per_core);
            }
        }

        if let Some(path) = &self.thermal_path {
            match read_millidegrees(path) {
                Ok(celsius) => snap = snap.with_cpu_temperature(celsius),
                Err(e) => tracing::debug!("cpu temperature unavailable: {e}"),
            }
        }

        Sample::Snapshot(snap)
    }

    fn name(&self) -> &str {
        "procfs"
    }
}

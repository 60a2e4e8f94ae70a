// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! GPU source backed by the DRM sysfs interface.
//!
//! Drivers that expose VRAM accounting (amdgpu, and several integrated
//! GPUs) publish it under `/sys/class/drm/cardN/device/`:
//!
//! | File | Unit |
//! |------|------|
//! | `gpu_busy_percent` | percent |
//! | `mem_info_vram_used` | bytes |
//! | `mem_info_vram_total` | bytes |
//! | `hwmon/hwmonM/temp1_input` | millidegrees Celsius |
//!
//! Cards without `mem_info_vram_total` are reported as unavailable rather
//! than as an error, so a host with no supported GPU degrades cleanly.

use crate::thermal::{read_millidegrees, read_sysfs_file};
use crate::{DomainId, MetricsSource, MonitorError, ResourceSnapshot, Sample};
use std::path::{Path, PathBuf};

/// Root of the DRM class tree.
const DRM_ROOT: &str = "/sys/class/drm";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Reads one GPU from DRM sysfs.
#[derive(Debug, Clone)]
pub struct SysfsGpuSource {
    device_dir: PathBuf,
}

impl SysfsGpuSource {
    /// Creates a source for `/sys/class/drm/card<index>/device`.
    pub fn new(index: u32) -> Self {
        Self::with_device_dir(Path::new(DRM_ROOT).join(format!("card{index}")).join("device"))
    }

    /// Creates a source over an explicit device directory.
    pub fn with_device_dir(device_dir: PathBuf) -> Self {
        Self { device_dir }
    }

    /// Returns the indices of DRM cards that expose VRAM accounting.
    pub fn detect() -> Vec<u32> {
        detect_in(Path::new(DRM_ROOT))
    }

    fn read(&self, domain: &DomainId, timestamp_ms: u64) -> Result<ResourceSnapshot, MonitorError> {
        let total = read_u64(&self.device_dir.join("mem_info_vram_total"))?;
        let used = read_u64(&self.device_dir.join("mem_info_vram_used"))?;
        let mut snap = ResourceSnapshot::new(domain.clone(), timestamp_ms)
            .with_gpu_memory(used / BYTES_PER_MB, total / BYTES_PER_MB);

        match read_u64(&self.device_dir.join("gpu_busy_percent")) {
            Ok(busy) => snap = snap.with_gpu_load(busy.min(100) as f64),
            Err(e) => tracing::debug!("gpu load unavailable: {e}"),
        }

        if let Some(temp_path) = self.hwmon_temp_path() {
            match read_millidegrees(&temp_path) {
                Ok(celsius) => snap = snap.with_gpu_temperature(celsius),
                Err(e) => tracing::debug!("gpu temperature unavailable: {e}"),
            }
        }

        Ok(snap)
    }

    fn hwmon_temp_path(&self) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(self.device_dir.join("hwmon"))
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path().join("temp1_input"))
            .filter(|p| p.exists())
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }
}

impl MetricsSource for SysfsGpuSource {
    fn sample(&self, domain: &DomainId, timestamp_ms: u64) -> Sample {
        if !self.device_dir.join("mem_info_vram_total").exists() {
            return Sample::unavailable(format!(
                "no VRAM accounting at {}",
                self.device_dir.display()
            ));
        }
        match self.read(domain, timestamp_ms) {
            Ok(snap) => Sample::Snapshot(snap),
            Err(e) => Sample::error(e.to_string()),
        }
    }

    fn name(&self) -> &str {
        "drm-sysfs"
    }
}

fn read_u64(path: &Path) -> Result<u64, MonitorError> {
    let content = read_sysfs_file(path)?;
    content.parse::<u64>().map_err(|_| MonitorError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected unsigned integer, got '{content}'"),
    })
}

fn detect_in(root: &Path) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut indices: Vec<u32> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name();
            let index = name.to_string_lossy().strip_prefix("card")?.parse::<u32>().ok()?;
            e.path()
                .join("device/mem_info_vram_total")
                .exists()
                .then_some(index)
        })
        .collect();
    indices.sort_unstable();
    indices
}

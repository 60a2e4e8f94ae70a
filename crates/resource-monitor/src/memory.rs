// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! System memory readings via `/proc/meminfo`.

use crate::MonitorError;
use std::path::Path;

/// Default path to the kernel memory info file.
pub(crate) const MEMINFO_PATH: &str = "/proc/meminfo";

/// System memory state in megabytes.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MemoryInfo {
    /// Total physical memory.
    pub total_mb: u64,
    /// Memory available to new allocations without swapping.
    pub available_mb: u64,
}

impl MemoryInfo {
    /// Reads current memory information from `/proc/meminfo`.
    pub fn read() -> Result<Self, MonitorError> {
        Self::read_from(Path::new(MEMINFO_PATH))
    }

    /// Reads memory information from a specific file.
    pub fn read_from(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parses `/proc/meminfo`-formatted content.
    ///
    /// Kernels older than 3.14 have no `MemAvailable`; for those the
    /// estimate is `MemFree + Buffers + Cached`.
    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, MonitorError> {
        let mut total_kb = None;
        let mut available_kb = None;
        let mut free_kb = None;
        let mut buffers_kb = None;
        let mut cached_kb = None;

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let slot = match key {
                "MemTotal:" => &mut total_kb,
                "MemAvailable:" => &mut available_kb,
                "MemFree:" => &mut free_kb,
                "Buffers:" => &mut buffers_kb,
                "Cached:" => &mut cached_kb,
                _ => continue,
            };
            *slot = Some(parse_kb_value(value, source_path)?);
        }

        let total_kb = total_kb.ok_or_else(|| MonitorError::ParseError {
            path: source_path.display().to_string(),
            detail: "MemTotal not found".to_string(),
        })?;

        let available_kb = match (available_kb, free_kb) {
            (Some(avail), _) => avail,
            (None, Some(free)) => free + buffers_kb.unwrap_or(0) + cached_kb.unwrap_or(0),
            (None, None) => {
                return Err(MonitorError::ParseError {
                    path: source_path.display().to_string(),
                    detail: "neither MemAvailable nor MemFree found".to_string(),
                })
            }
        };

        Ok(Self {
            total_mb: total_kb / 1024,
            available_mb: available_kb.min(total_kb) / 1024,
        })
    }

    /// Memory in use as a percentage of total, in `[0.0, 100.0]`.
    pub fn used_percent(&self) -> f64 {
        if self.total_mb == 0 {
            return 0.0;
        }
        let used = self.total_mb.saturating_sub(self.available_mb);
        used as f64 / self.total_mb as f64 * 100.0
    }
}

/// Parses a numeric string from `/proc/meminfo` (values are in kB).
fn parse_kb_value(s: &str, source_path: &Path) -> Result<u64, MonitorError> {
    s.parse::<u64>().map_err(|_| MonitorError::ParseError {
        path: source_path.display().to_string(),
        detail: format!("expected integer kB value, got '{s}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MEMINFO: &str = "\
MemTotal:        8192000 kB
MemFree:          512000 kB
MemAvailable:    2048000 kB
Buffers:          102400 kB
Cached:          1024000 kB
SwapCached:            0 kB
";

    #[test]
    fn test_parse_meminfo() {
        let info = MemoryInfo::parse(SAMPLE_MEMINFO, Path::new("/proc/meminfo")).unwrap();
        assert_eq!(info.total_mb, 8000);
        assert_eq!(info.available_mb, 2000);
        assert!((info.used_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_legacy_kernel_fallback() {
        let legacy = "\
MemTotal:        1024000 kB
MemFree:          102400 kB
Buffers:           51200 kB
Cached:           102400 kB
";
        let info = MemoryInfo::parse(legacy, Path::new("/proc/meminfo")).unwrap();
        assert_eq!(info.total_mb, 1000);
        assert_eq!(info.available_mb, 250);
    }

    #[test]
    fn test_missing_total() {
        let result = MemoryInfo::parse("MemFree: 10 kB\n", Path::new("/proc/meminfo"));
        assert!(matches!(result, Err(MonitorError::ParseError { .. })));
    }

    #[test]
    fn test_garbage_value() {
        let result = MemoryInfo::parse("MemTotal: lots kB\n", Path::new("/proc/meminfo"));
        assert!(matches!(result, Err(MonitorError::ParseError { .. })));
    }

    #[test]
    fn test_used_percent_zero_total() {
        let info = MemoryInfo {
            total_mb: 0,
            available_mb: 0,
        };
        assert_eq!(info.used_percent(), 0.0);
    }

    #[test]
    fn test_read_real_meminfo() {
        if Path::new(MEMINFO_PATH).exists() {
            let info = MemoryInfo::read().unwrap();
            assert!(info.total_mb > 0);
            assert!(info.available_mb <= info.total_mb);
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU thermal readings via `/sys/class/thermal/`.
//!
//! The kernel exposes every sensor as a `thermal_zoneN` directory with a
//! `type` label and a `temp` file in millidegrees Celsius. We prefer zones
//! whose type names the CPU package or SoC and fall back to zone 0.

use crate::MonitorError;
use std::path::{Path, PathBuf};

/// Root of the thermal zone tree.
const THERMAL_ROOT: &str = "/sys/class/thermal";

/// Zone `type` labels that identify the CPU package across common platforms.
const CPU_ZONE_TYPES: &[&str] = &["x86_pkg_temp", "cpu-thermal", "cpu_thermal", "soc_thermal", "k10temp"];

/// Locates the `temp` file of the thermal zone that best represents the CPU.
///
/// Returns `None` when the host exposes no thermal zones (containers, VMs).
pub fn find_cpu_thermal_zone() -> Option<PathBuf> {
    find_cpu_thermal_zone_in(Path::new(THERMAL_ROOT))
}

pub(crate) fn find_cpu_thermal_zone_in(root: &Path) -> Option<PathBuf> {
    let mut zones: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("thermal_zone"))
                .unwrap_or(false)
        })
        .filter(|p| p.join("temp").exists())
        .collect();
    zones.sort();

    let preferred = zones.iter().find(|zone| {
        read_sysfs_file(&zone.join("type"))
            .map(|t| CPU_ZONE_TYPES.iter().any(|want| t.eq_ignore_ascii_case(want)))
            .unwrap_or(false)
    });

    preferred.or_else(|| zones.first()).map(|zone| zone.join("temp"))
}

/// Reads a millidegree temperature file and converts it to degrees Celsius.
///
/// The kernel reports e.g. `54321` for 54.321 °C.
pub fn read_millidegrees(path: &Path) -> Result<f64, MonitorError> {
    let content = read_sysfs_file(path)?;
    let millidegrees: i64 = content.parse::<i64>().map_err(|_| MonitorError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected integer millidegrees, got '{content}'"),
    })?;
    Ok(millidegrees as f64 / 1000.0)
}

/// Reads a sysfs/procfs file and returns its trimmed content.
///
/// Shared by every reader in this crate.
pub(crate) fn read_sysfs_file(path: &Path) -> Result<String, MonitorError> {
    if !path.exists() {
        return Err(MonitorError::NotAvailable {
            path: path.display().to_string(),
        });
    }
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Creates a file (and its parent directories) with the given content
    /// under a per-test scratch directory.
    pub(crate) fn write_temp(rel: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join("resource_monitor_test").join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{content}").unwrap();
        path
    }

    #[test]
    fn test_parse_millidegrees() {
        let p = write_temp("thermal/t1/temp", "54321\n");
        assert!((read_millidegrees(&p).unwrap() - 54.321).abs() < 1e-9);
    }

    #[test]
    fn test_parse_negative() {
        let p = write_temp("thermal/t2/temp", "-5000");
        assert!((read_millidegrees(&p).unwrap() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file() {
        let result = read_millidegrees(Path::new("/nonexistent/thermal/temp"));
        assert!(matches!(result, Err(MonitorError::NotAvailable { .. })));
    }

    #[test]
    fn test_invalid_content() {
        let p = write_temp("thermal/t3/temp", "not_a_number");
        assert!(matches!(
            read_millidegrees(&p),
            Err(MonitorError::ParseError { .. })
        ));
    }

    #[test]
    fn test_prefers_cpu_zone() {
        write_temp("zones_a/thermal_zone0/temp", "30000");
        write_temp("zones_a/thermal_zone0/type", "acpitz");
        write_temp("zones_a/thermal_zone1/temp", "61000");
        write_temp("zones_a/thermal_zone1/type", "x86_pkg_temp");
        let root = std::env::temp_dir().join("resource_monitor_test/zones_a");

        let zone = find_cpu_thermal_zone_in(&root).unwrap();
        assert!(zone.ends_with("thermal_zone1/temp"));
        assert!((read_millidegrees(&zone).unwrap() - 61.0).abs() < 1e-9);
    }

    #[test]
    fn test_falls_back_to_first_zone() {
        write_temp("zones_b/thermal_zone0/temp", "45000");
        write_temp("zones_b/thermal_zone0/type", "acpitz");
        let root = std::env::temp_dir().join("resource_monitor_test/zones_b");
        let zone = find_cpu_thermal_zone_in(&root).unwrap();
        assert!(zone.ends_with("thermal_zone0/temp"));
    }

    #[test]
    fn test_no_zones() {
        assert!(find_cpu_thermal_zone_in(Path::new("/nonexistent/thermal")).is_none());
    }
}

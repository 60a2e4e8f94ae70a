// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU utilisation from `/proc/stat` jiffy counters.
//!
//! Utilisation is a rate, so it needs two readings: [`CpuTimes`] captures
//! the cumulative counters at one instant and [`CpuUsage::between`] turns
//! two of them into aggregate and per-core percentages.
//!
//! ```text
//! cpu  4705 356 584 3699 23 23 0 0 0 0      ← aggregate line
//! cpu0 1393 280 283 1078 7 8 0 0 0 0        ← one line per core
//! ```
//! Columns: user nice system idle iowait irq softirq steal guest guest_nice.
//! Guest time is already included in user/nice and is not counted twice.

use crate::MonitorError;
use std::path::Path;

/// Default path to the kernel CPU statistics file.
pub(crate) const STAT_PATH: &str = "/proc/stat";

/// Busy and total jiffies for one CPU line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Jiffies {
    busy: u64,
    total: u64,
}

/// Cumulative CPU counters at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTimes {
    aggregate: Jiffies,
    cores: Vec<Jiffies>,
}

impl CpuTimes {
    /// Reads the counters from `/proc/stat`.
    pub fn read() -> Result<Self, MonitorError> {
        Self::read_from(Path::new(STAT_PATH))
    }

    pub fn read_from(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, MonitorError> {
        let mut aggregate = None;
        let mut cores = Vec::new();

        for line in content.lines() {
            let mut fields = line.split_whitespace();
            let Some(label) = fields.next() else {
                continue;
            };
            if !label.starts_with("cpu") {
                continue;
            }
            let jiffies = parse_jiffies(fields, source_path)?;
            if label == "cpu" {
                aggregate = Some(jiffies);
            } else {
                cores.push(jiffies);
            }
        }

        let aggregate = aggregate.ok_or_else(|| MonitorError::ParseError {
            path: source_path.display().to_string(),
            detail: "aggregate 'cpu' line not found".to_string(),
        })?;

        Ok(Self { aggregate, cores })
    }

    /// Number of per-core lines seen.
    pub fn core_count(&self) -> usize {
        self.cores.len()
    }
}

fn parse_jiffies<'a>(
    fields: impl Iterator<Item = &'a str>,
    source_path: &Path,
) -> Result<Jiffies, MonitorError> {
    let values = fields
        .take(8)
        .map(|f| {
            f.parse::<u64>().map_err(|_| MonitorError::ParseError {
                path: source_path.display().to_string(),
                detail: format!("expected integer jiffies, got '{f}'"),
            })
        })
        .collect::<Result<Vec<u64>, _>>()?;

    if values.len() < 4 {
        return Err(MonitorError::ParseError {
            path: source_path.display().to_string(),
            detail: format!("expected at least 4 cpu columns, got {}", values.len()),
        });
    }

    // idle + iowait are idle; everything else in the first eight columns is busy.
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total: u64 = values.iter().sum();
    Ok(Jiffies {
        busy: total - idle,
        total,
    })
}

/// CPU utilisation over the interval between two [`CpuTimes`] readings.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CpuUsage {
    /// Aggregate utilisation across all cores, in percent.
    pub percent: f64,
    /// Per-core utilisation in percent.
    pub per_core: Vec<f64>,
}

impl CpuUsage {
    /// Computes utilisation from `prev` to `cur`.
    ///
    /// Returns `None` if the counters went backwards (e.g. a core was
    /// hot-unplugged and the line set changed).
    pub fn between(prev: &CpuTimes, cur: &CpuTimes) -> Option<Self> {
        let percent = usage_percent(prev.aggregate, cur.aggregate)?;
        let per_core = if prev.cores.len() == cur.cores.len() {
            prev.cores
                .iter()
                .zip(&cur.cores)
                .map(|(p, c)| usage_percent(*p, *c))
                .collect::<Option<Vec<_>>>()?
        } else {
            Vec::new()
        };
        Some(Self { percent, per_core })
    }
}

fn usage_percent(prev: Jiffies, cur: Jiffies) -> Option<f64> {
    let total = cur.total.checked_sub(prev.total)?;
    let busy = cur.busy.checked_sub(prev.busy)?;
    if total == 0 {
        return Some(0.0);
    }
    Some((busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

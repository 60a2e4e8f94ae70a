// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Human-readable memory sizes.
//!
//! A [`MemoryBudget`] is used in configuration for a GPU's total memory
//! (`memory_total = "8G"`) and is the unit the ledger's limit is derived
//! from.

use crate::LedgerError;
use std::fmt;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// A memory size, stored in bytes.
///
/// # Parsing
/// Accepts SI-style suffixes, case-insensitive:
/// - `"512M"` or `"512MB"` → 512 × 1024² bytes
/// - `"8G"` or `"8GB"` → 8 × 1024³ bytes
/// - `"2048K"` or `"2048KB"` → 2048 × 1024 bytes
/// - `"1073741824"` → raw byte count
///
/// # Examples
/// ```
/// use memory_ledger::MemoryBudget;
///
/// let b = MemoryBudget::parse("8G").unwrap();
/// assert_eq!(b.as_mb(), 8192);
/// assert_eq!(b.scaled(0.5).as_mb(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: u64,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    pub fn from_mb(mb: u64) -> Self {
        Self { bytes: mb * MB }
    }

    pub fn from_gb(gb: u64) -> Self {
        Self { bytes: gb * GB }
    }

    pub fn as_bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns the size in megabytes (truncated).
    pub fn as_mb(&self) -> u64 {
        self.bytes / MB
    }

    /// Returns `fraction` of this size, rounded down to whole bytes.
    ///
    /// `fraction` is clamped to `[0.0, 1.0]`.
    pub fn scaled(&self, fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        Self {
            bytes: (self.bytes as f64 * fraction).floor() as u64,
        }
    }

    /// Parses a human-readable size string.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        let invalid = |detail: &str| LedgerError::InvalidBudget {
            input: s.to_string(),
            detail: detail.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty string"));
        }

        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = [("GB", GB), ("G", GB), ("MB", MB), ("M", MB), ("KB", KB), ("K", KB), ("B", 1)]
            .iter()
            .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest.to_string(), *mult)))
            .unwrap_or((upper.clone(), 1));

        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional suffix (K, M, G)"))?;

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("size overflows 64 bits"))?;

        if bytes == 0 {
            return Err(invalid("size must be greater than zero"));
        }

        Ok(Self { bytes })
    }
}

impl std::str::FromStr for MemoryBudget {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes {
            b if b >= GB && b % GB == 0 => write!(f, "{} GB", b / GB),
            b if b >= MB && b % MB == 0 => write!(f, "{} MB", b / MB),
            b if b >= KB && b % KB == 0 => write!(f, "{} KB", b / KB),
            b => write!(f, "{b} B"),
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # resource-monitor
//!
//! Point-in-time resource readings and the sources that produce them.
//!
//! # Key Components
//! - [`ResourceSnapshot`] — one timestamped reading of one [`DomainId`].
//!   Fields that do not apply to a domain are absent, never zero.
//! - [`MetricsSource`] — the capability the governor polls. It returns a
//!   tagged [`Sample`] (`Snapshot | Unavailable | Error`) instead of a
//!   `Result`, so consumers never interpret provider-specific failures.
//! - [`SystemSource`] — CPU (from `/proc/stat` deltas), memory (from
//!   `/proc/meminfo`) and CPU temperature (from the thermal sysfs tree).
//! - [`SysfsGpuSource`] — GPU load, VRAM and temperature from DRM sysfs.
//! - [`UnavailableSource`] — stands in for a domain with no provider.
//!
//! # Graceful Degradation
//! Only `/proc/meminfo` is required for the system domain. Missing thermal
//! zones leave the temperature field absent; a missing GPU device yields
//! `Sample::Unavailable`.
//!
//! # Example
//! ```no_run
//! use resource_monitor::{DomainId, MetricsSource, SystemSource};
//!
//! let source = SystemSource::new();
//! let sample = source.sample(&DomainId::System, 0);
//! if let Some(snap) = sample.snapshot() {
//!     println!("{}", snap.summary());
//! }
//! ```

mod cpu;
mod error;
mod gpu;
mod memory;
mod snapshot;
mod source;
mod system;
pub(crate) mod thermal;

pub use cpu::{CpuTimes, CpuUsage};
pub use error::MonitorError;
pub use gpu::SysfsGpuSource;
pub use memory::MemoryInfo;
pub use snapshot::{DomainId, Metric, ResourceSnapshot};
pub use source::{MetricsSource, Sample, UnavailableSource};
pub use system::SystemSource;
pub use thermal::{find_cpu_thermal_zone, read_millidegrees};

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared helpers.

pub mod config;
pub mod status;
pub mod watch;

use anyhow::Context;
use governor::{GovernorConfig, GpuDomainConfig};
use resource_monitor::SysfsGpuSource;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialises logging to stderr. `RUST_LOG` overrides the `-v` count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads the configuration file, or the defaults plus every GPU detected
/// on this host when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GovernorConfig> {
    match path {
        Some(path) => GovernorConfig::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let mut config = GovernorConfig::default();
            config.gpus = SysfsGpuSource::detect().into_iter().map(GpuDomainConfig::new).collect();
            tracing::debug!(gpus = config.gpus.len(), "using default configuration");
            Ok(config)
        }
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # govctl
//!
//! Command-line interface for the resource governor.
//!
//! ## Usage
//! ```bash
//! # One-shot health report for the host and detected GPUs
//! govctl status
//! govctl status --json
//!
//! # Run the monitor loop and print every event until Ctrl-C
//! govctl watch --duration 120
//!
//! # Inspect configuration
//! govctl --config governor.toml config show
//! govctl config check governor.toml
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "govctl",
    about = "Resource governor: CPU, memory and GPU health, throttling and memory admission",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample every domain twice, one interval apart, and print the result.
    Status {
        /// Emit the status as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the monitor loop and print events as they happen.
    Watch {
        /// Stop after this many seconds (default: until Ctrl-C).
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Show or validate configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate a configuration file.
    Check {
        /// The file to check.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Status { json } => commands::status::execute(cli.config, json).await,
        Commands::Watch { duration } => commands::watch::execute(cli.config, duration).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(cli.config),
            ConfigAction::Check { file } => commands::config::check(&file),
        },
    }
}

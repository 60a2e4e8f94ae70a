// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `govctl status`: one-shot health report.
//!
//! CPU utilisation is a delta between two `/proc/stat` reads, so the
//! governor is polled twice, one monitor interval apart.

use governor::{DomainStatus, Governor, GovernorStatus};
use std::path::PathBuf;

pub async fn execute(config_path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path.as_deref())?;
    let interval = config.monitor_interval();
    let governor = Governor::new(config)?;

    governor.poll_once();
    tokio::time::sleep(interval).await;
    governor.poll_once();

    let status = governor.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_report(&status);
    }
    Ok(())
}

fn print_report(status: &GovernorStatus) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║          govctl · Resource Governor Status           ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    for domain in &status.domains {
        print_domain(domain);
        println!();
    }

    println!("  Assessment");
    println!("   State:        {}", status.state.label(false));
    println!(
        "   Throttle:     {}",
        if status.should_throttle { "yes" } else { "no" }
    );
    println!(
        "   Multiplier:   {:.1}  {}",
        status.speed_multiplier,
        usage_bar(status.speed_multiplier)
    );
}

fn print_domain(d: &DomainStatus) {
    println!("  {}  [{}]", d.domain, d.label);
    match &d.metrics {
        Some(snap) => {
            if let Some(cpu) = snap.cpu_percent {
                println!("   CPU:          {cpu:5.1}%  {}", usage_bar(cpu / 100.0));
            }
            if let Some(mem) = snap.memory_percent {
                println!("   Memory:       {mem:5.1}%  {}", usage_bar(mem / 100.0));
            }
            if let Some(load) = snap.gpu_load_percent {
                println!("   Load:         {load:5.1}%  {}", usage_bar(load / 100.0));
            }
            if let Some(vram) = snap.gpu_memory_percent() {
                println!("   VRAM:         {vram:5.1}%  {}", usage_bar(vram / 100.0));
            }
            if let Some(temp) = snap.cpu_temperature_c.or(snap.gpu_temperature_c) {
                println!("   Temperature:  {temp:5.1} C  {}", temp_bar(temp));
            }
        }
        None => {
            let reason = d.last_error.as_deref().unwrap_or("no reading yet");
            println!("   No metrics:   {reason}");
        }
    }
    if d.is_idle {
        println!("   Idle for:     {:.0}s", d.idle_duration_secs);
    }
    println!(
        "   Advice:       x{:.1}{}",
        d.speed_multiplier,
        if d.should_throttle { ", throttle" } else { "" }
    );
    if let Some(ledger) = &d.gpu_memory {
        println!("   Ledger:       {}", ledger.summary());
    }
}

/// Creates a visual temperature bar (0-100 C scale).
fn temp_bar(celsius: f64) -> String {
    let symbol = if celsius >= 80.0 {
        "#"
    } else if celsius >= 60.0 {
        "="
    } else {
        "-"
    };
    bar(celsius / 100.0, symbol)
}

/// Creates a visual usage bar (0.0-1.0 scale).
fn usage_bar(ratio: f64) -> String {
    let symbol = if ratio >= 0.9 {
        "#"
    } else if ratio >= 0.7 {
        "="
    } else {
        "-"
    };
    bar(ratio, symbol)
}

fn bar(ratio: f64, symbol: &str) -> String {
    let filled = ((ratio.clamp(0.0, 1.0)) * 20.0).round() as usize;
    format!("[{}{}]", symbol.repeat(filled), ".".repeat(20 - filled))
}

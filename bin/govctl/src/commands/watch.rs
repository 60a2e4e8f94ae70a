// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `govctl watch`: run the monitor thread and stream events.

use governor::{EventType, Governor, StopOutcome};
use std::path::PathBuf;
use std::time::Duration;

pub async fn execute(config_path: Option<PathBuf>, duration: Option<f64>) -> anyhow::Result<()> {
    let config = super::load_config(config_path.as_deref())?;
    let interval = config.monitor_interval();
    let governor = Governor::new(config)?;

    for kind in EventType::ALL {
        governor.register_callback(kind, |event| {
            let reading = event
                .snapshot
                .as_ref()
                .map(|s| s.summary())
                .unwrap_or_else(|| "no reading".into());
            println!(
                "[{}] {:<12} {}: {} -> {}  ({reading})",
                event.timestamp_ms,
                event.kind,
                event.domain,
                event.previous.label(event.domain.is_gpu()),
                event.current.label(event.domain.is_gpu()),
            );
            Ok(())
        });
    }

    governor.start()?;
    println!(
        "watching {} domain(s) every {:.1}s; Ctrl-C to stop",
        governor.domains().len(),
        interval.as_secs_f64()
    );

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::try_from_secs_f64(secs)?).await,
            None => std::future::pending::<()>().await,
        }
        Ok::<(), anyhow::Error>(())
    };
    let mut ticker = tokio::time::interval(interval);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            done = &mut deadline => {
                done?;
                break;
            }
            _ = ticker.tick() => {
                let status = governor.status();
                println!(
                    "  state {:<11} x{:.1}{}",
                    status.state.label(false),
                    status.speed_multiplier,
                    if status.should_throttle { " throttle" } else { "" },
                );
            }
        }
    }

    match governor.stop() {
        StopOutcome::TimedOut => tracing::warn!("monitor thread still finishing its last sample"),
        StopOutcome::Stopped | StopOutcome::NotRunning => {}
    }
    print!("{}", governor.status().summary());
    Ok(())
}

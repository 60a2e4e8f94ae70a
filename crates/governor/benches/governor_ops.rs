// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the per-tick hot paths: classification, history
//! maintenance and ledger admission.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use governor::{classify, GpuThresholds, MetricsHistory, SystemThresholds};
use memory_ledger::GpuMemoryLedger;
use resource_monitor::{DomainId, Metric, ResourceSnapshot};
use std::time::Duration;

fn bench_classify(c: &mut Criterion) {
    let system = SystemThresholds::default();
    let gpu = GpuThresholds::default();
    let host = ResourceSnapshot::new(DomainId::System, 0)
        .with_cpu(72.0)
        .with_memory(64.0, 4096)
        .with_cpu_temperature(61.0);
    let card = ResourceSnapshot::new(DomainId::Gpu(0), 0)
        .with_gpu_temperature(77.0)
        .with_gpu_load(88.0)
        .with_gpu_memory(6144, 8192);

    c.bench_function("classify_system", |b| {
        b.iter(|| classify(Some(black_box(&host)), &system))
    });
    c.bench_function("classify_gpu", |b| b.iter(|| classify(Some(black_box(&card)), &gpu)));
}

fn bench_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("history");
    for capacity in [120usize, 1200] {
        let mut history = MetricsHistory::new(capacity);
        for i in 0..capacity as u64 {
            history.push(ResourceSnapshot::new(DomainId::System, i * 1000).with_cpu((i % 100) as f64));
        }
        let now_ms = capacity as u64 * 1000;

        group.bench_with_input(BenchmarkId::new("push", capacity), &capacity, |b, _| {
            let mut h = history.clone();
            let mut ts = now_ms;
            b.iter(|| {
                ts += 1000;
                h.push(ResourceSnapshot::new(DomainId::System, ts).with_cpu(50.0))
            })
        });
        group.bench_with_input(BenchmarkId::new("trend_5min", capacity), &capacity, |b, _| {
            b.iter(|| history.trend(Metric::CpuPercent, Duration::from_secs(300), black_box(now_ms), 5.0))
        });
    }
    group.finish();
}

fn bench_ledger(c: &mut Criterion) {
    let ledger = GpuMemoryLedger::new("gpu0", 8192, 7372);
    for i in 0..64 {
        ledger.allocate(&format!("resident-{i}"), 16);
    }
    c.bench_function("ledger_allocate_deallocate", |b| {
        b.iter(|| {
            ledger.allocate(black_box("batch"), 512);
            ledger.deallocate(black_box("batch"))
        })
    });
}

criterion_group!(benches, bench_classify, bench_history, bench_ledger);
criterion_main!(benches);

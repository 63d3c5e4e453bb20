//! 调度与统计基准测试
//!
//! 测试到期判断、可用率计算和目标解析的性能

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;
use uptyne::health::{is_due, CheckResult, ProbeOutcome, Target};
use uptyne::recorder::uptime_percent;

fn history(len: usize) -> Vec<CheckResult> {
    let now = Utc::now();
    (0..len)
        .map(|i| {
            let outcome = if i % 7 == 0 {
                ProbeOutcome::down(Duration::from_millis(900), "HTTP 502 Bad Gateway")
                    .with_status_code(502)
            } else {
                ProbeOutcome::up(Duration::from_millis(120)).with_status_code(200)
            };
            CheckResult::from_outcome("api", outcome, now - ChronoDuration::minutes(i as i64))
        })
        .collect()
}

/// 到期判断基准测试
fn due_check_benchmark(c: &mut Criterion) {
    let now = Utc::now();
    let interval = ChronoDuration::minutes(5);
    let last_checked: Vec<_> = (0..1000)
        .map(|i| Some(now - ChronoDuration::seconds(i)))
        .collect();

    c.bench_function("is_due_1000_monitors", |b| {
        b.iter(|| {
            let due = last_checked
                .iter()
                .filter(|last| is_due(interval, **last, now))
                .count();
            black_box(due)
        });
    });
}

/// 可用率计算基准测试
fn uptime_benchmark(c: &mut Criterion) {
    let checks = history(100);
    c.bench_function("uptime_percent_window_100", |b| {
        b.iter(|| black_box(uptime_percent(black_box(&checks))));
    });
}

/// 目标解析基准测试
fn target_parse_benchmark(c: &mut Criterion) {
    let urls = [
        "https://api.example.com/health",
        "tcp://db.example.com:5432",
        "ping://gateway.example.com",
    ];
    c.bench_function("target_parse", |b| {
        b.iter(|| {
            for url in &urls {
                black_box(Target::parse(black_box(url)).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    due_check_benchmark,
    uptime_benchmark,
    target_parse_benchmark
);
criterion_main!(benches);

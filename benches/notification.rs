//! 告警处理基准测试
//!
//! 测试告警模板渲染和聊天消息构建的性能

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;
use uptyne::health::{CheckResult, ProbeOutcome};
use uptyne::notification::{AlertPayload, AlertTemplates, SlackSender};
use uptyne::store::Monitor;

fn down_payload() -> AlertPayload {
    let monitor = Monitor::new("api", "ops", "production-api", "https://api.example.com/health", 5);
    let outcome = ProbeOutcome::down(Duration::from_millis(250), "HTTP 503 Service Unavailable")
        .with_status_code(503);
    let check = CheckResult::from_outcome(&monitor.id, outcome, Utc::now());
    AlertPayload::new(&monitor, &check)
}

/// 告警处理基准测试
fn notification_benchmark(c: &mut Criterion) {
    let payload = down_payload();

    c.bench_function("sms_template_rendering", |b| {
        let templates = AlertTemplates::default();
        b.iter(|| black_box(templates.render_sms(black_box(&payload)).unwrap()));
    });

    c.bench_function("chat_message_body", |b| {
        let sender = SlackSender::new(Duration::from_secs(5), AlertTemplates::default()).unwrap();
        b.iter(|| black_box(sender.build_message_body(black_box(&payload)).unwrap()));
    });

    c.bench_function("template_compilation", |b| {
        b.iter(|| {
            let templates = AlertTemplates::new(
                "{{emoji}} {{monitor_name}} {{status_upper}}",
                "{{monitor_name}} {{status_text}}",
                "Monitor {{monitor_name}}",
            )
            .unwrap();
            black_box(templates)
        });
    });
}

criterion_group!(benches, notification_benchmark);
criterion_main!(benches);

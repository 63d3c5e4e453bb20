//! 检测引擎端到端场景测试
//!
//! 使用假探测器和假发送器驱动完整的调度、记录和告警流程

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uptyne::domain::{
    DnsCheck, DnsResolver, DomainChecker, DomainSettings, SslCheck, TlsInspector, WhoisCheck,
    WhoisLookup,
};
use uptyne::error::NotificationError;
use uptyne::health::{
    CheckScheduler, CheckStatus, EngineSettings, ProbeKind, ProbeOutcome, ProtocolProbe, Target,
    TcpProbe,
};
use uptyne::notification::{AlertDispatcher, AlertPayload, AlertPolicy, ChatSender, SmsSender};
use uptyne::recorder::{Recorder, DEFAULT_UPTIME_WINDOW};
use uptyne::store::{AlertPreference, MemoryStore, Monitor, MonitorStore, User};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, minute, 0).unwrap()
}

/// 按主机名返回预设结果
struct ScriptedProbe {
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProtocolProbe for ScriptedProbe {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match target.host() {
            "down.example.com" => {
                ProbeOutcome::down(Duration::from_millis(40), "HTTP 503 Service Unavailable")
                    .with_status_code(503)
            }
            _ => ProbeOutcome::up(Duration::from_millis(120)).with_status_code(200),
        }
    }

    fn timeout_for(&self, _kind: ProbeKind) -> Duration {
        Duration::from_secs(1)
    }
}

/// TCP连接永远不会完成
struct StalledTcp {
    tcp: TcpProbe,
}

#[async_trait]
impl ProtocolProbe for StalledTcp {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        match target {
            Target::Tcp { host, port } => {
                let stalled = std::future::pending::<std::io::Result<tokio::net::TcpStream>>();
                self.tcp.check_with(host, *port, stalled).await
            }
            other => ProbeOutcome::error(Duration::ZERO, format!("unexpected {}", other.host())),
        }
    }

    fn timeout_for(&self, _kind: ProbeKind) -> Duration {
        self.tcp.timeout()
    }
}

struct ExpiredTls;
struct ResolvingDns;
struct EmptyWhois;

#[async_trait]
impl TlsInspector for ExpiredTls {
    async fn inspect(&self, _domain: &str) -> SslCheck {
        SslCheck::failed("certificate has expired")
    }
}

#[async_trait]
impl DnsResolver for ResolvingDns {
    async fn resolve(&self, _domain: &str) -> DnsCheck {
        DnsCheck {
            resolved: true,
            records: vec!["203.0.113.10".to_string()],
            error: None,
        }
    }
}

#[async_trait]
impl WhoisLookup for EmptyWhois {
    async fn lookup(&self, _domain: &str) -> WhoisCheck {
        WhoisCheck::failed("whois: command not found")
    }
}

/// 记录发送次数，可配置为总是失败
struct CountingSender {
    fail: bool,
    sms: AtomicUsize,
    chat: AtomicUsize,
}

impl CountingSender {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            sms: AtomicUsize::new(0),
            chat: AtomicUsize::new(0),
        })
    }

    fn result(&self) -> Result<(), NotificationError> {
        if self.fail {
            Err(NotificationError::SendError("provider unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SmsSender for CountingSender {
    async fn send_sms(&self, _to: &str, _payload: &AlertPayload) -> Result<(), NotificationError> {
        self.sms.fetch_add(1, Ordering::SeqCst);
        self.result()
    }
}

#[async_trait]
impl ChatSender for CountingSender {
    async fn send_chat_alert(
        &self,
        _webhook_url: &str,
        _payload: &AlertPayload,
    ) -> Result<(), NotificationError> {
        self.chat.fetch_add(1, Ordering::SeqCst);
        self.result()
    }
}

fn ops_user() -> User {
    User {
        id: "ops".to_string(),
        alerts: AlertPreference {
            sms_enabled: true,
            phone_number: Some("+15551234567".to_string()),
            chat_enabled: true,
            chat_webhook_url: Some("https://hooks.example.com/T000/B000".to_string()),
        },
    }
}

fn domain_checker() -> DomainChecker {
    DomainChecker::new(
        Arc::new(ExpiredTls),
        Arc::new(ResolvingDns),
        Arc::new(EmptyWhois),
        DomainSettings::default(),
    )
}

fn settings() -> EngineSettings {
    EngineSettings {
        max_concurrent_checks: 4,
        domain_check_interval: chrono::Duration::hours(24),
        probe_grace: Duration::from_millis(500),
    }
}

fn scheduler(
    store: Arc<MemoryStore>,
    probes: Arc<dyn ProtocolProbe>,
    sms: Arc<CountingSender>,
    chat: Arc<CountingSender>,
) -> CheckScheduler {
    let dispatcher = AlertDispatcher::with_senders(AlertPolicy::Transition, Some(sms), chat);
    CheckScheduler::new(
        store.clone(),
        probes,
        Arc::new(domain_checker()),
        Arc::new(Recorder::new(store, DEFAULT_UPTIME_WINDOW)),
        Arc::new(dispatcher),
        settings(),
    )
}

async fn store_with(monitors: Vec<Monitor>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.replace_roster(monitors, vec![ops_user()]).await;
    store
}

#[tokio::test]
async fn test_first_check_of_healthy_monitor() {
    let store = store_with(vec![Monitor::new(
        "site",
        "ops",
        "Site",
        "https://site.example.com",
        5,
    )])
    .await;
    let sms = CountingSender::new(false);
    let chat = CountingSender::new(false);
    let scheduler = scheduler(store.clone(), ScriptedProbe::new(), sms.clone(), chat.clone());

    let summary = scheduler.run_monitor_pass(at(0)).await.unwrap();
    assert_eq!(summary.monitors_due, 1);
    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.alerts_sent, 0);

    let check = store.latest_check("site").await.unwrap().unwrap();
    assert_eq!(check.status, CheckStatus::Up);
    assert_eq!(check.response_time_ms, 120);
    assert_eq!(check.status_code, Some(200));
    assert_eq!(check.checked_at, at(0));

    let overview = scheduler.recorder().summary("site").await.unwrap();
    assert_eq!(overview.uptime_percent, 100);
    assert_eq!(overview.current_status, Some(CheckStatus::Up));

    // 首次检测健康，不发送告警
    assert_eq!(sms.sms.load(Ordering::SeqCst), 0);
    assert_eq!(chat.chat.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recently_checked_monitor_is_skipped() {
    let store = store_with(vec![Monitor::new(
        "site",
        "ops",
        "Site",
        "https://site.example.com",
        5,
    )])
    .await;
    let probe = ScriptedProbe::new();
    let scheduler = scheduler(
        store.clone(),
        probe.clone(),
        CountingSender::new(false),
        CountingSender::new(false),
    );

    scheduler.run_monitor_pass(at(0)).await.unwrap();
    let summary = scheduler.run_monitor_pass(at(4)).await.unwrap();

    assert_eq!(summary.monitors_checked, 1);
    assert_eq!(summary.monitors_due, 0);
    assert_eq!(summary.recorded, 0);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.count_checks("site").await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_tcp_target_is_down() {
    let store = store_with(vec![Monitor::new(
        "db",
        "ops",
        "Database",
        "tcp://10.255.255.1:81",
        1,
    )])
    .await;
    let probes = StalledTcp {
        tcp: TcpProbe::new(Duration::from_millis(5000)),
    };
    let scheduler = scheduler(
        store.clone(),
        Arc::new(probes),
        CountingSender::new(false),
        CountingSender::new(false),
    );

    let summary = scheduler.run_monitor_pass(at(0)).await.unwrap();
    assert_eq!(summary.recorded, 1);

    let check = store.latest_check("db").await.unwrap().unwrap();
    assert_eq!(check.status, CheckStatus::Down);
    assert!(check.status_code.is_none());
    assert_eq!(
        check.error_message.as_deref(),
        Some("TCP timeout after 5000ms")
    );
    assert!((5000..5050).contains(&check.response_time_ms));
}

#[tokio::test]
async fn test_domain_check_records_mixed_results() {
    let store = store_with(vec![Monitor::new(
        "shop",
        "ops",
        "Shop",
        "https://Shop.Example.com/health",
        5,
    )])
    .await;
    let scheduler = scheduler(
        store.clone(),
        ScriptedProbe::new(),
        CountingSender::new(false),
        CountingSender::new(false),
    );

    let summary = scheduler.run_domain_pass(at(0)).await.unwrap();
    assert_eq!(summary.recorded, 1);

    let record = store.latest_domain_check("shop").await.unwrap().unwrap();
    assert_eq!(record.result.domain, "shop.example.com");
    assert!(!record.result.ssl.valid);
    assert!(record.result.ssl.error.is_some());
    assert!(record.result.dns.resolved);
    assert_eq!(record.result.dns.records, vec!["203.0.113.10".to_string()]);
    assert!(record.result.whois.error.is_some());
}

#[tokio::test]
async fn test_failing_sms_does_not_block_chat() {
    let store = store_with(vec![Monitor::new(
        "api",
        "ops",
        "API",
        "https://down.example.com",
        1,
    )])
    .await;
    let sms = CountingSender::new(true);
    let chat = CountingSender::new(false);
    let scheduler = scheduler(store.clone(), ScriptedProbe::new(), sms.clone(), chat.clone());

    let summary = scheduler.run_monitor_pass(at(0)).await.unwrap();

    assert_eq!(summary.recorded, 1);
    assert_eq!(sms.sms.load(Ordering::SeqCst), 1);
    assert_eq!(chat.chat.load(Ordering::SeqCst), 1);
    assert_eq!(summary.alerts_sent, 1);

    let check = store.latest_check("api").await.unwrap().unwrap();
    assert_eq!(check.status, CheckStatus::Down);
    assert_eq!(check.status_code, Some(503));
}

#[tokio::test]
async fn test_persistent_failure_alerts_once_under_transition_policy() {
    let store = store_with(vec![Monitor::new(
        "api",
        "ops",
        "API",
        "https://down.example.com",
        1,
    )])
    .await;
    let sms = CountingSender::new(false);
    let chat = CountingSender::new(false);
    let scheduler = scheduler(store, ScriptedProbe::new(), sms.clone(), chat.clone());

    scheduler.run_monitor_pass(at(0)).await.unwrap();
    scheduler.run_monitor_pass(at(1)).await.unwrap();
    scheduler.run_monitor_pass(at(2)).await.unwrap();

    assert_eq!(chat.chat.load(Ordering::SeqCst), 1);
    assert_eq!(sms.sms.load(Ordering::SeqCst), 1);
}

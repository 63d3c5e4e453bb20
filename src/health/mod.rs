//! 健康检测模块
//!
//! 提供HTTP、TCP、Ping协议探测，检测结果类型和到期检测调度

pub mod checker;
pub mod http;
pub mod ping;
pub mod result;
pub mod scheduler;
pub mod target;
pub mod tcp;

// 重新导出主要类型
pub use checker::{ProbeSet, ProbeSettings, ProtocolProbe, DEFAULT_USER_AGENT};
pub use http::HttpProbe;
pub use ping::PingProbe;
pub use result::{CheckResult, CheckStatus, ProbeOutcome};
pub use scheduler::{is_due, CheckScheduler, EngineSettings, PassSummary};
pub use target::{ProbeKind, Target};
pub use tcp::TcpProbe;

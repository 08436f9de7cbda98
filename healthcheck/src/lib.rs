pub mod alarm;
pub mod api;
pub mod classify;
pub mod config;
pub mod constants;
pub mod errors;
pub mod notify;
pub mod orchestrator;
pub mod p2p;
pub mod report;
pub mod storage;
pub mod tls;

// Re-export commonly used types
pub use alarm::{AlarmCategory, AlarmKind, AlarmRegistry};
pub use config::{Config, ConfigManager};
pub use errors::MonitorError;
pub use notify::Notifier;
pub use orchestrator::run_all;
pub use report::{ApiCheckResult, P2pCheckResult, Report};
pub use storage::{FsStore, StateStore};

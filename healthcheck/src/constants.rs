//! Central repository for timeouts, score weights, and thresholds
//!
//! Constants are grouped by the component that owns them so the scoring
//! policy and every probe deadline can be read in one place.

use std::time::Duration;

/// Deadlines for the TLS downgrade prober
pub mod tls {
    use super::Duration;

    /// TCP dial timeout per candidate handshake
    pub const DIAL_TIMEOUT: Duration = Duration::from_secs(2);

    /// Time allowed for the server to answer a ClientHello
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Upper bound on the bytes read while looking for a ServerHello
    pub const MAX_HELLO_BYTES: usize = 64 * 1024;
}

/// Chain RPC and raw HTTP settings for API node checks
pub mod api {
    /// Head block older than this is reported as lagging
    pub const MAX_HEAD_BLOCK_LAG_SECONDS: i64 = 30;

    /// Certificates expiring sooner than this are noted
    pub const CERT_WARNING_DAYS: f64 = 30.0;

    /// Default per-request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

    pub const GET_INFO_PATH: &str = "/v1/chain/get_info";
    pub const GET_BLOCK_PATH: &str = "/v1/chain/get_block";
    pub const PRODUCER_SCHEDULE_PATH: &str = "/v1/chain/get_producer_schedule";
    pub const NET_CONNECTIONS_PATH: &str = "/v1/net/connections";
    pub const PRODUCER_PAUSED_PATH: &str = "/v1/producer/paused";
}

/// Peer protocol settings for P2P node checks
pub mod p2p {
    use super::Duration;

    /// Default time allowed to open the TCP connection
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Time allowed for any single frame to arrive
    pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

    /// Ceiling for the session once the connection is open and the handshake
    /// sent. A check can therefore take up to the connect timeout plus this.
    pub const PROBE_CEILING: Duration = Duration::from_secs(2);

    /// A block newer than this means the peer is in sync
    pub const MAX_BLOCK_AGE_SECONDS: i64 = 30;

    /// Frames larger than this are treated as a protocol violation
    pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

    pub const NETWORK_VERSION: u16 = 1206;
    pub const AGENT_NAME: &str = "healthcheck";
    pub const START_HEAD_BLOCK_NUM: u32 = 1;
}

/// Additive severity weights. Used only for ranking results.
pub mod score {
    pub const CONNECTION_FAILED: f32 = 10.0;
    pub const REQUEST_FAILED: f32 = 10.0;
    pub const HEAD_BLOCK_LAG: f32 = 1.0;
    pub const WRONG_CHAIN: f32 = 5.0;
    pub const WEAK_TLS: f32 = 1.0;
    pub const MISSING_CORS: f32 = 1.0;
    pub const OLD_TLS_VERSION: f32 = 1.0;
    pub const TLS_DISABLED: f32 = 1.0;
    pub const CERT_EXPIRING: f32 = 0.1;
    pub const EXPOSED_API: f32 = 3.0;

    pub const P2P_FAILURE: u32 = 1;
}

/// Alarm bookkeeping
pub mod alerts {
    /// Default flap suppression window in hours
    pub const DEFAULT_SUPPRESSION_HOURS: i64 = 4;

    /// Cert expiry notes at or below this many days bypass suppression
    pub const IMMINENT_CERT_EXPIRY_DAYS: i64 = 1;

    /// Telegram request timeout
    pub const NOTIFY_TIMEOUT_SECONDS: u64 = 10;

    pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
}

/// Storage keys, relative to the output directory
pub mod storage {
    pub const API_ALARMS_KEY: &str = "json/api_health.json";
    pub const P2P_ALARMS_KEY: &str = "json/p2p_health.json";
    pub const REPORT_KEY: &str = "json/report.json";
    pub const HISTORY_DIR: &str = "history";
}

/// Well known chain ids accepted as aliases in the config file
pub mod chains {
    pub const MAINNET_ID: &str =
        "21dcae42c0182200e93f954a074011f9048a7624c6fe81d3c9541a614a88bd1c";
    pub const TESTNET_ID: &str =
        "b20901380af44ef59c5918439a1f9a41d83669020319a80574b804a5f95cbd7e";
}

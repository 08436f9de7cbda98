//! Check results and the JSON report written after every run

use crate::constants::storage::{HISTORY_DIR, REPORT_KEY};
use crate::errors::StateError;
use crate::storage::StateStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiCheckResult {
    pub kind: String,
    pub node: String,
    pub node_version: String,
    pub timestamp: i64,
    pub had_error: bool,
    pub error: String,
    pub error_for: String,
    pub request_latency_ms: i64,
    pub head_block_latency_ms: i64,
    pub wrong_version: bool,
    pub permissive_cors: bool,
    pub tls_version_ok: bool,
    pub tls_cipher_ok: bool,
    pub tls_note: String,
    pub producer_exposed: bool,
    pub net_exposed: bool,
    pub from_geo: String,
    /// Ranking only
    #[serde(skip)]
    pub score: f32,
}

impl ApiCheckResult {
    pub fn new(node: &str, origin: &str) -> Self {
        Self {
            kind: "api".to_string(),
            node: node.to_string(),
            timestamp: Utc::now().timestamp(),
            from_geo: origin.to_string(),
            ..Default::default()
        }
    }

    /// Stands in for a check whose task died before producing a result.
    pub fn task_failed(node: &str, origin: &str) -> Self {
        let mut result = Self::new(node, origin);
        result.had_error = true;
        result.error = "check task failed".to_string();
        result.score = crate::constants::score::CONNECTION_FAILED;
        result
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct P2pCheckResult {
    pub kind: String,
    pub peer: String,
    pub timestamp: i64,
    pub took_sec: i64,
    pub reachable: bool,
    pub healthy: bool,
    pub head_block_latency_ms: i64,
    pub error: String,
    pub from_geo: String,
    #[serde(skip)]
    pub score: u32,
}

impl P2pCheckResult {
    pub fn new(peer: &str, origin: &str) -> Self {
        Self {
            kind: "p2p".to_string(),
            peer: peer.to_string(),
            timestamp: Utc::now().timestamp(),
            from_geo: origin.to_string(),
            ..Default::default()
        }
    }

    pub fn task_failed(peer: &str, origin: &str) -> Self {
        let mut result = Self::new(peer, origin);
        result.error = "check task failed".to_string();
        result.score = crate::constants::score::P2P_FAILURE;
        result
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub api: Vec<ApiCheckResult>,
    pub p2p: Vec<P2pCheckResult>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Report {
    pub fn new(description: &str, api: Vec<ApiCheckResult>, p2p: Vec<P2pCheckResult>) -> Self {
        Self {
            api,
            p2p,
            timestamp: Utc::now(),
            description: description.to_string(),
        }
    }

    /// Writes the latest report plus a timestamped copy under the history
    /// directory.
    pub async fn write<S: StateStore>(&self, store: &S) -> Result<(), StateError> {
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|e| StateError::SerializationError {
                reason: e.to_string(),
            })?;

        store.save(REPORT_KEY, &bytes).await?;
        let history_key = format!("{}/{}.json", HISTORY_DIR, self.timestamp.timestamp());
        store.save(&history_key, &bytes).await?;

        info!(
            "Report written: {} api results, {} p2p results",
            self.api.len(),
            self.p2p.len()
        );
        Ok(())
    }
}

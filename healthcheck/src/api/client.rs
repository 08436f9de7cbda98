//! Minimal chain RPC client for the endpoints the checker exercises

use crate::classify;
use crate::constants::api::{
    GET_BLOCK_PATH, GET_INFO_PATH, NET_CONNECTIONS_PATH, PRODUCER_PAUSED_PATH,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub enum RpcError {
    Transport(reqwest::Error),
    Status { status: u16, body: String },
    Decode(String),
}

impl RpcError {
    /// Short category for reports: transport failures are normalized,
    /// everything else keeps its own text.
    pub fn category(&self) -> String {
        match self {
            RpcError::Transport(e) => classify::normalize_reqwest(e),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(e) => write!(f, "HTTP request failed: {}", e),
            RpcError::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "HTTP error {}", status)
                } else {
                    write!(f, "HTTP error {}: {}", status, body)
                }
            }
            RpcError::Decode(reason) => write!(f, "Failed to parse JSON response: {}", reason),
        }
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Clone, Deserialize)]
pub struct GetInfo {
    pub chain_id: String,
    #[serde(deserialize_with = "block_time")]
    pub head_block_time: DateTime<Utc>,
    pub head_block_num: u32,
    pub last_irreversible_block_num: u32,
    #[serde(default)]
    pub server_version_string: String,
}

/// Block times come without a zone suffix and are always UTC.
fn block_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_block_time(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_block_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let trimmed = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc())
}

#[derive(Debug, Clone)]
pub struct ChainClient {
    http: HttpClient,
    base_url: String,
}

impl ChainClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(RpcError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Builds the client and proves the node answers `get_info`.
    pub async fn connect(base_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = Self::new(base_url, timeout)?;
        client.get_info().await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_info(&self) -> Result<GetInfo, RpcError> {
        self.post(GET_INFO_PATH, None).await
    }

    pub async fn get_block(&self, block_num: u32) -> Result<serde_json::Value, RpcError> {
        let body = serde_json::json!({ "block_num_or_id": block_num });
        self.post(GET_BLOCK_PATH, Some(&body)).await
    }

    pub async fn get_net_connections(&self) -> Result<serde_json::Value, RpcError> {
        self.post(NET_CONNECTIONS_PATH, None).await
    }

    pub async fn get_producer_paused(&self) -> Result<serde_json::Value, RpcError> {
        self.post(PRODUCER_PAUSED_PATH, None).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, RpcError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let mut request = self.http.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(RpcError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let bytes = response.bytes().await.map_err(RpcError::Transport)?;
        serde_json::from_slice(&bytes).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

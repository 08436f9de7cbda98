pub mod manager;

use crate::constants::{alerts, api, chains, p2p};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use manager::ConfigManager;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub report_title: String,
    /// "mainnet", "testnet" or a 64 character hex chain id
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub expected_version_prefix: String,
    #[serde(default)]
    pub api_nodes: Vec<String>,
    #[serde(default)]
    pub p2p_nodes: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub telegram_channel: String,
    #[serde(default)]
    pub base_url: String,
    /// Hours to suppress repeat alarms for a flapping host
    #[serde(default)]
    pub flap_suppression: i64,
    /// Where the checks run from, copied into every result
    #[serde(default)]
    pub origin_tag: String,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_seconds: u64,
    #[serde(default = "default_p2p_connect_timeout")]
    pub p2p_connect_timeout_seconds: u64,
    // Only ever read from the environment
    #[serde(skip)]
    pub telegram_key: String,
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_api_timeout() -> u64 {
    api::DEFAULT_TIMEOUT_SECONDS
}

fn default_p2p_connect_timeout() -> u64 {
    p2p::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

impl Config {
    /// Normalizes values in place and rejects anything the checkers can't use.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.report_title.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "report_title".to_string(),
            });
        }

        match self.chain_id.as_str() {
            "" => {
                return Err(ConfigError::MissingRequired {
                    field: "chain_id".to_string(),
                })
            }
            "mainnet" => self.chain_id = chains::MAINNET_ID.to_string(),
            "testnet" => self.chain_id = chains::TESTNET_ID.to_string(),
            _ => {}
        }
        // node reports carry bare lowercase hex
        self.chain_id = hex::encode(self.chain_id_bytes()?);

        if self.api_nodes.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_nodes".to_string(),
            });
        }
        if self.p2p_nodes.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "p2p_nodes".to_string(),
            });
        }

        let mut format_errors = Vec::new();
        for node in self.api_nodes.iter_mut() {
            if !node.starts_with("http") {
                format_errors.push(format!("malformed api '{}' missing http(s) prefix", node));
            }
            *node = node.trim_end_matches('/').to_string();
        }
        for peer in &self.p2p_nodes {
            if !is_host_port(peer) {
                format_errors.push(format!("malformed p2p '{}' should be name:port", peer));
            }
        }
        if !format_errors.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "nodes".to_string(),
                reason: format_errors.join(", "),
            });
        }

        if self.output_dir.is_empty() {
            self.output_dir = default_output_dir();
        }
        if self.output_dir.len() > 1 {
            self.output_dir = self.output_dir.trim_end_matches('/').to_string();
        }

        if self.flap_suppression < 1 {
            self.flap_suppression = alerts::DEFAULT_SUPPRESSION_HOURS;
        }
        if self.api_timeout_seconds == 0 {
            self.api_timeout_seconds = default_api_timeout();
        }
        if self.p2p_connect_timeout_seconds == 0 {
            self.p2p_connect_timeout_seconds = default_p2p_connect_timeout();
        }

        Ok(())
    }

    pub fn chain_id_bytes(&self) -> Result<[u8; 32], ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: "chain_id".to_string(),
            reason,
        };
        let raw = hex::decode(self.chain_id.trim_start_matches("0x"))
            .map_err(|e| invalid(e.to_string()))?;
        raw.try_into()
            .map_err(|raw: Vec<u8>| invalid(format!("expected 32 bytes, got {}", raw.len())))
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    pub fn p2p_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.p2p_connect_timeout_seconds)
    }
}

fn is_host_port(peer: &str) -> bool {
    let Some((host, port)) = peer.rsplit_once(':') else {
        return false;
    };
    host.chars().any(|c| c.is_ascii_alphanumeric())
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']'))
        && port.parse::<u16>().is_ok()
}

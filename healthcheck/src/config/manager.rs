use super::Config;
use crate::errors::ConfigError;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Env var holding the config path when no CLI argument is given
pub const CONFIG_PATH_ENV: &str = "CONFIG";
/// Env var holding the Telegram bot key. Never read from the file.
pub const TELEGRAM_KEY_ENV: &str = "TELEGRAM";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_configuration(config_path).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    /// First CLI argument, then `$CONFIG`, then `config.toml`
    pub fn resolve_path(cli_arg: Option<String>) -> String {
        cli_arg
            .filter(|p| !p.is_empty())
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()))
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    async fn load_configuration(config_path: &str) -> Result<Config, ConfigError> {
        debug!("Loading config: {}", config_path);

        let content = fs::read_to_string(config_path)
            .await
            .map_err(|e| ConfigError::LoadFailed {
                path: config_path.to_string(),
                reason: e.to_string(),
            })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;

        config.telegram_key = std::env::var(TELEGRAM_KEY_ENV).unwrap_or_default();
        config.validate()?;

        info!(
            "Loaded config '{}': {} api nodes, {} p2p nodes",
            config.report_title,
            config.api_nodes.len(),
            config.p2p_nodes.len()
        );

        Ok(config)
    }
}

//! Configuration loading from disk and the environment

mod common;

use common::fixtures::write_config_file;
use healthcheck::config::manager::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, TELEGRAM_KEY_ENV};
use healthcheck::constants::chains::TESTNET_ID;
use healthcheck::errors::ConfigError;
use healthcheck::ConfigManager;
use serial_test::serial;
use tempfile::TempDir;

const VALID_CONFIG: &str = r#"
report_title = "FIO Health"
chain_id = "testnet"
expected_version_prefix = "v3.5"
api_nodes = ["https://api.example.com/"]
p2p_nodes = ["peer.example.com:9876"]
output_dir = "/tmp/health/"
telegram_channel = "@alerts"
base_url = "https://health.example.com"
flap_suppression = 0
origin_tag = "US-OH"
"#;

#[tokio::test]
#[serial]
async fn test_load_valid_config_with_env_key() {
    let dir = TempDir::new().unwrap();
    let path = write_config_file(dir.path(), VALID_CONFIG);
    std::env::set_var(TELEGRAM_KEY_ENV, "bot-key");

    let manager = ConfigManager::new(path.to_str().unwrap()).await.unwrap();
    let config = manager.get_current_config();
    std::env::remove_var(TELEGRAM_KEY_ENV);

    assert_eq!(config.chain_id, TESTNET_ID);
    assert_eq!(config.api_nodes, vec!["https://api.example.com"]);
    assert_eq!(config.output_dir, "/tmp/health");
    assert_eq!(config.flap_suppression, 4);
    assert_eq!(config.api_timeout_seconds, 5);
    assert_eq!(config.p2p_connect_timeout_seconds, 10);
    assert_eq!(config.telegram_key, "bot-key");
}

#[tokio::test]
#[serial]
async fn test_key_in_file_is_ignored() {
    let dir = TempDir::new().unwrap();
    let contents = format!("{}\ntelegram_key = \"from-file\"\n", VALID_CONFIG);
    let path = write_config_file(dir.path(), &contents);
    std::env::remove_var(TELEGRAM_KEY_ENV);

    let manager = ConfigManager::new(path.to_str().unwrap()).await.unwrap();
    assert!(manager.get_current_config().telegram_key.is_empty());
}

#[tokio::test]
async fn test_missing_file() {
    let err = ConfigManager::new("/nonexistent/healthcheck.toml")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ConfigError::LoadFailed { .. }));
}

#[tokio::test]
async fn test_empty_node_list_rejected() {
    let dir = TempDir::new().unwrap();
    let contents = VALID_CONFIG.replace(r#"p2p_nodes = ["peer.example.com:9876"]"#, "p2p_nodes = []");
    let path = write_config_file(dir.path(), &contents);

    let err = ConfigManager::new(path.to_str().unwrap()).await.err().unwrap();
    assert!(matches!(err, ConfigError::MissingRequired { ref field } if field == "p2p_nodes"));
}

#[tokio::test]
async fn test_unparseable_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config_file(dir.path(), "report_title = [");

    let err = ConfigManager::new(path.to_str().unwrap()).await.err().unwrap();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
#[serial]
fn test_config_path_resolution() {
    std::env::remove_var(CONFIG_PATH_ENV);
    assert_eq!(ConfigManager::resolve_path(None), DEFAULT_CONFIG_PATH);

    std::env::set_var(CONFIG_PATH_ENV, "/etc/healthcheck.toml");
    assert_eq!(ConfigManager::resolve_path(None), "/etc/healthcheck.toml");
    assert_eq!(
        ConfigManager::resolve_path(Some("cli.toml".to_string())),
        "cli.toml"
    );
    std::env::remove_var(CONFIG_PATH_ENV);
}

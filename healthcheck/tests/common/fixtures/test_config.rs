//! Test configuration helpers

use healthcheck::constants::chains::MAINNET_ID;
use healthcheck::Config;
use std::fs;
use std::path::{Path, PathBuf};

/// A validated config pointing at the given nodes
pub fn test_config(api_nodes: Vec<String>, p2p_nodes: Vec<String>) -> Config {
    let mut config = Config {
        report_title: "Test Health".to_string(),
        chain_id: MAINNET_ID.to_string(),
        expected_version_prefix: "v3".to_string(),
        api_nodes,
        p2p_nodes,
        api_timeout_seconds: 2,
        p2p_connect_timeout_seconds: 2,
        ..Default::default()
    };
    config.validate().unwrap();
    config
}

pub fn write_config_file(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

/// An address nothing is listening on
pub fn closed_port_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

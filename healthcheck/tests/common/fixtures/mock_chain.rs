//! Mock chain RPC server for API checker tests

use chrono::{Duration, Utc};
use healthcheck::constants::chains::MAINNET_ID;
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub struct MockChainServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockChainServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// A synced, well-behaved node: fresh head block, right chain, plugin
    /// APIs disabled, permissive CORS
    pub async fn start_healthy() -> Self {
        let mock = Self::start().await;
        mock.mock_get_info(MAINNET_ID, 1, "v3.5.0").await;
        mock.mock_get_block_ok().await;
        mock.mock_producer_schedule(true).await;
        mock
    }

    /// `get_info` with a head block `head_age_secs` old
    pub async fn mock_get_info(&self, chain_id: &str, head_age_secs: i64, version: &str) {
        let head_time = (Utc::now() - Duration::seconds(head_age_secs))
            .format("%Y-%m-%dT%H:%M:%S%.3f")
            .to_string();

        Mock::given(method("POST"))
            .and(path("/v1/chain/get_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server_version": "d5e1f4a2",
                "chain_id": chain_id,
                "head_block_num": 1000,
                "last_irreversible_block_num": 990,
                "head_block_time": head_time,
                "server_version_string": version
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_get_block_ok(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/chain/get_block"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "block_num": 990,
                "timestamp": "2024-01-01T00:00:00.000",
                "producer": "bp1"
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_get_block_error(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/chain/get_block"))
            .respond_with(ResponseTemplate::new(500).set_body_string("unknown block"))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_producer_schedule(&self, permissive_cors: bool) {
        let mut response = ResponseTemplate::new(200).set_body_json(json!({
            "active": { "version": 1, "producers": [] }
        }));
        if permissive_cors {
            response = response.insert_header("Access-Control-Allow-Origin", "*");
        }

        Mock::given(method("GET"))
            .and(path("/v1/chain/get_producer_schedule"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_net_connections_exposed(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/net/connections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "peer": "peer1:9876", "connecting": false, "syncing": false }
            ])))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_producer_paused_exposed(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/producer/paused"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
            .mount(&self.server)
            .await;
    }
}

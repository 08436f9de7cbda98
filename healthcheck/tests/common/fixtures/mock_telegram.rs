//! Mock Telegram Bot API

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_BOT_KEY: &str = "123456:TEST";

pub struct MockTelegramServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockTelegramServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    pub async fn mock_send_ok(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMessage", TEST_BOT_KEY)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 1 }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_send_forbidden(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/bot{}/sendMessage", TEST_BOT_KEY)))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "description": "Forbidden: bot is not a member of the channel chat"
            })))
            .mount(&self.server)
            .await;
    }

    /// Bodies of every sendMessage request received so far
    pub async fn sent_messages(&self) -> Vec<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}

//! Telegram delivery for drained alarm lines

use crate::constants::alerts::{NOTIFY_TIMEOUT_SECONDS, TELEGRAM_API_URL};
use crate::errors::NotifyError;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    api_url: String,
    api_key: String,
    channel: String,
    base_url: String,
}

impl Notifier {
    /// `base_url` is where the title of every message links to.
    pub fn new(api_key: &str, channel: &str, base_url: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| NotifyError::RequestFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_url: TELEGRAM_API_URL.to_string(),
            api_key: api_key.to_string(),
            channel: channel.to_string(),
            base_url: base_url.to_string(),
        })
    }

    /// Points the notifier at a different Bot API host.
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn send(&self, alert: &str) -> Result<(), NotifyError> {
        let text = format_message(alert, &self.base_url)?;
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.api_key);
        let body = serde_json::json!({
            "chat_id": self.channel,
            "text": text,
            "parse_mode": "HTML",
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed {
                // the request URL carries the bot key
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        debug!("Telegram accepted alert for {}", self.channel);
        info!("Alert sent: {}", alert);
        Ok(())
    }
}

/// Splits `"<title>: <body>"` and renders it as the linked-title HTML message.
pub fn format_message(alert: &str, base_url: &str) -> Result<String, NotifyError> {
    let (title, body) = alert
        .split_once(": ")
        .ok_or_else(|| NotifyError::InvalidMessage {
            message: alert.to_string(),
        })?;

    Ok(format!(
        r#"<b><a href="{}">{}</a></b>: {}"#,
        escape_html(base_url),
        escape_html(title),
        escape_html(body)
    ))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

//! API node health and security checks
//!
//! A check walks the node through reachability, sync, chain identity, block
//! retrieval, TLS posture, response headers, and exposed plugin APIs. Every
//! finding adds to the result's score; health and security failures are fed
//! into the alarm registry as they are found.

use super::client::ChainClient;
use crate::alarm::{AlarmKind, AlarmRegistry};
use crate::classify;
use crate::config::Config;
use crate::constants::api::{CERT_WARNING_DAYS, MAX_HEAD_BLOCK_LAG_SECONDS, PRODUCER_SCHEDULE_PATH};
use crate::constants::score;
use crate::report::ApiCheckResult;
use crate::tls;
use chrono::Utc;
use reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use reqwest::Client as HttpClient;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const MISSING_CORS_NOTE: &str = "missing permissive CORS header";
pub const OLD_TLS_NOTE: &str = "negotiated TLS version < 1.2";
pub const TLS_DISABLED_NOTE: &str = "TLS not enabled";
pub const NET_EXPOSED_REASON: &str = "net api is enabled";
pub const PRODUCER_EXPOSED_REASON: &str = "producer api is enabled";

/// Everything a check needs besides the node URL and the registry
#[derive(Debug, Clone)]
pub struct ApiCheckSettings {
    pub chain_id: String,
    pub expected_version_prefix: String,
    pub timeout: Duration,
    pub origin: String,
    pub suppression_hours: i64,
}

impl ApiCheckSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chain_id: config.chain_id.clone(),
            expected_version_prefix: config.expected_version_prefix.clone(),
            timeout: config.api_timeout(),
            origin: config.origin_tag.clone(),
            suppression_hours: config.flap_suppression,
        }
    }
}

/// What the plain HTTP request revealed
struct HeaderProbe {
    permissive_cors: bool,
    peer_certificate: Option<Vec<u8>>,
}

struct Check<'a> {
    node: &'a str,
    settings: &'a ApiCheckSettings,
    alarms: &'a AlarmRegistry,
    result: ApiCheckResult,
    health_failed: bool,
}

impl Check<'_> {
    async fn health_failure(&mut self, step: &str, error: String, weight: f32) {
        warn!("{} {}: {}", self.node, step, error);
        self.result.had_error = true;
        self.result.error_for = step.to_string();
        self.result.score += weight;
        self.health_failed = true;
        self.alarms
            .mark_failed(
                self.node,
                AlarmKind::Health,
                &error,
                self.settings.suppression_hours,
            )
            .await;
        self.result.error = error;
    }

    async fn security_failure(&self, reason: &str) {
        self.alarms
            .mark_failed(
                self.node,
                AlarmKind::Security,
                reason,
                self.settings.suppression_hours,
            )
            .await;
    }
}

/// Runs the full battery against one API node. Never fails: every problem
/// becomes a field of the returned result.
pub async fn check_api(
    node: &str,
    settings: &ApiCheckSettings,
    alarms: &AlarmRegistry,
) -> ApiCheckResult {
    let mut check = Check {
        node,
        settings,
        alarms,
        result: ApiCheckResult::new(node, &settings.origin),
        health_failed: false,
    };

    let client = match ChainClient::connect(node, settings.timeout).await {
        Ok(client) => client,
        Err(e) => {
            check
                .health_failure("initial connection", e.category(), score::CONNECTION_FAILED)
                .await;
            return check.result;
        }
    };

    let started = Instant::now();
    let info = client.get_info().await;
    check.result.request_latency_ms = started.elapsed().as_millis() as i64;
    let info = match info {
        Ok(info) => info,
        Err(e) => {
            check
                .health_failure("get info", e.category(), score::REQUEST_FAILED)
                .await;
            return check.result;
        }
    };

    let lag = Utc::now() - info.head_block_time;
    check.result.head_block_latency_ms = lag.num_milliseconds();
    check.result.node_version = info.server_version_string.clone();
    check.result.wrong_version = !info
        .server_version_string
        .starts_with(&settings.expected_version_prefix);

    if lag.num_seconds() >= MAX_HEAD_BLOCK_LAG_SECONDS {
        let error = format!(
            "node head block is behind by {:.2} seconds",
            lag.num_milliseconds() as f64 / 1000.0
        );
        check
            .health_failure("get info", error, score::HEAD_BLOCK_LAG)
            .await;
    }

    if !info.chain_id.eq_ignore_ascii_case(&settings.chain_id) {
        check
            .health_failure("get info", "wrong chain".to_string(), score::WRONG_CHAIN)
            .await;
    }

    if let Err(e) = client.get_block(info.last_irreversible_block_num).await {
        check
            .health_failure("get block", e.to_string(), score::REQUEST_FAILED)
            .await;
        return check.result;
    }

    let is_https = client.base_url().starts_with("https");
    let mut notes: Vec<String> = Vec::new();
    let mut security_findings = false;

    if let Some(finding) = tls::probe(client.base_url()).await {
        notes.push(finding);
        check.result.score += score::WEAK_TLS;
    } else if is_https {
        check.result.tls_cipher_ok = true;
    }

    let schedule_url = format!("{}{}", client.base_url(), PRODUCER_SCHEDULE_PATH);
    match fetch_headers(&schedule_url, settings.timeout).await {
        Err(e) => {
            check
                .health_failure(
                    "get producer schedule",
                    classify::normalize_reqwest(&e),
                    score::REQUEST_FAILED,
                )
                .await;
        }
        Ok(probe) => {
            if probe.permissive_cors {
                check.result.permissive_cors = true;
            } else {
                check.result.score += score::MISSING_CORS;
                check.security_failure(MISSING_CORS_NOTE).await;
                security_findings = true;
            }

            if is_https {
                let version = match tls::negotiate(client.base_url(), settings.timeout).await {
                    Some(negotiated) => {
                        debug!(
                            "{} negotiated {}",
                            node,
                            tls::version_label(negotiated.version)
                        );
                        Some(negotiated.version)
                    }
                    None => {
                        debug!("{} TLS version could not be determined", node);
                        None
                    }
                };
                let cert_days = probe.peer_certificate.as_deref().and_then(cert_days_left);

                let posture = assess_tls(version, cert_days);
                check.result.tls_version_ok = posture.version_ok;
                check.result.score += posture.score;
                notes.extend(posture.notes);
                check.result.tls_note = notes.join(", ");
            } else {
                check.result.tls_note = TLS_DISABLED_NOTE.to_string();
                check.result.score += score::TLS_DISABLED;
            }
        }
    }

    if client.get_net_connections().await.is_ok() {
        warn!("{} exposes the net api", node);
        check.result.net_exposed = true;
        check.result.score += score::EXPOSED_API;
        check.security_failure(NET_EXPOSED_REASON).await;
        security_findings = true;
    }

    if client.get_producer_paused().await.is_ok() {
        warn!("{} exposes the producer api", node);
        check.result.producer_exposed = true;
        check.result.score += score::EXPOSED_API;
        check.security_failure(PRODUCER_EXPOSED_REASON).await;
        security_findings = true;
    }

    if !notes.is_empty() {
        check.security_failure(&notes.join(", ")).await;
        security_findings = true;
    }

    if !security_findings {
        alarms.mark_ok(node, AlarmKind::Security).await;
    }
    if !check.health_failed {
        alarms.mark_ok(node, AlarmKind::Health).await;
    }

    debug!("{} scored {:.1}", node, check.result.score);
    check.result
}

async fn fetch_headers(url: &str, timeout: Duration) -> Result<HeaderProbe, reqwest::Error> {
    let http = HttpClient::builder()
        .timeout(timeout)
        .tls_info(true)
        .build()?;
    let response = http.get(url).send().await?;

    let permissive_cors = response
        .headers()
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "*");

    let peer_certificate = response
        .extensions()
        .get::<reqwest::tls::TlsInfo>()
        .and_then(|info| info.peer_certificate())
        .map(<[u8]>::to_vec);

    Ok(HeaderProbe {
        permissive_cors,
        peer_certificate,
    })
}

/// Findings for an https node's negotiated version and leaf certificate
#[derive(Debug, Default, PartialEq)]
pub struct TlsPosture {
    pub version_ok: bool,
    pub notes: Vec<String>,
    pub score: f32,
}

/// Scores the negotiated version and days left on the certificate. An
/// unknown version is neither acceptable nor penalized.
pub fn assess_tls(negotiated_version: Option<u16>, cert_days: Option<f64>) -> TlsPosture {
    let mut posture = TlsPosture::default();

    match negotiated_version {
        Some(version) if version >= tls::TLS12 => posture.version_ok = true,
        Some(_) => {
            posture.notes.push(OLD_TLS_NOTE.to_string());
            posture.score += score::OLD_TLS_VERSION;
        }
        None => {}
    }

    if let Some(days) = cert_days.filter(|days| *days < CERT_WARNING_DAYS) {
        posture
            .notes
            .push(format!("cert expires in {} days", days.round() as i64));
        posture.score += score::CERT_EXPIRING;
    }

    posture
}

/// Days until the DER certificate's notAfter, fractional.
pub fn cert_days_left(der: &[u8]) -> Option<f64> {
    use x509_parser::prelude::*;

    match X509Certificate::from_der(der) {
        Ok((_, cert)) => {
            let not_after = cert.validity().not_after.timestamp();
            Some((not_after - Utc::now().timestamp()) as f64 / 86_400.0)
        }
        Err(e) => {
            debug!("Unparseable peer certificate: {}", e);
            None
        }
    }
}

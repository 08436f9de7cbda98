//! P2P node liveness and sync checks
//!
//! A check handshakes with the peer and listens until it learns something
//! conclusive: a signed block (fresh or stale) or a go-away. Whatever the
//! peer does, the session ends at the probe ceiling.

use super::codec::{Handshake, PeerMessage};
use super::session::{PeerError, PeerSession};
use crate::config::Config;
use crate::constants::p2p::{MAX_BLOCK_AGE_SECONDS, PROBE_CEILING, READ_TIMEOUT};
use crate::constants::score;
use crate::errors::ConfigError;
use crate::report::P2pCheckResult;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct P2pCheckSettings {
    pub chain_id: [u8; 32],
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub probe_ceiling: Duration,
    pub origin: String,
}

impl P2pCheckSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            chain_id: config.chain_id_bytes()?,
            connect_timeout: config.p2p_connect_timeout(),
            read_timeout: READ_TIMEOUT,
            probe_ceiling: PROBE_CEILING,
            origin: config.origin_tag.clone(),
        })
    }
}

/// Probes one peer. Never fails: errors become the result's error text.
pub async fn check_p2p(peer: &str, settings: &P2pCheckSettings) -> P2pCheckResult {
    let started = Instant::now();
    let mut result = P2pCheckResult::new(peer, &settings.origin);

    if let Err(e) = run_session(peer, settings, &mut result).await {
        if !result.healthy {
            warn!("p2p {}: {}", peer, e);
            if e.peer_answered() {
                result.reachable = true;
            }
            result.error = e.category();
            result.score += score::P2P_FAILURE;
        }
    }

    result.took_sec = started.elapsed().as_secs() as i64;
    debug!(
        "p2p {} reachable={} healthy={} took={}s",
        peer, result.reachable, result.healthy, result.took_sec
    );
    result
}

async fn run_session(
    peer: &str,
    settings: &P2pCheckSettings,
    result: &mut P2pCheckResult,
) -> Result<(), PeerError> {
    let handshake = Handshake::new(settings.chain_id);
    let mut session = PeerSession::connect(
        peer,
        &handshake,
        settings.connect_timeout,
        settings.read_timeout,
    )
    .await?;
    let deadline = tokio::time::Instant::now() + settings.probe_ceiling;

    let outcome = loop {
        let message = match session.next_message(deadline).await {
            Ok(message) => message,
            Err(e) => break Err(e),
        };
        result.reachable = true;

        match message {
            PeerMessage::GoAway(reason) => {
                result.error = format!("go away: {}", reason);
                result.score += score::P2P_FAILURE;
                break Ok(());
            }
            PeerMessage::SignedBlock { timestamp } => {
                let delta = Utc::now() - timestamp;
                result.head_block_latency_ms = delta.num_milliseconds();
                if delta.num_milliseconds() < MAX_BLOCK_AGE_SECONDS * 1000 {
                    result.healthy = true;
                } else {
                    result.score += score::P2P_FAILURE;
                    result.error =
                        format!("head block is behind by {} seconds", delta.num_seconds());
                }
                break Ok(());
            }
            other => debug!("p2p {} sent {:?}", peer, other),
        }
    };

    session.close().await;
    outcome
}

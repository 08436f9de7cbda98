//! Fans every configured node out to its checker and collects ranked results

use crate::alarm::{AlarmKind, AlarmRegistry};
use crate::api::{check_api, ApiCheckSettings};
use crate::config::Config;
use crate::errors::ConfigError;
use crate::p2p::{check_p2p, P2pCheckSettings};
use crate::report::{ApiCheckResult, P2pCheckResult};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, info};

/// Runs all API and P2P checks concurrently, one task per node. P2P outcomes
/// are fed into `p2p_alarms` here; API checks feed `api_alarms` themselves.
/// Both lists come back sorted worst first.
pub async fn run_all(
    config: &Config,
    api_alarms: Arc<AlarmRegistry>,
    p2p_alarms: Arc<AlarmRegistry>,
) -> Result<(Vec<ApiCheckResult>, Vec<P2pCheckResult>), ConfigError> {
    let api_settings = Arc::new(ApiCheckSettings::from_config(config));
    let p2p_settings = Arc::new(P2pCheckSettings::from_config(config)?);
    let suppression_hours = config.flap_suppression;

    info!(
        "Checking {} api nodes and {} p2p nodes",
        config.api_nodes.len(),
        config.p2p_nodes.len()
    );

    let api_handles = config.api_nodes.iter().map(|node| {
        let node = node.clone();
        let settings = api_settings.clone();
        let alarms = api_alarms.clone();
        tokio::spawn(async move { check_api(&node, &settings, &alarms).await })
    });

    let p2p_handles = config.p2p_nodes.iter().map(|peer| {
        let peer = peer.clone();
        let settings = p2p_settings.clone();
        let alarms = p2p_alarms.clone();
        tokio::spawn(async move {
            let result = check_p2p(&peer, &settings).await;
            if result.healthy {
                alarms.mark_ok(&peer, AlarmKind::P2p).await;
            } else {
                alarms
                    .mark_failed(&peer, AlarmKind::P2p, &result.error, suppression_hours)
                    .await;
            }
            result
        })
    });

    let (api_joined, p2p_joined) = tokio::join!(join_all(api_handles), join_all(p2p_handles));

    let mut api_results: Vec<ApiCheckResult> = api_joined
        .into_iter()
        .zip(&config.api_nodes)
        .map(|(joined, node)| {
            joined.unwrap_or_else(|e| {
                error!("API check task for {} failed: {}", node, e);
                ApiCheckResult::task_failed(node, &config.origin_tag)
            })
        })
        .collect();

    let mut p2p_results = collect_p2p_results(
        p2p_joined,
        &config.p2p_nodes,
        &config.origin_tag,
        &p2p_alarms,
        suppression_hours,
    )
    .await;

    sort_api_results(&mut api_results);
    sort_p2p_results(&mut p2p_results);

    info!(
        "Checks complete: {} api nodes with errors, {} unhealthy peers",
        api_results.iter().filter(|r| r.had_error).count(),
        p2p_results.iter().filter(|r| !r.healthy).count()
    );

    Ok((api_results, p2p_results))
}

/// Unwraps joined P2P tasks in peer order. A task that panicked never reached
/// the registry, so its placeholder is recorded as a failure here.
async fn collect_p2p_results(
    joined: Vec<Result<P2pCheckResult, JoinError>>,
    peers: &[String],
    origin: &str,
    alarms: &AlarmRegistry,
    suppression_hours: i64,
) -> Vec<P2pCheckResult> {
    let mut results = Vec::with_capacity(joined.len());
    for (outcome, peer) in joined.into_iter().zip(peers) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                error!("P2P check task for {} failed: {}", peer, e);
                let placeholder = P2pCheckResult::task_failed(peer, origin);
                alarms
                    .mark_failed(peer, AlarmKind::P2p, &placeholder.error, suppression_hours)
                    .await;
                results.push(placeholder);
            }
        }
    }
    results
}

/// Highest score first, slower responses first on ties. Stable.
pub fn sort_api_results(results: &mut [ApiCheckResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.request_latency_ms.cmp(&a.request_latency_ms))
    });
}

/// Highest score first, longer checks first on ties. Stable.
pub fn sort_p2p_results(results: &mut [P2pCheckResult]) {
    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.took_sec.cmp(&a.took_sec))
    });
}

use anyhow::Result;
use healthcheck::constants::storage::{API_ALARMS_KEY, P2P_ALARMS_KEY};
use healthcheck::{
    run_all, AlarmRegistry, Config, ConfigManager, FsStore, MonitorError, Notifier, Report,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("healthcheck=info".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting chain endpoint health check");

    let config_path = ConfigManager::resolve_path(std::env::args().nth(1));
    let config_manager = ConfigManager::new(&config_path).await?;
    let config = config_manager.get_current_config();

    let store = FsStore::new(&config.output_dir);
    let api_alarms = Arc::new(AlarmRegistry::restore(&store, API_ALARMS_KEY).await);
    let p2p_alarms = Arc::new(AlarmRegistry::restore(&store, P2P_ALARMS_KEY).await);

    let (api_results, p2p_results) =
        run_all(&config, api_alarms.clone(), p2p_alarms.clone()).await?;

    let report = Report::new(&config.report_title, api_results, p2p_results);
    if let Err(e) = report.write(&store).await {
        error!("Failed to write report: {}", e);
    }

    for (registry, key) in [(&api_alarms, API_ALARMS_KEY), (&p2p_alarms, P2P_ALARMS_KEY)] {
        if let Err(e) = registry.persist(&store, key).await {
            error!("Failed to save alarm state to '{}': {}", key, e);
        }
    }

    let mut alerts = api_alarms.drain_alerts().await;
    alerts.extend(p2p_alarms.drain_alerts().await);

    match deliver_alerts(&config, &alerts).await {
        Ok(sent) => info!("Run complete: {} alerts raised, {} delivered", alerts.len(), sent),
        Err(e) => error!("Alert delivery unavailable: {}", e),
    }

    Ok(())
}

/// Sends every alert line. A failed send is logged and the rest still go out.
async fn deliver_alerts(config: &Config, alerts: &[String]) -> Result<usize, MonitorError> {
    let notifier = Notifier::new(
        &config.telegram_key,
        &config.telegram_channel,
        &config.base_url,
    )?;

    if !notifier.is_enabled() {
        for alert in alerts {
            warn!("{}", alert);
        }
        return Ok(0);
    }

    let mut sent = 0;
    for alert in alerts {
        match notifier.send(alert).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to deliver alert '{}': {}", alert, e),
        }
    }
    Ok(sent)
}

//! # homelinkd — home-link daemon
//!
//! Composition root that wires a transport into the sync core and runs it.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Resolve the controller address (config, then persisted settings)
//! - Construct the selected transport adapter
//! - Start the sync engine over a shared state store
//! - Log alert and link transitions as they happen
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod settings;

use std::sync::Arc;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use homelink_adapter_cloud_kv::CloudKvTransport;
use homelink_adapter_device_http::DeviceHttpTransport;
use homelink_app::gateway::CommandGateway;
use homelink_app::ports::Transport;
use homelink_app::store::{StateStore, StoreEvent};
use homelink_app::sync_engine::SyncEngine;
use homelink_app::view::ViewHandle;

use config::{Config, TransportMode};
use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    match config.transport.mode {
        TransportMode::Device => {
            let host = resolve_device_host(&config)?;
            tracing::info!(%host, "using direct device transport");
            let transport =
                DeviceHttpTransport::new(&host, config.poll_interval(), config.sync_config().write_timeout)
                    .context("building device transport")?;
            run(transport, &config).await
        }
        TransportMode::Cloud => {
            tracing::info!(url = %config.cloud.database_url, "using cloud transport");
            let transport = CloudKvTransport::new(
                &config.cloud.database_url,
                config.cloud.api_key.clone(),
                config.sync_config().write_timeout,
                config.reconnect_delay(),
            )
            .context("building cloud transport")?;
            run(transport, &config).await
        }
    }
}

/// Controller address from config, falling back to the persisted value from
/// a previous run. A configured value is persisted for the next run.
fn resolve_device_host(config: &Config) -> anyhow::Result<String> {
    let settings = Settings::default();
    if !config.device.host.is_empty() {
        if let Err(err) = settings.save_device_host(&config.device.host) {
            tracing::warn!(%err, "could not persist controller address");
        }
        return Ok(config.device.host.clone());
    }
    settings.device_host().context(
        "no controller address: set device.host in homelink.toml or HOMELINK_DEVICE_HOST",
    )
}

async fn run<T>(transport: T, config: &Config) -> anyhow::Result<()>
where
    T: Transport + Clone + 'static,
{
    let sync_config = config.sync_config();
    let store = Arc::new(StateStore::new());
    let engine = SyncEngine::start(transport.clone(), Arc::clone(&store), &sync_config);
    let gateway = Arc::new(CommandGateway::new(
        Arc::clone(&store),
        transport,
        sync_config.write_timeout,
    ));
    let view = ViewHandle::new(store, gateway, sync_config.current_threshold);

    let watcher = tokio::spawn(watch_alerts(view));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");
    engine.shutdown();
    watcher.abort();
    Ok(())
}

/// Log link and alert transitions. Each condition is reported once per edge,
/// not once per event.
async fn watch_alerts<T: Transport>(view: ViewHandle<T>) {
    let mut receiver = view.subscribe();
    let mut connected = view.is_connected();
    let mut fire = view.fire_alert();
    let mut high_current = view.high_current();
    let mut water_low = view.water_low();

    loop {
        match receiver.recv().await {
            Ok(StoreEvent::Link) => {
                let now_connected = view.is_connected();
                if now_connected != connected {
                    connected = now_connected;
                    if connected {
                        tracing::info!("link established");
                    } else {
                        let reason = view.last_error().unwrap_or_else(|| "unknown".to_string());
                        tracing::warn!(%reason, "link lost");
                    }
                }
            }
            Ok(StoreEvent::Section(section)) => {
                tracing::debug!(%section, "state updated");
                let now_fire = view.fire_alert();
                if now_fire != fire {
                    fire = now_fire;
                    if fire {
                        tracing::error!("fire alert raised");
                    } else {
                        tracing::info!("fire alert cleared");
                    }
                }
                let now_high = view.high_current();
                if now_high != high_current {
                    high_current = now_high;
                    if high_current {
                        tracing::warn!("current draw above threshold");
                    } else {
                        tracing::info!("current draw back to normal");
                    }
                }
                let now_low = view.water_low();
                if now_low != water_low {
                    water_low = now_low;
                    if water_low {
                        tracing::warn!("water level low");
                    } else {
                        tracing::info!("water level restored");
                    }
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "alert watcher lagged behind store events");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

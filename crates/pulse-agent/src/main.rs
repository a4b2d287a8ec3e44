//! # pulse
//!
//! Pulse binary: loads settings, then runs the poller, the push gateway
//! client with its event sink, and the status server until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_core::ConnectionState;
use pulse_core::logging::{init_json_subscriber, init_subscriber};
use pulse_engine::{CommandProvider, Poller, SnapshotStore, TelemetryProvider, run_event_sink};
use pulse_gateway::{EVENT_CHANNEL_CAPACITY, GatewayClient};
use pulse_server::{PulseServer, ShutdownCoordinator};
use pulse_settings::PulseSettings;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Live telemetry for an agent fleet.
#[derive(Parser, Debug)]
#[command(name = "pulse", about = "Live telemetry for an agent fleet")]
struct Cli {
    /// Settings file (default `~/.pulse/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Push gateway URL (overrides settings).
    #[arg(long)]
    gateway_url: Option<String>,

    /// Run on polling alone, without the push gateway.
    #[arg(long)]
    no_gateway: bool,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layer command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut PulseSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(url) = &self.gateway_url {
            settings.gateway.url.clone_from(url);
        }
        if self.no_gateway {
            settings.gateway.enabled = false;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first: the log level comes from them.
    let settings_file = args
        .settings
        .clone()
        .unwrap_or_else(pulse_settings::settings_path);
    let mut settings = pulse_settings::load_settings_from_path(&settings_file)
        .with_context(|| format!("Failed to load settings from {}", settings_file.display()))?;
    args.apply(&mut settings);

    if settings.logging.json {
        init_json_subscriber(&settings.logging.level);
    } else {
        init_subscriber(&settings.logging.level);
    }
    let _ = pulse_settings::init_settings(settings);
    let settings = pulse_settings::get_settings();

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let store = Arc::new(SnapshotStore::new(settings.engine.main_agent_id.clone()));
    let mut handles = Vec::new();

    // Poll path
    let provider: Arc<dyn TelemetryProvider> =
        Arc::new(CommandProvider::from_settings(&settings.provider));
    let poller = Arc::new(Poller::new(
        provider,
        Arc::clone(&store),
        settings.engine.clone(),
    ));
    handles.push(tokio::spawn(poller.run(shutdown.token())));

    // Push path
    let connection = if settings.gateway.enabled {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (client, connection) = GatewayClient::new(settings.gateway.clone(), event_tx);
        handles.push(tokio::spawn(client.run(shutdown.token())));
        handles.push(tokio::spawn(run_event_sink(
            Arc::clone(&store),
            event_rx,
            shutdown.token(),
        )));
        connection
    } else {
        info!("gateway disabled, running on polling alone");
        watch::channel(ConnectionState::Disconnected).1
    };

    let server = PulseServer::new(
        settings.server.clone(),
        Arc::clone(&store),
        connection,
        Arc::clone(&shutdown),
    );
    let (addr, server_handle) = server
        .listen()
        .await
        .context("Failed to bind status server")?;
    handles.push(server_handle);

    info!(
        gateway = settings.gateway.enabled,
        poll_interval_ms = settings.engine.poll_interval_ms,
        "Pulse listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    shutdown.graceful_shutdown(handles, None).await;
    info!("Shutdown complete");
    Ok(())
}

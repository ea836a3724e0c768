//! `pfmqtt run`: the long-running bridge.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pfmqtt_api::{MqttBus, ReconnectConfig};
use pfmqtt_core::{
    BridgeConfig, IdentityRegistry, ShutdownKind, Synchronizer, build_firewall_client,
    bus_settings,
};

use crate::error::CliError;

pub async fn run(config: BridgeConfig) -> Result<(), CliError> {
    let firewall = build_firewall_client(&config.firewall)?;
    let registry = IdentityRegistry::load(config.identity_file.clone()).await;
    info!(
        path = %config.identity_file.display(),
        known = registry.len(),
        "identity registry loaded"
    );

    let cancel = CancellationToken::new();
    let (bus, mut events) = MqttBus::connect(
        &bus_settings(&config.bus),
        ReconnectConfig::default(),
        cancel.clone(),
    );

    let sync = Synchronizer::new(config.sync, registry, firewall, bus);
    let refresh = sync.spawn_refresh_task();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("shutdown requested");
                sync.shutdown(ShutdownKind::Clean).await;
                if let Err(e) = sync.bus().disconnect().await {
                    warn!(error = %e, "MQTT disconnect failed");
                }
                break Ok(());
            }
            event = events.recv() => match event {
                Some(event) => {
                    sync.dispatch(event);
                }
                None => {
                    warn!("MQTT event loop stopped");
                    sync.shutdown(ShutdownKind::Crash).await;
                    break Err(CliError::BusClosed);
                }
            },
        }
    };

    cancel.cancel();
    if let Some(handle) = refresh {
        let _ = handle.await;
    }
    outcome
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

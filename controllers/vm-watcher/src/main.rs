//! vm-watcher Controller
//!
//! Keeps Apache Guacamole connections in sync with KubeVirt VirtualMachines:
//! a connection is created once a VirtualMachine first runs, refreshed when
//! it restarts and removed when the VirtualMachine is deleted.

mod annotations;
mod config;
mod controller;
mod error;
mod filter;
mod profile;
mod reconciler;
mod resolver;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::Config;
use crate::error::ControllerError;
use clap::Parser;
use controller::Controller;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vm_watcher_controller=info,guacamole_client=info".into()),
        )
        .init();

    // Both kube and reqwest use rustls; pin the crypto provider to ring
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting vm-watcher controller v{}", env!("CARGO_PKG_VERSION"));

    let settings = Config::parse().validate().inspect_err(|e| error!("{}", e))?;

    info!("Configuration:");
    info!("  Guacamole URL: {}", settings.gateway.base_url);
    info!("  Guacamole user: {}", settings.gateway.credentials.username);
    info!(
        "  Namespace: {}",
        settings.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Concurrency: {}", settings.concurrency);
    info!("  Reconcile timeout: {:?}", settings.reconcile_timeout);

    let controller = Controller::new(settings).await?;
    controller.run().await?;

    Ok(())
}

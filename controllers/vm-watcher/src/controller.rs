//! Main controller implementation.
//!
//! Builds the Guacamole and Kubernetes clients, wires them into the
//! reconciler and starts the VirtualMachine watcher.

use crate::config::Settings;
use crate::error::ControllerError;
use crate::filter::RelevanceFilter;
use crate::reconciler::Reconciler;
use crate::store::KubeClusterStore;
use crate::watcher::{Context, Watcher};
use crds::VirtualMachine;
use guacamole_client::GuacamoleClient;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for Guacamole connection management.
pub struct Controller {
    vm_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(settings: Settings) -> Result<Self, ControllerError> {
        info!("Initializing vm-watcher controller");

        let gateway = GuacamoleClient::new(
            settings.gateway.base_url.clone(),
            settings.gateway.credentials.clone(),
            settings.gateway.timeout,
        )
        .map_err(|e| ControllerError::InvalidConfig(e.to_string()))?;

        // Guacamole may come up after the controller, so a failure is not fatal
        info!("Validating Guacamole credentials and connectivity...");
        match gateway.authenticate().await {
            Ok(session) => info!(
                "Authenticated with Guacamole at {} (data source: {})",
                gateway.base_url(),
                session.data_source
            ),
            Err(e) => warn!(
                "Could not authenticate with Guacamole at {} (continuing, reconciliations will retry): {}",
                gateway.base_url(),
                e
            ),
        }

        let kube_client = Client::try_default().await?;
        let store = Arc::new(KubeClusterStore::new(kube_client.clone()));

        let reconciler = Reconciler::new(
            store,
            Arc::new(gateway),
            &settings.cluster_domain,
            settings.reconcile.clone(),
        );

        let vm_api: Api<VirtualMachine> = match settings.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client, ns),
            None => Api::all(kube_client),
        };

        let context = Arc::new(Context {
            reconciler,
            filter: RelevanceFilter::new(),
            reconcile_timeout: settings.reconcile_timeout,
        });
        let watcher = Watcher::new(vm_api, context, settings.concurrency);

        let vm_watcher = tokio::spawn(async move { watcher.watch_virtual_machines().await });

        Ok(Self { vm_watcher })
    }

    /// Runs until the watcher stops.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("vm-watcher controller running");

        self.vm_watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("VirtualMachine watcher panicked: {}", e)))?
    }
}

//! Reconciliation of VirtualMachines against Guacamole connections.
//!
//! Each invocation reads the current VirtualMachine and applies exactly one
//! transition of its lifecycle:
//! - `deletion`: deletion requested, or the object is already gone
//! - `lifecycle`: finalizer registration, first connection creation, and
//!   power state changes of processed VMs
//!
//! All state lives in the VM's annotations (see `crate::annotations`) and is
//! written through `persist`, which retries on resource version conflicts.

pub mod deletion;
pub mod lifecycle;
pub mod persist;

use crate::annotations::ReconciliationState;
use crate::error::ControllerError;
use crate::resolver::EndpointResolver;
use crate::store::{ClusterStore, ResourceKey};
use crds::VirtualMachine;
use guacamole_client::{Connection, GuacamoleClientTrait, GuacamoleError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What the dispatcher should do with a key after a successful invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the resource changes
    Done,
    /// Reconcile again after the given delay
    RetryAfter(Duration),
    /// The VirtualMachine no longer exists; nothing is left to track
    Gone,
}

/// Timing knobs of the reconciler
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Wait before re-checking a VM that is not running yet
    pub not_running_requeue: Duration,
    /// Fixed delay before retrying a failed invocation
    pub retry_delay: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            not_running_requeue: Duration::from_secs(30),
            retry_delay: Duration::from_secs(120),
        }
    }
}

/// Reconciles VirtualMachines into Guacamole connections.
pub struct Reconciler {
    pub(crate) store: Arc<dyn ClusterStore>,
    pub(crate) gateway: Arc<dyn GuacamoleClientTrait>,
    pub(crate) resolver: EndpointResolver,
    pub(crate) settings: ReconcileSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        gateway: Arc<dyn GuacamoleClientTrait>,
        cluster_domain: &str,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            resolver: EndpointResolver::new(Arc::clone(&store), cluster_domain),
            store,
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Reconcile the VirtualMachine identified by `key`.
    ///
    /// `last_known` is the most recent snapshot the dispatcher saw; it is only
    /// consulted when the VM is no longer in the cluster.
    pub async fn reconcile(
        &self,
        key: &ResourceKey,
        last_known: Option<&VirtualMachine>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        debug!("Reconciling VirtualMachine {}", key);

        let Some(vm) = self
            .store
            .get_virtual_machine(&key.namespace, &key.name)
            .await?
        else {
            return self.handle_absent(key, last_known).await;
        };

        let state = ReconciliationState::from_vm(&vm);
        if vm.is_deleting() {
            return self.handle_deletion(key, &vm, &state).await;
        }
        if !state.has_finalizer {
            return self.add_finalizer(key, &vm).await;
        }
        if !state.processed {
            return self.handle_unprocessed(key, &vm).await;
        }
        self.handle_processed(key, &vm, &state).await
    }

    // Every gateway operation obtains its own token.

    pub(crate) async fn gateway_create(&self, connection: &Connection) -> Result<String, GuacamoleError> {
        let session = self.gateway.authenticate().await?;
        self.gateway.create_connection(&session, connection).await
    }

    pub(crate) async fn gateway_update(
        &self,
        identifier: &str,
        connection: &Connection,
    ) -> Result<(), GuacamoleError> {
        let session = self.gateway.authenticate().await?;
        self.gateway
            .update_connection(&session, identifier, connection)
            .await
    }

    pub(crate) async fn gateway_delete(&self, identifier: &str) -> Result<(), GuacamoleError> {
        let session = self.gateway.authenticate().await?;
        self.gateway.delete_connection(&session, identifier).await
    }
}

//! Finalizer registration, connection creation and power state transitions

use super::persist::{SnapshotWrite, StateUpdate};
use super::{ReconcileOutcome, Reconciler};
use crate::annotations::{CONNECTION_ID, LAST_STATUS, PROCESSED, ReconciliationState};
use crate::error::ControllerError;
use crate::profile::{ConnectionOverrides, build_connection};
use crate::store::ResourceKey;
use crds::{PowerState, VirtualMachine};
use guacamole_client::Connection;
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Register the finalizer before anything is created in Guacamole
    pub(crate) async fn add_finalizer(
        &self,
        key: &ResourceKey,
        vm: &VirtualMachine,
    ) -> Result<ReconcileOutcome, ControllerError> {
        info!("Adding finalizer to VirtualMachine {}", key);
        match self.persist(key, vm, &StateUpdate::new().add_finalizer()).await? {
            Some(_) => Ok(ReconcileOutcome::RetryAfter(Duration::ZERO)),
            None => Ok(ReconcileOutcome::Gone),
        }
    }

    /// Create the connection once the VM is running
    pub(crate) async fn handle_unprocessed(
        &self,
        key: &ResourceKey,
        vm: &VirtualMachine,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let power_state = vm.power_state();
        if !power_state.is_running() {
            info!(
                "VirtualMachine {} is not running yet (status: {:?}), checking again in {:?}",
                key,
                power_state.as_str(),
                self.settings.not_running_requeue
            );
            return Ok(ReconcileOutcome::RetryAfter(self.settings.not_running_requeue));
        }

        info!("New running VirtualMachine {}, creating Guacamole connection", key);
        let connection = self.connection_for(key, vm).await?;
        let connection_id = match self.gateway_create(&connection).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to create Guacamole connection for {}: {}", key, e);
                return Ok(ReconcileOutcome::RetryAfter(self.settings.retry_delay));
            }
        };

        let update = StateUpdate::new()
            .annotate(PROCESSED, "true")
            .annotate(LAST_STATUS, power_state.as_str())
            .annotate(CONNECTION_ID, connection_id.as_str());
        match self.persist(key, vm, &update).await {
            Ok(Some(_)) => {
                info!(
                    "Created Guacamole connection {} for VirtualMachine {} ({} {}:{})",
                    connection_id,
                    key,
                    connection.protocol,
                    connection.parameter("hostname").unwrap_or_default(),
                    connection.parameter("port").unwrap_or_default()
                );
                Ok(ReconcileOutcome::Done)
            }
            Ok(None) => {
                warn!(
                    "VirtualMachine {} disappeared after connection {} was created, removing it",
                    key, connection_id
                );
                self.delete_connection_best_effort(key, &connection_id).await;
                Ok(ReconcileOutcome::Gone)
            }
            Err(e) => {
                error!(
                    "Created Guacamole connection {} for {} but failed to record it: {}",
                    connection_id, key, e
                );
                Err(e)
            }
        }
    }

    /// React to a power state change of a VM that already has a connection
    pub(crate) async fn handle_processed(
        &self,
        key: &ResourceKey,
        vm: &VirtualMachine,
        state: &ReconciliationState,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let power_state = vm.power_state();
        let Some(last_status) = state.last_status.as_deref() else {
            debug!("VirtualMachine {} has no recorded status, nothing to compare", key);
            return Ok(ReconcileOutcome::Done);
        };
        if last_status == power_state.as_str() {
            debug!("VirtualMachine {} unchanged ({})", key, last_status);
            return Ok(ReconcileOutcome::Done);
        }

        info!(
            "VirtualMachine {} changed status from {} to {}",
            key,
            last_status,
            power_state.as_str()
        );

        match (&power_state, state.connection_id.as_deref()) {
            (PowerState::Stopped, Some(id)) => {
                // The connection is kept while the VM is stopped
                info!("VirtualMachine {} stopped, keeping connection {}", key, id);
            }
            (PowerState::Running, Some(id)) => self.refresh_connection(key, vm, id).await,
            _ => {}
        }

        let update = StateUpdate::new().annotate(LAST_STATUS, power_state.as_str());
        match self.persist_on_snapshot(key, vm, &update).await? {
            SnapshotWrite::Written => Ok(ReconcileOutcome::Done),
            SnapshotWrite::Stale => {
                debug!("VirtualMachine {} changed while recording its status, re-evaluating", key);
                Ok(ReconcileOutcome::RetryAfter(Duration::ZERO))
            }
            SnapshotWrite::Gone => Ok(ReconcileOutcome::Gone),
        }
    }

    /// Push a rebuilt profile after a restart; failures are only logged
    async fn refresh_connection(&self, key: &ResourceKey, vm: &VirtualMachine, connection_id: &str) {
        let connection = match self.connection_for(key, vm).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to rebuild connection {} for {}: {}", connection_id, key, e);
                return;
            }
        };
        match self.gateway_update(connection_id, &connection).await {
            Ok(()) => info!("Updated Guacamole connection {} for restarted VirtualMachine {}", connection_id, key),
            Err(e) => error!("Failed to update Guacamole connection {} for {}: {}", connection_id, key, e),
        }
    }

    async fn connection_for(&self, key: &ResourceKey, vm: &VirtualMachine) -> Result<Connection, ControllerError> {
        let hostname = self.resolver.resolve(key, vm.labels()).await?;
        let overrides = ConnectionOverrides::from_annotations(vm.metadata.annotations.as_ref());
        Ok(build_connection(key, &overrides, &hostname))
    }
}

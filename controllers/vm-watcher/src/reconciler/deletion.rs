//! Connection cleanup on deletion

use super::persist::StateUpdate;
use super::{ReconcileOutcome, Reconciler};
use crate::annotations::{CONNECTION_ID, ReconciliationState};
use crate::error::ControllerError;
use crate::store::ResourceKey;
use crds::VirtualMachine;
use tracing::{debug, error, info};

impl Reconciler {
    /// Delete the connection, then release the finalizer.
    ///
    /// Gateway failures never block finalizer removal.
    pub(crate) async fn handle_deletion(
        &self,
        key: &ResourceKey,
        vm: &VirtualMachine,
        state: &ReconciliationState,
    ) -> Result<ReconcileOutcome, ControllerError> {
        info!("VirtualMachine {} is being deleted", key);

        match state.connection_id.as_deref() {
            Some(id) => self.delete_connection_best_effort(key, id).await,
            None => debug!("VirtualMachine {} has no Guacamole connection", key),
        }

        if !state.has_finalizer {
            return Ok(ReconcileOutcome::Done);
        }

        let mut update = StateUpdate::new().remove_finalizer();
        if state.connection_id.is_some() {
            update = update.annotate(CONNECTION_ID, "");
        }
        if self.persist(key, vm, &update).await?.is_some() {
            info!("Removed finalizer from VirtualMachine {}", key);
        } else {
            debug!("VirtualMachine {} already removed", key);
        }
        Ok(ReconcileOutcome::Done)
    }

    /// The VM vanished without passing through `handle_deletion`
    pub(crate) async fn handle_absent(
        &self,
        key: &ResourceKey,
        last_known: Option<&VirtualMachine>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let Some(last) = last_known else {
            debug!("VirtualMachine {} not found and was never tracked", key);
            return Ok(ReconcileOutcome::Gone);
        };
        if last.is_deleting() {
            debug!("VirtualMachine {} removed after deletion was handled", key);
            return Ok(ReconcileOutcome::Gone);
        }

        let state = ReconciliationState::from_vm(last);
        if let Some(id) = state.connection_id.as_deref() {
            info!("VirtualMachine {} disappeared, removing connection {}", key, id);
            self.delete_connection_best_effort(key, id).await;
        }
        Ok(ReconcileOutcome::Gone)
    }

    /// Delete a connection, treating an unknown identifier as already deleted
    pub(crate) async fn delete_connection_best_effort(&self, key: &ResourceKey, connection_id: &str) {
        match self.gateway_delete(connection_id).await {
            Ok(()) => info!("Deleted Guacamole connection {} for {}", connection_id, key),
            Err(e) if e.is_not_found() => {
                debug!("Guacamole connection {} for {} already absent", connection_id, key);
            }
            Err(e) => error!(
                "Failed to delete Guacamole connection {} for {} (continuing cleanup): {}",
                connection_id, key, e
            ),
        }
    }
}

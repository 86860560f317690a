//! Read-modify-write of the reconciliation state annotations

use super::Reconciler;
use crate::annotations::FINALIZER;
use crate::error::ControllerError;
use crate::store::{MetadataPatch, ResourceKey, StoreError};
use crds::VirtualMachine;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Attempts before a persistent conflict is reported
const MAX_PERSIST_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalizerChange {
    Add,
    Remove,
}

/// Desired changes to a VM's annotations and finalizers, independent of any
/// particular snapshot so it can be re-applied after a conflict
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    annotations: BTreeMap<String, String>,
    finalizer: Option<FinalizerChange>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(mut self, key: &str, value: impl Into<String>) -> Self {
        self.annotations.insert(key.to_string(), value.into());
        self
    }

    pub fn add_finalizer(mut self) -> Self {
        self.finalizer = Some(FinalizerChange::Add);
        self
    }

    pub fn remove_finalizer(mut self) -> Self {
        self.finalizer = Some(FinalizerChange::Remove);
        self
    }

    /// Patch turning `vm` into the desired state; `None` when it already is
    pub fn to_patch(&self, vm: &VirtualMachine) -> Option<MetadataPatch> {
        let current = vm.metadata.annotations.as_ref();
        let annotations: BTreeMap<String, String> = self
            .annotations
            .iter()
            .filter(|(k, v)| current.and_then(|a| a.get(*k)) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let existing = vm.metadata.finalizers.clone().unwrap_or_default();
        let present = existing.iter().any(|f| f == FINALIZER);
        let finalizers = match self.finalizer {
            Some(FinalizerChange::Add) if !present => {
                let mut list = existing;
                list.push(FINALIZER.to_string());
                Some(list)
            }
            Some(FinalizerChange::Remove) if present => {
                Some(existing.into_iter().filter(|f| f != FINALIZER).collect())
            }
            _ => None,
        };

        if annotations.is_empty() && finalizers.is_none() {
            return None;
        }
        Some(MetadataPatch {
            resource_version: vm.metadata.resource_version.clone(),
            annotations,
            finalizers,
        })
    }
}

/// Result of a write that only holds for the snapshot it was decided on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SnapshotWrite {
    Written,
    /// The object changed since the snapshot was read
    Stale,
    Gone,
}

impl Reconciler {
    /// Apply `update` to exactly the snapshot `vm`, without retrying.
    ///
    /// Used for writes that record a decision taken on that snapshot; on a
    /// conflict the caller re-decides against the fresh object instead.
    pub(crate) async fn persist_on_snapshot(
        &self,
        key: &ResourceKey,
        vm: &VirtualMachine,
        update: &StateUpdate,
    ) -> Result<SnapshotWrite, ControllerError> {
        let Some(patch) = update.to_patch(vm) else {
            return Ok(SnapshotWrite::Written);
        };

        match self
            .store
            .patch_virtual_machine_metadata(&key.namespace, &key.name, &patch)
            .await
        {
            Ok(_) => Ok(SnapshotWrite::Written),
            Err(StoreError::Conflict(_)) => Ok(SnapshotWrite::Stale),
            Err(StoreError::NotFound(_)) => Ok(SnapshotWrite::Gone),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `update` on top of `vm`, refetching and re-applying on conflict.
    ///
    /// Returns the stored object, or `None` if it no longer exists.
    pub(crate) async fn persist(
        &self,
        key: &ResourceKey,
        vm: &VirtualMachine,
        update: &StateUpdate,
    ) -> Result<Option<VirtualMachine>, ControllerError> {
        let mut current = vm.clone();

        for attempt in 1..=MAX_PERSIST_ATTEMPTS {
            let Some(patch) = update.to_patch(&current) else {
                debug!("State of {} already up to date", key);
                return Ok(Some(current));
            };

            match self
                .store
                .patch_virtual_machine_metadata(&key.namespace, &key.name, &patch)
                .await
            {
                Ok(updated) => return Ok(Some(updated)),
                Err(StoreError::Conflict(_)) => {
                    debug!(
                        "Conflict persisting state of {} (attempt {}/{}), refetching",
                        key, attempt, MAX_PERSIST_ATTEMPTS
                    );
                    match self
                        .store
                        .get_virtual_machine(&key.namespace, &key.name)
                        .await?
                    {
                        Some(fresh) => current = fresh,
                        None => return Ok(None),
                    }
                }
                Err(StoreError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Giving up persisting state of {} after {} conflicts", key, MAX_PERSIST_ATTEMPTS);
        Err(StoreError::Conflict(format!(
            "{} (gave up after {} attempts)",
            key, MAX_PERSIST_ATTEMPTS
        ))
        .into())
    }
}

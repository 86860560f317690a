//! Event relevance filtering at the dispatch boundary.
//!
//! The watch delivers every change to a VirtualMachine, including periodic
//! re-lists and updates the reconciler cannot act on. A delivery is worth a
//! reconciliation only if the `processed` annotation, the power state, the
//! generation or the deletion marker moved since the snapshot the reconciler
//! last settled.

use crate::annotations::{PROCESSED, annotation};
use crate::store::ResourceKey;
use crds::VirtualMachine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Whether `new` differs from `old` in a way the reconciler reacts to
pub fn is_relevant_update(old: &VirtualMachine, new: &VirtualMachine) -> bool {
    let processed = |vm: &VirtualMachine| annotation(vm.metadata.annotations.as_ref(), PROCESSED) == Some("true");

    processed(old) != processed(new)
        || old.power_state() != new.power_state()
        || old.metadata.generation != new.metadata.generation
        || old.is_deleting() != new.is_deleting()
}

/// Remembers, per key, the last snapshot whose reconciliation finished with
/// nothing left to do
#[derive(Debug, Default)]
pub struct RelevanceFilter {
    settled: Mutex<HashMap<ResourceKey, Arc<VirtualMachine>>>,
}

impl RelevanceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a delivery of `vm` should be reconciled
    ///
    /// Keys without a settled snapshot are always admitted.
    pub fn admit(&self, key: &ResourceKey, vm: &VirtualMachine) -> bool {
        let Ok(settled) = self.settled.lock() else {
            return true;
        };
        settled
            .get(key)
            .is_none_or(|previous| is_relevant_update(previous, vm))
    }

    /// Record `vm` as fully reconciled
    pub fn settle(&self, key: &ResourceKey, vm: Arc<VirtualMachine>) {
        if let Ok(mut settled) = self.settled.lock() {
            settled.insert(key.clone(), vm);
        }
    }

    /// Drop any settled snapshot so the next delivery is admitted
    pub fn forget(&self, key: &ResourceKey) {
        if let Ok(mut settled) = self.settled.lock() {
            settled.remove(key);
        }
    }
}

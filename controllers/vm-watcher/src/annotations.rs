//! Annotation keys and the reconciliation state persisted through them.
//!
//! The controller keeps no state of its own: whether a VirtualMachine has been
//! processed, its last observed power state and the identifier of its Guacamole
//! connection all live in annotations on the VirtualMachine, next to the
//! user-supplied connection overrides.

use crds::VirtualMachine;
use std::collections::BTreeMap;

/// `"true"` once a connection has been created for the VM
pub const PROCESSED: &str = "vm-watcher.microscaler.io/processed";
/// Power state observed at the last processed transition
pub const LAST_STATUS: &str = "vm-watcher.microscaler.io/last-status";
/// Identifier of the Guacamole connection; empty when none exists
pub const CONNECTION_ID: &str = "vm-watcher.microscaler.io/connection-id";

// User-supplied overrides
pub const PROTOCOL: &str = "vm-watcher.microscaler.io/protocol";
pub const PORT: &str = "vm-watcher.microscaler.io/port";
pub const USERNAME: &str = "vm-watcher.microscaler.io/username";
pub const PASSWORD: &str = "vm-watcher.microscaler.io/password";
pub const DOMAIN: &str = "vm-watcher.microscaler.io/domain";
pub const PRIVATE_KEY: &str = "vm-watcher.microscaler.io/private-key";

/// Finalizer guarding removal of the Guacamole connection
pub const FINALIZER: &str = "vm-watcher.microscaler.io/finalizer";

/// Read a non-empty annotation value
pub fn annotation<'a>(annotations: Option<&'a BTreeMap<String, String>>, key: &str) -> Option<&'a str> {
    annotations?
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Reconciliation state as persisted on a VirtualMachine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    pub processed: bool,
    pub last_status: Option<String>,
    pub connection_id: Option<String>,
    pub has_finalizer: bool,
}

impl ReconciliationState {
    pub fn from_vm(vm: &VirtualMachine) -> Self {
        let annotations = vm.metadata.annotations.as_ref();
        Self {
            processed: annotation(annotations, PROCESSED) == Some("true"),
            last_status: annotation(annotations, LAST_STATUS).map(str::to_string),
            connection_id: annotation(annotations, CONNECTION_ID).map(str::to_string),
            has_finalizer: vm
                .metadata
                .finalizers
                .as_ref()
                .is_some_and(|f| f.iter().any(|f| f == FINALIZER)),
        }
    }
}

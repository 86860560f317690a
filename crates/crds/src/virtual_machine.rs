//! VirtualMachine CRD
//!
//! The declarative record of a KubeVirt virtual machine. Owned by KubeVirt;
//! the controller only reads it and patches its metadata.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    namespaced,
    status = "VirtualMachineStatus",
    shortname = "vm"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    /// Legacy desired power flag (superseded by `runStrategy`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,

    /// Desired run strategy (Always, Halted, Manual, RerunOnFailure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_strategy: Option<String>,

    /// Instance template, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    /// Human-readable power state reported by KubeVirt ("Running", "Stopped", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printable_status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

/// Observed power state of a virtual machine.
///
/// Only `Running` and `Stopped` carry meaning for the controller; every other
/// printable status is preserved verbatim so it can be persisted and compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PowerState {
    Running,
    Stopped,
    Other(String),
}

impl PowerState {
    /// Parse a KubeVirt printable status string
    pub fn from_printable(status: &str) -> Self {
        match status {
            "Running" => Self::Running,
            "Stopped" => Self::Stopped,
            other => Self::Other(other.to_string()),
        }
    }

    /// The printable status string this state was parsed from
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Other(s) => s,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VirtualMachine {
    /// Current observed power state; an empty `Other` when KubeVirt has not
    /// reported a status yet.
    pub fn power_state(&self) -> PowerState {
        let printable = self
            .status
            .as_ref()
            .and_then(|s| s.printable_status.as_deref())
            .unwrap_or_default();
        PowerState::from_printable(printable)
    }

    /// Whether deletion has been requested (deletionTimestamp is set)
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

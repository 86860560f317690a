//! VirtualMachineInstance CRD
//!
//! The transient runtime counterpart of a running virtual machine. It shares
//! the virtual machine's namespace and name and reports guest network interfaces.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    namespaced,
    status = "VirtualMachineInstanceStatus",
    shortname = "vmi"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    /// Domain specification, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    /// Runtime phase (Pending, Scheduling, Running, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Guest network interfaces as reported by the guest agent / launcher
    #[serde(default)]
    pub interfaces: Vec<VirtualMachineInstanceNetworkInterface>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceNetworkInterface {
    /// Logical network name from the VM spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Interface name inside the guest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    /// Primary IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// All IP addresses, primary first
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

impl VirtualMachineInstance {
    /// First non-empty primary IP address across the reported interfaces
    pub fn first_ip_address(&self) -> Option<&str> {
        self.status
            .as_ref()?
            .interfaces
            .iter()
            .filter_map(|iface| iface.ip_address.as_deref())
            .find(|ip| !ip.is_empty())
    }
}

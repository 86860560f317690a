//! Test utilities for unit testing the reconciler
//!
//! Provides an in-memory `ClusterStore` and helpers for building test resources.

use crate::store::{ClusterStore, MetadataPatch, ResourceKey, StoreError};
use crds::{VirtualMachine, VirtualMachineInstance};
use k8s_openapi::api::core::v1::Service;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct StoreState {
    vms: BTreeMap<ResourceKey, VirtualMachine>,
    vmis: BTreeMap<ResourceKey, VirtualMachineInstance>,
    services: Vec<Service>,
    resource_version: u64,
    patches: usize,
    conflicts_to_inject: usize,
    fail_vmi_reads: bool,
    fail_service_lists: bool,
}

impl StoreState {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// In-memory cluster store
///
/// Behaves like the API server where the reconciler can tell: resource
/// versions are bumped on every write and checked on patches, and an object
/// marked for deletion disappears once its finalizer list is empty.
#[derive(Clone, Default)]
pub struct MockClusterStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a VirtualMachine, assigning it a fresh resource version
    pub fn insert_vm(&self, mut vm: VirtualMachine) -> VirtualMachine {
        let mut state = self.state.lock().unwrap();
        vm.metadata.resource_version = Some(state.next_resource_version());
        let key = ResourceKey::from_object(&vm).unwrap();
        state.vms.insert(key, vm.clone());
        vm
    }

    pub fn vm(&self, namespace: &str, name: &str) -> Option<VirtualMachine> {
        self.state
            .lock()
            .unwrap()
            .vms
            .get(&ResourceKey::new(namespace, name))
            .cloned()
    }

    /// Change a stored VirtualMachine the way another writer would
    pub fn update_vm(&self, namespace: &str, name: &str, change: impl FnOnce(&mut VirtualMachine)) {
        let mut state = self.state.lock().unwrap();
        let rv = state.next_resource_version();
        let vm = state.vms.get_mut(&ResourceKey::new(namespace, name)).unwrap();
        change(vm);
        vm.metadata.resource_version = Some(rv);
    }

    /// Set the printable status of a stored VirtualMachine
    pub fn set_power_state(&self, namespace: &str, name: &str, status: &str) {
        self.update_vm(namespace, name, |vm| {
            vm.status.get_or_insert_with(Default::default).printable_status = Some(status.to_string());
        });
    }

    /// Request deletion; the object is removed at once when it has no finalizers
    pub fn request_deletion(&self, namespace: &str, name: &str) {
        let key = ResourceKey::new(namespace, name);
        let mut state = self.state.lock().unwrap();
        let rv = state.next_resource_version();
        let Some(vm) = state.vms.get_mut(&key) else {
            return;
        };
        vm.metadata.deletion_timestamp =
            Some(serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap());
        vm.metadata.resource_version = Some(rv);
        if vm.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            state.vms.remove(&key);
        }
    }

    pub fn remove_vm(&self, namespace: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .vms
            .remove(&ResourceKey::new(namespace, name));
    }

    pub fn insert_vmi(&self, vmi: VirtualMachineInstance) {
        let key = ResourceKey::new(
            vmi.metadata.namespace.clone().unwrap(),
            vmi.metadata.name.clone().unwrap(),
        );
        self.state.lock().unwrap().vmis.insert(key, vmi);
    }

    pub fn insert_service(&self, service: Service) {
        self.state.lock().unwrap().services.push(service);
    }

    /// Make the next `count` patches fail with a conflict, as if another
    /// writer got there first
    pub fn inject_conflicts(&self, count: usize) {
        self.state.lock().unwrap().conflicts_to_inject = count;
    }

    pub fn fail_vmi_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_vmi_reads = fail;
    }

    pub fn fail_service_lists(&self, fail: bool) {
        self.state.lock().unwrap().fail_service_lists = fail;
    }

    /// Number of patch requests received, including rejected ones
    pub fn patch_count(&self) -> usize {
        self.state.lock().unwrap().patches
    }
}

fn api_error(code: u16, reason: &str) -> StoreError {
    let response: kube::core::ErrorResponse = serde_json::from_value(serde_json::json!({
        "status": "Failure",
        "message": format!("injected {}", reason),
        "reason": reason,
        "code": code
    }))
    .unwrap();
    StoreError::Kube(kube::Error::Api(response))
}

#[async_trait::async_trait]
impl ClusterStore for MockClusterStore {
    async fn get_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachine>, StoreError> {
        Ok(self.vm(namespace, name))
    }

    async fn patch_virtual_machine_metadata(
        &self,
        namespace: &str,
        name: &str,
        patch: &MetadataPatch,
    ) -> Result<VirtualMachine, StoreError> {
        let key = ResourceKey::new(namespace, name);
        let mut state = self.state.lock().unwrap();
        state.patches += 1;

        if !state.vms.contains_key(&key) {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if state.conflicts_to_inject > 0 {
            state.conflicts_to_inject -= 1;
            let rv = state.next_resource_version();
            if let Some(vm) = state.vms.get_mut(&key) {
                vm.metadata.resource_version = Some(rv);
            }
            return Err(StoreError::Conflict(key.to_string()));
        }

        let rv = state.next_resource_version();
        let Some(vm) = state.vms.get_mut(&key) else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        if patch.resource_version.is_some() && patch.resource_version != vm.metadata.resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }

        if !patch.annotations.is_empty() {
            let annotations = vm.metadata.annotations.get_or_insert_with(BTreeMap::new);
            for (k, v) in &patch.annotations {
                annotations.insert(k.clone(), v.clone());
            }
        }
        if let Some(finalizers) = &patch.finalizers {
            vm.metadata.finalizers = Some(finalizers.clone());
        }
        vm.metadata.resource_version = Some(rv);

        let updated = vm.clone();
        let released = updated.metadata.deletion_timestamp.is_some()
            && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if released {
            state.vms.remove(&key);
        }
        Ok(updated)
    }

    async fn get_virtual_machine_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineInstance>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_vmi_reads {
            return Err(api_error(500, "InternalError"));
        }
        Ok(state.vmis.get(&ResourceKey::new(namespace, name)).cloned())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_service_lists {
            return Err(api_error(403, "Forbidden"));
        }
        Ok(state
            .services
            .iter()
            .filter(|s| s.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }
}

/// Helper to create a test VirtualMachine with the given status and annotations
pub fn create_test_vm(
    namespace: &str,
    name: &str,
    printable_status: Option<&str>,
    annotations: &[(&str, &str)],
) -> VirtualMachine {
    let annotations: BTreeMap<String, String> = annotations
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut vm: VirtualMachine = serde_json::from_value(serde_json::json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachine",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "generation": 1,
            "labels": { "app": name },
            "annotations": annotations
        },
        "spec": { "runStrategy": "Always" }
    }))
    .unwrap();
    if let Some(status) = printable_status {
        vm.status = Some(crds::VirtualMachineStatus {
            printable_status: Some(status.to_string()),
            ..Default::default()
        });
    }
    vm
}

/// Helper to create a test VirtualMachineInstance reporting the given interface IPs
pub fn create_test_vmi(namespace: &str, name: &str, ips: &[&str]) -> VirtualMachineInstance {
    let interfaces: Vec<serde_json::Value> = ips
        .iter()
        .enumerate()
        .map(|(i, ip)| serde_json::json!({ "name": format!("nic{}", i), "ipAddress": ip }))
        .collect();
    serde_json::from_value(serde_json::json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachineInstance",
        "metadata": { "name": name, "namespace": namespace },
        "spec": {},
        "status": { "phase": "Running", "interfaces": interfaces }
    }))
    .unwrap()
}

/// Helper to create a test Service with the given selector
pub fn create_test_service(namespace: &str, name: &str, selector: &[(&str, &str)]) -> Service {
    let selector: BTreeMap<String, String> = selector
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "name": name, "namespace": namespace },
        "spec": { "selector": selector, "ports": [{ "port": 3389 }] }
    }))
    .unwrap()
}

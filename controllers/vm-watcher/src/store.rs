//! Cluster store access.
//!
//! The reconciler reads VirtualMachines, VirtualMachineInstances and Services
//! and writes VirtualMachine metadata through `ClusterStore`, so tests can run
//! it against an in-memory store instead of an API server.

use crds::{VirtualMachine, VirtualMachineInstance};
use k8s_openapi::api::core::v1::Service;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Namespaced identity of a VirtualMachine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced object; `None` when the namespace is missing
    pub fn from_object(vm: &VirtualMachine) -> Option<Self> {
        Some(Self::new(vm.namespace()?, vm.name_any()))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors returned by the cluster store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write carried a stale resource version
    #[error("Conflict writing {0}: resource version is stale")]
    Conflict(String),

    /// The object no longer exists
    #[error("{0} not found")]
    NotFound(String),

    /// Any other API failure
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

/// Metadata-only change to a VirtualMachine
///
/// Sent as a JSON merge patch. When `resource_version` is set the API server
/// rejects the write with 409 if the object changed since it was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    pub resource_version: Option<String>,
    pub annotations: BTreeMap<String, String>,
    /// Full replacement finalizer list
    pub finalizers: Option<Vec<String>>,
}

impl MetadataPatch {
    pub fn to_merge_patch(&self) -> serde_json::Value {
        let mut metadata = serde_json::Map::new();
        if let Some(rv) = &self.resource_version {
            metadata.insert("resourceVersion".to_string(), serde_json::json!(rv));
        }
        if !self.annotations.is_empty() {
            metadata.insert("annotations".to_string(), serde_json::json!(self.annotations));
        }
        if let Some(finalizers) = &self.finalizers {
            metadata.insert("finalizers".to_string(), serde_json::json!(finalizers));
        }
        serde_json::json!({ "metadata": metadata })
    }
}

/// Cluster resources the reconciler depends on
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachine>, StoreError>;

    /// Apply a metadata patch and return the updated object
    async fn patch_virtual_machine_metadata(
        &self,
        namespace: &str,
        name: &str,
        patch: &MetadataPatch,
    ) -> Result<VirtualMachine, StoreError>;

    async fn get_virtual_machine_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineInstance>, StoreError>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, StoreError>;
}

/// `ClusterStore` backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl KubeClusterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachine>, StoreError> {
        let api: Api<VirtualMachine> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_virtual_machine_metadata(
        &self,
        namespace: &str,
        name: &str,
        patch: &MetadataPatch,
    ) -> Result<VirtualMachine, StoreError> {
        let api: Api<VirtualMachine> = Api::namespaced(self.client.clone(), namespace);
        let body = patch.to_merge_patch();
        api.patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 409 => {
                    StoreError::Conflict(format!("{}/{}", namespace, name))
                }
                kube::Error::Api(ae) if ae.code == 404 => {
                    StoreError::NotFound(format!("{}/{}", namespace, name))
                }
                other => StoreError::Kube(other),
            })
    }

    async fn get_virtual_machine_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualMachineInstance>, StoreError> {
        let api: Api<VirtualMachineInstance> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, StoreError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }
}

//! Endpoint resolution.
//!
//! Determines the hostname Guacamole should connect to for a VirtualMachine:
//! the first guest IP reported by its VirtualMachineInstance, else the DNS
//! name of a Service in the same namespace that selects the VM, else the VM's
//! own name.

use crate::error::ControllerError;
use crate::store::{ClusterStore, ResourceKey};
use k8s_openapi::api::core::v1::Service;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves the network endpoint of a VirtualMachine
#[derive(Clone)]
pub struct EndpointResolver {
    store: Arc<dyn ClusterStore>,
    cluster_domain: String,
}

impl EndpointResolver {
    pub fn new(store: Arc<dyn ClusterStore>, cluster_domain: impl Into<String>) -> Self {
        Self {
            store,
            cluster_domain: cluster_domain.into(),
        }
    }

    /// Resolve the hostname for the VM identified by `key` carrying `labels`.
    ///
    /// Never fails for lack of an address. Only a failed read of the
    /// VirtualMachineInstance is an error; a failed Service listing falls
    /// through to the VM name.
    pub async fn resolve(
        &self,
        key: &ResourceKey,
        labels: &BTreeMap<String, String>,
    ) -> Result<String, ControllerError> {
        match self
            .store
            .get_virtual_machine_instance(&key.namespace, &key.name)
            .await
        {
            Ok(Some(vmi)) => {
                if let Some(ip) = vmi.first_ip_address() {
                    debug!("Resolved {} to instance IP {}", key, ip);
                    return Ok(ip.to_string());
                }
                debug!("VirtualMachineInstance {} reports no IP address yet", key);
            }
            Ok(None) => debug!("No VirtualMachineInstance for {}", key),
            Err(e) => {
                return Err(ControllerError::Resolution(format!(
                    "failed to read VirtualMachineInstance {}: {}",
                    key, e
                )));
            }
        }

        match self.store.list_services(&key.namespace).await {
            Ok(services) => {
                if let Some(hostname) = self.matching_service_hostname(&services, labels, &key.namespace) {
                    debug!("Resolved {} to service {}", key, hostname);
                    return Ok(hostname);
                }
            }
            Err(e) => warn!("Failed to list services in {} while resolving {}: {}", key.namespace, key, e),
        }

        debug!("Falling back to VM name as hostname for {}", key);
        Ok(key.name.clone())
    }

    fn matching_service_hostname(
        &self,
        services: &[Service],
        labels: &BTreeMap<String, String>,
        namespace: &str,
    ) -> Option<String> {
        services.iter().find_map(|service| {
            let name = service.metadata.name.as_deref()?;
            let selector = service.spec.as_ref()?.selector.as_ref()?;
            selector_matches(selector, labels)
                .then(|| service_hostname(name, namespace, &self.cluster_domain))
        })
    }
}

/// Whether every selector pair is present in `labels`; an empty selector matches nothing
pub fn selector_matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    !selector.is_empty() && selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Cluster DNS name of a Service
pub fn service_hostname(service: &str, namespace: &str, cluster_domain: &str) -> String {
    format!("{}.{}.svc.{}", service, namespace, cluster_domain)
}

//! Controller-specific error types.
//!
//! This module defines error types specific to the vm-watcher controller
//! that are not covered by upstream library errors.

use crate::store::StoreError;
use guacamole_client::GuacamoleError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the vm-watcher controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client error outside the cluster store (client construction)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Reading or writing cluster resources failed
    #[error("Cluster store error: {0}")]
    Store(#[from] StoreError),

    /// Guacamole API error
    #[error("Guacamole error: {0}")]
    Guacamole(#[from] GuacamoleError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource is missing fields the controller relies on
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Endpoint could not be determined
    #[error("Endpoint resolution failed: {0}")]
    Resolution(String),

    /// Reconciliation did not finish before its deadline
    #[error("Reconciliation of {0} exceeded its deadline")]
    DeadlineExceeded(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

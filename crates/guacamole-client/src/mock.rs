//! Mock GuacamoleClient for unit testing
//!
//! This module provides a mock implementation of GuacamoleClientTrait that can be used
//! in unit tests without requiring a running Guacamole instance.

use crate::error::GuacamoleError;
use crate::guacamole_trait::GuacamoleClientTrait;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Number of calls made against the mock, per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub authenticate: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Calls that touched connections (authentication excluded)
    pub fn connection_calls(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Debug, Default)]
struct Failures {
    authenticate: bool,
    create: Option<u16>,
    update: Option<u16>,
    delete: Option<u16>,
}

/// Mock GuacamoleClient for testing
///
/// Stores connections in memory keyed by identifier and can be configured
/// to fail specific operations.
#[derive(Debug, Clone)]
pub struct MockGuacamoleClient {
    pub(crate) base_url: String,
    pub(crate) connections: Arc<Mutex<HashMap<String, Connection>>>,
    calls: Arc<Mutex<CallCounts>>,
    failures: Arc<Mutex<Failures>>,
    // Counter for generating identifiers
    pub(crate) next_id: Arc<Mutex<u64>>,
}

impl MockGuacamoleClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connections: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(CallCounts::default())),
            failures: Arc::new(Mutex::new(Failures::default())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Add a connection to the mock store (for test setup)
    pub fn add_connection(&self, identifier: impl Into<String>, connection: Connection) {
        self.connections.lock().unwrap().insert(identifier.into(), connection);
    }

    /// Stored connection by identifier
    pub fn connection(&self, identifier: &str) -> Option<Connection> {
        self.connections.lock().unwrap().get(identifier).cloned()
    }

    /// Number of stored connections
    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Snapshot of the call counters
    pub fn call_counts(&self) -> CallCounts {
        *self.calls.lock().unwrap()
    }

    /// Make every token request fail until cleared
    pub fn fail_authentication(&self, fail: bool) {
        self.failures.lock().unwrap().authenticate = fail;
    }

    /// Make create calls fail with the given HTTP status until cleared
    pub fn fail_create_with(&self, status: Option<u16>) {
        self.failures.lock().unwrap().create = status;
    }

    /// Make update calls fail with the given HTTP status until cleared
    pub fn fail_update_with(&self, status: Option<u16>) {
        self.failures.lock().unwrap().update = status;
    }

    /// Make delete calls fail with the given HTTP status until cleared
    pub fn fail_delete_with(&self, status: Option<u16>) {
        self.failures.lock().unwrap().delete = status;
    }

    /// Generate next identifier
    fn next_id(&self) -> String {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current.to_string()
    }

    fn injected(status: u16, operation: &str) -> GuacamoleError {
        GuacamoleError::Api {
            status,
            message: format!("{} failed (injected by mock)", operation),
        }
    }
}

#[async_trait::async_trait]
impl GuacamoleClientTrait for MockGuacamoleClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn authenticate(&self) -> Result<AuthSession, GuacamoleError> {
        self.calls.lock().unwrap().authenticate += 1;
        if self.failures.lock().unwrap().authenticate {
            return Err(GuacamoleError::Authentication(
                "token request failed with status 403".to_string(),
            ));
        }

        Ok(AuthSession {
            auth_token: "mock-token".to_string(),
            username: "guacadmin".to_string(),
            data_source: "postgresql".to_string(),
            available_data_sources: vec!["postgresql".to_string()],
        })
    }

    async fn create_connection(
        &self,
        _session: &AuthSession,
        connection: &Connection,
    ) -> Result<String, GuacamoleError> {
        self.calls.lock().unwrap().create += 1;
        if let Some(status) = self.failures.lock().unwrap().create {
            return Err(Self::injected(status, "create"));
        }

        let id = self.next_id();
        self.connections.lock().unwrap().insert(id.clone(), connection.clone());
        Ok(id)
    }

    async fn update_connection(
        &self,
        _session: &AuthSession,
        identifier: &str,
        connection: &Connection,
    ) -> Result<(), GuacamoleError> {
        self.calls.lock().unwrap().update += 1;
        if let Some(status) = self.failures.lock().unwrap().update {
            return Err(Self::injected(status, "update"));
        }

        let mut connections = self.connections.lock().unwrap();
        match connections.get_mut(identifier) {
            Some(existing) => {
                *existing = connection.clone();
                Ok(())
            }
            None => Err(GuacamoleError::NotFound(format!("connection {}", identifier))),
        }
    }

    async fn delete_connection(
        &self,
        _session: &AuthSession,
        identifier: &str,
    ) -> Result<(), GuacamoleError> {
        self.calls.lock().unwrap().delete += 1;
        if let Some(status) = self.failures.lock().unwrap().delete {
            return Err(Self::injected(status, "delete"));
        }

        match self.connections.lock().unwrap().remove(identifier) {
            Some(_) => Ok(()),
            None => Err(GuacamoleError::NotFound(format!("connection {}", identifier))),
        }
    }
}

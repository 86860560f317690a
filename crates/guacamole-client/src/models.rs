//! Guacamole API models
//!
//! These models match the JSON exchanged with the Guacamole REST API
//! (`/api/tokens` and `/api/session/data/{dataSource}/connections`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of the root connection group
pub const ROOT_CONNECTION_GROUP: &str = "ROOT";

/// Administrative credentials used to obtain auth tokens
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response of `POST /api/tokens`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub auth_token: String,
    pub username: String,
    pub data_source: String,
    #[serde(default)]
    pub available_data_sources: Vec<String>,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("auth_token", &"<redacted>")
            .field("username", &self.username)
            .field("data_source", &self.data_source)
            .field("available_data_sources", &self.available_data_sources)
            .finish()
    }
}

/// Connection definition sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub parent_identifier: String,
    pub name: String,
    pub protocol: String,
    pub parameters: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
}

impl Connection {
    /// Create a connection in the root connection group
    pub fn new(
        name: impl Into<String>,
        protocol: impl Into<String>,
        parameters: BTreeMap<String, String>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            parent_identifier: ROOT_CONNECTION_GROUP.to_string(),
            name: name.into(),
            protocol: protocol.into(),
            parameters,
            attributes,
        }
    }

    /// Convenience accessor for a single parameter
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Response of `POST .../connections`; echoes the submitted fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResponse {
    pub identifier: String,
    #[serde(default)]
    pub parent_identifier: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub active_connections: Option<u32>,
}

//! Guacamole API client
//!
//! Implements the subset of the Guacamole REST API the controller needs:
//! token issuance (`/api/tokens`) and connection management
//! (`/api/session/data/{dataSource}/connections`).

use crate::common::HttpClient;
use crate::error::GuacamoleError;
use crate::guacamole_trait::GuacamoleClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Guacamole API client
#[derive(Debug, Clone)]
pub struct GuacamoleClient {
    http: HttpClient,
    credentials: Credentials,
}

impl GuacamoleClient {
    /// Create a new Guacamole client
    ///
    /// # Arguments
    /// * `base_url` - Guacamole base URL (e.g., "https://guacamole.example.com/guacamole")
    /// * `credentials` - Administrative username and password
    /// * `timeout` - Per-request timeout applied to every call
    pub fn new(
        base_url: String,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, GuacamoleError> {
        reqwest::Url::parse(&base_url).map_err(|e| {
            GuacamoleError::InvalidRequest(format!("invalid Guacamole base URL {}: {}", base_url, e))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url),
            credentials,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Obtain a fresh auth token and the default data source.
    ///
    /// Guacamole answers `200 OK` on success; anything else, including a
    /// transport failure, is reported as `GuacamoleError::Authentication`.
    pub async fn authenticate(&self) -> Result<AuthSession, GuacamoleError> {
        let url = self.http.build_url("/api/tokens");
        debug!("Requesting Guacamole auth token for user {}", self.credentials.username);

        let response = self
            .http
            .client()
            .post(&url)
            .form(&[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                GuacamoleError::Authentication(format!("failed to reach Guacamole: {}", e))
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(GuacamoleError::Authentication(format!(
                "token request failed with status {}",
                status.as_u16()
            )));
        }

        let text = response.text().await.map_err(|e| {
            GuacamoleError::Authentication(format!("failed to read token response: {}", e))
        })?;
        let session: AuthSession = serde_json::from_str(&text).map_err(|e| {
            GuacamoleError::Authentication(format!("failed to decode token response: {}", e))
        })?;

        debug!("Authenticated with Guacamole (data source: {})", session.data_source);
        Ok(session)
    }

    /// Create a connection and return its identifier
    pub async fn create_connection(
        &self,
        session: &AuthSession,
        connection: &Connection,
    ) -> Result<String, GuacamoleError> {
        let path = HttpClient::connections_path(&session.data_source);
        let created: ConnectionResponse = self
            .http
            .post(&path, &session.auth_token, connection)
            .await?;

        info!(
            "Created Guacamole connection {} (identifier: {}, protocol: {})",
            connection.name, created.identifier, created.protocol
        );
        Ok(created.identifier)
    }

    /// Replace an existing connection definition
    pub async fn update_connection(
        &self,
        session: &AuthSession,
        identifier: &str,
        connection: &Connection,
    ) -> Result<(), GuacamoleError> {
        let path = HttpClient::connection_path(&session.data_source, identifier);
        self.http.put(&path, &session.auth_token, connection).await?;

        info!("Updated Guacamole connection {} (identifier: {})", connection.name, identifier);
        Ok(())
    }

    /// Delete a connection
    ///
    /// An unknown identifier yields `GuacamoleError::NotFound`; callers doing
    /// cleanup treat that as already deleted.
    pub async fn delete_connection(
        &self,
        session: &AuthSession,
        identifier: &str,
    ) -> Result<(), GuacamoleError> {
        let path = HttpClient::connection_path(&session.data_source, identifier);
        self.http.delete(&path, &session.auth_token).await?;

        info!("Deleted Guacamole connection {}", identifier);
        Ok(())
    }
}

#[async_trait::async_trait]
impl GuacamoleClientTrait for GuacamoleClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn authenticate(&self) -> Result<AuthSession, GuacamoleError> {
        self.authenticate().await
    }

    async fn create_connection(
        &self,
        session: &AuthSession,
        connection: &Connection,
    ) -> Result<String, GuacamoleError> {
        self.create_connection(session, connection).await
    }

    async fn update_connection(
        &self,
        session: &AuthSession,
        identifier: &str,
        connection: &Connection,
    ) -> Result<(), GuacamoleError> {
        self.update_connection(session, identifier, connection).await
    }

    async fn delete_connection(
        &self,
        session: &AuthSession,
        identifier: &str,
    ) -> Result<(), GuacamoleError> {
        self.delete_connection(session, identifier).await
    }
}

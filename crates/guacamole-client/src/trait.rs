//! GuacamoleClient trait for mocking
//!
//! This trait abstracts the GuacamoleClient so the reconciler can be tested
//! against an in-memory gateway.

use crate::error::GuacamoleError;
use crate::models::*;

/// Trait for Guacamole API client operations
///
/// Every connection operation takes the session returned by `authenticate`.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait GuacamoleClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Obtain a fresh auth token and data source
    async fn authenticate(&self) -> Result<AuthSession, GuacamoleError>;

    // Connection operations
    async fn create_connection(&self, session: &AuthSession, connection: &Connection) -> Result<String, GuacamoleError>;
    async fn update_connection(&self, session: &AuthSession, identifier: &str, connection: &Connection) -> Result<(), GuacamoleError>;
    async fn delete_connection(&self, session: &AuthSession, identifier: &str) -> Result<(), GuacamoleError>;
}

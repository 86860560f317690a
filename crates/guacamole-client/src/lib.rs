//! Guacamole REST API Client
//!
//! A Rust client library for the Apache Guacamole REST API, covering the
//! token and connection endpoints needed to publish remote desktop
//! connections for virtual machines.
//!
//! # Example
//!
//! ```no_run
//! use guacamole_client::{Connection, Credentials, GuacamoleClient};
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GuacamoleClient::new(
//!     "https://guacamole.example.com/guacamole".to_string(),
//!     Credentials::new("guacadmin", "guacadmin"),
//!     Duration::from_secs(30),
//! )?;
//!
//! // Every operation runs under a freshly issued token
//! let session = client.authenticate().await?;
//!
//! let connection = Connection::new("lab-vm-a", "ssh", BTreeMap::new(), BTreeMap::new());
//! let id = client.create_connection(&session, &connection).await?;
//! client.delete_connection(&session, &id).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod guacamole_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::GuacamoleClient;
pub use common::HttpClient;
pub use error::GuacamoleError;
pub use models::*;
pub use guacamole_trait::GuacamoleClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{CallCounts, MockGuacamoleClient};

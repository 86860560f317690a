//! Common utilities for the Guacamole API client
//!
//! Provides the token-scoped request plumbing shared by all connection operations.

use crate::error::GuacamoleError;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper bound to one Guacamole base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Path of the connection collection in a data source
    pub fn connections_path(data_source: &str) -> String {
        format!(
            "/api/session/data/{}/connections",
            urlencoding::encode(data_source)
        )
    }

    /// Path of a single connection in a data source
    pub fn connection_path(data_source: &str, identifier: &str) -> String {
        format!(
            "{}/{}",
            Self::connections_path(data_source),
            urlencoding::encode(identifier)
        )
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.build_url(path))
            .query(&[("token", token)])
            .header("Accept", "application/json")
    }

    /// Make a POST request with a JSON body and decode the JSON response
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, GuacamoleError> {
        debug!("POST {}", self.build_url(path));

        let response = self
            .request(Method::POST, path, token)
            .json(body)
            .send()
            .await?;

        let response = Self::check_status(response, "POST", path).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(GuacamoleError::Serialization)
    }

    /// Make a PUT request with a JSON body; the response body is ignored
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<(), GuacamoleError> {
        debug!("PUT {}", self.build_url(path));

        let response = self
            .request(Method::PUT, path, token)
            .json(body)
            .send()
            .await?;

        Self::check_status(response, "PUT", path).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str, token: &str) -> Result<(), GuacamoleError> {
        debug!("DELETE {}", self.build_url(path));

        let response = self.request(Method::DELETE, path, token).send().await?;

        Self::check_status(response, "DELETE", path).await?;
        Ok(())
    }

    /// Map non-2xx responses to errors, keeping the body for diagnostics
    async fn check_status(
        response: Response,
        method: &str,
        path: &str,
    ) -> Result<Response, GuacamoleError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            return Err(GuacamoleError::NotFound(format!(
                "{} {} - {}",
                method, path, body
            )));
        }

        Err(GuacamoleError::Api {
            status: status.as_u16(),
            message: format!("{} {} failed: {}", method, path, body),
        })
    }
}

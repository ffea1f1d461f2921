//! Trawler HTTP Client
//!
//! A simple, type-safe HTTP client for communicating with the Trawler
//! coordinator API.
//!
//! Runners never hold database credentials; every interaction with the
//! coordinator goes through these authenticated HTTP endpoints. Requests
//! carry the API key in the `X-Api-Key` header.
//!
//! # Example
//!
//! ```no_run
//! use trawler_client::CoordinatorClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trawler_client::ClientError> {
//!     let client = CoordinatorClient::new("http://localhost:8080", "secret-key");
//!
//!     client.health().await?;
//!     let config = client.get_job("job-123").await?;
//!     println!("job {} has {} skus", config.job_id, config.skus.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod runners;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use trawler_core::domain::job::JobConfig;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// Name of the authentication header expected by the coordinator
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP client for the Trawler coordinator API
///
/// This client provides methods for all coordinator endpoints the runner
/// consumes, organized into logical groups:
/// - Health and runner registration
/// - Job configuration retrieval
/// - Result submission via the callback endpoint
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    /// Base URL of the coordinator (e.g., "http://localhost:8080")
    base_url: String,
    /// API key sent with every request
    api_key: String,
    /// HTTP client instance
    client: Client,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the coordinator API
    /// * `api_key` - The key used to authenticate every request
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Create a client with a custom HTTP client
    ///
    /// Allows configuring timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds a GET request with the auth header attached
    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).header(API_KEY_HEADER, &self.api_key)
    }

    /// Builds a POST request with the auth header attached
    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url).header(API_KEY_HEADER, &self.api_key)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Checks the status code and returns an appropriate error if the request
    /// failed, or deserializes the response body if successful.
    pub(crate) async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response where only the status code matters
    pub(crate) async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

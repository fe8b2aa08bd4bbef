use async_trait::async_trait;
use reqwest::Method;

use super::error::RemoteError;

/// Executes requests against the REST service.
///
/// Implementations return the raw body of a 2xx response and a classified
/// [`RemoteError`] for everything else. Endpoints are relative to the API base
/// (`meals`, `family-members/{id}`, ...).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, RemoteError>;

    /// Multipart upload of a single file part.
    async fn upload(
        &self,
        endpoint: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>, RemoteError>;

    /// Cheap bounded-time check that the service answers at all.
    async fn probe(&self) -> bool;
}

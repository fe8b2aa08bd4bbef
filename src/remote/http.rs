//! reqwest-backed [`Transport`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response};
use std::time::Duration;
use tracing::debug;

use super::error::{classify, RemoteError};
use super::transport::Transport;

/// Path prefix of every API endpoint.
pub const API_PREFIX: &str = "api/v1";

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpTransport {
    /// Builds a client that sends `Authorization: Bearer <token>` on every call.
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| RemoteError::Setup(format!("invalid token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            probe_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an API endpoint.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            API_PREFIX,
            endpoint.trim_start_matches('/')
        )
    }

    /// Reads the body and classifies the status. A body cut off after the
    /// status line is `Unreachable`, so the request stays eligible for replay.
    async fn read(response: Response) -> Result<Vec<u8>, RemoteError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        classify(status, &body)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, RemoteError> {
        let url = self.url(endpoint);
        debug!(%method, %url, "Sending request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Self::read(response).await
    }

    async fn upload(
        &self,
        endpoint: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<u8>, RemoteError> {
        let url = self.url(endpoint);
        debug!(%url, bytes = bytes.len(), "Uploading file");

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| RemoteError::Setup(e.to_string()))?;
        let form = Form::new().part(field.to_string(), part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Self::read(response).await
    }

    async fn probe(&self) -> bool {
        self.client
            .head(&self.base_url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .is_ok()
    }
}

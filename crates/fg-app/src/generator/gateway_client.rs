use std::path::Path;

use async_trait::async_trait;
use futures::TryStreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use fg_core::{CreateTaskRequest, CreateTaskResponse, TaskSnapshot};

use crate::backend::schemas::KeyStatus;
use crate::error::AppError;
use crate::generator::TaskGateway;

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Path, relative to the gateway root, that relays `url` through the proxy.
pub fn proxy_path(url: &str) -> String {
    format!("/api/proxy/model?url={}", utf8_percent_encode(url, URI_COMPONENT))
}

/// HTTP client for the forge3d gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn check_key(&self) -> Result<KeyStatus, AppError> {
        let response = self.http.get(format!("{}/api/check-api-key", self.base_url)).send().await?;
        Ok(response.json().await?)
    }

    /// Streams `url` through the proxy relay into `dest`. Returns bytes written.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, proxy_path(url)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body["error"].as_str().unwrap_or("download failed");
            return Err(AppError::BackendError(format!("HTTP {status}: {message}")));
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(bytes = written, dest = %dest.display(), "download complete");
        Ok(written)
    }
}

#[async_trait]
impl TaskGateway for GatewayClient {
    async fn create_task(&self, req: &CreateTaskRequest) -> Result<String, AppError> {
        let response = self
            .http
            .post(format!("{}/api/text-to-3d", self.base_url))
            .json(req)
            .send()
            .await?;

        let ok = response.status().is_success();
        let body: Value = response.json().await?;

        if !ok || body.get("error").is_some() {
            let message = body["error"].as_str().unwrap_or("Failed to create task");
            return Err(AppError::BackendError(message.to_string()));
        }

        serde_json::from_value::<CreateTaskResponse>(body)
            .ok()
            .map(|created| created.result)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::BackendError("No task ID returned. Please check your API key configuration.".into())
            })
    }

    async fn fetch_task(&self, id: &str) -> Result<TaskSnapshot, AppError> {
        let response = self
            .http
            .get(format!("{}/api/text-to-3d/{}", self.base_url, utf8_percent_encode(id, URI_COMPONENT)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::BackendError(format!("HTTP {}", response.status())));
        }

        let mut snapshot: TaskSnapshot = response.json().await?;
        if snapshot.id.is_empty() {
            snapshot.id = id.to_string();
        }
        Ok(snapshot)
    }

    async fn list_tasks(&self) -> Result<Vec<TaskSnapshot>, AppError> {
        let response = self.http.get(format!("{}/api/text-to-3d", self.base_url)).send().await?;

        if !response.status().is_success() {
            return Err(AppError::BackendError(format!("HTTP {}", response.status())));
        }

        Ok(response.json().await?)
    }
}

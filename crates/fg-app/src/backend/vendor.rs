use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use fg_core::{CreateTaskRequest, TaskSnapshot};

use crate::backend::schemas::KeyStatus;
use crate::config::Credential;
use crate::error::GatewayError;

/// Typed client for the vendor's text-to-3D job API.
#[derive(Debug, Clone)]
pub struct VendorClient {
    http: Client,
    base_url: String,
    credential: Credential,
}

impl VendorClient {
    pub fn new(http: Client, base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credential,
        }
    }

    fn api_key(&self) -> Result<String, GatewayError> {
        self.credential.resolve().ok_or(GatewayError::MissingCredential)
    }

    /// Validates and forwards a create call. Returns the vendor payload untouched.
    pub async fn create(&self, req: &CreateTaskRequest) -> Result<Value, GatewayError> {
        let mode = req.validate()?;
        let key = self.api_key()?;

        debug!(%mode, url = %self.base_url, "forwarding create request");
        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(key)
            .json(req)
            .send()
            .await?;

        read_json(response, "Failed to create task").await
    }

    pub async fn get(&self, id: &str) -> Result<TaskSnapshot, GatewayError> {
        let key = self.api_key()?;
        let url = format!("{}/{}", self.base_url, encode_segment(id));

        let response = self.http.get(url).bearer_auth(key).send().await?;
        let mut snapshot: TaskSnapshot = read_json(response, "Failed to get task").await?;
        if snapshot.id.is_empty() {
            snapshot.id = id.to_string();
        }
        Ok(snapshot)
    }

    pub async fn list(&self) -> Result<Vec<TaskSnapshot>, GatewayError> {
        let key = self.api_key()?;
        let response = self.http.get(&self.base_url).bearer_auth(key).send().await?;
        read_json(response, "Failed to list tasks").await
    }

    /// Calls the list endpoint to see whether the configured key is accepted.
    pub async fn check_key(&self) -> KeyStatus {
        let Some(key) = self.credential.resolve() else {
            return KeyStatus::unset();
        };

        match self.http.get(&self.base_url).bearer_auth(key).send().await {
            Ok(r) if matches!(r.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                KeyStatus::invalid()
            }
            Ok(_) => KeyStatus::set(),
            Err(e) => {
                warn!(error = %e, "could not verify API key");
                KeyStatus::unverified()
            }
        }
    }
}

/// Turns whatever the vendor sent into `T` or a classified error.
async fn read_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, GatewayError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("rate limit exceeded for vendor API");
        return Err(GatewayError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body, fallback);
        warn!(%status, %message, "vendor API error");
        return Err(GatewayError::Upstream { status, message });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if !content_type.as_deref().is_some_and(|ct| ct.contains("application/json")) {
        warn!(?content_type, "unexpected content type from vendor API");
        return Err(GatewayError::UnexpectedContent { content_type });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Best-effort message from an error body: a JSON `message`, else the raw text.
pub fn extract_message(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = map.get("message").and_then(Value::as_str).filter(|m| !m.is_empty()) {
            return message.to_string();
        }
        return fallback.to_string();
    }

    let text = body.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

/// RFC 3986 unreserved characters stay as they are.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

fn encode_segment(id: &str) -> String {
    utf8_percent_encode(id, PATH_SEGMENT).to_string()
}

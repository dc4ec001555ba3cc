use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fg_core::constants::RATE_LIMIT_MESSAGE;
use fg_core::{TaskSnapshot, TaskStatus, ValidationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Client-side failures: talking to the gateway, local files, user input.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Error from backend: {0}")]
    BackendError(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("You have used all {limit} free generations")]
    QuotaExhausted { limit: u32 },

    #[error("{0}")]
    InvalidInput(String),

    #[error("task {task_id} has no {format} model")]
    ModelUnavailable { task_id: String, format: String },

    #[error("task {task_id} has no {map} texture in set {set}")]
    TextureUnavailable { task_id: String, set: usize, map: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to load .env: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Failures at the vendor boundary.
///
/// The vendor client returns these as-is; each route decides whether a
/// failure becomes an HTTP error or a synthesized task snapshot.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("API key not configured")]
    MissingCredential,

    #[error("{}", RATE_LIMIT_MESSAGE)]
    RateLimited,

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Unexpected response from server")]
    UnexpectedContent { content_type: Option<String> },

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    /// Folds the failure into a task-shaped body for `id`.
    ///
    /// Rate limiting reads as "still pending"; everything else as FAILED.
    pub fn into_snapshot(self, id: &str) -> TaskSnapshot {
        let status = match self {
            GatewayError::RateLimited => TaskStatus::Pending,
            _ => TaskStatus::Failed,
        };
        TaskSnapshot::synthesized(id, status, self.to_string())
    }
}

/// Error half of a gateway route. Renders as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A failure whose message is safe to show, e.g. the vendor's own text.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Validation(v) => ApiError::BadRequest(v.to_string()),
            GatewayError::MissingCredential => ApiError::Upstream {
                status: StatusCode::UNAUTHORIZED,
                message: e.to_string(),
            },
            GatewayError::RateLimited => ApiError::Upstream {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: e.to_string(),
            },
            GatewayError::Upstream { status, message } => ApiError::Upstream { status, message },
            GatewayError::UnexpectedContent { .. } | GatewayError::Decode(_) => ApiError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: e.to_string(),
            },
            GatewayError::Transport(_) => ApiError::Upstream {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Upstream { status, message } => (status, message),
            ApiError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use percent_encoding::percent_decode_str;
use reqwest::Url;
use tracing::{debug, error};

use crate::backend::schemas::ProxyQuery;
use crate::backend::state::GenState;
use crate::error::ApiError;

const CACHE_FOR_A_DAY: &str = "public, max-age=86400";

/// Relays a remote asset so callers that cannot fetch cross-origin can.
///
/// The trailing path only names the download and is ignored.
pub async fn proxy_resource(
    State(state): State<Arc<GenState>>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let raw = query
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("URL parameter is required".to_string()))?;

    // Callers encode the target once more on top of query encoding.
    let decoded = percent_decode_str(&raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or(raw);
    let url = Url::parse(&decoded).map_err(|e| ApiError::BadRequest(format!("Invalid URL: {e}")))?;

    debug!(%url, "proxying resource");
    let mut request = state.http.get(url);
    if let Some(auth) = headers.get(AUTHORIZATION) {
        request = request.header(AUTHORIZATION, auth.clone());
    }

    let upstream = request.send().await.map_err(|e| {
        error!(error = %e, "proxy request failed");
        ApiError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    })?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(ApiError::Upstream {
            status,
            message: format!(
                "Failed to fetch resource: {}",
                status.canonical_reason().unwrap_or("Unknown status")
            ),
        });
    }

    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let content_length = upstream.headers().get(CONTENT_LENGTH).cloned();

    let mut builder = Response::builder()
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, CACHE_FOR_A_DAY);
    if let Some(len) = content_length {
        builder = builder.header(CONTENT_LENGTH, len);
    }

    builder
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

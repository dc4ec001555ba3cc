pub mod routes;
pub mod schemas;
pub mod state;
pub mod vendor;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use reqwest::Client;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::backend::routes::api_routes;
use crate::backend::state::GenState;
use crate::backend::vendor::VendorClient;
use crate::config::Config;

/// The gateway router. Every route is served both at the root and under `/api`.
pub fn router(state: Arc<GenState>) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("forge3d/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub struct GenBackend {
    addr: SocketAddr,
    app: Router,
}

impl GenBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = http_client().context("failed to build HTTP client")?;
        let vendor = VendorClient::new(http.clone(), config.vendor_url.clone(), config.credential.clone());
        let state = GenState::new(vendor, http);

        Ok(Self {
            addr: SocketAddr::new(config.host, config.port),
            app: router(Arc::new(state)),
        })
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;

        info!("Starting backend server on {}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("backend server failed")?;

        info!("Backend server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use axum::response::{Html, IntoResponse, Response};
    use axum::routing::get;
    use axum::Json;
    use fg_core::constants::RATE_LIMIT_MESSAGE;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum Vendor {
        Healthy,
        RateLimited,
        Broken,
        Maintenance,
        /// Claims JSON but sends something unparsable.
        Malformed,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Bearer test-key")
    }

    fn reply(mode: Vendor, headers: &HeaderMap, healthy: Value) -> Response {
        if !authorized(headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid API key" }))).into_response();
        }
        match mode {
            Vendor::Healthy => Json(healthy).into_response(),
            Vendor::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response(),
            Vendor::Broken => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal vendor failure" })),
            )
                .into_response(),
            Vendor::Maintenance => Html("<html>down for maintenance</html>").into_response(),
            Vendor::Malformed => ([(header::CONTENT_TYPE, "application/json")], "{not json").into_response(),
        }
    }

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn fake_vendor(mode: Vendor) -> String {
        let app = Router::new()
            .route(
                "/openapi/v2/text-to-3d",
                get(move |headers: HeaderMap| async move {
                    reply(
                        mode,
                        &headers,
                        json!([
                            { "id": "older", "mode": "preview", "status": "SUCCEEDED", "progress": 100, "created_at": 1 },
                            { "id": "newer", "mode": "preview", "status": "IN_PROGRESS", "progress": 40, "created_at": 2 }
                        ]),
                    )
                })
                .post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                    assert_eq!(body["mode"], json!("preview"));
                    reply(mode, &headers, json!({ "result": "task_abc" }))
                }),
            )
            .route(
                "/openapi/v2/text-to-3d/{id}",
                get(move |headers: HeaderMap, Path(id): Path<String>| async move {
                    reply(
                        mode,
                        &headers,
                        json!({ "id": id, "mode": "preview", "status": "IN_PROGRESS", "progress": 40, "created_at": 2 }),
                    )
                }),
            );
        format!("{}/openapi/v2/text-to-3d", spawn(app).await)
    }

    fn gateway(vendor_url: &str, key: Option<&str>) -> Router {
        let vendor = VendorClient::new(
            Client::new(),
            vendor_url,
            Credential::Static(key.map(str::to_string)),
        );
        router(Arc::new(GenState::new(vendor, Client::new())))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_get_relays_snapshot() {
        let app = gateway(&fake_vendor(Vendor::Healthy).await, Some("test-key"));

        let (status, body) = get_json(app.clone(), "/text-to-3d/task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!("task_abc"));
        assert_eq!(body["status"], json!("IN_PROGRESS"));

        let (status, body) = get_json(app, "/api/text-to-3d?id=task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["progress"], json!(40));
    }

    #[tokio::test]
    async fn test_get_rate_limited_is_pending() {
        let app = gateway(&fake_vendor(Vendor::RateLimited).await, Some("test-key"));

        let (status, body) = get_json(app, "/text-to-3d/task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!("task_abc"));
        assert_eq!(body["status"], json!("PENDING"));
        assert_eq!(body["progress"], json!(0));
        assert_eq!(body["task_error"]["message"], json!(RATE_LIMIT_MESSAGE));
    }

    #[tokio::test]
    async fn test_get_upstream_failure_is_failed() {
        let app = gateway(&fake_vendor(Vendor::Broken).await, Some("test-key"));

        let (status, body) = get_json(app, "/text-to-3d?id=task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("FAILED"));
        assert_eq!(body["task_error"]["message"], json!("Internal vendor failure"));
    }

    #[tokio::test]
    async fn test_get_non_json_is_failed() {
        let app = gateway(&fake_vendor(Vendor::Maintenance).await, Some("test-key"));

        let (status, body) = get_json(app, "/text-to-3d/task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("FAILED"));
        assert_eq!(body["task_error"]["message"], json!("Unexpected response from server"));
    }

    #[tokio::test]
    async fn test_get_malformed_json_is_failed() {
        let app = gateway(&fake_vendor(Vendor::Malformed).await, Some("test-key"));

        let (status, body) = get_json(app, "/text-to-3d/task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!("task_abc"));
        assert_eq!(body["status"], json!("FAILED"));
        assert!(!body["task_error"]["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_unreachable_vendor_keeps_id() {
        let app = gateway("http://127.0.0.1:9/openapi/v2/text-to-3d", Some("test-key"));

        let (status, body) = get_json(app, "/text-to-3d/task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!("task_abc"));
        assert_eq!(body["status"], json!("FAILED"));
        assert!(!body["task_error"]["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_without_key() {
        let app = gateway(&fake_vendor(Vendor::Healthy).await, Some("your-api-key"));

        let (status, body) = get_json(app, "/text-to-3d/task_abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("FAILED"));
        assert_eq!(body["task_error"]["message"], json!("API key not configured"));
    }

    #[tokio::test]
    async fn test_list() {
        let app = gateway(&fake_vendor(Vendor::Healthy).await, Some("test-key"));
        let (status, body) = get_json(app, "/text-to-3d").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_failures_are_empty() {
        for mode in [Vendor::Broken, Vendor::RateLimited, Vendor::Maintenance, Vendor::Malformed] {
            let app = gateway(&fake_vendor(mode).await, Some("test-key"));
            let (status, body) = get_json(app, "/text-to-3d").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!([]));
        }

        let app = gateway(&fake_vendor(Vendor::Healthy).await, None);
        assert_eq!(get_json(app, "/text-to-3d").await, (StatusCode::OK, json!([])));

        let app = gateway("http://127.0.0.1:9/openapi/v2/text-to-3d", Some("test-key"));
        assert_eq!(get_json(app, "/api/text-to-3d").await, (StatusCode::OK, json!([])));
    }

    #[tokio::test]
    async fn test_create_validation() {
        // Unreachable vendor: validation must answer before any network call.
        let app = gateway("http://127.0.0.1:9/openapi/v2/text-to-3d", Some("test-key"));

        let (status, body) = post_json(app.clone(), "/text-to-3d", r#"{"prompt":"a red cube"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Mode is required" }));

        let (status, body) = post_json(app.clone(), "/text-to-3d", r#"{"mode":"preview"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Prompt is required for preview mode" }));

        let (status, body) = post_json(app.clone(), "/text-to-3d", r#"{"mode":"refine"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Preview task ID is required for refine mode" }));

        let (status, body) = post_json(app, "/text-to-3d", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_create_forwards() {
        let app = gateway(&fake_vendor(Vendor::Healthy).await, Some("test-key"));
        let (status, body) =
            post_json(app, "/text-to-3d", r#"{"mode":"preview","prompt":"a red cube"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "result": "task_abc" }));
    }

    #[tokio::test]
    async fn test_create_upstream_status() {
        let app = gateway(&fake_vendor(Vendor::Healthy).await, Some("wrong-key"));
        let (status, body) =
            post_json(app, "/text-to-3d", r#"{"mode":"preview","prompt":"a red cube"}"#).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid API key" }));
    }

    #[tokio::test]
    async fn test_check_api_key() {
        let url = fake_vendor(Vendor::Healthy).await;

        let (_, body) = get_json(gateway(&url, Some("test-key")), "/check-api-key").await;
        assert_eq!(body, json!({ "isSet": true }));

        let (_, body) = get_json(gateway(&url, Some("wrong-key")), "/check-api-key").await;
        assert_eq!(body, json!({ "isSet": false, "message": "API key is invalid" }));

        let (_, body) = get_json(gateway(&url, None), "/check-api-key").await;
        assert_eq!(body, json!({ "isSet": false }));

        let unreachable = gateway("http://127.0.0.1:9/openapi/v2/text-to-3d", Some("test-key"));
        let (_, body) = get_json(unreachable, "/check-api-key").await;
        assert_eq!(
            body,
            json!({ "isSet": true, "warning": "API key is set but could not be verified" })
        );
    }

    async fn fake_asset_host() -> String {
        let app = Router::new()
            .route(
                "/model.glb",
                get(|headers: HeaderMap| async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("none")
                        .to_string();
                    ([(header::CONTENT_TYPE, "model/gltf-binary")], format!("glTF|{auth}"))
                }),
            )
            .route("/raw.bin", get(|| async { Body::from(vec![0u8, 1, 2, 3]) }));
        spawn(app).await
    }

    #[tokio::test]
    async fn test_proxy_requires_url() {
        let app = gateway("http://127.0.0.1:9", None);
        let (status, body) = get_json(app, "/api/proxy/model").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "URL parameter is required" }));
    }

    #[tokio::test]
    async fn test_proxy_streams_with_headers() {
        let host = fake_asset_host().await;
        let app = gateway("http://127.0.0.1:9", None);

        let target = percent_encoding::utf8_percent_encode(
            &format!("{host}/model.glb"),
            percent_encoding::NON_ALPHANUMERIC,
        )
        .to_string();
        let request = Request::builder()
            .uri(format!("/api/proxy/model?url={target}"))
            .header(header::AUTHORIZATION, "Bearer asset-token")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "model/gltf-binary");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=86400");
        assert_eq!(body, b"glTF|Bearer asset-token");
    }

    #[tokio::test]
    async fn test_proxy_defaults_content_type() {
        let host = fake_asset_host().await;
        let app = gateway("http://127.0.0.1:9", None);

        let request = Request::builder()
            .uri(format!("/proxy/texture?url={host}/raw.bin"))
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(body, vec![0u8, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_proxy_relays_upstream_status() {
        let host = fake_asset_host().await;
        let app = gateway("http://127.0.0.1:9", None);

        let (status, body) = get_json(app, &format!("/proxy/model?url={host}/missing.glb")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Failed to fetch resource: Not Found" }));
    }
}

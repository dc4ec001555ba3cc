use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{info, warn};

use fg_core::{CreateTaskRequest, TaskSnapshot};

use crate::backend::schemas::TaskQuery;
use crate::backend::state::GenState;
use crate::error::ApiError;

pub async fn create_task(
    State(state): State<Arc<GenState>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let created = state.vendor.create(&req).await?;
    info!(result = ?created.get("result"), "task created");
    Ok(Json(created))
}

/// `GET /text-to-3d?id=` fetches one task; without `id` it lists them all.
pub async fn get_or_list_tasks(
    State(state): State<Arc<GenState>>,
    Query(query): Query<TaskQuery>,
) -> Response {
    match query.id.filter(|id| !id.is_empty()) {
        Some(id) => Json(fetch_snapshot(&state, &id).await).into_response(),
        None => Json(list_snapshots(&state).await).into_response(),
    }
}

pub async fn get_task(State(state): State<Arc<GenState>>, Path(id): Path<String>) -> Json<TaskSnapshot> {
    Json(fetch_snapshot(&state, &id).await)
}

/// Never fails: vendor trouble comes back as a synthesized snapshot.
async fn fetch_snapshot(state: &GenState, id: &str) -> TaskSnapshot {
    match state.vendor.get(id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(task_id = %id, error = %e, "task lookup failed, answering with a synthesized snapshot");
            e.into_snapshot(id)
        }
    }
}

/// Never fails: the list view treats "no data" and "error" alike.
async fn list_snapshots(state: &GenState) -> Vec<TaskSnapshot> {
    match state.vendor.list().await {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "task listing failed, answering with an empty list");
            Vec::new()
        }
    }
}

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::backend::schemas::KeyStatus;
use crate::backend::state::GenState;

pub async fn check_api_key(State(state): State<Arc<GenState>>) -> Json<KeyStatus> {
    Json(state.vendor.check_key().await)
}

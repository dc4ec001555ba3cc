use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::backend::routes::api_key::check_api_key;
use crate::backend::routes::proxy::proxy_resource;
use crate::backend::routes::text_to_3d::{create_task, get_or_list_tasks, get_task};
use crate::backend::state::GenState;

mod api_key;
mod proxy;
mod text_to_3d;

pub fn api_routes() -> Router<Arc<GenState>> {
    Router::new()
        .route("/check-api-key", get(check_api_key))
        .route("/proxy/{*path}", get(proxy_resource))
        .route("/text-to-3d", get(get_or_list_tasks).post(create_task))
        .route("/text-to-3d/{id}", get(get_task))
}

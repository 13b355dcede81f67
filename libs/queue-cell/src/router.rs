use std::sync::Arc;
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn queue_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/addQueue", post(handlers::add_to_queue))
        .route("/getQueue", get(handlers::get_queue))
        .route("/{id}", patch(handlers::update_queue))
        .route("/{id}", delete(handlers::remove_from_queue))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

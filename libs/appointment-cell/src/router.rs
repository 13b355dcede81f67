use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, require_admin};

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Admin listings sit behind an extra role check
    let admin_routes = Router::new()
        .route("/all", get(handlers::admin_all_appointments))
        .route("/doctor/{id}", get(handlers::admin_appointments_by_doctor))
        .route("/patient/{id}", get(handlers::admin_appointments_by_patient))
        .layer(middleware::from_fn(require_admin));

    Router::new()
        .route("/create", post(handlers::create_appointment))
        .route("/get", get(handlers::get_appointments))
        .route("/update/{id}", put(handlers::update_appointment))
        .route("/cancel/{id}", delete(handlers::cancel_appointment))
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

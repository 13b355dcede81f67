use std::sync::Arc;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{CheckInRequest, QueueError, QueueListQuery, UpdateQueueRequest};
use crate::services::QueueSequencerService;

fn map_queue_error(e: QueueError) -> AppError {
    match e {
        QueueError::NotFound => AppError::NotFound("Queue entry not found".to_string()),
        QueueError::InvalidTransition { .. } | QueueError::PriorityLocked => {
            AppError::ValidationError(e.to_string())
        }
        QueueError::ValidationError(msg) => AppError::ValidationError(msg),
        QueueError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn add_to_queue(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Value>, AppError> {
    let service = QueueSequencerService::new(&config);

    let entry = service.check_in(request, auth.token())
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn get_queue(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<QueueListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = QueueSequencerService::new(&config);

    let entries = service.get_queue(query.status, auth.token())
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!(entries)))
}

#[axum::debug_handler]
pub async fn update_queue(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateQueueRequest>,
) -> Result<Json<Value>, AppError> {
    let service = QueueSequencerService::new(&config);

    let entry = service.update_entry(id, request, auth.token())
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!(entry)))
}

#[axum::debug_handler]
pub async fn remove_from_queue(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = QueueSequencerService::new(&config);

    service.remove(id, auth.token())
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({ "removed": id })))
}

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;

use crate::models::{AuthError, AuthResponse, LoginRequest, RegisterRequest};
use crate::services::account::AccountService;

fn map_auth_error(err: AuthError) -> AppError {
    match err {
        AuthError::StaffNotFound => AppError::NotFound(err.to_string()),
        AuthError::AlreadyRegistered => AppError::Conflict(err.to_string()),
        AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
        AuthError::InvalidToken(_) => AppError::Auth(err.to_string()),
        AuthError::Hashing(_) => AppError::Internal(err.to_string()),
        AuthError::DatabaseError(_) => AppError::Database(err.to_string()),
    }
}

// Helper function to extract token
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    Ok(auth_value[7..].to_string())
}

pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let service = AccountService::new(&config);

    let response = service.login(request).await.map_err(map_auth_error)?;
    Ok(Json(response))
}

pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let service = AccountService::new(&config);

    let response = service.register(request, false).await.map_err(map_auth_error)?;
    Ok(Json(response))
}

pub async fn register_admin(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let service = AccountService::new(&config);

    let response = service.register(request, true).await.map_err(map_auth_error)?;
    Ok(Json(response))
}

pub async fn verify(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let service = AccountService::new(&config);

    let response = service.verify(&token).await.map_err(map_auth_error)?;
    Ok(Json(response))
}

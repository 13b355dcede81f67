use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, TokenResponse};
use shared_utils::jwt::{sign_token, validate_token};

use crate::models::{
    AuthError, AuthResponse, Credential, LoginRequest, RegisterRequest,
    StaffRosterEntry, UserProfile,
};
use crate::services::password::{hash_password, verify_password};

/// Registration, login and token verification for front-desk staff.
/// Registration is gated by the pre-seeded staff roster.
pub struct AccountService {
    supabase: SupabaseClient,
    jwt_secret: String,
    token_ttl_hours: i64,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            jwt_secret: config.jwt_secret.clone(),
            token_ttl_hours: config.token_ttl_hours,
        }
    }

    pub async fn register(
        &self,
        request: RegisterRequest,
        force_admin: bool,
    ) -> Result<AuthResponse, AuthError> {
        info!("Registration attempt for staff ID: {}", request.staff_id);

        let staff = self.validate_staff(&request.staff_id).await?;

        // A credential row means a previous registration got as far as
        // creating the login, even if the roster flag was never flipped.
        if self.find_credential(&request.staff_id).await?.is_some() {
            warn!("Staff ID {} already has dashboard access", request.staff_id);
            return Err(AuthError::AlreadyRegistered);
        }

        let password_hash = hash_password(&request.password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        // PostgREST answers writes with an empty body unless asked for the
        // representation, so every write here requests it.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let credential_data = json!({
            "username": request.staff_id.clone(),
            "password": password_hash
        });
        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/credentials",
            None,
            Some(credential_data),
            Some(headers.clone()),
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let role = if force_admin {
            Role::Admin
        } else {
            request.role.unwrap_or(Role::Staff)
        };

        let profile_data = json!({
            "name": staff.name,
            "email": staff.email,
            "staff_id": request.staff_id.clone(),
            "role": role,
            "created_at": Utc::now().to_rfc3339()
        });
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/user_profiles",
            None,
            Some(profile_data),
            Some(headers.clone()),
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let profile: UserProfile = result.into_iter().next()
            .ok_or_else(|| AuthError::DatabaseError("Failed to create user profile".to_string()))
            .and_then(|value| serde_json::from_value(value)
                .map_err(|e| AuthError::DatabaseError(format!("Failed to parse profile: {}", e))))?;

        let roster_path = format!(
            "/rest/v1/staff_roster?staff_id=eq.{}",
            urlencoding::encode(&request.staff_id)
        );
        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &roster_path,
            None,
            Some(json!({ "is_registered": true })),
            Some(headers),
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let user = profile.to_user();
        let access_token = sign_token(&user, &self.jwt_secret, self.token_ttl_hours)
            .map_err(AuthError::Hashing)?;

        info!("Successfully registered staff ID {} as {}", request.staff_id, role);
        Ok(AuthResponse { access_token, user })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        info!("Login attempt for staff ID: {}", request.staff_id);

        let credential = match self.find_credential(&request.staff_id).await? {
            Some(credential) => credential,
            None => {
                warn!("Failed login attempt for unknown staff ID: {}", request.staff_id);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let valid = verify_password(&request.password, &credential.password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;
        if !valid {
            warn!("Failed login attempt for staff ID: {}", request.staff_id);
            return Err(AuthError::InvalidCredentials);
        }

        let profile = self.find_profile_by_staff_id(&request.staff_id).await?
            .ok_or(AuthError::InvalidCredentials)?;

        let user = profile.to_user();
        let access_token = sign_token(&user, &self.jwt_secret, self.token_ttl_hours)
            .map_err(AuthError::Hashing)?;

        info!("Successful login for staff ID: {}", request.staff_id);
        Ok(AuthResponse { access_token, user })
    }

    /// Validate a bearer token and confirm its subject still has a profile.
    pub async fn verify(&self, token: &str) -> Result<TokenResponse, AuthError> {
        debug!("Verifying token");

        let user = validate_token(token, &self.jwt_secret)
            .map_err(AuthError::InvalidToken)?;

        let path = format!("/rest/v1/user_profiles?id=eq.{}", user.id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AuthError::InvalidToken("Unknown user".to_string()));
        }

        Ok(TokenResponse { valid: true, user })
    }

    /// Roster gate: the staff id must be pre-seeded and not yet registered.
    async fn validate_staff(&self, staff_id: &str) -> Result<StaffRosterEntry, AuthError> {
        debug!("Validating staff ID against roster: {}", staff_id);

        let path = format!(
            "/rest/v1/staff_roster?staff_id=eq.{}",
            urlencoding::encode(staff_id)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let staff: StaffRosterEntry = match result.into_iter().next() {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| AuthError::DatabaseError(format!("Failed to parse roster entry: {}", e)))?,
            None => {
                warn!("Staff ID {} not found in roster", staff_id);
                return Err(AuthError::StaffNotFound);
            }
        };

        if staff.is_registered {
            warn!("Staff ID {} is already registered", staff_id);
            return Err(AuthError::AlreadyRegistered);
        }

        Ok(staff)
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, AuthError> {
        let path = format!(
            "/rest/v1/credentials?username=eq.{}&limit=1",
            urlencoding::encode(username)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AuthError::DatabaseError(format!("Failed to parse credential: {}", e))),
            None => Ok(None),
        }
    }

    async fn find_profile_by_staff_id(
        &self,
        staff_id: &str,
    ) -> Result<Option<UserProfile>, AuthError> {
        let path = format!(
            "/rest/v1/user_profiles?staff_id=eq.{}&limit=1",
            urlencoding::encode(staff_id)
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await.map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        match result.into_iter().next() {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| AuthError::DatabaseError(format!("Failed to parse profile: {}", e))),
            None => Ok(None),
        }
    }
}

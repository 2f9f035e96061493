use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{RequireAccount, TokenGenerator, hash_password, verify_password};
use crate::server::AppState;
use crate::server::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::server::response::ApiError;
use crate::types::{Account, Plan, Role, Token};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 30;
const MIN_PASSWORD_LEN: usize = 6;

/// Shared by self-registration and admin-created accounts.
pub(super) fn validate_credentials(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), ApiError> {
    let username = username.trim();
    if username.len() < MIN_USERNAME_LEN || username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username must be {MIN_USERNAME_LEN}-{MAX_USERNAME_LEN} characters"
        )));
    }
    if username.contains(char::is_whitespace) {
        return Err(ApiError::bad_request("Username cannot contain whitespace"));
    }
    if !email.contains('@') || email.trim().is_empty() {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub(super) fn issue_token(state: &AppState, account_id: &str) -> Result<String, ApiError> {
    let generator = TokenGenerator::new();
    let (raw_token, lookup, hash) = generator.generate()?;

    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        account_id: account_id.to_string(),
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    state.store.create_token(&token)?;

    Ok(raw_token)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req.username, &req.email, &req.password)?;

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4().to_string(),
        username: req.username.trim().to_string(),
        email: req.email.trim().to_ascii_lowercase(),
        password_hash: hash_password(&req.password)?,
        role: Role::User,
        plan: Plan::Free,
        created_at: now,
        updated_at: now,
    };

    state.store.create_account(&account)?;
    let token = issue_token(&state, &account.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse { token, account }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .store
        .get_account_by_email(&req.email.trim().to_ascii_lowercase())?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&req.password, &account.password_hash)? {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(&state, &account.id)?;
    Ok(Json(AuthResponse { token, account }))
}

pub async fn me(auth: RequireAccount) -> impl IntoResponse {
    Json(serde_json::json!({ "account": auth.account }))
}

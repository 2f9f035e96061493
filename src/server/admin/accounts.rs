use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{RequireAdmin, hash_password};
use crate::server::AppState;
use crate::server::accounts::validate_credentials;
use crate::server::dto::{CreateAccountRequest, PaginationParams, UpdateAccountRequest};
use crate::server::response::{ApiError, DEFAULT_PAGE_SIZE, paginate};
use crate::types::{Account, Plan, Role};

pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = params.cursor.unwrap_or_default();
    // Fetch one past the page to learn whether more exist.
    let accounts = state
        .store
        .list_accounts(&cursor, DEFAULT_PAGE_SIZE + 1)?;
    let (accounts, next_cursor, has_more) =
        paginate(accounts, DEFAULT_PAGE_SIZE as usize, |a| a.id.clone());

    Ok(Json(json!({
        "accounts": accounts,
        "next_cursor": next_cursor,
        "has_more": has_more,
    })))
}

/// Creates an account on a caller-chosen role and plan, for operators
/// provisioning users outside self-registration.
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_credentials(&req.username, &req.email, &req.password)?;

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4().to_string(),
        username: req.username.trim().to_string(),
        email: req.email.trim().to_ascii_lowercase(),
        password_hash: hash_password(&req.password)?,
        role: req.role.unwrap_or(Role::User),
        plan: req.plan.unwrap_or(Plan::Free),
        created_at: now,
        updated_at: now,
    };
    state.store.create_account(&account)?;

    Ok((StatusCode::CREATED, Json(json!({ "account": account }))))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .store
        .get_account(&id)?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;
    let sites = state.store.list_account_sites(&id)?;

    Ok(Json(json!({ "account": account, "sites": sites })))
}

pub async fn update_account(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(id): Path<String>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut account = state
        .store
        .get_account(&id)?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;

    // An admin cannot strip their own role; someone must stay in charge.
    if let Some(role) = req.role {
        if account.id == admin.account.id && role != account.role {
            return Err(ApiError::bad_request("Cannot change your own role"));
        }
        account.role = role;
    }
    if let Some(plan) = req.plan {
        account.plan = plan;
    }
    account.updated_at = Utc::now();

    state.store.update_account(&account)?;
    Ok(Json(json!({ "account": account })))
}

/// Deletes an account and everything it owns: each site's files and
/// record go first, then the account row (tokens cascade in the schema).
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if id == admin.account.id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    let account = state
        .store
        .get_account(&id)?
        .ok_or_else(|| ApiError::not_found("Account not found"))?;

    let removed_sites = state.sites.cascade_delete_for_account(&account.id).await?;
    state.store.delete_account(&account.id)?;

    tracing::info!(
        account_id = account.id,
        username = account.username,
        removed_sites,
        "account deleted by admin"
    );

    Ok(Json(json!({
        "message": "Account deleted",
        "removed_sites": removed_sites,
    })))
}

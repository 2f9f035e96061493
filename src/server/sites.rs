use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::RequireAccount;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateSiteRequest, SiteListResponse, UpdateSiteRequest};
use crate::server::response::ApiError;
use crate::sites::name;
use crate::types::{Account, Site};

/// Fetches a site and checks the caller owns it. Admins can reach any
/// site; everyone else gets the same 404 whether the site is missing or
/// someone else's.
pub(super) fn load_owned_site(
    state: &AppState,
    account: &Account,
    site_id: &str,
) -> Result<Site, ApiError> {
    let site = state
        .store
        .get_site(site_id)?
        .ok_or_else(|| ApiError::not_found("Site not found"))?;

    if site.account_id != account.id && !account.is_admin() {
        return Err(ApiError::not_found("Site not found"));
    }
    Ok(site)
}

pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
) -> Result<impl IntoResponse, ApiError> {
    let sites = state.store.list_account_sites(&auth.account.id)?;
    Ok(Json(SiteListResponse { sites }))
}

pub async fn create_site(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Json(req): Json<CreateSiteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = state
        .sites
        .create_site(&auth.account, &req.name, &req.subdomain)
        .await
        .map_err(|e| match e {
            Error::Conflict(_) => ApiError::bad_request("Subdomain already taken"),
            e => e.into(),
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "site": site }))))
}

pub async fn get_site(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;
    Ok(Json(json!({ "site": site })))
}

pub async fn update_site(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(id): Path<String>,
    Json(req): Json<UpdateSiteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut site = load_owned_site(&state, &auth.account, &id)?;

    if let Some(new_name) = req.name {
        site.name = name::validate_site_name(&new_name)?;
    }
    if let Some(patch) = req.settings {
        if let Some(v) = patch.password_protection {
            site.settings.password_protection = v;
        }
        if let Some(v) = patch.analytics {
            site.settings.analytics = v;
        }
        if let Some(v) = patch.indexing {
            site.settings.indexing = v;
        }
    }
    site.updated_at = Utc::now();

    state.store.update_site(&site)?;
    Ok(Json(json!({ "site": site })))
}

pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;
    state.sites.delete_site(&site).await?;
    Ok(Json(json!({ "message": "Site deleted" })))
}

pub async fn list_site_files(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;
    let root = state.sites.root_for(&site);

    // A site whose root was never materialized simply has no files yet.
    let files = match state.storage.list(&root, "").await {
        Ok(files) => files,
        Err(Error::NotFound) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    Ok(Json(json!({ "files": files })))
}

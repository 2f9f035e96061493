use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::response::ApiError;

const RECENT_LIMIT: i32 = 5;

/// Platform-wide rollups for the admin dashboard. Read-only; every
/// number is computed fresh from the store.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.store.count_accounts()?;
    let sites = state.store.count_sites()?;
    let storage_bytes = state.store.total_storage_bytes()?;
    let plans = state.store.count_accounts_by_plan()?;
    let recent_accounts = state.store.recent_accounts(RECENT_LIMIT)?;
    let recent_sites = state.store.recent_sites(RECENT_LIMIT)?;

    Ok(Json(json!({
        "stats": {
            "accounts": accounts,
            "sites": sites,
            "storage_bytes": storage_bytes,
            "plans": plans,
        },
        "recent_accounts": recent_accounts,
        "recent_sites": recent_sites,
    })))
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::PaginationParams;
use crate::server::response::{ApiError, DEFAULT_PAGE_SIZE, paginate};

/// Every site on the platform with its owner, regardless of account.
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let cursor = params.cursor.unwrap_or_default();
    // Fetch one past the page to learn whether more exist.
    let sites = state.store.list_sites(&cursor, DEFAULT_PAGE_SIZE + 1)?;
    let (sites, next_cursor, has_more) =
        paginate(sites, DEFAULT_PAGE_SIZE as usize, |s| s.site.id.clone());

    Ok(Json(json!({
        "sites": sites,
        "next_cursor": next_cursor,
        "has_more": has_more,
    })))
}

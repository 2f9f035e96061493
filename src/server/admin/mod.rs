mod accounts;
mod dashboard;
mod sites;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/sites", get(sites::list_sites))
        .route("/accounts", get(accounts::list_accounts))
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/{id}", get(accounts::get_account))
        .route("/accounts/{id}", put(accounts::update_account))
        .route("/accounts/{id}", delete(accounts::delete_account))
}

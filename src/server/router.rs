use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::hosting;
use super::{accounts, admin::admin_router, domains, files, sites};
use crate::sites::SiteService;
use crate::storage::SiteStorage;
use crate::store::Store;

/// Uploads and file writes are JSON/multipart bounded by this, matching
/// the largest per-file plan limit.
const MAX_BODY_BYTES: usize = 110 * 1024 * 1024;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub storage: Arc<SiteStorage>,
    pub sites: SiteService,
    pub data_dir: PathBuf,
    /// Domains the platform answers on; everything else is resolved as a
    /// hosted-site host.
    pub base_domains: Vec<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, data_dir: PathBuf, base_domains: Vec<String>) -> Self {
        let storage = Arc::new(SiteStorage::new(&data_dir));
        let primary = base_domains
            .first()
            .cloned()
            .unwrap_or_else(|| "localhost".to_string());
        let sites = SiteService::new(store.clone(), storage.clone(), primary);

        Self {
            store,
            storage,
            sites,
            data_dir,
            base_domains,
        }
    }

    #[must_use]
    pub fn primary_domain(&self) -> &str {
        self.base_domains
            .first()
            .map(String::as_str)
            .unwrap_or("localhost")
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn sites_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(sites::list_sites))
        .route("/", post(sites::create_site))
        .route("/{id}", get(sites::get_site))
        .route("/{id}", put(sites::update_site))
        .route("/{id}", delete(sites::delete_site))
        .route("/{id}/files", get(sites::list_site_files))
        .route("/{id}/files", post(files::write_file))
        .route("/{id}/files/{*path}", get(files::read_file))
        .route("/{id}/files/{*path}", put(files::rename_file))
        .route("/{id}/files/{*path}", delete(files::delete_file))
        .route("/{id}/upload", post(files::upload_files))
}

fn domains_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/supported", get(domains::supported_domains))
        .route("/check/{domain}/{subdomain}", get(domains::check_subdomain))
        .route("/dns/{domain}/{subdomain}", get(domains::dns_config))
        .route("/custom/{site_id}", post(domains::add_custom_domain))
        .route(
            "/custom/{site_id}/{domain}",
            delete(domains::remove_custom_domain),
        )
        .route(
            "/verify/{site_id}/{domain}",
            post(domains::verify_custom_domain),
        )
}

fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(accounts::register))
        .route("/login", post(accounts::login))
        .route("/me", get(accounts::me))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/auth", auth_router())
        .nest("/api/v1/sites", sites_router())
        .nest("/api/v1/domains", domains_router())
        .nest("/api/v1/admin", admin_router())
        .fallback(hosting::resolve_host)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::RequireAccount;
use crate::server::AppState;
use crate::server::dto::{AddDomainRequest, AvailabilityResponse};
use crate::server::response::ApiError;
use crate::server::sites::load_owned_site;
use crate::sites::name;
use crate::types::{CustomDomain, DnsRecords};

fn supported_base<'a>(state: &'a AppState, domain: &str) -> Result<&'a str, ApiError> {
    state
        .base_domains
        .iter()
        .map(String::as_str)
        .find(|base| base.eq_ignore_ascii_case(domain))
        .ok_or_else(|| ApiError::bad_request("Domain not supported"))
}

/// DNS instructions for pointing a custom domain at the platform. The
/// CNAME targets the platform's primary domain; the TXT record carries
/// the per-domain verification token.
fn dns_records_for(state: &AppState, verify_token: &str) -> DnsRecords {
    DnsRecords {
        a: Vec::new(),
        cname: vec![state.primary_domain().to_string()],
        txt: vec![format!("perch-verify={verify_token}")],
    }
}

pub async fn supported_domains(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(json!({ "domains": state.base_domains })))
}

pub async fn check_subdomain(
    State(state): State<Arc<AppState>>,
    Path((domain, subdomain)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let base = supported_base(&state, &domain)?.to_string();
    let subdomain = name::normalize_subdomain(&subdomain)?;

    // Any record holds the name, active or not.
    let available = state.store.get_site_by_subdomain(&subdomain)?.is_none();

    let full_domain = format!("{subdomain}.{base}");
    Ok(Json(AvailabilityResponse {
        available,
        subdomain,
        domain: base,
        full_domain,
    }))
}

pub async fn dns_config(
    State(state): State<Arc<AppState>>,
    Path((domain, subdomain)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let base = supported_base(&state, &domain)?.to_string();
    let subdomain = name::normalize_subdomain(&subdomain)?;

    Ok(Json(json!({
        "domain": base,
        "subdomain": subdomain,
        "fullDomain": format!("{subdomain}.{base}"),
        "records": {
            "cname": { "name": subdomain, "value": state.primary_domain() },
        },
    })))
}

pub async fn add_custom_domain(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(site_id): Path<String>,
    Json(req): Json<AddDomainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &site_id)?;
    let domain = name::normalize_domain(&req.domain)?;

    // Platform domains and anything under them are never claimable.
    let under_base = state
        .base_domains
        .iter()
        .any(|base| domain == *base || domain.ends_with(&format!(".{base}")));
    if under_base {
        return Err(ApiError::bad_request("Domain not allowed"));
    }

    let verify_token = Uuid::new_v4().to_string();
    let custom = CustomDomain {
        site_id: site.id.clone(),
        domain,
        verified: false,
        ssl_enabled: false,
        dns_records: dns_records_for(&state, &verify_token),
        created_at: Utc::now(),
    };
    state.store.add_custom_domain(&custom)?;

    Ok((StatusCode::CREATED, Json(json!({ "domain": custom }))))
}

pub async fn remove_custom_domain(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path((site_id, domain)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &site_id)?;
    let domain = name::normalize_domain(&domain)?;

    if !state.store.remove_custom_domain(&site.id, &domain)? {
        return Err(ApiError::not_found("Domain not found"));
    }
    Ok(Json(json!({ "message": "Domain removed" })))
}

pub async fn verify_custom_domain(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path((site_id, domain)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &site_id)?;
    let domain = name::normalize_domain(&domain)?;

    // TODO: query the TXT record before flipping the flag once an async
    // resolver is wired in. Until then verification is operator-trusted.
    if !state.store.mark_domain_verified(&site.id, &domain)? {
        return Err(ApiError::not_found("Domain not found"));
    }

    let verified = state
        .store
        .get_custom_domain(&domain)?
        .ok_or_else(|| ApiError::not_found("Domain not found"))?;
    Ok(Json(json!({ "domain": verified })))
}

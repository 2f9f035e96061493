//! Host-header routing for hosted sites. Every request the API router
//! does not match lands here; the Host header decides whether it is the
//! platform itself, a subdomain of a base domain, or a custom domain.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
};
use serde_json::json;

use crate::error::Error;
use crate::server::AppState;

/// Where a request's Host header routes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The platform's own pages (base domain, loopback, or no host).
    Platform,
    /// A subdomain under one of the base domains.
    Subdomain { subdomain: String, host: String },
    /// A host outside every base domain, resolvable only as a verified
    /// custom domain.
    CustomHost { host: String },
}

/// Classifies a Host header value. Pure so the matrix is testable
/// without a server.
pub fn decide(host: &str, base_domains: &[String]) -> RouteDecision {
    let host = strip_port(host).to_ascii_lowercase();
    if host.is_empty() || is_loopback(&host) {
        return RouteDecision::Platform;
    }

    for base in base_domains {
        let base = base.to_ascii_lowercase();
        if host == base {
            return RouteDecision::Platform;
        }
        if let Some(prefix) = host.strip_suffix(&format!(".{base}")) {
            // Multi-label prefixes (a.b.base) are not site subdomains.
            if !prefix.is_empty() && !prefix.contains('.') {
                return RouteDecision::Subdomain {
                    subdomain: prefix.to_string(),
                    host: host.clone(),
                };
            }
        }
    }

    RouteDecision::CustomHost { host }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 hosts keep their brackets.
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &host[..end + 2];
        }
        return host;
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn is_loopback(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1"
}

/// Fallback handler: everything the API router did not match.
pub async fn resolve_host(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    // An unmatched API path is a missing endpoint, not a site request.
    if uri.path().starts_with("/api/") {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "error": "Not found" })),
        )
            .into_response();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (subdomain, lookup_host) = match decide(host, &state.base_domains) {
        RouteDecision::Platform => return landing_page(),
        RouteDecision::Subdomain { subdomain, host } => (subdomain, host),
        RouteDecision::CustomHost { host } => (String::new(), host),
    };

    let site = match state
        .store
        .get_active_site_for_host(&subdomain, &lookup_host)
    {
        Ok(Some(site)) => site,
        Ok(None) => return landing_page(),
        Err(e) => {
            tracing::error!("host lookup failed for {lookup_host}: {e}");
            return landing_page();
        }
    };

    let relative = requested_file(uri.path());
    let root = state.storage.root_for(&site.account_id, &site.id);

    match state.storage.read_bytes(&root, &relative).await {
        Ok(bytes) => {
            if let Err(e) = state.store.record_site_visit(&site.id, bytes.len() as i64) {
                tracing::warn!(site_id = site.id, "failed to record visit: {e}");
            }
            (
                [(header::CONTENT_TYPE, content_type_for(&relative))],
                bytes,
            )
                .into_response()
        }
        // A site without an index yet still answers on its domain.
        Err(Error::NotFound | Error::Traversal) if relative == "index.html" => landing_page(),
        Err(Error::NotFound | Error::Traversal) => (
            StatusCode::NOT_FOUND,
            Html("<h1>404</h1><p>Page not found</p>"),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(site_id = site.id, "failed to serve {relative}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Maps a request path to a relative file under the site root. Directory
/// requests get their `index.html`.
fn requested_file(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        "index.html".to_string()
    } else if trimmed.ends_with('/') {
        format!("{trimmed}index.html")
    } else {
        trimmed.to_string()
    }
}

fn content_type_for(relative: &str) -> &'static str {
    let ext = relative
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" | "md" | "csv" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn landing_page() -> Response {
    Html(LANDING_PAGE).into_response()
}

/// Served for the platform's own domain and for hosts no site claims.
const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Perch</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 40px;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
        }
        .container {
            text-align: center;
            color: white;
        }
        h1 {
            font-size: 3em;
            margin-bottom: 20px;
        }
        p {
            font-size: 1.2em;
            opacity: 0.9;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Perch</h1>
        <p>Publish a static site on your own subdomain in seconds.</p>
    </div>
</body>
</html>"#;

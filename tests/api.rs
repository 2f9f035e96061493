//! End-to-end API tests driving the router directly, one request at a
//! time, with an in-memory database and a temp directory for site files.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use perch::server::{AppState, create_router};
use perch::store::{SqliteStore, Store};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BASE_DOMAIN: &str = "perch.test";

struct TestApp {
    router: Router,
    store: Arc<SqliteStore>,
    _tmp: TempDir,
}

fn app() -> TestApp {
    let tmp = TempDir::new().expect("temp dir");
    let store = Arc::new(SqliteStore::open_in_memory().expect("open store"));
    store.initialize().expect("initialize store");

    let state = Arc::new(AppState::new(
        store.clone(),
        tmp.path().to_path_buf(),
        vec![BASE_DOMAIN.to_string()],
    ));

    TestApp {
        router: create_router(state),
        store,
        _tmp: tmp,
    }
}

async fn send(
    app: &TestApp,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.router.clone().oneshot(request).await.expect("send");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, body)
}

/// Sends a request with a Host header and returns status + raw body text.
async fn send_host(app: &TestApp, path: &str, host: &str) -> (StatusCode, String, String) {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .header(header::HOST, host)
        .body(Body::empty())
        .expect("build request");

    let response = app.router.clone().oneshot(request).await.expect("send");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
}

async fn register(app: &TestApp, username: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

async fn promote_to_admin(app: &TestApp, username: &str) {
    let mut account = app
        .store
        .get_account_by_username(username)
        .unwrap()
        .unwrap();
    account.role = perch::types::Role::Admin;
    app.store.update_account(&account).unwrap();
}

async fn site_storage_bytes(app: &TestApp, token: &str, site_id: &str) -> i64 {
    let (_, body) = send(
        app,
        "GET",
        &format!("/api/v1/sites/{site_id}"),
        Some(token),
        None,
    )
    .await;
    body["site"]["stats"]["storage_bytes"].as_i64().unwrap()
}

async fn create_site(app: &TestApp, token: &str, name: &str, subdomain: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/sites",
        Some(token),
        Some(json!({ "name": name, "subdomain": subdomain })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create site failed: {body}");
    body["site"].clone()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_register_login_me() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["username"], "alice");
    assert_eq!(body["account"]["plan"], "free");
    assert!(body["account"]["password_hash"].is_null());

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "username": "bob", "email": "bob@example.com", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = app();
    let (status, _) = send(&app, "GET", "/api/v1/sites", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_site_with_default_index() {
    let app = app();
    let token = register(&app, "alice").await;

    let site = create_site(&app, &token, "My Blog", "MyBlog").await;
    assert_eq!(site["subdomain"], "myblog");
    assert_eq!(site["active"], true);

    let site_id = site["id"].as_str().unwrap();
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}/files"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["index.html"]);
}

#[tokio::test]
async fn test_duplicate_subdomain_is_rejected() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    create_site(&app, &alice, "Mine", "shared").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/sites",
        Some(&bob),
        Some(json!({ "name": "Theirs", "subdomain": "Shared" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Subdomain already taken");
}

#[tokio::test]
async fn test_free_plan_site_limit() {
    let app = app();
    let token = register(&app, "alice").await;
    create_site(&app, &token, "First", "first-site").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/sites",
        Some(&token),
        Some(json!({ "name": "Second", "subdomain": "second-site" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Plan limit exceeded");
}

#[tokio::test]
async fn test_file_write_read_round_trip() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/sites/{site_id}/files"),
        Some(&token),
        Some(json!({ "filename": "about.html", "content": "<h1>About</h1>" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "about.html");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}/files/about.html"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "<h1>About</h1>");

    // Storage accounting reflects the write.
    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}"),
        Some(&token),
        None,
    )
    .await;
    assert!(body["site"]["stats"]["storage_bytes"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_write_without_filename_is_rejected() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/sites/{site_id}/files"),
        Some(&token),
        Some(json!({ "content": "orphan" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_traversal_paths_are_not_found() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    // Writing through a traversal filename is refused without detail.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/sites/{site_id}/files"),
        Some(&token),
        Some(json!({ "filename": "../escape.html", "content": "pwned" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");

    // Reading through one is equally opaque.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}/files/..%2Fescape.html"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");
}

#[tokio::test]
async fn test_delete_file_is_idempotent() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/sites/{site_id}/files/index.html"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Second delete still succeeds.
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/sites/{site_id}/files/index.html"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rename_over_existing_file_releases_storage() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    for (name, size) in [("a.txt", 50), ("b.txt", 100)] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/sites/{site_id}/files"),
            Some(&token),
            Some(json!({ "filename": name, "content": "x".repeat(size) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let before = site_storage_bytes(&app, &token, site_id).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/sites/{site_id}/files/a.txt"),
        Some(&token),
        Some(json!({ "new_filename": "b.txt" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The replaced destination's 100 bytes are released; only a.txt's 50
    // remain on disk as b.txt, and the counter agrees.
    let after = site_storage_bytes(&app, &token, site_id).await;
    assert_eq!(after, before - 100);
}

#[tokio::test]
async fn test_other_accounts_sites_are_invisible() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let site = create_site(&app, &alice, "Private", "private-site").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_host_resolution_serves_site() {
    let app = app();
    let token = register(&app, "alice").await;
    create_site(&app, &token, "My Blog", "blog").await;

    let (status, content_type, body) =
        send_host(&app, "/", &format!("blog.{BASE_DOMAIN}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/html"));
    assert!(body.contains("Welcome to My Blog"));
}

#[tokio::test]
async fn test_unknown_host_gets_landing_page() {
    let app = app();
    let (status, _, body) = send_host(&app, "/", &format!("ghost.{BASE_DOMAIN}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Perch"));
}

#[tokio::test]
async fn test_platform_domain_gets_landing_page() {
    let app = app();
    let (status, _, body) = send_host(&app, "/", BASE_DOMAIN).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Perch"));
}

#[tokio::test]
async fn test_inactive_site_does_not_resolve() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Paused", "paused").await;

    let mut record = app
        .store
        .get_site(site["id"].as_str().unwrap())
        .unwrap()
        .unwrap();
    record.active = false;
    app.store.update_site(&record).unwrap();

    let (status, _, body) = send_host(&app, "/", &format!("paused.{BASE_DOMAIN}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("Welcome to Paused"));
}

#[tokio::test]
async fn test_unmatched_api_path_is_json_404() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/v1/nonsense", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_availability_check() {
    let app = app();
    let token = register(&app, "alice").await;
    create_site(&app, &token, "Blog", "taken-name").await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/domains/check/{BASE_DOMAIN}/taken-name"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/domains/check/{BASE_DOMAIN}/fresh-name"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
    assert_eq!(body["fullDomain"], format!("fresh-name.{BASE_DOMAIN}"));

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/domains/check/unknown.example/fresh-name",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_dashboard_requires_role() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, _) = send(&app, "GET", "/api/v1/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promote the account; the existing token picks up the role.
    promote_to_admin(&app, "alice").await;

    let (status, body) = send(&app, "GET", "/api/v1/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["accounts"], 1);
}

#[tokio::test]
async fn test_admin_lists_all_sites_with_owners() {
    let app = app();
    let admin_token = register(&app, "boss").await;
    promote_to_admin(&app, "boss").await;

    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    create_site(&app, &alice, "Alice's", "alice-site").await;
    create_site(&app, &bob, "Bob's", "bob-site").await;

    // The listing spans accounts, which no regular caller can do.
    let (status, _) = send(&app, "GET", "/api/v1/admin/sites", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/v1/admin/sites", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let sites = body["sites"].as_array().unwrap();
    assert_eq!(sites.len(), 2);
    let mut pairs: Vec<(String, String)> = sites
        .iter()
        .map(|s| {
            (
                s["subdomain"].as_str().unwrap().to_string(),
                s["owner"]["username"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("alice-site".to_string(), "alice".to_string()),
            ("bob-site".to_string(), "bob".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_admin_creates_account() {
    let app = app();
    let admin_token = register(&app, "boss").await;
    promote_to_admin(&app, "boss").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/admin/accounts",
        Some(&admin_token),
        Some(json!({
            "username": "carol",
            "email": "carol@example.com",
            "password": "hunter22",
            "plan": "pro",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    assert_eq!(body["account"]["plan"], "pro");
    assert_eq!(body["account"]["role"], "user");

    // The provisioned account can log in with the chosen password.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "carol@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let carol = body["token"].as_str().unwrap().to_string();

    // Non-admins cannot provision accounts.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/admin/accounts",
        Some(&carol),
        Some(json!({
            "username": "mallory",
            "email": "mallory@example.com",
            "password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Duplicate usernames are still rejected.
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/admin/accounts",
        Some(&admin_token),
        Some(json!({
            "username": "carol",
            "email": "carol2@example.com",
            "password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_delete_account_cascades() {
    let app = app();
    let admin_token = register(&app, "admin-user").await;
    promote_to_admin(&app, "admin-user").await;

    let victim_token = register(&app, "victim").await;
    create_site(&app, &victim_token, "Doomed", "doomed").await;
    let victim = app.store.get_account_by_username("victim").unwrap().unwrap();

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/v1/admin/accounts/{}", victim.id),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "delete failed: {body}");
    assert_eq!(body["removed_sites"], 1);

    // The subdomain is free again.
    assert!(app.store.get_site_by_subdomain("doomed").unwrap().is_none());
    assert!(
        app.store
            .get_account_by_username("victim")
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_multipart_upload() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    let boundary = "perch-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"a.html\"\r\n\
         Content-Type: text/html\r\n\r\n\
         <h1>A</h1>\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"b.css\"\r\n\
         Content-Type: text/css\r\n\r\n\
         body {{}}\r\n\
         --{boundary}--\r\n"
    );

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/sites/{site_id}/upload"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("build request");

    let response = app.router.clone().oneshot(request).await.expect("send");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f["status"] == "uploaded"));

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}/files/a.html"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "<h1>A</h1>");
}

#[tokio::test]
async fn test_upload_batch_over_file_count_is_rejected() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    let boundary = "perch-test-boundary";
    // Free plan allows 5 files per upload; send 6.
    let mut body = String::new();
    for i in 0..6 {
        body.push_str(&format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"files\"; filename=\"f{i}.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {i}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/sites/{site_id}/upload"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("build request");

    let response = app.router.clone().oneshot(request).await.expect("send");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing from the batch landed.
    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/v1/sites/{site_id}/files"),
        Some(&token),
        None,
    )
    .await;
    let names: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["index.html"]);
}

#[tokio::test]
async fn test_update_site_settings() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Blog", "blog").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/sites/{site_id}"),
        Some(&token),
        Some(json!({ "name": "Renamed", "settings": { "analytics": false } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["site"]["name"], "Renamed");
    assert_eq!(body["site"]["settings"]["analytics"], false);
    // Untouched settings keep their values.
    assert_eq!(body["site"]["settings"]["indexing"], true);
    // Subdomain never changes through update.
    assert_eq!(body["site"]["subdomain"], "blog");
}

#[tokio::test]
async fn test_custom_domain_lifecycle() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Brand", "brand").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/domains/custom/{site_id}"),
        Some(&token),
        Some(json!({ "domain": "www.acme.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "add domain failed: {body}");
    assert_eq!(body["domain"]["verified"], false);

    // Unverified domains do not serve the site.
    let (_, _, page) = send_host(&app, "/", "www.acme.example").await;
    assert!(!page.contains("Welcome to Brand"));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/domains/verify/{site_id}/www.acme.example"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, page) = send_host(&app, "/", "www.acme.example").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Welcome to Brand"));

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/domains/custom/{site_id}/www.acme.example"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_base_domain_cannot_be_custom_domain() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Brand", "brand").await;
    let site_id = site["id"].as_str().unwrap();

    for domain in [BASE_DOMAIN.to_string(), format!("steal.{BASE_DOMAIN}")] {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/domains/custom/{site_id}"),
            Some(&token),
            Some(json!({ "domain": domain })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_delete_site_frees_subdomain() {
    let app = app();
    let token = register(&app, "alice").await;
    let site = create_site(&app, &token, "Temp", "temp-site").await;
    let site_id = site["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/sites/{site_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Same account can claim the name again (free plan slot is back too).
    create_site(&app, &token, "Temp Again", "temp-site").await;
}

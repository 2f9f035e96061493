//! # Perch
//!
//! A static-site hosting server, usable both as a standalone binary and as a library.
//!
//! Tenants register accounts, create sites bound to unique subdomains, and manage
//! the files under each site's isolated storage root. Incoming requests are routed
//! by Host header: a known subdomain serves that site's content, everything else
//! falls back to the platform landing page.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! perch = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use perch::server::{AppState, create_router};
//! use perch::store::SqliteStore;
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/perch.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     PathBuf::from("./data"),
//!     vec!["perch.local".to_string()],
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the `perch` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod quota;
pub mod server;
pub mod sites;
pub mod storage;
pub mod store;
pub mod types;

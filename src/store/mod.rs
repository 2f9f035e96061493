mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Plan breakdown row for the admin dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanCount {
    pub plan: String,
    pub count: i64,
}

/// Site row joined with its owner, for the platform-wide admin listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SiteWithOwner {
    #[serde(flatten)]
    pub site: Site,
    pub owner: SiteOwner,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SiteOwner {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Account operations
    fn create_account(&self, account: &Account) -> Result<()>;
    fn get_account(&self, id: &str) -> Result<Option<Account>>;
    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;
    fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;
    fn list_accounts(&self, cursor: &str, limit: i32) -> Result<Vec<Account>>;
    fn update_account(&self, account: &Account) -> Result<()>;
    fn delete_account(&self, id: &str) -> Result<bool>;
    fn has_admin_account(&self) -> Result<bool>;

    // Site operations. `create_site` must surface a subdomain uniqueness
    // violation as Conflict; the insert is the reservation.
    fn create_site(&self, site: &Site) -> Result<()>;
    fn get_site(&self, id: &str) -> Result<Option<Site>>;
    fn get_site_by_subdomain(&self, subdomain: &str) -> Result<Option<Site>>;
    /// Lookup key for host resolution: an active site claiming `subdomain`,
    /// or an active site with a verified custom domain equal to `host`.
    fn get_active_site_for_host(&self, subdomain: &str, host: &str) -> Result<Option<Site>>;
    fn list_account_sites(&self, account_id: &str) -> Result<Vec<Site>>;
    /// Every site on the platform with its owner, cursor-paginated by
    /// site id. Admin listing only.
    fn list_sites(&self, cursor: &str, limit: i32) -> Result<Vec<SiteWithOwner>>;
    fn count_account_sites(&self, account_id: &str) -> Result<i64>;
    fn update_site(&self, site: &Site) -> Result<()>;
    fn delete_site(&self, id: &str) -> Result<bool>;
    /// Atomically applies `delta` to `storage_bytes`, floored at zero for
    /// negative deltas. For positive deltas, `max_storage_bytes` (when set)
    /// is enforced inside the same statement; exceeding it fails with
    /// QuotaExceeded and leaves the row untouched. `deployed` additionally
    /// stamps `last_deployed_at`.
    fn adjust_site_storage(
        &self,
        id: &str,
        delta: i64,
        max_storage_bytes: Option<i64>,
        deployed: bool,
    ) -> Result<()>;
    fn record_site_visit(&self, id: &str, bandwidth_bytes: i64) -> Result<()>;

    // Custom domain operations
    fn add_custom_domain(&self, domain: &CustomDomain) -> Result<()>;
    fn get_custom_domain(&self, domain: &str) -> Result<Option<CustomDomain>>;
    fn list_site_domains(&self, site_id: &str) -> Result<Vec<CustomDomain>>;
    fn remove_custom_domain(&self, site_id: &str, domain: &str) -> Result<bool>;
    fn mark_domain_verified(&self, site_id: &str, domain: &str) -> Result<bool>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn delete_token(&self, id: &str) -> Result<bool>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;

    // Dashboard rollups
    fn count_accounts(&self) -> Result<i64>;
    fn count_sites(&self) -> Result<i64>;
    fn total_storage_bytes(&self) -> Result<i64>;
    fn count_accounts_by_plan(&self) -> Result<Vec<PlanCount>>;
    fn recent_accounts(&self, limit: i32) -> Result<Vec<Account>>;
    fn recent_sites(&self, limit: i32) -> Result<Vec<Site>>;

    fn close(&self) -> Result<()>;
}

/// Shared parse for timestamps the schema writes with `datetime('now')`
/// and the code writes as RFC3339.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

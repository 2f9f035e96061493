use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::schema::SCHEMA;
use super::{PlanCount, SiteOwner, SiteWithOwner, Store, format_datetime, parse_datetime};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

/// Maps a unique-index violation to Conflict; anything else stays a
/// database error. Uniqueness is enforced by the persistence layer so two
/// concurrent inserts for the same name can never both succeed.
fn conflict_on_constraint(e: rusqlite::Error, message: &str) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(message.to_string())
        }
        e => Error::Database(e),
    }
}

const ACCOUNT_COLS: &str =
    "id, username, email, password_hash, role, plan, created_at, updated_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::parse(&row.get::<_, String>(4)?),
        plan: Plan::parse(&row.get::<_, String>(5)?),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const SITE_COLS: &str = "id, account_id, name, subdomain, password_protection, analytics, \
     indexing, visits, bandwidth_bytes, storage_bytes, last_deployed_at, active, \
     build_status, created_at, updated_at";

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        subdomain: row.get(3)?,
        settings: SiteSettings {
            password_protection: row.get(4)?,
            analytics: row.get(5)?,
            indexing: row.get(6)?,
        },
        stats: SiteStats {
            visits: row.get(7)?,
            bandwidth_bytes: row.get(8)?,
            storage_bytes: row.get(9)?,
            last_deployed_at: row
                .get::<_, Option<String>>(10)?
                .map(|s| parse_datetime(&s)),
        },
        active: row.get(11)?,
        build_status: BuildStatus::parse(&row.get::<_, String>(12)?),
        created_at: parse_datetime(&row.get::<_, String>(13)?),
        updated_at: parse_datetime(&row.get::<_, String>(14)?),
    })
}

fn domain_from_row(row: &Row<'_>) -> rusqlite::Result<CustomDomain> {
    let parse_list = |s: String| serde_json::from_str::<Vec<String>>(&s).unwrap_or_default();
    Ok(CustomDomain {
        site_id: row.get(0)?,
        domain: row.get(1)?,
        verified: row.get(2)?,
        ssl_enabled: row.get(3)?,
        dns_records: DnsRecords {
            a: parse_list(row.get(4)?),
            cname: parse_list(row.get(5)?),
            txt: parse_list(row.get(6)?),
        },
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Account operations

    fn create_account(&self, account: &Account) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO accounts (id, username, email, password_hash, role, plan, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    account.id,
                    account.username,
                    account.email,
                    account.password_hash,
                    account.role.as_str(),
                    account.plan.as_str(),
                    format_datetime(&account.created_at),
                    format_datetime(&account.updated_at),
                ],
            )
            .map_err(|e| conflict_on_constraint(e, "Username or email already registered"))?;
        Ok(())
    }

    fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE id = ?1"),
            params![id],
            account_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE username = ?1"),
            params![username],
            account_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE email = ?1"),
            params![email],
            account_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_accounts(&self, cursor: &str, limit: i32) -> Result<Vec<Account>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLS} FROM accounts WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], account_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_account(&self, account: &Account) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE accounts SET username = ?1, email = ?2, password_hash = ?3, role = ?4,
                 plan = ?5, updated_at = ?6 WHERE id = ?7",
            params![
                account.username,
                account.email,
                account.password_hash,
                account.role.as_str(),
                account.plan.as_str(),
                format_datetime(&Utc::now()),
                account.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_account(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn has_admin_account(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Site operations

    fn create_site(&self, site: &Site) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO sites (id, account_id, name, subdomain, password_protection,
                     analytics, indexing, visits, bandwidth_bytes, storage_bytes,
                     last_deployed_at, active, build_status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    site.id,
                    site.account_id,
                    site.name,
                    site.subdomain,
                    site.settings.password_protection,
                    site.settings.analytics,
                    site.settings.indexing,
                    site.stats.visits,
                    site.stats.bandwidth_bytes,
                    site.stats.storage_bytes,
                    site.stats.last_deployed_at.as_ref().map(format_datetime),
                    site.active,
                    site.build_status.as_str(),
                    format_datetime(&site.created_at),
                    format_datetime(&site.updated_at),
                ],
            )
            .map_err(|e| conflict_on_constraint(e, "Subdomain already taken"))?;
        Ok(())
    }

    fn get_site(&self, id: &str) -> Result<Option<Site>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SITE_COLS} FROM sites WHERE id = ?1"),
            params![id],
            site_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_site_by_subdomain(&self, subdomain: &str) -> Result<Option<Site>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SITE_COLS} FROM sites WHERE subdomain = ?1"),
            params![subdomain],
            site_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_active_site_for_host(&self, subdomain: &str, host: &str) -> Result<Option<Site>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {SITE_COLS} FROM sites
                 WHERE active = 1 AND (subdomain = ?1 OR id IN (
                     SELECT site_id FROM custom_domains WHERE domain = ?2 AND verified = 1))
                 LIMIT 1"
            ),
            params![subdomain, host],
            site_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_account_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SITE_COLS} FROM sites WHERE account_id = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![account_id], site_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_sites(&self, cursor: &str, limit: i32) -> Result<Vec<SiteWithOwner>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.account_id, s.name, s.subdomain, s.password_protection,
                    s.analytics, s.indexing, s.visits, s.bandwidth_bytes, s.storage_bytes,
                    s.last_deployed_at, s.active, s.build_status, s.created_at, s.updated_at,
                    a.username, a.email
             FROM sites s JOIN accounts a ON a.id = s.account_id
             WHERE s.id > ?1 ORDER BY s.id LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![cursor, limit], |row| {
            let site = site_from_row(row)?;
            let owner = SiteOwner {
                id: site.account_id.clone(),
                username: row.get(15)?,
                email: row.get(16)?,
            };
            Ok(SiteWithOwner { site, owner })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_account_sites(&self, account_id: &str) -> Result<i64> {
        let conn = self.conn();
        conn.query_row(
            "SELECT COUNT(*) FROM sites WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .map_err(Error::from)
    }

    fn update_site(&self, site: &Site) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE sites SET name = ?1, password_protection = ?2, analytics = ?3,
                 indexing = ?4, active = ?5, build_status = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                site.name,
                site.settings.password_protection,
                site.settings.analytics,
                site.settings.indexing,
                site.active,
                site.build_status.as_str(),
                format_datetime(&Utc::now()),
                site.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_site(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sites WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn adjust_site_storage(
        &self,
        id: &str,
        delta: i64,
        max_storage_bytes: Option<i64>,
        deployed: bool,
    ) -> Result<()> {
        let conn = self.conn();
        let now = format_datetime(&Utc::now());

        // Single-statement increment so concurrent adjustments can never
        // read-modify-write each other's totals.
        let rows = match (delta > 0, max_storage_bytes) {
            (true, Some(max)) => conn.execute(
                "UPDATE sites SET storage_bytes = storage_bytes + ?2,
                     last_deployed_at = CASE WHEN ?3 THEN ?4 ELSE last_deployed_at END,
                     updated_at = ?4
                 WHERE id = ?1 AND storage_bytes + ?2 <= ?5",
                params![id, delta, deployed, now, max],
            )?,
            _ => conn.execute(
                "UPDATE sites SET storage_bytes = MAX(0, storage_bytes + ?2),
                     last_deployed_at = CASE WHEN ?3 THEN ?4 ELSE last_deployed_at END,
                     updated_at = ?4
                 WHERE id = ?1",
                params![id, delta, deployed, now],
            )?,
        };

        if rows == 0 {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sites WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(Error::NotFound);
            }
            return Err(Error::QuotaExceeded("storage limit reached".to_string()));
        }
        Ok(())
    }

    fn record_site_visit(&self, id: &str, bandwidth_bytes: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE sites SET visits = visits + 1,
                 bandwidth_bytes = bandwidth_bytes + ?2
             WHERE id = ?1",
            params![id, bandwidth_bytes],
        )?;
        Ok(())
    }

    // Custom domain operations

    fn add_custom_domain(&self, domain: &CustomDomain) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO custom_domains (site_id, domain, verified, ssl_enabled,
                     dns_a, dns_cname, dns_txt, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    domain.site_id,
                    domain.domain,
                    domain.verified,
                    domain.ssl_enabled,
                    serde_json::to_string(&domain.dns_records.a).unwrap_or_default(),
                    serde_json::to_string(&domain.dns_records.cname).unwrap_or_default(),
                    serde_json::to_string(&domain.dns_records.txt).unwrap_or_default(),
                    format_datetime(&domain.created_at),
                ],
            )
            .map_err(|e| conflict_on_constraint(e, "Domain already in use"))?;
        Ok(())
    }

    fn get_custom_domain(&self, domain: &str) -> Result<Option<CustomDomain>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT site_id, domain, verified, ssl_enabled, dns_a, dns_cname, dns_txt, created_at
             FROM custom_domains WHERE domain = ?1",
            params![domain],
            domain_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_site_domains(&self, site_id: &str) -> Result<Vec<CustomDomain>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT site_id, domain, verified, ssl_enabled, dns_a, dns_cname, dns_txt, created_at
             FROM custom_domains WHERE site_id = ?1 ORDER BY domain",
        )?;

        let rows = stmt.query_map(params![site_id], domain_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn remove_custom_domain(&self, site_id: &str, domain: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM custom_domains WHERE site_id = ?1 AND domain = ?2",
            params![site_id, domain],
        )?;
        Ok(rows > 0)
    }

    fn mark_domain_verified(&self, site_id: &str, domain: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE custom_domains SET verified = 1, ssl_enabled = 1
             WHERE site_id = ?1 AND domain = ?2",
            params![site_id, domain],
        )?;
        Ok(rows > 0)
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, account_id, created_at, expires_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.account_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
                token.last_used_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, account_id, created_at, expires_at, last_used_at
             FROM tokens WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Token {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    account_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_token(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Dashboard rollups

    fn count_accounts(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .map_err(Error::from)
    }

    fn count_sites(&self) -> Result<i64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))
            .map_err(Error::from)
    }

    fn total_storage_bytes(&self) -> Result<i64> {
        self.conn()
            .query_row(
                "SELECT COALESCE(SUM(storage_bytes), 0) FROM sites",
                [],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    fn count_accounts_by_plan(&self) -> Result<Vec<PlanCount>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT plan, COUNT(*) FROM accounts GROUP BY plan ORDER BY plan")?;

        let rows = stmt.query_map([], |row| {
            Ok(PlanCount {
                plan: row.get(0)?,
                count: row.get(1)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn recent_accounts(&self, limit: i32) -> Result<Vec<Account>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLS} FROM accounts ORDER BY created_at DESC LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit], account_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn recent_sites(&self, limit: i32) -> Result<Vec<Site>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SITE_COLS} FROM sites ORDER BY created_at DESC LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit], site_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4().to_string(),
            username: format!("user-{}", &Uuid::new_v4().to_string()[..8]),
            email: format!("{}@example.com", &Uuid::new_v4().to_string()[..8]),
            password_hash: "$argon2id$test".to_string(),
            role: Role::User,
            plan: Plan::Free,
            created_at: now,
            updated_at: now,
        }
    }

    fn test_site(account_id: &str, subdomain: &str) -> Site {
        let now = Utc::now();
        Site {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            name: "Test Site".to_string(),
            subdomain: subdomain.to_string(),
            settings: SiteSettings::default(),
            stats: SiteStats::default(),
            active: true,
            build_status: BuildStatus::Success,
            created_at: now,
            updated_at: now,
        }
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_duplicate_subdomain_is_conflict() {
        let store = store();
        let account = test_account();
        store.create_account(&account).unwrap();

        store.create_site(&test_site(&account.id, "acme")).unwrap();
        let result = store.create_site(&test_site(&account.id, "acme"));
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_subdomain_held_by_inactive_site() {
        let store = store();
        let account = test_account();
        store.create_account(&account).unwrap();

        let mut site = test_site(&account.id, "parked");
        site.active = false;
        store.create_site(&site).unwrap();

        // Name stays reserved while any record claims it.
        let result = store.create_site(&test_site(&account.id, "parked"));
        assert!(matches!(result, Err(Error::Conflict(_))));
        // But host resolution must not find it.
        assert!(
            store
                .get_active_site_for_host("parked", "parked.example.com")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_list_sites_joins_owner() {
        let store = store();
        let alice = test_account();
        let bob = test_account();
        store.create_account(&alice).unwrap();
        store.create_account(&bob).unwrap();
        store.create_site(&test_site(&alice.id, "alices")).unwrap();
        store.create_site(&test_site(&bob.id, "bobs")).unwrap();

        let listed = store.list_sites("", 10).unwrap();
        assert_eq!(listed.len(), 2);
        for entry in &listed {
            let expected = if entry.site.account_id == alice.id {
                &alice.username
            } else {
                &bob.username
            };
            assert_eq!(&entry.owner.username, expected);
            assert!(entry.owner.email.contains('@'));
        }
    }

    #[test]
    fn test_storage_adjustment_respects_limit() {
        let store = store();
        let account = test_account();
        store.create_account(&account).unwrap();
        let site = test_site(&account.id, "quota");
        store.create_site(&site).unwrap();

        store
            .adjust_site_storage(&site.id, 80, Some(100), true)
            .unwrap();

        let result = store.adjust_site_storage(&site.id, 30, Some(100), true);
        assert!(matches!(result, Err(Error::QuotaExceeded(_))));

        // The failed adjustment must not have moved the total.
        let stored = store.get_site(&site.id).unwrap().unwrap();
        assert_eq!(stored.stats.storage_bytes, 80);
        assert!(stored.stats.last_deployed_at.is_some());
    }

    #[test]
    fn test_storage_decrement_floors_at_zero() {
        let store = store();
        let account = test_account();
        store.create_account(&account).unwrap();
        let site = test_site(&account.id, "floor");
        store.create_site(&site).unwrap();

        store
            .adjust_site_storage(&site.id, 10, None, false)
            .unwrap();
        store
            .adjust_site_storage(&site.id, -25, None, false)
            .unwrap();

        let stored = store.get_site(&site.id).unwrap().unwrap();
        assert_eq!(stored.stats.storage_bytes, 0);
    }

    #[test]
    fn test_host_lookup_by_verified_custom_domain() {
        let store = store();
        let account = test_account();
        store.create_account(&account).unwrap();
        let site = test_site(&account.id, "branded");
        store.create_site(&site).unwrap();

        let domain = CustomDomain {
            site_id: site.id.clone(),
            domain: "www.acme.example".to_string(),
            verified: false,
            ssl_enabled: false,
            dns_records: DnsRecords::default(),
            created_at: Utc::now(),
        };
        store.add_custom_domain(&domain).unwrap();

        // Unverified domains do not resolve.
        assert!(
            store
                .get_active_site_for_host("www", "www.acme.example")
                .unwrap()
                .is_none()
        );

        store
            .mark_domain_verified(&site.id, "www.acme.example")
            .unwrap();
        let found = store
            .get_active_site_for_host("www", "www.acme.example")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, site.id);
    }

    #[test]
    fn test_custom_domain_unique_across_sites() {
        let store = store();
        let account = test_account();
        store.create_account(&account).unwrap();
        let site_a = test_site(&account.id, "site-a");
        let site_b = test_site(&account.id, "site-b");
        store.create_site(&site_a).unwrap();
        store.create_site(&site_b).unwrap();

        let domain = CustomDomain {
            site_id: site_a.id.clone(),
            domain: "shared.example".to_string(),
            verified: false,
            ssl_enabled: false,
            dns_records: DnsRecords::default(),
            created_at: Utc::now(),
        };
        store.add_custom_domain(&domain).unwrap();

        let mut second = domain.clone();
        second.site_id = site_b.id.clone();
        assert!(matches!(
            store.add_custom_domain(&second),
            Err(Error::Conflict(_))
        ));
    }
}

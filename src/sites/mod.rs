//! Site lifecycle: creation (with quota and subdomain reservation),
//! deletion (idempotent, files first), storage accounting, and cascade
//! removal when an account goes away.

pub mod name;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::quota;
use crate::storage::SiteStorage;
use crate::store::Store;
use crate::types::{Account, BuildStatus, Site, SiteSettings, SiteStats};

pub struct SiteService {
    store: Arc<dyn Store>,
    storage: Arc<SiteStorage>,
    /// Primary domain suffix used in the generated welcome page.
    base_domain: String,
}

impl SiteService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<SiteStorage>, base_domain: String) -> Self {
        Self {
            store,
            storage,
            base_domain,
        }
    }

    #[must_use]
    pub fn root_for(&self, site: &Site) -> PathBuf {
        self.storage.root_for(&site.account_id, &site.id)
    }

    /// Creates a site for `owner`. The row insert doubles as the subdomain
    /// reservation (unique index); if materializing the storage root fails
    /// afterwards, the row is deleted again so the name is not orphaned.
    pub async fn create_site(&self, owner: &Account, name: &str, subdomain: &str) -> Result<Site> {
        let name = name::validate_site_name(name)?;
        let subdomain = name::normalize_subdomain(subdomain)?;

        let limits = quota::limits(owner.role, owner.plan);
        if let Some(max_sites) = limits.max_sites {
            // Fresh count at the point of enforcement, never cached.
            let owned = self.store.count_account_sites(&owner.id)?;
            if owned >= max_sites {
                return Err(Error::QuotaExceeded(format!(
                    "site limit reached ({max_sites})"
                )));
            }
        }

        let now = Utc::now();
        let site = Site {
            id: Uuid::new_v4().to_string(),
            account_id: owner.id.clone(),
            name: name.clone(),
            subdomain: subdomain.clone(),
            settings: SiteSettings {
                password_protection: false,
                analytics: true,
                indexing: true,
            },
            stats: SiteStats::default(),
            active: true,
            build_status: BuildStatus::Success,
            created_at: now,
            updated_at: now,
        };

        self.store.create_site(&site)?;

        let root = self.root_for(&site);
        let full_domain = format!("{subdomain}.{}", self.base_domain);
        let materialized: Result<u64> = async {
            self.storage.ensure_root(&root).await?;
            self.storage
                .write_default_index(&root, &name, &full_domain)
                .await
        }
        .await;

        match materialized {
            Ok(index_bytes) => {
                self.store
                    .adjust_site_storage(&site.id, index_bytes as i64, None, true)?;
                Ok(self.store.get_site(&site.id)?.ok_or(Error::NotFound)?)
            }
            Err(e) => {
                // Compensate: release the subdomain reservation.
                if let Err(rollback) = self.store.delete_site(&site.id) {
                    tracing::error!(
                        site_id = site.id,
                        "failed to roll back site record after storage error: {rollback}"
                    );
                }
                let _ = self.storage.remove_root(&root).await;
                Err(e)
            }
        }
    }

    /// Deletes a site's files and record. Both halves tolerate the target
    /// already being gone, so retries after partial failure are safe.
    pub async fn delete_site(&self, site: &Site) -> Result<()> {
        self.storage.remove_root(&self.root_for(site)).await?;
        self.store.delete_site(&site.id)?;
        Ok(())
    }

    /// Accounts `bytes` of new content against the owner's storage quota.
    /// The owner's limits are re-read here so a plan change between
    /// request start and accounting cannot race the check.
    pub fn record_upload(&self, site: &Site, bytes: i64) -> Result<()> {
        let owner = self
            .store
            .get_account(&site.account_id)?
            .ok_or(Error::NotFound)?;
        let limits = quota::limits(owner.role, owner.plan);
        self.store
            .adjust_site_storage(&site.id, bytes, limits.max_storage_bytes, true)
    }

    /// Releases `bytes` from a site's storage total, floored at zero.
    pub fn record_deletion(&self, site: &Site, bytes: i64) -> Result<()> {
        self.store.adjust_site_storage(&site.id, -bytes, None, false)
    }

    /// Removes every site owned by `account_id`, files and records both.
    /// Returns the number of sites removed. Run before deleting the
    /// account itself.
    pub async fn cascade_delete_for_account(&self, account_id: &str) -> Result<usize> {
        let sites = self.store.list_account_sites(account_id)?;
        let count = sites.len();

        for site in &sites {
            self.delete_site(site).await?;
        }

        Ok(count)
    }
}

//! Per-tenant character quota ledger.

use crate::db::Database;
use crate::error::{Result, TranslateError};
use tracing::{debug, warn};

/// Checks and debits tenant character quotas.
///
/// Debits are a single conditional update at the storage layer, never a
/// read-then-write here, so concurrent batches for one tenant cannot jointly
/// exceed the ceiling.
#[derive(Clone)]
pub struct QuotaLedger {
    db: Database,
}

impl QuotaLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// True iff `quota_used + characters <= quota_limit`.
    ///
    /// Unknown tenants can consume nothing.
    pub async fn can_consume(&self, tenant_id: i64, characters: i64) -> Result<bool> {
        let tenant = match self.db.tenant(tenant_id).await? {
            Some(tenant) => tenant,
            None => return Ok(false),
        };
        Ok(characters >= 0 && tenant.quota_used + characters <= tenant.quota_limit)
    }

    /// Debit `characters` from the tenant's quota.
    ///
    /// # Errors
    /// `TranslateError::QuotaExceeded` when the debit would pass the ceiling; in
    /// that case nothing is debited.
    pub async fn consume(&self, tenant_id: i64, characters: i64) -> Result<()> {
        if characters == 0 {
            return Ok(());
        }

        if self.db.try_consume_quota(tenant_id, characters).await? {
            debug!("Tenant {}: consumed {} characters", tenant_id, characters);
            return Ok(());
        }

        let remaining = self.remaining(tenant_id).await?;
        warn!(
            "Tenant {}: quota debit of {} characters rejected ({} remaining)",
            tenant_id, characters, remaining
        );
        Err(TranslateError::QuotaExceeded {
            tenant_id,
            requested: characters,
            remaining,
        })
    }

    /// Characters left under the ceiling (zero for unknown tenants).
    pub async fn remaining(&self, tenant_id: i64) -> Result<i64> {
        Ok(self
            .db
            .tenant(tenant_id)
            .await?
            .map(|tenant| tenant.remaining())
            .unwrap_or(0))
    }
}

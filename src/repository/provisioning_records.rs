//! SQLite-backed persistence for provisioning records.
//!
//! One table, keyed naturally by (`tenant_id`, `bucket_name`) with a unique
//! index, so the at-most-one-record invariant is enforced by the store
//! rather than by callers. Writes are upserts over the natural key; the
//! store-assigned id survives updates.

use crate::errors::ProvisionError;
use crate::models::provisioning::ProvisioningRecord;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Query contract the orchestrator depends on.
#[async_trait]
pub trait ProvisioningStore: Send + Sync {
    /// Upsert the full record over its natural key, refreshing `created_at`.
    /// The existing id is reused when a record for the pair already exists;
    /// a fresh one is assigned otherwise. Returns the id actually stored.
    async fn create_or_update(&self, record: ProvisioningRecord) -> Result<Uuid, ProvisionError>;

    /// Exact natural-key lookup.
    async fn get(
        &self,
        tenant_id: &str,
        bucket_name: &str,
    ) -> Result<ProvisioningRecord, ProvisionError>;

    /// Hard delete by identifier. `force` is accepted for API compatibility
    /// but reserved; deletion is unconditional either way.
    async fn delete(&self, id: Uuid, force: bool) -> Result<(), ProvisionError>;

    /// Cheap store liveness check for the readiness probe.
    async fn ping(&self) -> Result<(), ProvisionError>;
}

/// [`ProvisioningStore`] over a shared SQLite pool.
#[derive(Clone)]
pub struct ProvisioningRepository {
    db: Arc<SqlitePool>,
}

impl ProvisioningRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProvisioningStore for ProvisioningRepository {
    async fn create_or_update(
        &self,
        mut record: ProvisioningRecord,
    ) -> Result<Uuid, ProvisionError> {
        record.created_at = Utc::now();

        // Any lookup failure other than "no rows" is a hard error, not a
        // signal to create.
        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM provisioning_records WHERE tenant_id = ? AND bucket_name = ?",
        )
        .bind(&record.tenant_id)
        .bind(&record.bucket_name)
        .fetch_optional(&*self.db)
        .await?;

        record.id = existing.unwrap_or_else(Uuid::new_v4);

        sqlx::query(
            "INSERT INTO provisioning_records (
                 id, tenant_id, bucket_name, access_key, secret_ref,
                 dns_record_ids, policy, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, bucket_name) DO UPDATE SET
                 access_key = excluded.access_key,
                 secret_ref = excluded.secret_ref,
                 dns_record_ids = excluded.dns_record_ids,
                 policy = excluded.policy,
                 created_at = excluded.created_at",
        )
        .bind(record.id)
        .bind(&record.tenant_id)
        .bind(&record.bucket_name)
        .bind(&record.access_key)
        .bind(&record.secret_ref)
        .bind(&record.dns_record_ids)
        .bind(&record.policy)
        .bind(record.created_at)
        .execute(&*self.db)
        .await?;

        Ok(record.id)
    }

    async fn get(
        &self,
        tenant_id: &str,
        bucket_name: &str,
    ) -> Result<ProvisioningRecord, ProvisionError> {
        sqlx::query_as::<_, ProvisioningRecord>(
            "SELECT id, tenant_id, bucket_name, access_key, secret_ref,
                    dns_record_ids, policy, created_at
             FROM provisioning_records
             WHERE tenant_id = ? AND bucket_name = ?",
        )
        .bind(tenant_id)
        .bind(bucket_name)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => ProvisionError::not_found(format!(
                "provisioning record for bucket `{bucket_name}` in tenant `{tenant_id}`"
            )),
            other => other.into(),
        })
    }

    async fn delete(&self, id: Uuid, _force: bool) -> Result<(), ProvisionError> {
        let result = sqlx::query("DELETE FROM provisioning_records WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ProvisionError::not_found(format!(
                "provisioning record {id}"
            )));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<(), ProvisionError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

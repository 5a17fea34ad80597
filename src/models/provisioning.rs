//! The durable bundle produced by provisioning a bucket policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Everything a single `SetBucketPolicy` leaves behind for one
/// (tenant, bucket) pair.
///
/// At most one record exists per (`tenant_id`, `bucket_name`); the unique
/// index on that pair enforces it in the store. The `dns_record_ids` list is
/// the only handle for retracting the published records later — losing it
/// leaks DNS records.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ProvisioningRecord {
    /// Store-assigned identifier, generated once and reused across updates.
    pub id: Uuid,

    /// Tenant owning the bucket; part of the natural key.
    pub tenant_id: String,

    /// Bucket the policy is attached to; part of the natural key.
    pub bucket_name: String,

    /// Access key of the issued credential.
    pub access_key: String,

    /// Reference usable to revoke the credential. The secret itself is
    /// never retained.
    pub secret_ref: String,

    /// Provider-assigned identifiers of the published DNS records.
    pub dns_record_ids: Json<Vec<String>>,

    /// The caller's policy document, stored and returned verbatim.
    pub policy: Json<Value>,

    /// Refreshed on every write, both insert and update.
    pub created_at: DateTime<Utc>,
}

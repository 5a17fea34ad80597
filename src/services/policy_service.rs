//! PolicyService — the bucket-policy provisioning workflow.
//!
//! Attaching a policy to a bucket means three side-effects, strictly in
//! order: issue a scoped credential from the identity service, publish the
//! bucket's DNS discovery records, and persist the resulting bundle under
//! the (tenant, bucket) natural key. Teardown runs the exact inverse, with
//! the persisted record deleted last so a failed teardown can always be
//! retried from stored state.
//!
//! There is no compensating rollback between steps: a failure after
//! credential issuance leaves the credential orphaned, and a failure after
//! DNS publication leaves both the credential and the records orphaned. The
//! caller's recovery path is retrying the whole workflow.

use crate::clients::dns::DnsPublisher;
use crate::clients::identity::CredentialIssuer;
use crate::context::RequestContext;
use crate::errors::ProvisionError;
use crate::models::provisioning::ProvisioningRecord;
use crate::repository::provisioning_records::ProvisioningStore;
use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Orchestrates credential issuance, DNS publication, and metadata
/// persistence behind the S3-style bucket-policy surface.
#[derive(Clone)]
pub struct PolicyService {
    issuer: Arc<dyn CredentialIssuer>,
    dns: Arc<dyn DnsPublisher>,
    store: Arc<dyn ProvisioningStore>,
}

impl PolicyService {
    pub fn new(
        issuer: Arc<dyn CredentialIssuer>,
        dns: Arc<dyn DnsPublisher>,
        store: Arc<dyn ProvisioningStore>,
    ) -> Self {
        Self { issuer, dns, store }
    }

    /// Provision the side-effects of attaching `policy` to `bucket`.
    ///
    /// Idempotent at the persistence layer — re-running for the same
    /// (tenant, bucket) replaces the stored bundle — but not at the
    /// side-effect layer: a re-run issues a fresh credential and fresh DNS
    /// records.
    pub async fn set_bucket_policy(
        &self,
        ctx: &RequestContext,
        bucket: &str,
        policy: Value,
    ) -> Result<(), ProvisionError> {
        let info = ctx.info().ok_or_else(missing_request_info)?;

        let credential = self
            .issuer
            .issue(&info.tenant_id, bucket)
            .await
            .map_err(|err| {
                err.context(format!(
                    "failed to issue credential for bucket `{bucket}` in tenant `{}`",
                    info.tenant_id
                ))
            })?;
        debug!("issued credential {} for bucket {bucket}", credential.access_key);

        let record_ids = self
            .dns
            .create_records(bucket, &info.internal_path, &credential.access_key)
            .await
            .map_err(|err| {
                err.context(format!(
                    "failed to publish dns records for bucket `{bucket}` in tenant `{}`",
                    info.tenant_id
                ))
            })?;

        let record = ProvisioningRecord {
            id: Uuid::nil(),
            tenant_id: info.tenant_id.clone(),
            bucket_name: bucket.to_string(),
            access_key: credential.access_key,
            secret_ref: credential.secret_ref,
            dns_record_ids: Json(record_ids),
            policy: Json(policy),
            created_at: Utc::now(),
        };
        let id = self.store.create_or_update(record).await.map_err(|err| {
            err.context(format!(
                "failed to persist provisioning record for bucket `{bucket}` in tenant `{}`",
                info.tenant_id
            ))
        })?;

        info!(
            "provisioned policy for bucket {bucket} in tenant {} (record {id})",
            info.tenant_id
        );
        Ok(())
    }

    /// Return the stored policy document for (tenant, bucket), verbatim.
    pub async fn get_bucket_policy(
        &self,
        ctx: &RequestContext,
        bucket: &str,
    ) -> Result<Value, ProvisionError> {
        let info = ctx.info().ok_or_else(missing_request_info)?;

        let record = self.store.get(&info.tenant_id, bucket).await?;
        Ok(record.policy.0)
    }

    /// Tear down everything `set_bucket_policy` provisioned, in the inverse
    /// order: retract DNS records, revoke the credential, delete the record.
    ///
    /// The DNS records reference the access key, so they are retracted
    /// before the key authorizing them is revoked. Any step failure aborts
    /// the rest and leaves the record in place as the source of truth for a
    /// retry.
    pub async fn delete_bucket_policy(
        &self,
        ctx: &RequestContext,
        bucket: &str,
    ) -> Result<(), ProvisionError> {
        let info = ctx.info().ok_or_else(missing_request_info)?;

        let record = self.store.get(&info.tenant_id, bucket).await?;

        self.dns
            .delete_records(&record.dns_record_ids)
            .await
            .map_err(|err| {
                err.context(format!(
                    "failed to retract dns records for bucket `{bucket}` in tenant `{}`",
                    info.tenant_id
                ))
            })?;

        self.issuer
            .revoke(&info.tenant_id, &record.access_key, &record.secret_ref)
            .await
            .map_err(|err| {
                err.context(format!(
                    "failed to revoke credential for bucket `{bucket}` in tenant `{}`",
                    info.tenant_id
                ))
            })?;

        self.store.delete(record.id, true).await.map_err(|err| {
            err.context(format!(
                "failed to delete provisioning record for bucket `{bucket}` in tenant `{}`",
                info.tenant_id
            ))
        })?;

        info!(
            "tore down policy for bucket {bucket} in tenant {}",
            info.tenant_id
        );
        Ok(())
    }

    /// Store liveness, surfaced by the readiness probe.
    pub async fn ready(&self) -> Result<(), ProvisionError> {
        self.store.ping().await
    }
}

fn missing_request_info() -> ProvisionError {
    ProvisionError::PreconditionFailed(
        "request context carries no tenant id or internal bucket path".into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::identity::Credential;
    use crate::repository::provisioning_records::ProvisioningRepository;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type EventLog = Arc<Mutex<Vec<&'static str>>>;

    struct FakeIssuer {
        conflict: bool,
        fail_revoke: bool,
        issued: AtomicUsize,
        log: EventLog,
    }

    impl FakeIssuer {
        fn new(log: EventLog) -> Self {
            Self {
                conflict: false,
                fail_revoke: false,
                issued: AtomicUsize::new(0),
                log,
            }
        }
    }

    #[async_trait]
    impl CredentialIssuer for FakeIssuer {
        async fn issue(&self, _tenant: &str, bucket: &str) -> Result<Credential, ProvisionError> {
            self.log.lock().unwrap().push("issue");
            if self.conflict {
                return Err(ProvisionError::AlreadyExists(format!(
                    "credential for bucket `{bucket}`"
                )));
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Credential {
                access_key: format!("AKID-{n}"),
                secret_ref: format!("ref-{n}"),
            })
        }

        async fn revoke(
            &self,
            _tenant: &str,
            _access_key: &str,
            _secret_ref: &str,
        ) -> Result<(), ProvisionError> {
            self.log.lock().unwrap().push("revoke");
            if self.fail_revoke {
                return Err(ProvisionError::internal("identity service unavailable"));
            }
            Ok(())
        }
    }

    struct FakeDns {
        fail_create: bool,
        fail_delete: bool,
        log: EventLog,
    }

    impl FakeDns {
        fn new(log: EventLog) -> Self {
            Self {
                fail_create: false,
                fail_delete: false,
                log,
            }
        }
    }

    #[async_trait]
    impl DnsPublisher for FakeDns {
        async fn create_records(
            &self,
            _bucket: &str,
            _internal_path: &str,
            access_key: &str,
        ) -> Result<Vec<String>, ProvisionError> {
            self.log.lock().unwrap().push("dns.create");
            if self.fail_create {
                return Err(ProvisionError::internal("dns provider unavailable"));
            }
            Ok((1..=4).map(|n| format!("{access_key}-rec-{n}")).collect())
        }

        async fn delete_records(&self, _ids: &[String]) -> Result<(), ProvisionError> {
            self.log.lock().unwrap().push("dns.delete");
            if self.fail_delete {
                return Err(ProvisionError::internal("dns provider unavailable"));
            }
            Ok(())
        }
    }

    /// Store wrapper that journals calls so teardown ordering is checkable.
    struct LoggingStore {
        inner: ProvisioningRepository,
        log: EventLog,
    }

    #[async_trait]
    impl ProvisioningStore for LoggingStore {
        async fn create_or_update(
            &self,
            record: ProvisioningRecord,
        ) -> Result<Uuid, ProvisionError> {
            self.log.lock().unwrap().push("store.upsert");
            self.inner.create_or_update(record).await
        }

        async fn get(
            &self,
            tenant_id: &str,
            bucket_name: &str,
        ) -> Result<ProvisioningRecord, ProvisionError> {
            self.log.lock().unwrap().push("store.get");
            self.inner.get(tenant_id, bucket_name).await
        }

        async fn delete(&self, id: Uuid, force: bool) -> Result<(), ProvisionError> {
            self.log.lock().unwrap().push("store.delete");
            self.inner.delete(id, force).await
        }

        async fn ping(&self) -> Result<(), ProvisionError> {
            self.inner.ping().await
        }
    }

    struct Harness {
        service: PolicyService,
        repo: ProvisioningRepository,
        log: EventLog,
    }

    async fn memory_pool() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        Arc::new(pool)
    }

    async fn harness(configure: impl FnOnce(&mut FakeIssuer, &mut FakeDns)) -> Harness {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let mut issuer = FakeIssuer::new(Arc::clone(&log));
        let mut dns = FakeDns::new(Arc::clone(&log));
        configure(&mut issuer, &mut dns);

        let repo = ProvisioningRepository::new(memory_pool().await);
        let store = LoggingStore {
            inner: repo.clone(),
            log: Arc::clone(&log),
        };
        let service = PolicyService::new(Arc::new(issuer), Arc::new(dns), Arc::new(store));
        Harness { service, repo, log }
    }

    fn ctx() -> RequestContext {
        RequestContext::new().with_info("t1", "t1/b1")
    }

    fn events(log: &EventLog) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn set_requires_populated_request_context() {
        let h = harness(|_, _| {}).await;

        let err = h
            .service
            .set_bucket_policy(&RequestContext::new(), "b1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::PreconditionFailed(_)), "{err}");
        assert!(events(&h.log).is_empty());
    }

    #[tokio::test]
    async fn credential_conflict_aborts_before_dns_and_persistence() {
        let h = harness(|issuer, _| issuer.conflict = true).await;

        let err = h
            .service
            .set_bucket_policy(&ctx(), "b1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::AlreadyExists(_)), "{err}");
        assert_eq!(events(&h.log), vec!["issue"]);
        assert!(h.repo.get("t1", "b1").await.is_err());
    }

    #[tokio::test]
    async fn dns_failure_aborts_persistence() {
        let h = harness(|_, dns| dns.fail_create = true).await;

        let err = h
            .service
            .set_bucket_policy(&ctx(), "b1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Internal(_)), "{err}");
        assert_eq!(events(&h.log), vec!["issue", "dns.create"]);
        assert!(h.repo.get("t1", "b1").await.is_err());
    }

    #[tokio::test]
    async fn setting_twice_yields_one_record_with_stable_id() {
        let h = harness(|_, _| {}).await;

        h.service
            .set_bucket_policy(&ctx(), "b1", json!({"v": 1}))
            .await
            .unwrap();
        let first = h.repo.get("t1", "b1").await.unwrap();

        h.service
            .set_bucket_policy(&ctx(), "b1", json!({"v": 2}))
            .await
            .unwrap();
        let second = h.repo.get("t1", "b1").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.policy.0, json!({"v": 2}));
        // The re-run issued a fresh credential and fresh records.
        assert_ne!(first.access_key, second.access_key);
        assert_ne!(first.dns_record_ids.0, second.dns_record_ids.0);
    }

    #[tokio::test]
    async fn get_returns_the_policy_verbatim() {
        let h = harness(|_, _| {}).await;
        let policy = json!({"Version": "2012-10-17", "Statement": []});

        h.service
            .set_bucket_policy(&ctx(), "b1", policy.clone())
            .await
            .unwrap();

        let stored = h.service.get_bucket_policy(&ctx(), "b1").await.unwrap();
        assert_eq!(stored, policy);
    }

    #[tokio::test]
    async fn get_missing_policy_is_not_found() {
        let h = harness(|_, _| {}).await;
        let err = h
            .service
            .get_bucket_policy(&ctx(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound(_)), "{err}");
    }

    #[tokio::test]
    async fn teardown_runs_inverse_order_and_removes_the_record() {
        let h = harness(|_, _| {}).await;
        h.service
            .set_bucket_policy(&ctx(), "b1", json!({}))
            .await
            .unwrap();
        h.log.lock().unwrap().clear();

        h.service.delete_bucket_policy(&ctx(), "b1").await.unwrap();
        assert_eq!(
            events(&h.log),
            vec!["store.get", "dns.delete", "revoke", "store.delete"]
        );

        let err = h.service.get_bucket_policy(&ctx(), "b1").await.unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound(_)), "{err}");
    }

    #[tokio::test]
    async fn teardown_of_missing_bucket_attempts_nothing() {
        let h = harness(|_, _| {}).await;

        let err = h
            .service
            .delete_bucket_policy(&ctx(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotFound(_)), "{err}");
        assert_eq!(events(&h.log), vec!["store.get"]);
    }

    #[tokio::test]
    async fn dns_retraction_failure_keeps_credential_and_record() {
        let h = harness(|_, dns| dns.fail_delete = true).await;
        h.service
            .set_bucket_policy(&ctx(), "b1", json!({}))
            .await
            .unwrap();
        h.log.lock().unwrap().clear();

        let err = h
            .service
            .delete_bucket_policy(&ctx(), "b1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Internal(_)), "{err}");
        assert_eq!(events(&h.log), vec!["store.get", "dns.delete"]);

        // Retry path: the record is still the source of truth.
        assert!(h.repo.get("t1", "b1").await.is_ok());
    }

    #[tokio::test]
    async fn revocation_failure_keeps_the_record() {
        let h = harness(|issuer, _| issuer.fail_revoke = true).await;
        h.service
            .set_bucket_policy(&ctx(), "b1", json!({}))
            .await
            .unwrap();
        h.log.lock().unwrap().clear();

        let err = h
            .service
            .delete_bucket_policy(&ctx(), "b1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Internal(_)), "{err}");
        assert_eq!(events(&h.log), vec!["store.get", "dns.delete", "revoke"]);
        assert!(h.repo.get("t1", "b1").await.is_ok());
    }

    #[tokio::test]
    async fn buckets_under_one_tenant_are_independent() {
        let h = harness(|_, _| {}).await;
        h.service
            .set_bucket_policy(&ctx(), "b1", json!({"bucket": "b1"}))
            .await
            .unwrap();
        h.service
            .set_bucket_policy(&ctx(), "b2", json!({"bucket": "b2"}))
            .await
            .unwrap();

        h.service.delete_bucket_policy(&ctx(), "b1").await.unwrap();

        let survivor = h.service.get_bucket_policy(&ctx(), "b2").await.unwrap();
        assert_eq!(survivor, json!({"bucket": "b2"}));
    }
}

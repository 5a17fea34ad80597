//! Client for the DNS provider that makes a provisioned bucket discoverable.
//!
//! Publishing a bucket means four records in one provider zone: a proxied
//! CNAME routing the bucket name at the storage network's public endpoint, a
//! TXT marker advertising TLS capability, and two TXT records on the shared
//! discovery name binding the internal bucket path and the issued access
//! key. All four are created concurrently; the first failure cancels the
//! in-flight siblings. Records the provider accepted before cancellation are
//! not retracted here — the caller owns that decision.

use crate::errors::ProvisionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Every bucket is published as exactly this many records.
const RECORD_COUNT: usize = 4;

/// Shared name the discovery TXT records are published under.
const DISCOVERY_NAME: &str = "txt-share";

const TLS_MARKER: &str = "storage-tls:true";
const ROOT_PREFIX: &str = "storage-root:";
const ACCESS_PREFIX: &str = "storage-access:";

/// Publish/retract capability the orchestrator depends on.
#[async_trait]
pub trait DnsPublisher: Send + Sync {
    /// Publish the bucket's record set and return the provider-assigned
    /// identifiers. Order of the returned identifiers is not significant.
    async fn create_records(
        &self,
        bucket: &str,
        internal_path: &str,
        access_key: &str,
    ) -> Result<Vec<String>, ProvisionError>;

    /// Retract previously created records. Every identifier is attempted;
    /// an identifier the provider no longer knows is treated as already
    /// retracted, so retrying the whole set is safe.
    async fn delete_records(&self, ids: &[String]) -> Result<(), ProvisionError>;
}

/// One record submitted to the provider; doubles as the request body.
#[derive(Debug, Clone, Serialize)]
struct RecordSpec {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: String,
    content: String,
    proxied: bool,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    success: bool,
    result: Option<RecordResult>,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    id: String,
}

enum RecordOutcome {
    Created,
    Canceled,
    Failed(ProvisionError),
}

/// HTTP implementation of [`DnsPublisher`] against a zone-scoped record API.
#[derive(Clone)]
pub struct DnsClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    zone_id: String,
    public_endpoint: String,
}

impl DnsClient {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        token: impl Into<String>,
        zone_id: impl Into<String>,
        public_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            zone_id: zone_id.into(),
            public_endpoint: public_endpoint.into(),
        }
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    fn record_specs(&self, bucket: &str, internal_path: &str, access_key: &str) -> [RecordSpec; 4] {
        [
            RecordSpec {
                record_type: "CNAME",
                name: bucket.to_string(),
                content: self.public_endpoint.clone(),
                proxied: true,
            },
            RecordSpec {
                record_type: "TXT",
                name: bucket.to_string(),
                content: TLS_MARKER.to_string(),
                proxied: false,
            },
            RecordSpec {
                record_type: "TXT",
                name: DISCOVERY_NAME.to_string(),
                content: format!("{ROOT_PREFIX}{internal_path}"),
                proxied: false,
            },
            RecordSpec {
                record_type: "TXT",
                name: DISCOVERY_NAME.to_string(),
                content: format!("{ACCESS_PREFIX}{access_key}"),
                proxied: false,
            },
        ]
    }

    async fn create_record(&self, spec: &RecordSpec) -> Result<String, ProvisionError> {
        let resp = self
            .http
            .post(self.records_url())
            .bearer_auth(&self.token)
            .json(spec)
            .send()
            .await
            .map_err(|err| ProvisionError::from(err).context("dns provider"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProvisionError::internal(format!(
                "dns provider returned {status} creating {} record `{}`",
                spec.record_type, spec.name
            )));
        }

        let envelope = resp
            .json::<RecordEnvelope>()
            .await
            .map_err(|err| ProvisionError::internal(format!("decoding dns response: {err}")))?;

        match envelope.result {
            Some(result) if envelope.success => Ok(result.id),
            _ => Err(ProvisionError::internal(format!(
                "dns provider rejected {} record `{}`",
                spec.record_type, spec.name
            ))),
        }
    }

    async fn delete_record(&self, id: &str) -> Result<(), ProvisionError> {
        let resp = self
            .http
            .delete(format!("{}/{}", self.records_url(), id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| ProvisionError::from(err).context("dns provider"))?;

        // An identifier the provider no longer knows is already retracted.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("dns record {id} already gone");
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(ProvisionError::internal(format!(
                "dns provider returned {} deleting record {id}",
                resp.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl DnsPublisher for DnsClient {
    async fn create_records(
        &self,
        bucket: &str,
        internal_path: &str,
        access_key: &str,
    ) -> Result<Vec<String>, ProvisionError> {
        let ids = Arc::new(Mutex::new(Vec::with_capacity(RECORD_COUNT)));
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for spec in self.record_specs(bucket, internal_path, access_key) {
            let client = self.clone();
            let ids = Arc::clone(&ids);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => RecordOutcome::Canceled,
                    res = client.create_record(&spec) => match res {
                        Ok(id) => {
                            ids.lock().await.push(id);
                            RecordOutcome::Created
                        }
                        Err(err) => {
                            cancel.cancel();
                            RecordOutcome::Failed(err)
                        }
                    },
                }
            });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RecordOutcome::Created | RecordOutcome::Canceled) => {}
                Ok(RecordOutcome::Failed(err)) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(ProvisionError::internal(format!(
                            "dns record task failed: {err}"
                        )));
                    }
                }
            }
        }

        if let Some(err) = first_err {
            return Err(err.context(format!("failed to create dns records for `{bucket}`")));
        }

        let ids = std::mem::take(&mut *ids.lock().await);
        debug!("created {} dns records for bucket {bucket}", ids.len());
        Ok(ids)
    }

    async fn delete_records(&self, ids: &[String]) -> Result<(), ProvisionError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        for id in ids {
            let client = self.clone();
            let id = id.clone();
            tasks.spawn(async move { client.delete_record(&id).await.map_err(|err| (id, err)) });
        }

        let total = ids.len();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((id, err))) => {
                    warn!("failed to delete dns record {id}: {err}");
                    failures.push(format!("{id}: {err}"));
                }
                Err(err) => failures.push(format!("task failure: {err}")),
            }
        }

        if !failures.is_empty() {
            return Err(ProvisionError::internal(format!(
                "failed to delete {} of {total} dns records: {}",
                failures.len(),
                failures.join("; ")
            )));
        }

        Ok(())
    }
}

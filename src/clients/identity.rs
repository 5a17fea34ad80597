//! Client for the external identity service that issues and revokes scoped
//! bucket credentials.
//!
//! The service exposes a single `/access-key` resource: `POST` issues a
//! credential for a (tenant, bucket) pair, `DELETE` revokes one. Status codes
//! collapse into the small shared taxonomy — 4xx on issue means a conflicting
//! credential already exists, everything else unexpected is internal.

use crate::errors::ProvisionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ACCESS_KEY_PATH: &str = "/access-key";

/// Descriptor of an issued credential. Only the key and a revocation
/// reference are kept; the secret itself never enters this process.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretRef")]
    pub secret_ref: String,
}

/// Issue/revoke capability the orchestrator depends on.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, tenant_id: &str, bucket: &str) -> Result<Credential, ProvisionError>;

    async fn revoke(
        &self,
        tenant_id: &str,
        access_key: &str,
        secret_ref: &str,
    ) -> Result<(), ProvisionError>;
}

/// HTTP implementation of [`CredentialIssuer`].
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    host: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct IssuePayload<'a> {
    #[serde(rename = "tenantID")]
    tenant_id: &'a str,
    #[serde(rename = "bucketName")]
    bucket_name: &'a str,
}

#[derive(Debug, Serialize)]
struct RevokePayload<'a> {
    #[serde(rename = "tenantID")]
    tenant_id: &'a str,
    #[serde(rename = "accessKey")]
    access_key: &'a str,
    #[serde(rename = "secretRef")]
    secret_ref: &'a str,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn access_key_url(&self) -> String {
        format!("{}{}", self.host, ACCESS_KEY_PATH)
    }
}

#[async_trait]
impl CredentialIssuer for IdentityClient {
    async fn issue(&self, tenant_id: &str, bucket: &str) -> Result<Credential, ProvisionError> {
        let resp = self
            .http
            .post(self.access_key_url())
            .header(reqwest::header::AUTHORIZATION, self.token.as_str())
            .json(&IssuePayload {
                tenant_id,
                bucket_name: bucket,
            })
            .send()
            .await
            .map_err(|err| ProvisionError::from(err).context("identity service"))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(ProvisionError::internal(format!(
                "identity service returned {status}"
            )));
        }
        if status.is_client_error() {
            return Err(ProvisionError::AlreadyExists(format!(
                "credential for bucket `{bucket}`"
            )));
        }

        let credential = resp
            .json::<Credential>()
            .await
            .map_err(|err| ProvisionError::internal(format!("decoding credential: {err}")))?;

        Ok(credential)
    }

    async fn revoke(
        &self,
        tenant_id: &str,
        access_key: &str,
        secret_ref: &str,
    ) -> Result<(), ProvisionError> {
        let resp = self
            .http
            .delete(self.access_key_url())
            .header(reqwest::header::AUTHORIZATION, self.token.as_str())
            .json(&RevokePayload {
                tenant_id,
                access_key,
                secret_ref,
            })
            .send()
            .await
            .map_err(|err| ProvisionError::from(err).context("identity service"))?;

        if !resp.status().is_success() {
            return Err(ProvisionError::internal(format!(
                "identity service returned {} on revoke",
                resp.status()
            )));
        }

        Ok(())
    }
}

//! Request-scoped side-channel for the policy endpoints.
//!
//! The S3-style policy surface has no parameter for the tenant id or the
//! internal bucket path, so the surrounding request layer attaches them here
//! and the orchestrator reads them back. The carrier holds exactly these two
//! immutable strings for the lifetime of one request; cancellation and
//! timeouts stay with the usual async machinery.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// Header carrying the resolved tenant identifier.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
/// Header carrying the internal bucket path used for discovery records.
pub const INTERNAL_PATH_HEADER: &str = "x-internal-bucket-path";

/// The two values the provisioning workflow needs beyond its typed
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub tenant_id: String,
    pub internal_path: String,
}

/// Single-slot carrier; empty unless the request layer populated both
/// fields.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    info: Option<RequestInfo>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the tenant id and internal bucket path, consuming the carrier.
    pub fn with_info(self, tenant_id: impl Into<String>, internal_path: impl Into<String>) -> Self {
        Self {
            info: Some(RequestInfo {
                tenant_id: tenant_id.into(),
                internal_path: internal_path.into(),
            }),
        }
    }

    /// The attached info, or `None` when the request layer never populated
    /// it. Absence is the caller's precondition failure, not ours.
    pub fn info(&self) -> Option<&RequestInfo> {
        self.info.as_ref()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        let path = parts
            .headers
            .get(INTERNAL_PATH_HEADER)
            .and_then(|v| v.to_str().ok());

        Ok(match (tenant, path) {
            (Some(tenant), Some(path)) => RequestContext::new().with_info(tenant, path),
            _ => RequestContext::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_has_no_info() {
        assert!(RequestContext::new().info().is_none());
    }

    #[test]
    fn with_info_round_trips_both_fields() {
        let ctx = RequestContext::new().with_info("tenant-1", "tenant-1/bucket-a");
        let info = ctx.info().expect("info should be present");
        assert_eq!(info.tenant_id, "tenant-1");
        assert_eq!(info.internal_path, "tenant-1/bucket-a");
    }
}

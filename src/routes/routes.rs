//! Defines routes for the bucket-policy provisioning surface.
//!
//! ## Structure
//! - **Policy endpoints**
//!   - `PUT    /{bucket}/policy` — provision a policy (credential + DNS + record)
//!   - `GET    /{bucket}/policy` — fetch the stored policy document
//!   - `DELETE /{bucket}/policy` — tear the provisioning down again
//!
//! - **Probes**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (metadata store)
//!
//! The policy endpoints expect the surrounding request layer to supply the
//! `x-tenant-id` and `x-internal-bucket-path` headers; without them the
//! service answers 412.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        policy_handlers::{delete_bucket_policy, get_bucket_policy, put_bucket_policy},
    },
    services::policy_service::PolicyService,
};
use axum::{
    Router,
    routing::{get, put},
};

/// Build and return the router for the whole service.
///
/// The router carries shared state (`PolicyService`) to all handlers.
pub fn routes() -> Router<PolicyService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // policy endpoints
        .route(
            "/{bucket}/policy",
            put(put_bucket_policy)
                .get(get_bucket_policy)
                .delete(delete_bucket_policy),
        )
}

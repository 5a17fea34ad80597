//! HTTP handlers for the bucket-policy endpoints.
//!
//! Thin translation layer: each handler pulls the request context carrier
//! off the request, hands the call to `PolicyService`, and maps the domain
//! error taxonomy onto HTTP statuses via `AppError`.

use crate::{context::RequestContext, errors::AppError, services::policy_service::PolicyService};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

/// PUT `/{bucket}/policy` — provision credential, DNS records, and the
/// stored bundle for the bucket.
pub async fn put_bucket_policy(
    State(service): State<PolicyService>,
    Path(bucket): Path<String>,
    ctx: RequestContext,
    Json(policy): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    service.set_bucket_policy(&ctx, &bucket, policy).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/{bucket}/policy` — return the stored policy document verbatim.
pub async fn get_bucket_policy(
    State(service): State<PolicyService>,
    Path(bucket): Path<String>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    let policy = service.get_bucket_policy(&ctx, &bucket).await?;
    Ok(Json(policy))
}

/// DELETE `/{bucket}/policy` — retract DNS records, revoke the credential,
/// and delete the stored bundle.
pub async fn delete_bucket_policy(
    State(service): State<PolicyService>,
    Path(bucket): Path<String>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, AppError> {
    service.delete_bucket_policy(&ctx, &bucket).await?;
    Ok(StatusCode::NO_CONTENT)
}

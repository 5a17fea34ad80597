//! HTTP handlers for the policy endpoints and the health probes.

pub mod health_handlers;
pub mod policy_handlers;

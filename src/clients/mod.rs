//! Narrow clients for the two external collaborators: the identity service
//! that issues scoped credentials and the DNS provider that publishes
//! discovery records. The orchestrator only sees the traits defined here.

pub mod dns;
pub mod identity;

//! Core data model for the bucket-policy provisioning service.
//!
//! The provisioning record is the durable outcome of attaching a policy to a
//! bucket. It maps cleanly to a database table via `sqlx::FromRow` and
//! serializes naturally as JSON via `serde`.

pub mod provisioning;

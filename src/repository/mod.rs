//! Durable storage for the credential/DNS/policy bundles.

pub mod provisioning_records;

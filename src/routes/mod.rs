//! Router composition for the service.

pub mod routes;

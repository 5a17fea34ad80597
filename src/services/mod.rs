//! Workflow layer tying the identity, DNS, and persistence seams together.

pub mod policy_service;

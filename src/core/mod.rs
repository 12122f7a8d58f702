//! Service core.
//!
//! Lifecycle contract, persisted status record, and the startup readiness
//! barrier shared by bridge implementations.

pub mod readiness;
pub mod service;
pub mod status;

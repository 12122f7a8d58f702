//! Observability
//!
//! Structured audit events for bridge lifecycle transitions.

pub mod audit;

//! Safety and cleanup
//!
//! Owns the host-side volumes the helpers rendezvous through and the lock that
//! serializes lifecycle calls per owner.

pub mod lock;
pub mod volumes;

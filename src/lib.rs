//! xbridge: X11 display bridging for sandboxed desktop applications
//!
//! An untrusted application never talks to the host X server. Instead it
//! connects to an xpra server running in an untrusted helper sandbox, and a
//! trusted xpra client relays that display to the host.
//!
//! # Architecture
//!
//! ## Bridge ([`bridge`])
//! - [`bridge::xpra`]: Helper provisioning and the server/client start protocol
//! - [`bridge::args`]: GUI permissions to proxy command-line switches
//! - [`bridge::naming`]: Helper sandbox naming
//! - [`bridge::registry`]: Bridge selection from configuration
//!
//! ## Lifecycle ([`core`])
//! - [`core::service`]: The `Service` trait and bridge state machine
//! - [`core::readiness`]: Display socket readiness barrier with cancellation
//! - [`core::status`]: Persistent process handle record
//!
//! ## Collaborators
//! - [`registry`]: Sandbox registry seam and a JSON-backed implementation
//! - [`runtime`]: Container runtime seam and the docker CLI implementation
//!
//! ## Safety ([`safety`])
//! - [`safety::volumes`]: Ephemeral per-owner volume directories
//! - [`safety::lock`]: Per-owner exclusive lock around start and stop
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured lifecycle events
//!
//! ## Configuration ([`config`])
//! - [`config::loader`]: bridge.json loading and validation
//! - [`config::types`]: Shared types and the error enum

pub mod bridge;
pub mod cli;
pub mod config;
pub mod core;
pub mod observability;
pub mod registry;
pub mod runtime;
pub mod safety;
pub mod testing;

pub use bridge::{bridge_for, BridgeContext, BridgeRegistry, XpraBridge};
pub use config::loader::BridgeConfig;
pub use config::types::{BridgeError, Result};
pub use self::core::service::{BridgeState, Service};
pub use self::core::status::ServiceStatus;

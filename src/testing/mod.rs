//! Testing infrastructure
//!
//! In-process doubles for the runtime and registry seams, shared by unit and
//! integration tests.

pub mod counting_registry;
pub mod fake_runtime;

pub use counting_registry::CountingRegistry;
pub use fake_runtime::{FakeRuntime, RecordedLaunch};

//! Configuration
//!
//! Bridge settings and the shared error taxonomy.

pub mod loader;
pub mod types;

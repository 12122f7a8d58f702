//! Display bridges between untrusted sandboxes and the host X server.

pub mod args;
pub mod naming;
pub mod registry;
pub mod xpra;

use crate::config::loader::BridgeConfig;
use crate::core::readiness::CancelToken;
use crate::registry::SandboxRegistry;
use crate::runtime::ContainerRuntime;
use std::sync::Arc;

pub use registry::{bridge_for, BridgeRegistry};
pub use xpra::XpraBridge;

/// Collaborators shared by every bridge built for one invocation.
#[derive(Clone)]
pub struct BridgeContext {
    pub config: BridgeConfig,
    pub registry: Arc<dyn SandboxRegistry>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub cancel: CancelToken,
}

impl BridgeContext {
    pub fn new(
        config: BridgeConfig,
        registry: Arc<dyn SandboxRegistry>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            config,
            registry,
            runtime,
            cancel: CancelToken::new(),
        }
    }
}

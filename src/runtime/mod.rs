//! Container runtime seam.
//!
//! The bridge launches helper sandboxes as background processes and later
//! inspects or stops them through opaque handles.

pub mod docker;

use crate::config::types::Result;
use crate::registry::SandboxRecord;
use serde::{Deserialize, Serialize};

/// Arguments and environment for one helper process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Return as soon as the process exists instead of waiting for it to exit
    pub background: bool,
}

impl LaunchRequest {
    pub fn background(args: Vec<String>) -> Self {
        Self {
            args,
            env: Vec::new(),
            background: true,
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Metadata reported by the runtime for a launched process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    /// Network hostname peers use to reach the container
    pub hostname: String,
}

/// Opaque reference to a launched helper process.
pub trait ProcessHandle: Send {
    fn id(&self) -> &str;
    /// `None` when the process cannot be found or inspection failed.
    fn inspect(&self) -> Option<ContainerInfo>;
    fn stop(&self) -> Result<()>;
}

pub trait ContainerRuntime: Send + Sync {
    fn launch(&self, sandbox: &SandboxRecord, request: &LaunchRequest)
        -> Result<Box<dyn ProcessHandle>>;
    /// Handle for a process launched earlier, possibly by another invocation.
    fn handle(&self, id: &str) -> Box<dyn ProcessHandle>;
}

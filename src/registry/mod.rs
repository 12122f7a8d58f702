//! Sandbox registry seam.
//!
//! The registry resolves logical sandbox names to their image source and
//! permission set. The bridge consumes it only through [`SandboxRegistry`].

pub mod json;

use crate::config::types::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Repository/name pair identifying where a sandbox image comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    pub repository: String,
    pub name: String,
}

impl ImageSource {
    pub fn new(repository: &str, name: &str) -> Self {
        Self {
            repository: repository.to_string(),
            name: name.to_string(),
        }
    }
}

/// GUI capabilities an owning sandbox may expose through the bridge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GuiPermissions {
    pub system_tray: bool,
    pub cursors: bool,
    pub clipboard: bool,
}

/// Declarative permission set of one sandbox.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SandboxPermissions {
    /// Host path -> container path mounts
    #[serde(default)]
    pub system_dirs: BTreeMap<PathBuf, PathBuf>,
    #[serde(default)]
    pub gui: GuiPermissions,
}

/// One registered sandbox.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SandboxRecord {
    pub name: String,
    #[serde(default)]
    pub image_source: Option<ImageSource>,
    /// Built image reference, when known
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub permissions: SandboxPermissions,
    /// Internal helper sandboxes this sandbox depends on
    #[serde(default)]
    pub service_helpers: BTreeSet<String>,
}

impl SandboxRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Image reference to launch: the built image if present, else the source name.
    pub fn image(&self) -> Option<&str> {
        self.image_id
            .as_deref()
            .or_else(|| self.image_source.as_ref().map(|source| source.name.as_str()))
    }
}

/// Registry contract consumed by the bridge.
pub trait SandboxRegistry: Send + Sync {
    fn contains(&self, name: &str) -> bool;
    fn resolve(&self, name: &str) -> Result<SandboxRecord>;
    fn create_from_image_source(&self, name: &str, source: &ImageSource) -> Result<()>;
    fn register_service_dependency(&self, owner: &str, helper: &str) -> Result<()>;
    fn verify_all(&self) -> Result<()>;
    fn save_permissions(&self, name: &str, permissions: &SandboxPermissions) -> Result<()>;
    /// Suppress the registry's own progress output.
    fn silence_output(&self);
}

/// Read/mutate/commit transaction over one sandbox's permissions.
///
/// Changes only reach the registry through [`PermissionEdit::persist`]; dropping
/// the edit discards them.
pub struct PermissionEdit<'r> {
    registry: &'r dyn SandboxRegistry,
    sandbox: String,
    permissions: SandboxPermissions,
}

impl<'r> PermissionEdit<'r> {
    pub fn begin(registry: &'r dyn SandboxRegistry, sandbox: &str) -> Result<Self> {
        let record = registry.resolve(sandbox)?;
        Ok(Self {
            registry,
            sandbox: sandbox.to_string(),
            permissions: record.permissions,
        })
    }

    pub fn permissions(&self) -> &SandboxPermissions {
        &self.permissions
    }

    pub fn permissions_mut(&mut self) -> &mut SandboxPermissions {
        &mut self.permissions
    }

    pub fn persist(self) -> Result<()> {
        log::debug!("Persisting permissions of {}", self.sandbox);
        self.registry.save_permissions(&self.sandbox, &self.permissions)
    }
}

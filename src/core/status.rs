use crate::config::types::{HelperRole, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

pub const SERVER_KEY: &str = "xpra-server-service-cid";
pub const CLIENT_KEY: &str = "xpra-client-service-cid";

/// Persisted service status: the process handles needed to stop a started
/// bridge, possibly from another process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceStatus(BTreeMap<String, String>);

impl ServiceStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(role: HelperRole) -> &'static str {
        match role {
            HelperRole::Server => SERVER_KEY,
            HelperRole::Client => CLIENT_KEY,
        }
    }

    pub fn handle(&self, role: HelperRole) -> Option<&str> {
        self.0
            .get(Self::key(role))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn set_handle(&mut self, role: HelperRole, id: &str) {
        self.0.insert(Self::key(role).to_string(), id.to_string());
    }

    pub fn take_handle(&mut self, role: HelperRole) -> Option<String> {
        self.0.remove(Self::key(role)).filter(|id| !id.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Load from `path`; a missing file is an empty status.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Delete the record at `path`. Best-effort.
    pub fn discard(path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove status record {}: {}", path.display(), e);
            }
        }
    }
}

/// JSON-backed sandbox registry
///
/// Keeps the whole registry in memory and, when opened on a file, rewrites the
/// file after every mutation. A mutation becomes visible only once it is on disk.
use crate::config::types::{BridgeError, Result};
use crate::registry::{ImageSource, SandboxPermissions, SandboxRecord, SandboxRegistry};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RegistryState {
    #[serde(default)]
    sandboxes: BTreeMap<String, SandboxRecord>,
}

pub struct JsonRegistry {
    path: Option<PathBuf>,
    state: Mutex<RegistryState>,
    quiet: AtomicBool,
}

impl JsonRegistry {
    /// Registry that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(RegistryState::default()),
            quiet: AtomicBool::new(false),
        }
    }

    /// Open the registry stored at `path`; a missing file opens empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                BridgeError::Registry(format!(
                    "Failed to parse registry {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            quiet: AtomicBool::new(false),
        })
    }

    /// Register or replace a sandbox record.
    pub fn insert(&self, record: SandboxRecord) -> Result<()> {
        self.commit(|state| {
            state.sandboxes.insert(record.name.clone(), record);
            Ok(())
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().sandboxes.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the state, flush the copy, then swap it in.
    fn commit<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut RegistryState) -> Result<()>,
    {
        let mut state = self.lock();
        let mut next = state.clone();
        change(&mut next)?;
        self.flush(&next)?;
        *state = next;
        Ok(())
    }

    fn flush(&self, state: &RegistryState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn progress(&self, message: &str) {
        if self.quiet.load(Ordering::Relaxed) {
            debug!("{}", message);
        } else {
            info!("{}", message);
        }
    }
}

impl SandboxRegistry for JsonRegistry {
    fn contains(&self, name: &str) -> bool {
        self.lock().sandboxes.contains_key(name)
    }

    fn resolve(&self, name: &str) -> Result<SandboxRecord> {
        self.lock()
            .sandboxes
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownSandbox(name.to_string()))
    }

    fn create_from_image_source(&self, name: &str, source: &ImageSource) -> Result<()> {
        self.commit(|state| {
            if state.sandboxes.contains_key(name) {
                return Err(BridgeError::Registry(format!(
                    "Sandbox {} is already registered",
                    name
                )));
            }
            let mut record = SandboxRecord::new(name);
            record.image_source = Some(source.clone());
            state.sandboxes.insert(name.to_string(), record);
            Ok(())
        })?;
        self.progress(&format!(
            "Added {} from {}/{}",
            name, source.repository, source.name
        ));
        Ok(())
    }

    fn register_service_dependency(&self, owner: &str, helper: &str) -> Result<()> {
        self.commit(|state| {
            let record = state
                .sandboxes
                .get_mut(owner)
                .ok_or_else(|| BridgeError::UnknownSandbox(owner.to_string()))?;
            record.service_helpers.insert(helper.to_string());
            Ok(())
        })
    }

    fn verify_all(&self) -> Result<()> {
        let state = self.lock();
        let mut problems = Vec::new();

        for record in state.sandboxes.values() {
            for helper in &record.service_helpers {
                match state.sandboxes.get(helper) {
                    None => problems.push(format!(
                        "{} depends on unregistered helper {}",
                        record.name, helper
                    )),
                    Some(helper_record) if helper_record.image_source.is_none() => problems.push(
                        format!("helper {} has no image source", helper_record.name),
                    ),
                    Some(_) => {}
                }
            }
        }

        if !problems.is_empty() {
            return Err(BridgeError::Verification(problems.join("; ")));
        }

        self.progress(&format!("Verified {} sandboxes", state.sandboxes.len()));
        Ok(())
    }

    fn save_permissions(&self, name: &str, permissions: &SandboxPermissions) -> Result<()> {
        self.commit(|state| {
            let record = state
                .sandboxes
                .get_mut(name)
                .ok_or_else(|| BridgeError::UnknownSandbox(name.to_string()))?;
            record.permissions = permissions.clone();
            Ok(())
        })
    }

    fn silence_output(&self) {
        self.quiet.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_twice_is_rejected() {
        let registry = JsonRegistry::in_memory();
        let source = ImageSource::new("default", "subuser-internal-xpra-server");
        registry.create_from_image_source("helper", &source).unwrap();
        assert!(registry.contains("helper"));
        assert!(registry.create_from_image_source("helper", &source).is_err());
    }

    #[test]
    fn test_verify_reports_dangling_dependency() {
        let registry = JsonRegistry::in_memory();
        registry.insert(SandboxRecord::new("browser")).unwrap();
        registry
            .register_service_dependency("browser", "missing-helper")
            .unwrap();

        match registry.verify_all() {
            Err(BridgeError::Verification(details)) => assert!(details.contains("missing-helper")),
            other => panic!("expected verification failure, got {:?}", other),
        }
    }

    #[test]
    fn test_file_registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("registry.json");

        let registry = JsonRegistry::open(&path).unwrap();
        registry.insert(SandboxRecord::new("browser")).unwrap();
        let mut permissions = SandboxPermissions::default();
        permissions.gui.cursors = true;
        registry.save_permissions("browser", &permissions).unwrap();
        drop(registry);

        let reopened = JsonRegistry::open(&path).unwrap();
        assert_eq!(reopened.names(), vec!["browser".to_string()]);
        assert!(reopened.resolve("browser").unwrap().permissions.gui.cursors);
    }

    #[test]
    fn test_dependency_on_unknown_owner_fails() {
        let registry = JsonRegistry::in_memory();
        assert!(matches!(
            registry.register_service_dependency("ghost", "helper"),
            Err(BridgeError::UnknownSandbox(_))
        ));
    }

    #[test]
    fn test_failed_flush_leaves_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("state");
        let registry = JsonRegistry::open(parent.join("registry.json")).unwrap();
        // A regular file where the registry directory should be makes every flush fail.
        std::fs::write(&parent, b"").unwrap();

        let source = ImageSource::new("default", "subuser-internal-xpra-server");
        assert!(registry.create_from_image_source("helper", &source).is_err());
        assert!(!registry.contains("helper"));
        assert!(registry.insert(SandboxRecord::new("browser")).is_err());
        assert!(registry.names().is_empty());
    }
}

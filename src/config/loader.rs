/// Configuration loading from bridge.json
use crate::config::types::{BridgeError, DisplayIndex, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Full bridge.json structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BridgeConfig {
    /// Root under which per-service volumes are created
    pub volumes_dir: PathBuf,
    /// Name of the bridge implementation to use
    pub x11_bridge: String,
    /// Display number served by the proxy server
    pub display: DisplayIndex,
    /// Home directory path as seen from inside the helper containers
    pub helper_home: PathBuf,
    /// Interval between readiness marker checks
    pub readiness_poll_ms: u64,
    /// Upper bound on the readiness wait; `None` waits forever
    pub readiness_timeout_ms: Option<u64>,
    /// JSON file backing the sandbox registry
    pub registry_path: PathBuf,
    /// Container runtime executable
    pub docker_binary: PathBuf,
}

impl BridgeConfig {
    /// Per-user state root, scoped by effective UID so root and non-root runs never collide.
    pub fn state_root_dir() -> PathBuf {
        let euid = nix::unistd::geteuid();
        std::env::temp_dir().join(format!("xbridge-uid-{}", euid))
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: BridgeConfig = serde_json::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.x11_bridge.trim().is_empty() {
            return Err(BridgeError::Config(
                "x11-bridge must name a bridge implementation".to_string(),
            ));
        }
        if self.readiness_poll_ms == 0 {
            return Err(BridgeError::Config(
                "readiness-poll-ms must be greater than zero".to_string(),
            ));
        }
        if !self.volumes_dir.is_absolute() {
            return Err(BridgeError::Config(format!(
                "volumes-dir must be an absolute path: {}",
                self.volumes_dir.display()
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let state_root = Self::state_root_dir();
        Self {
            volumes_dir: state_root.join("volumes"),
            x11_bridge: "xpra".to_string(),
            display: DisplayIndex::default(),
            helper_home: std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/home")),
            readiness_poll_ms: 50,
            readiness_timeout_ms: Some(30_000),
            registry_path: state_root.join("registry.json"),
            docker_binary: PathBuf::from("docker"),
        }
    }
}

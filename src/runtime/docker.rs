/// Docker CLI runtime adapter
///
/// Helper sandboxes run as detached containers. `system-dirs` permissions
/// become bind mounts.
use crate::config::types::{BridgeError, Result};
use crate::registry::SandboxRecord;
use crate::runtime::{ContainerInfo, ContainerRuntime, LaunchRequest, ProcessHandle};
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new<P: AsRef<Path>>(binary: P) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
        }
    }

    /// Full `docker` argument vector for launching `sandbox`.
    pub fn run_arguments(sandbox: &SandboxRecord, request: &LaunchRequest) -> Result<Vec<String>> {
        let image = sandbox.image().ok_or_else(|| BridgeError::Launch {
            sandbox: sandbox.name.clone(),
            reason: "sandbox has no image".to_string(),
        })?;

        let mut args = vec!["run".to_string(), "--detach".to_string(), "--rm".to_string()];
        for (host, container) in &sandbox.permissions.system_dirs {
            args.push("--volume".to_string());
            args.push(format!("{}:{}", host.display(), container.display()));
        }
        for (key, value) in &request.env {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(image.to_string());
        args.extend(request.args.iter().cloned());
        Ok(args)
    }
}

impl ContainerRuntime for DockerCli {
    fn launch(
        &self,
        sandbox: &SandboxRecord,
        request: &LaunchRequest,
    ) -> Result<Box<dyn ProcessHandle>> {
        if !request.background {
            return Err(BridgeError::Launch {
                sandbox: sandbox.name.clone(),
                reason: "foreground launches are not supported by the docker adapter".to_string(),
            });
        }

        let args = Self::run_arguments(sandbox, request)?;
        debug!("{} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BridgeError::Launch {
                sandbox: sandbox.name.clone(),
                reason: format!("failed to execute {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(BridgeError::Launch {
                sandbox: sandbox.name.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(BridgeError::Launch {
                sandbox: sandbox.name.clone(),
                reason: "runtime returned no container id".to_string(),
            });
        }

        Ok(self.handle(&id))
    }

    fn handle(&self, id: &str) -> Box<dyn ProcessHandle> {
        Box::new(DockerContainer {
            binary: self.binary.clone(),
            id: id.to_string(),
        })
    }
}

struct DockerContainer {
    binary: PathBuf,
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    config: InspectConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    hostname: String,
}

/// Parse `docker inspect` output; `None` on anything but a single well-formed entry.
fn parse_inspect(stdout: &str) -> Option<ContainerInfo> {
    let mut entries: Vec<InspectEntry> = serde_json::from_str(stdout).ok()?;
    if entries.len() != 1 {
        return None;
    }
    let entry = entries.pop()?;
    Some(ContainerInfo {
        id: entry.id,
        hostname: entry.config.hostname,
    })
}

impl ProcessHandle for DockerContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn inspect(&self) -> Option<ContainerInfo> {
        let output = Command::new(&self.binary)
            .args(["inspect", self.id.as_str()])
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) if output.status.success() => {
                parse_inspect(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(
                    "inspect {} failed: {}",
                    self.id,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                warn!("Failed to execute {}: {}", self.binary.display(), e);
                None
            }
        }
    }

    fn stop(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(["stop", self.id.as_str()])
            .stdin(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(BridgeError::Process(format!(
                "Failed to stop {}: {}",
                self.id,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

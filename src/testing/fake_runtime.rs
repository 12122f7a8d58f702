/// Container runtime double
///
/// Records every launch and stop. A launched proxy server binds its display
/// marker in whichever host directory is mounted at the X11 socket path, the
/// way the real server does once it accepts connections.
use crate::bridge::xpra::X11_SOCKET_DIR;
use crate::config::types::{BridgeError, Result};
use crate::registry::SandboxRecord;
use crate::runtime::{ContainerInfo, ContainerRuntime, LaunchRequest, ProcessHandle};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Debug)]
pub struct RecordedLaunch {
    pub sandbox: String,
    pub request: LaunchRequest,
    pub id: String,
}

#[derive(Debug, Default)]
struct FakeState {
    launches: Vec<RecordedLaunch>,
    stops: Vec<String>,
    next_id: u64,
}

#[derive(Clone, Copy, Debug)]
struct Behavior {
    bind_marker: bool,
    inspect_fails: bool,
    stop_fails: bool,
}

pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
    behavior: Behavior,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            behavior: Behavior {
                bind_marker: true,
                inspect_fails: false,
                stop_fails: false,
            },
        }
    }

    /// Servers never create their display marker.
    pub fn without_readiness(mut self) -> Self {
        self.behavior.bind_marker = false;
        self
    }

    pub fn with_failing_inspect(mut self) -> Self {
        self.behavior.inspect_fails = true;
        self
    }

    pub fn with_failing_stop(mut self) -> Self {
        self.behavior.stop_fails = true;
        self
    }

    /// Hostname reported for the process `id`.
    pub fn hostname_for(id: &str) -> String {
        format!("{}.containers.test", id)
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        lock(&self.state).launches.clone()
    }

    pub fn stops(&self) -> Vec<String> {
        lock(&self.state).stops.clone()
    }

    fn handle_for(&self, id: &str) -> FakeHandle {
        FakeHandle {
            id: id.to_string(),
            state: Arc::clone(&self.state),
            behavior: self.behavior,
        }
    }
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create `X<n>` for a server started on display `:<n>`.
fn bind_display_marker(sandbox: &SandboxRecord, request: &LaunchRequest) -> Result<()> {
    if request.args.first().map(String::as_str) != Some("start") {
        return Ok(());
    }
    let Some(display) = request.args.last().and_then(|a| a.strip_prefix(':')) else {
        return Ok(());
    };
    let socket_dir = sandbox
        .permissions
        .system_dirs
        .iter()
        .find(|(_, inside)| inside.as_path() == Path::new(X11_SOCKET_DIR))
        .map(|(host, _)| host);

    if let Some(dir) = socket_dir {
        std::fs::write(dir.join(format!("X{}", display)), b"")?;
    }
    Ok(())
}

impl ContainerRuntime for FakeRuntime {
    fn launch(
        &self,
        sandbox: &SandboxRecord,
        request: &LaunchRequest,
    ) -> Result<Box<dyn ProcessHandle>> {
        if !request.background {
            return Err(BridgeError::Launch {
                sandbox: sandbox.name.clone(),
                reason: "only background launches are supported".to_string(),
            });
        }

        let id = {
            let mut state = lock(&self.state);
            state.next_id += 1;
            let id = format!("fake-{:04}", state.next_id);
            state.launches.push(RecordedLaunch {
                sandbox: sandbox.name.clone(),
                request: request.clone(),
                id: id.clone(),
            });
            id
        };

        if self.behavior.bind_marker {
            bind_display_marker(sandbox, request)?;
        }
        Ok(Box::new(self.handle_for(&id)))
    }

    fn handle(&self, id: &str) -> Box<dyn ProcessHandle> {
        Box::new(self.handle_for(id))
    }
}

struct FakeHandle {
    id: String,
    state: Arc<Mutex<FakeState>>,
    behavior: Behavior,
}

impl ProcessHandle for FakeHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn inspect(&self) -> Option<ContainerInfo> {
        if self.behavior.inspect_fails {
            return None;
        }
        Some(ContainerInfo {
            id: self.id.clone(),
            hostname: FakeRuntime::hostname_for(&self.id),
        })
    }

    fn stop(&self) -> Result<()> {
        lock(&self.state).stops.push(self.id.clone());
        if self.behavior.stop_fails {
            return Err(BridgeError::Process(format!("{} refused to stop", self.id)));
        }
        Ok(())
    }
}

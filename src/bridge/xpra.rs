//! Xpra-based X11 bridge.
//!
//! ```text
//!   -------------                      -------------
//!   |desktop app| <--/tmp/.X11-unix--> |xpra server|    Untrusted
//!   -------------                      -------------
//!                                            ^
//!                                            | shared xpra home
//!                                            v
//!   -------------                       -------------
//!   | host      |  <--/tmp/.X11-unix--> |xpra client|   Trusted
//!   -------------                       -------------
//! ```
//!
//! Three sandboxes take part: the untrusted application, an untrusted xpra
//! server and a trusted xpra client. The application never reaches the host
//! display server directly.

use crate::bridge::args::{self, SOCKET_HOSTNAME_ENV};
use crate::bridge::naming::{HelperNaming, ServiceHelperNaming};
use crate::bridge::BridgeContext;
use crate::config::types::{BridgeError, DisplayIndex, HelperRole, Result};
use crate::core::readiness::{self, CancelToken, ReadinessWatcher};
use crate::core::service::{BridgeState, Service};
use crate::core::status::ServiceStatus;
use crate::observability::audit::{self, BridgeEventType};
use crate::registry::{ImageSource, PermissionEdit, SandboxRegistry};
use crate::runtime::{ContainerRuntime, LaunchRequest};
use crate::safety::lock::OwnerLock;
use crate::safety::volumes::{self, VolumeLayout};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const SERVICE_NAME: &str = "xpra";

/// Where the X11 socket directory appears inside the server container.
pub const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";

const IMAGE_REPOSITORY: &str = "default";

fn image_source(role: HelperRole) -> ImageSource {
    match role {
        HelperRole::Server => ImageSource::new(IMAGE_REPOSITORY, "subuser-internal-xpra-server"),
        HelperRole::Client => ImageSource::new(IMAGE_REPOSITORY, "subuser-internal-xpra-client"),
    }
}

pub struct XpraBridge {
    owner: String,
    naming: Arc<dyn HelperNaming>,
    registry: Arc<dyn SandboxRegistry>,
    runtime: Arc<dyn ContainerRuntime>,
    volumes: VolumeLayout,
    watcher: ReadinessWatcher,
    display: DisplayIndex,
    helper_home: PathBuf,
    cancel: CancelToken,
    state: Mutex<BridgeState>,
}

impl XpraBridge {
    /// Fails when `owner` is not usable as a single volume path component.
    pub fn new(owner: &str, ctx: &BridgeContext) -> Result<Self> {
        volumes::validate_owner(owner)?;
        Ok(Self {
            owner: owner.to_string(),
            naming: Arc::new(ServiceHelperNaming::new(SERVICE_NAME)),
            registry: Arc::clone(&ctx.registry),
            runtime: Arc::clone(&ctx.runtime),
            volumes: VolumeLayout::new(&ctx.config.volumes_dir, SERVICE_NAME),
            watcher: ReadinessWatcher::new(
                ctx.config.poll_interval(),
                ctx.config.readiness_timeout(),
            ),
            display: ctx.config.display,
            helper_home: ctx.config.helper_home.clone(),
            cancel: ctx.cancel.clone(),
            state: Mutex::new(BridgeState::Unconfigured),
        })
    }

    pub fn with_naming(mut self, naming: Arc<dyn HelperNaming>) -> Self {
        self.naming = naming;
        self
    }

    pub fn helper_name(&self, role: HelperRole) -> String {
        self.naming.helper_name(&self.owner, role)
    }

    pub fn volumes(&self) -> &VolumeLayout {
        &self.volumes
    }

    /// State guard with `Unconfigured` upgraded once setup is complete, which
    /// may have happened in another process.
    fn current_state(&self) -> MutexGuard<'_, BridgeState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == BridgeState::Unconfigured && self.is_setup() {
            *state = BridgeState::Configured;
        }
        state
    }

    /// Compare-and-swap into `Running`; rejects a second or premature start.
    fn claim_start(&self) -> Result<()> {
        let mut state = self.current_state();
        match *state {
            s if s.can_start() => {
                *state = BridgeState::Running;
                Ok(())
            }
            BridgeState::Running => Err(BridgeError::AlreadyRunning {
                owner: self.owner.clone(),
            }),
            _ => Err(BridgeError::NotSetup {
                owner: self.owner.clone(),
            }),
        }
    }

    fn set_state(&self, next: BridgeState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Host to container mounts `role` needs for this owner.
    fn required_system_dirs(&self, role: HelperRole) -> BTreeMap<PathBuf, PathBuf> {
        let paths = self.volumes.paths(&self.owner);
        match role {
            HelperRole::Server => BTreeMap::from([
                (paths.socket_dir, PathBuf::from(X11_SOCKET_DIR)),
                (paths.shared_home, self.helper_home.clone()),
            ]),
            HelperRole::Client => BTreeMap::from([(paths.shared_home, self.helper_home.clone())]),
        }
    }

    /// Registered and carrying exactly the mounts `role` needs.
    fn helper_configured(&self, role: HelperRole) -> bool {
        self.registry
            .resolve(&self.helper_name(role))
            .map(|record| record.permissions.system_dirs == self.required_system_dirs(role))
            .unwrap_or(false)
    }

    fn grant_system_dirs(&self, role: HelperRole) -> Result<()> {
        let mut edit = PermissionEdit::begin(self.registry.as_ref(), &self.helper_name(role))?;
        edit.permissions_mut().system_dirs = self.required_system_dirs(role);
        edit.persist()
    }

    fn launch_pair(&self, run_id: Uuid, status: &mut ServiceStatus) -> Result<()> {
        self.clean_up_for(run_id);
        let paths = self.volumes.provision(&self.owner)?;
        // A socket dir that survived cleanup may still hold the previous server's marker.
        readiness::clear_marker(&paths.socket_dir, self.display)?;

        let gui = self.registry.resolve(&self.owner)?.permissions.gui;
        let permission_args = args::translate(&gui);

        let server_sandbox = self.registry.resolve(&self.helper_name(HelperRole::Server))?;
        let request =
            LaunchRequest::background(args::server_args(&permission_args, self.display));
        let server = self.runtime.launch(&server_sandbox, &request)?;
        status.set_handle(HelperRole::Server, server.id());
        audit::record(
            run_id,
            &self.owner,
            BridgeEventType::ServerLaunched,
            Some(server.id().to_string()),
        );

        let waited = self
            .watcher
            .await_ready(&paths.socket_dir, self.display, &self.cancel)?;
        audit::record(
            run_id,
            &self.owner,
            BridgeEventType::ServerReady,
            Some(format!("waited {}ms", waited.as_millis())),
        );

        let server_info = server.inspect().ok_or_else(|| BridgeError::ServerInspection {
            container_id: server.id().to_string(),
        })?;

        let client_sandbox = self.registry.resolve(&self.helper_name(HelperRole::Client))?;
        let request = LaunchRequest::background(args::client_args(&permission_args))
            .with_env(SOCKET_HOSTNAME_ENV, &server_info.hostname);
        let client = self.runtime.launch(&client_sandbox, &request)?;
        status.set_handle(HelperRole::Client, client.id());
        audit::record(
            run_id,
            &self.owner,
            BridgeEventType::ClientLaunched,
            Some(client.id().to_string()),
        );

        Ok(())
    }

    fn stop_helper(&self, run_id: Uuid, role: HelperRole, id: Option<String>) {
        let Some(id) = id else {
            warn!("No {} process recorded for {}; nothing to stop", role, self.owner);
            audit::record(
                run_id,
                &self.owner,
                BridgeEventType::StopSkipped,
                Some(format!("missing {} handle", role)),
            );
            return;
        };

        match self.runtime.handle(&id).stop() {
            Ok(()) => {
                debug!("Stopped {} process {}", role, id);
                audit::record(run_id, &self.owner, BridgeEventType::ProcessStopped, Some(id));
            }
            Err(e) => {
                warn!("Failed to stop {} process {}: {}", role, id, e);
                audit::record(
                    run_id,
                    &self.owner,
                    BridgeEventType::StopSkipped,
                    Some(format!("{}: {}", id, e)),
                );
            }
        }
    }

    fn clean_up_for(&self, run_id: Uuid) {
        for path in self.volumes.deprovision(&self.owner) {
            audit::record(
                run_id,
                &self.owner,
                BridgeEventType::CleanupFailure,
                Some(path.display().to_string()),
            );
        }
    }
}

impl Service for XpraBridge {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn state(&self) -> BridgeState {
        *self.current_state()
    }

    /// Both helpers exist and hold the mounts for the current volume layout.
    fn is_setup(&self) -> bool {
        self.helper_configured(HelperRole::Server) && self.helper_configured(HelperRole::Client)
    }

    fn setup(&self) -> Result<()> {
        if self.is_setup() {
            debug!("Bridge for {} already set up", self.owner);
            let mut state = self.current_state();
            if *state == BridgeState::Unconfigured {
                *state = BridgeState::Configured;
            }
            return Ok(());
        }

        self.registry.silence_output();
        for role in [HelperRole::Server, HelperRole::Client] {
            let name = self.helper_name(role);
            // Only missing helpers are created; a retry after any partial failure
            // re-runs registration, verification and grants for existing ones.
            if !self.registry.contains(&name) {
                self.registry.create_from_image_source(&name, &image_source(role))?;
            }
            self.registry.register_service_dependency(&self.owner, &name)?;
        }
        self.registry.verify_all()?;

        self.grant_system_dirs(HelperRole::Server)?;
        self.grant_system_dirs(HelperRole::Client)?;

        self.set_state(BridgeState::Configured);
        audit::record(Uuid::new_v4(), &self.owner, BridgeEventType::SetupComplete, None);
        info!("Bridge for {} set up", self.owner);
        Ok(())
    }

    fn start(&self, status: &mut ServiceStatus) -> Result<()> {
        let _lock = OwnerLock::acquire(&self.volumes.owner_dir(&self.owner))?;
        self.claim_start()?;

        let run_id = Uuid::new_v4();
        match self.launch_pair(run_id, status) {
            Ok(()) => {
                info!("Bridge for {} running on display {}", self.owner, self.display);
                Ok(())
            }
            Err(e) => {
                audit::record(
                    run_id,
                    &self.owner,
                    BridgeEventType::StartFailed,
                    Some(e.to_string()),
                );
                self.set_state(BridgeState::Configured);
                Err(e)
            }
        }
    }

    fn stop(&self, status: &mut ServiceStatus) -> Result<()> {
        let _lock = OwnerLock::acquire(&self.volumes.owner_dir(&self.owner))?;
        let run_id = Uuid::new_v4();

        // Client first: it must disconnect before its server disappears.
        self.stop_helper(run_id, HelperRole::Client, status.take_handle(HelperRole::Client));
        self.stop_helper(run_id, HelperRole::Server, status.take_handle(HelperRole::Server));
        self.clean_up_for(run_id);

        let mut state = self.current_state();
        if *state != BridgeState::Unconfigured {
            *state = BridgeState::Stopped;
        }
        info!("Bridge for {} stopped", self.owner);
        Ok(())
    }

    /// Skipped while another `start` or `stop` holds the owner lock.
    fn clean_up(&self) {
        let run_id = Uuid::new_v4();
        let _lock = match OwnerLock::acquire(&self.volumes.owner_dir(&self.owner)) {
            Ok(lock) => Some(lock),
            Err(BridgeError::LockBusy { path }) => {
                warn!("{} is held; leaving volumes of {} in place", path.display(), self.owner);
                audit::record(
                    run_id,
                    &self.owner,
                    BridgeEventType::CleanupFailure,
                    Some(format!("lock busy: {}", path.display())),
                );
                return;
            }
            Err(e) => {
                warn!("Cleaning up {} without lock: {}", self.owner, e);
                None
            }
        };
        self.clean_up_for(run_id);
    }
}

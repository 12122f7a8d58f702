/// Per-owner bridge volumes
///
/// Two directories per owning sandbox, both ephemeral:
/// - the server-side X11 socket directory, mounted at `/tmp/.X11-unix`
/// - the shared proxy home, mounted as home into both helpers
///
/// They are recreated on every start and removed on every cleanup, so no proxy
/// state or stale socket survives between runs.
use crate::config::types::{BridgeError, Result};
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// World rwx plus sticky bit: untrusted server and trusted client run as
/// different identities and must both reach the socket.
pub const SOCKET_DIR_MODE: u32 = 0o1777;

/// Reject owner names that would not stay a single path component below the
/// service directory.
pub fn validate_owner(owner: &str) -> Result<()> {
    if owner.is_empty() || owner == "." || owner == ".." || owner.contains(['/', '\0']) {
        return Err(BridgeError::Config(format!(
            "Invalid owner sandbox name: {:?}",
            owner
        )));
    }
    Ok(())
}

/// Host locations of one owner's bridge volumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedPaths {
    pub socket_dir: PathBuf,
    pub shared_home: PathBuf,
}

/// Path layout rooted at `<volumes-dir>/<service>/<owner>/`.
#[derive(Clone, Debug)]
pub struct VolumeLayout {
    root: PathBuf,
    service: String,
}

impl VolumeLayout {
    pub fn new<P: AsRef<Path>>(volumes_dir: P, service: &str) -> Self {
        Self {
            root: volumes_dir.as_ref().to_path_buf(),
            service: service.to_string(),
        }
    }

    pub fn owner_dir(&self, owner: &str) -> PathBuf {
        self.root.join(&self.service).join(owner)
    }

    pub fn server_socket_dir(&self, owner: &str) -> PathBuf {
        self.owner_dir(owner).join("tmp").join(".X11-unix")
    }

    pub fn shared_home(&self, owner: &str) -> PathBuf {
        self.owner_dir(owner).join("xpra-home")
    }

    pub fn paths(&self, owner: &str) -> ProvisionedPaths {
        ProvisionedPaths {
            socket_dir: self.server_socket_dir(owner),
            shared_home: self.shared_home(owner),
        }
    }

    /// Create both directories and open up the socket directory. Idempotent.
    pub fn provision(&self, owner: &str) -> Result<ProvisionedPaths> {
        validate_owner(owner)?;
        let paths = self.paths(owner);
        fs::create_dir_all(&paths.socket_dir)?;
        fs::create_dir_all(&paths.shared_home)?;
        // Explicit chmod: create_dir_all is subject to the umask.
        fs::set_permissions(&paths.socket_dir, fs::Permissions::from_mode(SOCKET_DIR_MODE))?;
        debug!(
            "Provisioned {} and {}",
            paths.socket_dir.display(),
            paths.shared_home.display()
        );
        Ok(paths)
    }

    /// Remove both directories. Never fails; problems are only logged.
    ///
    /// Returns the paths that could not be removed.
    pub fn deprovision(&self, owner: &str) -> Vec<PathBuf> {
        if let Err(e) = validate_owner(owner) {
            warn!("Refusing to remove volumes: {}", e);
            return Vec::new();
        }
        let paths = self.paths(owner);
        [paths.socket_dir, paths.shared_home]
            .into_iter()
            .filter(|path| !remove_tree(path))
            .collect()
    }
}

/// Recursive delete that never follows a symlinked root. Missing is success.
fn remove_tree(path: &Path) -> bool {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

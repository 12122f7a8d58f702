//! Readiness barrier between proxy server and client startup.
//!
//! The server binds `X<display>` inside its socket directory once it accepts
//! connections. That file is the only startup signal; no marker means not ready.

use crate::config::types::{BridgeError, DisplayIndex, Result};
use log::debug;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag, checked between polls.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm after a cancelled start.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Remove the display's marker from `socket_dir` if present, so that only a
/// freshly bound server releases the next wait.
pub fn clear_marker(socket_dir: &Path, display: DisplayIndex) -> Result<()> {
    let marker = socket_dir.join(display.marker_name());
    match std::fs::remove_file(&marker) {
        Ok(()) => {
            debug!("Removed stale marker {}", marker.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[derive(Clone, Debug)]
pub struct ReadinessWatcher {
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl ReadinessWatcher {
    pub fn new(poll_interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until the display's marker exists directly inside `socket_dir`.
    ///
    /// Returns the time spent waiting.
    pub fn await_ready(
        &self,
        socket_dir: &Path,
        display: DisplayIndex,
        cancel: &CancelToken,
    ) -> Result<Duration> {
        let marker = socket_dir.join(display.marker_name());
        let started = Instant::now();

        loop {
            // symlink_metadata: the marker is a socket, and a dangling link still counts
            if std::fs::symlink_metadata(&marker).is_ok() {
                let waited = started.elapsed();
                debug!("{} appeared after {:?}", marker.display(), waited);
                return Ok(waited);
            }
            if cancel.is_cancelled() {
                return Err(BridgeError::Cancelled);
            }

            let mut pause = self.poll_interval;
            if let Some(timeout) = self.timeout {
                let waited = started.elapsed();
                if waited >= timeout {
                    return Err(BridgeError::StartupTimeout { marker, waited });
                }
                pause = pause.min(timeout - waited);
            }
            std::thread::sleep(pause);
        }
    }
}

impl Default for ReadinessWatcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Some(Duration::from_secs(30)))
    }
}

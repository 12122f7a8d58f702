use crate::config::types::Result;
use crate::core::status::ServiceStatus;
use std::fmt;

/// Lifecycle of one bridge instance.
///
/// `Stopped` returns to `Configured` rather than `Unconfigured`: helper
/// sandboxes persist once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

impl BridgeState {
    pub fn can_start(self) -> bool {
        matches!(self, BridgeState::Configured | BridgeState::Stopped)
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeState::Unconfigured => write!(f, "unconfigured"),
            BridgeState::Configured => write!(f, "configured"),
            BridgeState::Running => write!(f, "running"),
            BridgeState::Stopped => write!(f, "stopped"),
        }
    }
}

/// A service attached to an owning sandbox.
pub trait Service: Send + Sync {
    /// Implementation name, e.g. `"xpra"`.
    fn name(&self) -> &str;
    /// Owning sandbox.
    fn owner(&self) -> &str;
    fn state(&self) -> BridgeState;
    fn is_setup(&self) -> bool;
    /// One-time provisioning. Idempotent.
    fn setup(&self) -> Result<()>;
    /// Start the service, recording process handles in `status`.
    ///
    /// Handles are recorded as soon as each process exists, so on error
    /// `status` still names whatever must be stopped.
    fn start(&self, status: &mut ServiceStatus) -> Result<()>;
    /// Stop the processes named in `status` and clear it.
    fn stop(&self, status: &mut ServiceStatus) -> Result<()>;
    /// Best-effort removal of ephemeral state. Never fails.
    fn clean_up(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_idle_states_can_start() {
        assert!(!BridgeState::Unconfigured.can_start());
        assert!(BridgeState::Configured.can_start());
        assert!(!BridgeState::Running.can_start());
        assert!(BridgeState::Stopped.can_start());
    }
}

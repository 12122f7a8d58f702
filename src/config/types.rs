/// Core types and error taxonomy for the display bridge
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// X display number served by the untrusted proxy server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayIndex(pub u32);

impl DisplayIndex {
    /// Name of the socket file the server binds inside the socket directory.
    pub fn marker_name(&self) -> String {
        format!("X{}", self.0)
    }
}

impl Default for DisplayIndex {
    fn default() -> Self {
        DisplayIndex(100)
    }
}

impl fmt::Display for DisplayIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

/// Which half of the proxy pair a helper sandbox runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HelperRole {
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "client")]
    Client,
}

impl fmt::Display for HelperRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperRole::Server => write!(f, "server"),
            HelperRole::Client => write!(f, "client"),
        }
    }
}

/// Custom error types for xbridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sandbox registry error: {0}")]
    Registry(String),

    #[error("Sandbox registry verification failed: {0}")]
    Verification(String),

    #[error("Unknown sandbox: {0}")]
    UnknownSandbox(String),

    #[error("Unknown bridge implementation: {0}")]
    UnknownBridge(String),

    #[error("Bridge for {owner} is not set up")]
    NotSetup { owner: String },

    #[error("Bridge for {owner} is already running")]
    AlreadyRunning { owner: String },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Failed to launch {sandbox}: {reason}")]
    Launch { sandbox: String, reason: String },

    #[error("The display proxy server container failed to launch. Container id: {container_id}")]
    ServerInspection { container_id: String },

    #[error("Display proxy server did not create {} within {waited:?}", marker.display())]
    StartupTimeout { marker: PathBuf, waited: Duration },

    #[error("Bridge startup cancelled")]
    Cancelled,

    #[error("Bridge lock {} is held by another process", path.display())]
    LockBusy { path: PathBuf },
}

impl BridgeError {
    /// Process exit code the CLI terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::AlreadyRunning { .. } | BridgeError::LockBusy { .. } => 2,
            BridgeError::StartupTimeout { .. } => 3,
            BridgeError::ServerInspection { .. } => 4,
            BridgeError::Cancelled => 130,
            BridgeError::Config(_) | BridgeError::UnknownBridge(_) => 78,
            BridgeError::Io(_) => 74,
            BridgeError::Serialization(_) | BridgeError::Verification(_) => 65,
            BridgeError::NotSetup { .. } | BridgeError::UnknownSandbox(_) => 69,
            BridgeError::Registry(_) | BridgeError::Launch { .. } | BridgeError::Process(_) => 1,
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

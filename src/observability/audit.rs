/// Structured audit trail for bridge lifecycle events
///
/// Events are serialized as single-line JSON and written through `log` under
/// a dedicated target, so they can be routed with `RUST_LOG=xbridge::audit=info`.
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUDIT_TARGET: &str = "xbridge::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeEventType {
    SetupComplete,
    ServerLaunched,
    ServerReady,
    ClientLaunched,
    StartFailed,
    ProcessStopped,
    StopSkipped,
    CleanupFailure,
}

impl BridgeEventType {
    fn is_failure(self) -> bool {
        matches!(
            self,
            BridgeEventType::StartFailed
                | BridgeEventType::StopSkipped
                | BridgeEventType::CleanupFailure
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub timestamp: DateTime<Utc>,
    /// Correlates the events of one lifecycle call
    pub run_id: Uuid,
    pub owner: String,
    pub event_type: BridgeEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl BridgeEvent {
    pub fn new(run_id: Uuid, owner: &str, event_type: BridgeEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id,
            owner: owner.to_string(),
            event_type,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) if self.event_type.is_failure() => warn!(target: AUDIT_TARGET, "{}", line),
            Ok(line) => info!(target: AUDIT_TARGET, "{}", line),
            Err(e) => warn!("Failed to serialize audit event {:?}: {}", self.event_type, e),
        }
    }
}

/// Emit one event for `owner` under `run_id`.
pub fn record(run_id: Uuid, owner: &str, event_type: BridgeEventType, detail: Option<String>) {
    let mut event = BridgeEvent::new(run_id, owner, event_type);
    event.detail = detail;
    event.emit();
}

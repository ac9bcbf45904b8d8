//! Registry-facing snapshots and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::backend::BackendKind;

/// Read-only snapshot of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    /// Name of the active runner, `None` in degraded mode.
    pub active: Option<String>,
    pub base_url: Option<String>,
    pub current_model: Option<String>,
    /// Result of the most recent probe of the active runner.
    pub healthy: bool,
    /// All configured runner names in registration order.
    pub runners: Vec<String>,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl RegistryStatus {
    pub const fn is_degraded(&self) -> bool {
        self.active.is_none()
    }
}

/// Descriptor of one configured runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerDescriptor {
    pub name: String,
    pub kind: BackendKind,
    pub base_url: String,
    pub current_model: Option<String>,
    pub active: bool,
}

/// Registry lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryEvent {
    /// A runner became active through selection or an explicit switch.
    Activated { name: String },
    /// The active runner failed and was replaced.
    Failover { from: String, to: String },
    /// No runner passed its probe; there is no active runner.
    Degraded { previous: Option<String> },
    /// A runner was added or replaced.
    Registered { name: String },
    /// A runner was removed.
    Removed { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_string(&RegistryEvent::Failover {
            from: "a".to_string(),
            to: "b".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"failover\""));
        assert!(json.contains("\"from\":\"a\""));
    }
}

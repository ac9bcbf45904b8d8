//! Observable state of a supervised backend process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state published by a process supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ProcessState {
    /// Never started, or stopped and reaped.
    Idle,
    /// Spawned and not yet exited.
    Running { pid: u32 },
    /// Exited on its own or after a stop request.
    Exited { code: Option<i32> },
}

impl ProcessState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One captured output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub timestamp: DateTime<Utc>,
    pub stream: OutputStream,
    pub line: String,
}

impl OutputLine {
    pub fn now(stream: OutputStream, line: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            line: line.into(),
        }
    }
}

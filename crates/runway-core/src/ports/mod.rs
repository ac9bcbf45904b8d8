//! Port definitions (trait abstractions) and the error taxonomy.
//!
//! Ports define the interfaces the registry expects from backends.
//! They contain no HTTP or process implementation details.
//!
//! # Design Rules
//!
//! - No `reqwest` or `tokio::process` types in any signature
//! - One capability trait for every backend kind; the kind itself is an enum
//! - Errors are domain-shaped so adapters (HTTP, CLI) can map them

pub mod backend_adapter;
pub mod process;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use backend_adapter::BackendAdapter;
pub use process::{OutputLine, OutputStream, ProcessState};

/// Errors from supervising a local backend process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable does not exist.
    #[error("Executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// The model file handed to the executable does not exist.
    #[error("Model file not found: {}", .0.display())]
    ModelFileNotFound(PathBuf),

    /// Spawning the process failed.
    #[error("Failed to start process: {0}")]
    StartFailed(String),

    /// The process could not be terminated.
    #[error("Failed to stop process: {0}")]
    StopFailed(String),

    /// The process started but never passed a health probe.
    #[error("Backend did not become ready within {0:?}")]
    NotReady(Duration),
}

/// Errors from a single backend operation.
///
/// Chat errors are surfaced to the caller as-is; the registry never
/// retries them.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure (connection refused, DNS, reset).
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-2xx status.
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend answered 2xx with a body that is not a chat response.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// The request exceeded the client timeout.
    #[error("Backend request timed out")]
    Timeout,

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// The local backend process is not running.
    #[error("Backend process is not running")]
    NotRunning,

    /// Process lifecycle failure of a local backend.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl BackendError {
    /// Status code reported by the backend, when there was one.
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from turning a definition into an adapter.
#[derive(Debug, Error)]
pub enum AdapterBuildError {
    #[error("Runner '{name}' has an invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("Runner '{0}' has no base URL")]
    MissingBaseUrl(String),

    #[error("Runner '{0}' is local-process but has no executable/model configured")]
    MissingLaunchSpec(String),

    #[error("No free port for runner '{name}': {reason}")]
    PortAllocation { name: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No runner is active (degraded mode).
    #[error("No backend available")]
    NoBackendAvailable,

    /// No runner with this name is configured.
    #[error("Unknown runner: {0}")]
    UnknownRunner(String),

    /// The runner failed its health probe.
    #[error("Runner '{0}' failed its health check")]
    Unhealthy(String),

    #[error(transparent)]
    Build(#[from] AdapterBuildError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

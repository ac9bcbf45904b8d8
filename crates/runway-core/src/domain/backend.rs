//! Backend definitions.
//!
//! A [`BackendDefinition`] is the immutable description of one runner,
//! produced by the configuration resolver and consumed by the registry
//! when it builds adapters.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Loopback host used for locally spawned backends.
pub const LOCAL_HOST: &str = "127.0.0.1";

/// The closed set of backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// A backend already running at a configured HTTP address.
    RemoteHttp,
    /// A backend executable spawned and supervised by runway.
    LocalProcess,
}

impl BackendKind {
    /// Stable identifier used in configuration and on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteHttp => "remote-http",
            Self::LocalProcess => "local-process",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a backend kind string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend kind: {0}")]
pub struct UnknownBackendKind(pub String);

impl FromStr for BackendKind {
    type Err = UnknownBackendKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote-http" | "remote" | "http" | "openai" => Ok(Self::RemoteHttp),
            "local-process" | "local" | "process" | "embedded" => Ok(Self::LocalProcess),
            other => Err(UnknownBackendKind(other.to_string())),
        }
    }
}

/// How to launch a local-process backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchSpec {
    /// Path to the server executable (e.g. `llama-server`).
    pub executable: PathBuf,
    /// Model file passed to the executable with `-m`.
    pub model_path: PathBuf,
    /// Fixed port; allocated from the local base port when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Context size passed with `-c`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u64>,
    /// Extra arguments appended verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn new(executable: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            model_path: model_path.into(),
            port: None,
            context_size: None,
            args: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub const fn with_context_size(mut self, size: u64) -> Self {
        self.context_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Command-line arguments for serving `model_path` on `port`.
    pub fn command_args(&self, model_path: &Path, port: u16) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            model_path.to_string_lossy().into_owned(),
            "--host".to_string(),
            LOCAL_HOST.to_string(),
            "--port".to_string(),
            port.to_string(),
        ];
        if let Some(ctx) = self.context_size {
            args.push("-c".to_string());
            args.push(ctx.to_string());
        }
        args.extend(self.args.iter().cloned());
        args
    }
}

/// Immutable description of one runner.
///
/// The `name` is the identity key: two definitions with the same name
/// describe the same runner, and later configuration sources replace
/// earlier ones wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDefinition {
    name: String,
    kind: BackendKind,
    base_url: Option<String>,
    default_model: Option<String>,
    launch: Option<LaunchSpec>,
}

impl BackendDefinition {
    /// Definition of a backend already listening at `base_url`.
    pub fn remote(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: BackendKind::RemoteHttp,
            base_url: Some(base_url.into()),
            default_model: None,
            launch: None,
        }
    }

    /// Definition of a backend spawned from `launch`.
    pub fn local(name: impl Into<String>, launch: LaunchSpec) -> Self {
        Self {
            name: name.into(),
            kind: BackendKind::LocalProcess,
            base_url: None,
            default_model: None,
            launch: Some(launch),
        }
    }

    /// Raw constructor used by configuration parsing.
    ///
    /// Validation of the address and launch spec happens when the adapter
    /// is built, so a bad entry only drops that one runner.
    pub const fn from_parts(
        name: String,
        kind: BackendKind,
        base_url: Option<String>,
        default_model: Option<String>,
        launch: Option<LaunchSpec>,
    ) -> Self {
        Self {
            name,
            kind,
            base_url,
            default_model,
            launch,
        }
    }

    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Configured base URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub const fn launch(&self) -> Option<&LaunchSpec> {
        self.launch.as_ref()
    }

    /// The address this definition resolves to before any port allocation.
    ///
    /// Local definitions without a fixed port have no address until the
    /// adapter allocates one.
    pub fn base_address(&self) -> Option<String> {
        match self.kind {
            BackendKind::RemoteHttp => self.base_url.clone(),
            BackendKind::LocalProcess => self
                .launch
                .as_ref()
                .and_then(|l| l.port)
                .map(|port| format!("http://{LOCAL_HOST}:{port}")),
        }
    }
}

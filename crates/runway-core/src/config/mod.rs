//! Runner configuration: file schema, layers and the effective result.
//!
//! Configuration is assembled from layers (built-in defaults, an optional
//! JSON file, environment overrides) by the [`ConfigurationResolver`].
//! Runners merge by name; scalars take the value of the last layer that
//! sets them.

mod env;
mod resolver;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{BackendDefinition, BackendKind, LaunchSpec};

pub use env::{ENV_PREFIX, EnvVars};
pub use resolver::{ConfigSource, ConfigurationResolver};

/// Name of the built-in llama.cpp runner, also the built-in default.
pub const DEFAULT_RUNNER_NAME: &str = "llamacpp";

/// Default interval between health loop ticks.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Default time a local backend gets to pass its first probe.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Default first port tried for local backends.
pub const DEFAULT_LOCAL_BASE_PORT: u16 = 9000;

/// Errors while reading one configuration source.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Malformed config file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

/// One runner entry as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl RunnerEntry {
    /// Convert into a definition.
    ///
    /// Returns `None` (with a warning) for entries whose kind is unknown;
    /// the rest of the file still applies.
    pub fn into_definition(self) -> Option<BackendDefinition> {
        let kind = match self.kind.parse::<BackendKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(runner = %self.name, error = %e, "Skipping runner entry");
                return None;
            }
        };

        let launch = match kind {
            BackendKind::RemoteHttp => None,
            BackendKind::LocalProcess => self.model_path.map(|model_path| LaunchSpec {
                executable: self.executable.unwrap_or_default(),
                model_path,
                port: self.port,
                context_size: self.context_size,
                args: self.args,
            }),
        };

        Some(BackendDefinition::from_parts(
            self.name,
            kind,
            self.base_url,
            self.default_model,
            launch,
        ))
    }
}

/// The JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub runners: Vec<RunnerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_runner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_discover_local: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llama_server_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_base_port: Option<u16>,
}

impl FileConfig {
    pub fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            runners: self
                .runners
                .into_iter()
                .filter_map(RunnerEntry::into_definition)
                .collect(),
            default_runner: self.default_runner,
            allow_fallback: self.allow_fallback,
            auto_discover_local: self.auto_discover_local,
            models_dir: self.models_dir,
            llama_server_path: self.llama_server_path,
            health_interval: self.health_interval_secs.map(Duration::from_secs),
            ready_timeout: self.ready_timeout_secs.map(Duration::from_secs),
            local_base_port: self.local_base_port,
        }
    }
}

/// What a single source contributes.
///
/// Every field is optional so a layer only overrides what it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub runners: Vec<BackendDefinition>,
    pub default_runner: Option<String>,
    pub allow_fallback: Option<bool>,
    pub auto_discover_local: Option<bool>,
    pub models_dir: Option<PathBuf>,
    pub llama_server_path: Option<PathBuf>,
    pub health_interval: Option<Duration>,
    pub ready_timeout: Option<Duration>,
    pub local_base_port: Option<u16>,
}

impl ConfigLayer {
    /// Built-in defaults: llama.cpp and Ollama on their usual ports.
    pub fn builtin() -> Self {
        Self {
            runners: vec![
                BackendDefinition::remote(DEFAULT_RUNNER_NAME, "http://127.0.0.1:8080"),
                BackendDefinition::remote("ollama", "http://127.0.0.1:11434"),
            ],
            default_runner: Some(DEFAULT_RUNNER_NAME.to_string()),
            allow_fallback: Some(false),
            auto_discover_local: Some(false),
            health_interval: Some(DEFAULT_HEALTH_INTERVAL),
            ready_timeout: Some(DEFAULT_READY_TIMEOUT),
            local_base_port: Some(DEFAULT_LOCAL_BASE_PORT),
            ..Self::default()
        }
    }
}

/// The effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Runners in first-seen order, unique by name.
    pub runners: Vec<BackendDefinition>,
    pub default_runner: Option<String>,
    /// Gateway may answer with a canned reply when no runner is healthy.
    pub allow_fallback: bool,
    /// Scan `models_dir` and spawn local runners when nothing is healthy.
    pub auto_discover_local: bool,
    pub models_dir: Option<PathBuf>,
    pub llama_server_path: Option<PathBuf>,
    pub health_interval: Duration,
    pub ready_timeout: Duration,
    pub local_base_port: u16,
    /// Sources that were skipped, with the reason.
    pub warnings: Vec<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            runners: Vec::new(),
            default_runner: None,
            allow_fallback: false,
            auto_discover_local: false,
            models_dir: None,
            llama_server_path: None,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            local_base_port: DEFAULT_LOCAL_BASE_PORT,
            warnings: Vec::new(),
        }
    }
}

impl ResolvedConfig {
    /// Look up a runner by name.
    pub fn runner(&self, name: &str) -> Option<&BackendDefinition> {
        self.runners.iter().find(|r| r.name() == name)
    }
}

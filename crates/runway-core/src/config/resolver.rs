//! Layered configuration resolution.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::{ConfigError, ConfigLayer, EnvVars, FileConfig, ResolvedConfig};
use crate::domain::{BackendDefinition, BackendKind, LaunchSpec};

/// One configuration source.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Built-in runner defaults.
    Defaults,
    /// JSON config file. A missing file contributes nothing.
    File(PathBuf),
    /// A snapshot of `RUNWAY_*` variables.
    Environment(EnvVars),
    /// An already-built layer (CLI flags, tests).
    Layer(ConfigLayer),
}

impl ConfigSource {
    fn describe(&self) -> String {
        match self {
            Self::Defaults => "defaults".to_string(),
            Self::File(path) => format!("file {}", path.display()),
            Self::Environment(_) => "environment".to_string(),
            Self::Layer(_) => "layer".to_string(),
        }
    }

    /// Load this source. `Ok(None)` means the source is absent.
    fn load(&self) -> Result<Option<ConfigLayer>, ConfigError> {
        match self {
            Self::Defaults => Ok(Some(ConfigLayer::builtin())),
            Self::File(path) => {
                if !path.exists() {
                    debug!(path = %path.display(), "Config file not present");
                    return Ok(None);
                }
                let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                let file: FileConfig =
                    serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(file.into_layer()))
            }
            Self::Environment(vars) => vars.clone().into_layer().map(Some),
            Self::Layer(layer) => Ok(Some(layer.clone())),
        }
    }
}

/// Merges [`ConfigSource`]s, in increasing priority, into a [`ResolvedConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigurationResolver {
    sources: Vec<ConfigSource>,
}

impl ConfigurationResolver {
    pub const fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Defaults, then `config_file`, then the current environment.
    pub fn standard(config_file: Option<PathBuf>) -> Self {
        let mut resolver = Self::new().with_source(ConfigSource::Defaults);
        if let Some(path) = config_file {
            resolver = resolver.with_source(ConfigSource::File(path));
        }
        resolver.with_source(ConfigSource::Environment(EnvVars::from_process()))
    }

    /// Append a source with higher priority than every source so far.
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Apply every source in order.
    ///
    /// Never fails: a source that cannot be loaded is skipped and recorded
    /// in [`ResolvedConfig::warnings`].
    pub fn resolve(&self) -> ResolvedConfig {
        let mut config = ResolvedConfig::default();

        for source in &self.sources {
            match source.load() {
                Ok(Some(layer)) => apply_layer(&mut config, layer),
                Ok(None) => {}
                Err(e) => {
                    warn!(source = %source.describe(), error = %e, "Skipping configuration source");
                    config.warnings.push(e.to_string());
                }
            }
        }

        if let Some(server) = config.llama_server_path.clone() {
            for runner in &mut config.runners {
                fill_executable(runner, &server);
            }
        }

        debug!(
            runners = config.runners.len(),
            default = ?config.default_runner,
            "Configuration resolved"
        );
        config
    }
}

fn apply_layer(config: &mut ResolvedConfig, layer: ConfigLayer) {
    for definition in layer.runners {
        match config
            .runners
            .iter_mut()
            .find(|r| r.name() == definition.name())
        {
            Some(existing) => *existing = definition,
            None => config.runners.push(definition),
        }
    }

    if layer.default_runner.is_some() {
        config.default_runner = layer.default_runner;
    }
    if let Some(v) = layer.allow_fallback {
        config.allow_fallback = v;
    }
    if let Some(v) = layer.auto_discover_local {
        config.auto_discover_local = v;
    }
    if layer.models_dir.is_some() {
        config.models_dir = layer.models_dir;
    }
    if layer.llama_server_path.is_some() {
        config.llama_server_path = layer.llama_server_path;
    }
    if let Some(v) = layer.health_interval {
        config.health_interval = v;
    }
    if let Some(v) = layer.ready_timeout {
        config.ready_timeout = v;
    }
    if let Some(v) = layer.local_base_port {
        config.local_base_port = v;
    }
}

/// Local runners configured without an executable use the global server path.
fn fill_executable(runner: &mut BackendDefinition, server: &std::path::Path) {
    if runner.kind() != BackendKind::LocalProcess {
        return;
    }
    let Some(launch) = runner.launch() else {
        return;
    };
    if !launch.executable.as_os_str().is_empty() {
        return;
    }
    let launch = LaunchSpec {
        executable: server.to_path_buf(),
        ..launch.clone()
    };
    *runner = BackendDefinition::from_parts(
        runner.name().to_string(),
        runner.kind(),
        runner.base_url().map(str::to_string),
        runner.default_model().map(str::to_string),
        Some(launch),
    );
}

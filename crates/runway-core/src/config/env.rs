//! Environment-variable configuration layer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{ConfigError, ConfigLayer, DEFAULT_RUNNER_NAME};
use crate::domain::{BackendDefinition, BackendKind, LaunchSpec};

/// Prefix shared by every variable runway reads.
pub const ENV_PREFIX: &str = "RUNWAY_";

const BASE_URL: &str = "RUNWAY_BASE_URL";
const BACKEND: &str = "RUNWAY_BACKEND";
const NAME: &str = "RUNWAY_NAME";
const DEFAULT_MODEL: &str = "RUNWAY_DEFAULT_MODEL";
const MODEL_PATH: &str = "RUNWAY_MODEL_PATH";
const DEFAULT_RUNNER: &str = "RUNWAY_DEFAULT_RUNNER";
const ALLOW_FALLBACK: &str = "RUNWAY_ALLOW_FALLBACK";
const AUTO_DISCOVER: &str = "RUNWAY_AUTO_DISCOVER";
const MODELS_DIR: &str = "RUNWAY_MODELS_DIR";
const LLAMA_SERVER: &str = "RUNWAY_LLAMA_SERVER";

/// Snapshot of `RUNWAY_*` variables.
///
/// Taken once so resolution never races with later changes to the
/// process environment, and so tests can build one without touching it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars(BTreeMap<String, String>);

impl EnvVars {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self(
            std::env::vars()
                .filter(|(k, _)| k.starts_with(ENV_PREFIX))
                .collect(),
        )
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(ConfigError::InvalidEnv {
                var: key.to_string(),
                reason: format!("expected a boolean, got '{other}'"),
            }),
        }
    }

    /// Build the layer these variables describe.
    ///
    /// A runner entry is produced when `RUNWAY_BASE_URL` (remote) or
    /// `RUNWAY_MODEL_PATH` (local) is set; it becomes the preferred
    /// default unless `RUNWAY_DEFAULT_RUNNER` names another runner. Without
    /// `RUNWAY_NAME` a remote entry takes the built-in default's name and
    /// so replaces it.
    pub fn into_layer(self) -> Result<ConfigLayer, ConfigError> {
        let kind = match self.get(BACKEND) {
            Some(raw) => raw.parse::<BackendKind>().map_err(|e| ConfigError::InvalidEnv {
                var: BACKEND.to_string(),
                reason: e.to_string(),
            })?,
            None if self.get(MODEL_PATH).is_some() && self.get(BASE_URL).is_none() => {
                BackendKind::LocalProcess
            }
            None => BackendKind::RemoteHttp,
        };

        let mut layer = ConfigLayer {
            allow_fallback: self.flag(ALLOW_FALLBACK)?,
            auto_discover_local: self.flag(AUTO_DISCOVER)?,
            models_dir: self.get(MODELS_DIR).map(PathBuf::from),
            llama_server_path: self.get(LLAMA_SERVER).map(PathBuf::from),
            ..ConfigLayer::default()
        };

        let definition = match kind {
            BackendKind::RemoteHttp => self.get(BASE_URL).map(|url| {
                let name = self.get(NAME).unwrap_or(DEFAULT_RUNNER_NAME);
                BackendDefinition::remote(name, url)
            }),
            BackendKind::LocalProcess => self.get(MODEL_PATH).map(|model_path| {
                let name = self.get(NAME).unwrap_or("local");
                let executable = layer.llama_server_path.clone().unwrap_or_default();
                BackendDefinition::local(name, LaunchSpec::new(executable, model_path))
            }),
        };

        if let Some(mut definition) = definition {
            if let Some(model) = self.get(DEFAULT_MODEL) {
                definition = definition.with_default_model(model);
            }
            layer.default_runner = Some(definition.name().to_string());
            layer.runners.push(definition);
        }

        if let Some(name) = self.get(DEFAULT_RUNNER) {
            layer.default_runner = Some(name.to_string());
        }

        Ok(layer)
    }
}

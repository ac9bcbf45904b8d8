//! Canonical locations of runway's config file and model directory.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError`; callers decide whether a missing
//!   location is fatal
//! - Explicit overrides (`RUNWAY_CONFIG`, config values) always win over
//!   the platform defaults from `dirs`

mod error;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::path::PathBuf;

pub use error::PathError;

/// Variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "RUNWAY_CONFIG";

const APP_DIR: &str = "runway";
const CONFIG_FILE: &str = "runners.json";

/// `<config_dir>/runway`.
pub fn config_dir() -> Result<PathBuf, PathError> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or(PathError::NoConfigDir)
}

/// `<data_dir>/runway`.
pub fn data_dir() -> Result<PathBuf, PathError> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or(PathError::NoDataDir)
}

/// Config file location: `RUNWAY_CONFIG`, else `<config_dir>/runway/runners.json`.
pub fn config_file_path() -> Result<PathBuf, PathError> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Default directory scanned for local model files.
pub fn default_models_dir() -> Result<PathBuf, PathError> {
    Ok(data_dir()?.join("models"))
}

#[cfg(test)]
mod tests {
    use super::test_utils::{ENV_LOCK, EnvVarGuard};
    use super::*;

    #[test]
    fn explicit_config_path_wins() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(CONFIG_ENV_VAR, "/tmp/runway-test.json");
        assert_eq!(
            config_file_path().unwrap(),
            PathBuf::from("/tmp/runway-test.json")
        );
    }

    #[test]
    fn blank_override_falls_back_to_platform_dir() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(CONFIG_ENV_VAR, "  ");
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("runway/runners.json"));
        }
    }

    #[test]
    fn models_dir_lives_under_data_dir() {
        if let (Ok(models), Ok(data)) = (default_models_dir(), data_dir()) {
            assert_eq!(models, data.join("models"));
        }
    }
}

//! Discovery of local model files.
//!
//! Used by the registry as a last-resort tier when no configured runner is
//! healthy and `autoDiscoverLocal` is set.

use std::fs;
use std::path::{Path, PathBuf};

use runway_core::domain::{BackendDefinition, LaunchSpec};
use tracing::{debug, warn};

/// Extension of model files llama-server can serve.
const MODEL_EXTENSION: &str = "gguf";

/// Model files directly under `dir`, sorted by path.
///
/// Multimodal projector files (`mmproj*`) and shards after the first are
/// skipped since they cannot be served on their own.
pub fn discover_models(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot scan models directory");
            return Vec::new();
        }
    };

    let mut models: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_servable_model(path))
        .collect();
    models.sort();
    debug!(dir = %dir.display(), count = models.len(), "Discovered local models");
    models
}

fn is_servable_model(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MODEL_EXTENSION));
    if !has_extension {
        return false;
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if stem.starts_with("mmproj") {
        return false;
    }
    // "name-00002-of-00003": only the first shard is loadable
    match shard_index(&stem) {
        Some(index) => index == 1,
        None => true,
    }
}

fn shard_index(stem: &str) -> Option<u32> {
    let (head, total) = stem.rsplit_once("-of-")?;
    let (_, index) = head.rsplit_once('-')?;
    if index.len() != 5 || total.len() != 5 {
        return None;
    }
    total.parse::<u32>().ok()?;
    index.parse().ok()
}

/// Runner name for a discovered model file.
pub fn discovered_name(model: &Path) -> String {
    let stem = model
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    format!("local-{stem}")
}

/// One local-process definition per discovered model.
pub fn discovered_definitions(models_dir: &Path, server: &Path) -> Vec<BackendDefinition> {
    discover_models(models_dir)
        .into_iter()
        .map(|model| {
            let name = discovered_name(&model);
            BackendDefinition::local(name, LaunchSpec::new(server, model))
        })
        .collect()
}

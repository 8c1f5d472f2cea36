// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable that overrides the default task file location.
pub const CONFIG_ENV: &str = "TASKWEAVE_CONFIG";

/// Load a task file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (references, cycles, etc.). Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), tasks = config.task.len(), "loaded task file");

    Ok(config)
}

/// Load a task file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - unknown child / hook references,
///   - mode and body mismatches,
///   - hook/child cycles,
///   - basic global config sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the default task file path.
///
/// `TASKWEAVE_CONFIG` wins when set and non-empty; otherwise
/// `Taskweave.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from("Taskweave.toml"),
    }
}

/// Directory that relative `cwd` entries are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "ci/Taskweave.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Taskweave.toml" (parent = ""),
///   we fall back to the current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Load a settings file from a given path and return the raw `RawSettings`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to
/// also check the values.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettings> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawSettings = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a settings file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let raw = load_from_path(&path)?;
    let settings = Settings::try_from(raw)?;
    Ok(settings)
}

/// Load the settings the CLI should use.
///
/// - An explicit path must exist.
/// - Without one, [`default_config_path`] is used if present, otherwise the
///   built-in defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => load_and_validate(path),
        None => {
            let path = default_config_path();
            if path.is_file() {
                load_and_validate(&path)
            } else {
                debug!(path = ?path, "no settings file; using defaults");
                Ok(Settings::default())
            }
        }
    }
}

/// `buildterm.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("buildterm.toml")
}

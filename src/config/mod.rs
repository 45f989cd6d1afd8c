// src/config/mod.rs

//! Settings for buildterm.
//!
//! Responsibilities:
//! - Define the TOML-backed settings model (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate values that would only fail at launch time (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{RawSettings, Settings, TeePaths};
pub use validate::validate_settings;

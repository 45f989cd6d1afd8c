// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{ExitPolicy, Platform, TerminalGeometry};

/// Settings as read from the TOML settings file.
///
/// ```toml
/// terminal = "xterm"
/// terminal_exit = "prompt"
/// hide_panel_without_errors = true
///
/// [tee_path]
/// windows = "${BUILDTERM_HOME}/bin/tee.exe"
/// linux = "tee"
///
/// [terminal_geometry]
/// columns = 120
/// lines = 40
/// ```
///
/// Every key is optional. Use [`Settings`] (via `TryFrom`) for the validated
/// form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSettings {
    #[serde(default)]
    pub tee_path: TeePaths,

    /// POSIX terminal emulator program (plus any fixed flags).
    #[serde(default = "default_terminal")]
    pub terminal: String,

    /// Run builds in a background shell instead of a terminal window.
    #[serde(default)]
    pub headless: bool,

    #[serde(default)]
    pub terminal_geometry: Option<TerminalGeometry>,

    /// Exit policy used when a request does not set `terminal_exit`.
    #[serde(default)]
    pub terminal_exit: ExitPolicy,

    #[serde(default)]
    pub show_panel_on_build: bool,

    #[serde(default)]
    pub hide_panel_without_errors: bool,

    #[serde(default = "default_true")]
    pub show_errors_inline: bool,

    /// Directory for run log files; defaults to the user cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            tee_path: TeePaths::default(),
            terminal: default_terminal(),
            headless: false,
            terminal_geometry: None,
            terminal_exit: ExitPolicy::default(),
            show_panel_on_build: false,
            hide_panel_without_errors: false,
            show_errors_inline: true,
            cache_dir: None,
        }
    }
}

/// `[tee_path]` section: tee executable per platform.
#[derive(Debug, Clone, Deserialize)]
pub struct TeePaths {
    #[serde(default = "default_tee")]
    pub windows: String,
    #[serde(default = "default_tee")]
    pub osx: String,
    #[serde(default = "default_tee")]
    pub linux: String,
}

impl Default for TeePaths {
    fn default() -> Self {
        Self {
            windows: default_tee(),
            osx: default_tee(),
            linux: default_tee(),
        }
    }
}

impl TeePaths {
    pub fn for_platform(&self, platform: Platform) -> &str {
        match platform {
            Platform::Windows => &self.windows,
            Platform::Osx => &self.osx,
            Platform::Linux => &self.linux,
        }
    }
}

fn default_terminal() -> String {
    "xterm".to_string()
}

fn default_tee() -> String {
    "tee".to_string()
}

fn default_true() -> bool {
    true
}

/// Validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tee_path: TeePaths,
    pub terminal: String,
    pub headless: bool,
    pub terminal_geometry: Option<TerminalGeometry>,
    pub terminal_exit: ExitPolicy,
    pub show_panel_on_build: bool,
    pub hide_panel_without_errors: bool,
    pub show_errors_inline: bool,
    pub cache_dir: PathBuf,
}

impl Settings {
    /// Build from raw settings without validation.
    ///
    /// Use `Settings::try_from(raw)` in application code.
    pub(crate) fn new_unchecked(raw: RawSettings) -> Self {
        Self {
            tee_path: raw.tee_path,
            terminal: raw.terminal,
            headless: raw.headless,
            terminal_geometry: raw.terminal_geometry,
            terminal_exit: raw.terminal_exit,
            show_panel_on_build: raw.show_panel_on_build,
            hide_panel_without_errors: raw.hide_panel_without_errors,
            show_errors_inline: raw.show_errors_inline,
            cache_dir: raw
                .cache_dir
                .unwrap_or_else(crate::exec::default_cache_dir),
        }
    }

    /// tee executable for the current platform.
    pub fn tee_path(&self) -> &str {
        self.tee_path.for_platform(Platform::current())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new_unchecked(RawSettings::default())
    }
}

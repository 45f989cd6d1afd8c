use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How the terminal window behaves once the user command completes.
///
/// - `Prompt`: wait for the user to press ENTER (default).
/// - `Manual`: keep the window open until it is closed or killed.
/// - `Auto`: close as soon as the command finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    #[default]
    Prompt,
    Manual,
    Auto,
}

impl FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prompt" => Ok(ExitPolicy::Prompt),
            "manual" => Ok(ExitPolicy::Manual),
            "auto" => Ok(ExitPolicy::Auto),
            other => Err(format!(
                "invalid terminal_exit: {other} (expected \"prompt\", \"manual\" or \"auto\")"
            )),
        }
    }
}

/// Fixed terminal window size, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TerminalGeometry {
    pub columns: u16,
    pub lines: u16,
}

/// Operating-system family; decides how the terminal command line is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Osx,
    Linux,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Osx
        } else {
            Platform::Linux
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "windows",
            Platform::Osx => "osx",
            Platform::Linux => "linux",
        };
        f.write_str(name)
    }
}

/// Text decoding applied to log-file bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    /// Resolve an encoding name, falling back to UTF-8 for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name.parse() {
            Ok(enc) => enc,
            Err(e) => {
                tracing::warn!(encoding = %name, error = %e, "falling back to utf-8");
                TextEncoding::Utf8
            }
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(format!("unsupported encoding: {other}")),
        }
    }
}

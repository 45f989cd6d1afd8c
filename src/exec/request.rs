// src/exec/request.rs

//! The immutable description of one build invocation.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::env::EnvMap;
use crate::errors::{BuildTermError, Result};
use crate::types::{ExitPolicy, TextEncoding};

/// A `cmd` / `shell_cmd` value as written in a build definition: either a
/// single string or an argument list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Line(String),
    Argv(Vec<String>),
}

impl CommandValue {
    fn is_blank(&self) -> bool {
        match self {
            CommandValue::Line(s) => s.trim().is_empty(),
            CommandValue::Argv(argv) => argv.is_empty(),
        }
    }
}

/// Validated command of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// From `cmd = [...]`.
    Argv(Vec<String>),
    /// From `shell_cmd = "..."` (or a plain-string `cmd`).
    Shell(String),
}

impl Command {
    /// The command as a single shell line. Arguments are POSIX-quoted.
    pub fn to_shell_line(&self) -> String {
        match self {
            Command::Argv(argv) => shell_words::join(argv),
            Command::Shell(line) => line.clone(),
        }
    }

    /// First line of the diagnostic block shown on launch failure.
    pub fn debug_line(&self) -> String {
        match self {
            Command::Argv(argv) => format!("[cmd: {argv:?}]"),
            Command::Shell(line) => format!("[shell_cmd: {line}]"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_line())
    }
}

/// Parameters accepted by the "run a build" entry point.
///
/// Can be deserialized from a build definition:
///
/// ```toml
/// shell_cmd = "cargo build"
/// file_regex = "^\\s*--> (.+?):(\\d+):(\\d+)"
/// terminal_exit = "auto"
/// [env]
/// RUSTFLAGS = "-D warnings"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub cmd: Option<CommandValue>,
    pub shell_cmd: Option<CommandValue>,

    /// Defaults to the active document's directory.
    pub working_dir: Option<PathBuf>,

    /// Merged over the process environment and per-view overrides.
    pub env: EnvMap,

    /// Decoding used when tailing the log file.
    pub encoding: String,

    /// Suppress start / finish status lines.
    pub quiet: bool,

    /// Cancel the active run instead of starting one.
    pub kill: bool,

    /// Overrides the configured exit policy.
    pub terminal_exit: Option<ExitPolicy>,

    /// Mirror output into the results panel.
    pub tee: bool,

    pub file_regex: String,
    pub line_regex: String,

    /// Temporary search path for locating executables, e.g. `"/opt/sdk/bin:$PATH"`.
    pub path: Option<String>,

    pub show_panel_on_build: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            cmd: None,
            shell_cmd: None,
            working_dir: None,
            env: EnvMap::new(),
            encoding: "utf-8".to_string(),
            quiet: false,
            kill: false,
            terminal_exit: None,
            tee: true,
            file_regex: String::new(),
            line_regex: String::new(),
            path: None,
            show_panel_on_build: false,
        }
    }
}

impl RunRequest {
    /// Request running an argument list.
    pub fn argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: Some(CommandValue::Argv(argv.into_iter().map(Into::into).collect())),
            ..Self::default()
        }
    }

    /// Request running a shell line.
    pub fn shell(line: impl Into<String>) -> Self {
        Self {
            shell_cmd: Some(CommandValue::Line(line.into())),
            ..Self::default()
        }
    }

    /// Request cancelling the active run.
    pub fn kill() -> Self {
        Self {
            kill: true,
            ..Self::default()
        }
    }

    /// Validate `cmd` / `shell_cmd`.
    ///
    /// Exactly one must be given (empty values count as absent) and
    /// `shell_cmd` must be a string.
    pub fn command(&self) -> Result<Command> {
        let cmd = self.cmd.as_ref().filter(|c| !c.is_blank());
        let shell_cmd = self.shell_cmd.as_ref().filter(|c| !c.is_blank());

        match (cmd, shell_cmd) {
            (None, None) => Err(BuildTermError::InvalidRequest(
                "shell_cmd or cmd is required".to_string(),
            )),
            (_, Some(CommandValue::Argv(_))) => Err(BuildTermError::InvalidRequest(
                "shell_cmd must be a string".to_string(),
            )),
            (Some(_), Some(_)) => Err(BuildTermError::InvalidRequest(
                "cmd and shell_cmd are mutually exclusive".to_string(),
            )),
            (None, Some(CommandValue::Line(line))) => Ok(Command::Shell(line.clone())),
            (Some(CommandValue::Argv(argv)), None) => Ok(Command::Argv(argv.clone())),
            (Some(CommandValue::Line(line)), None) => Ok(Command::Shell(line.clone())),
        }
    }

    pub fn text_encoding(&self) -> TextEncoding {
        TextEncoding::from_name(&self.encoding)
    }
}

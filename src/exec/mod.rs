// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`request`] describes one build invocation.
//! - [`launcher`] composes the tee'd shell line and spawns it in a terminal
//!   window (or headless).
//! - [`process`] wraps the spawned OS process and kills its whole tree.
//! - [`log_file`] names, creates and cleans up the per-run log files.
//! - [`tailer`] follows a log file while the terminal is alive.
//! - [`async_process`] ties the above together on a background task and
//!   reports output to a [`ProcessListener`].

pub mod async_process;
pub mod launcher;
pub mod log_file;
pub mod process;
pub mod request;
pub mod tailer;

pub use async_process::{AsyncProcess, ProcessListener, ProcessOptions, RunId};
pub use launcher::{HeadlessLauncher, LaunchSpec, Launcher, TerminalCommand, TerminalLauncher};
pub use log_file::{LogFile, clear_cache, default_cache_dir};
pub use process::TerminalProcess;
pub use request::{Command, CommandValue, RunRequest};
pub use tailer::LogTailer;

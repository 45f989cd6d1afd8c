// src/logging.rs

//! Logging setup for `buildterm` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BUILDTERM_LOG` environment variable: either a bare level ("info",
//!    "debug") or full filter directives ("buildterm::exec=trace,tokio=debug")
//! 3. default to `info`
//!
//! A bare level only applies to buildterm's own targets; dependencies stay
//! at `warn` unless the level is stricter.
//!
//! Logs are sent to STDERR so that stdout only carries the mirrored build
//! output.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var("BUILDTERM_LOG").ok();
    let directives = filter_directives(cli_level, env_value.as_deref());
    let filter = EnvFilter::try_new(&directives)?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    let rejected = env_value.filter(|v| cli_level.is_none() && !is_valid_filter(v.trim()));
    if let Some(value) = rejected {
        tracing::warn!(value = %value, "ignoring invalid BUILDTERM_LOG");
    }

    Ok(())
}

fn is_valid_filter(value: &str) -> bool {
    value.is_empty() || parse_level_str(value).is_some() || EnvFilter::try_new(value).is_ok()
}

fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return level_directives(level_from_log_level(lvl));
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        None => level_directives(Level::INFO),
        Some(value) => match parse_level_str(value) {
            Some(level) => level_directives(level),
            None if EnvFilter::try_new(value).is_ok() => value.to_string(),
            None => level_directives(Level::INFO),
        },
    }
}

/// `level` for buildterm, at most `warn` for everything else.
fn level_directives(level: Level) -> String {
    let deps = level.min(Level::WARN);
    format!(
        "{},buildterm={}",
        deps.as_str().to_lowercase(),
        level.as_str().to_lowercase()
    )
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

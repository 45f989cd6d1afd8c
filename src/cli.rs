// src/cli.rs

//! CLI argument parsing using `clap`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::exec::{CommandValue, RunRequest};
use crate::types::ExitPolicy;

/// Command-line arguments for `buildterm`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildterm",
    version,
    about = "Run a build in a terminal window and mirror its output.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the settings file (TOML).
    ///
    /// Default: `buildterm.toml` in the current working directory, if it exists.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDTERM_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Start a build and wait for it to finish.
    Run(RunArgs),
    /// Delete leftover log files from the cache directory.
    ClearCache,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Command as an argument list; repeat for each argument.
    #[arg(long = "cmd", value_name = "ARG", conflicts_with = "shell_cmd")]
    pub cmd: Vec<String>,

    /// Command as a single shell line.
    #[arg(long, value_name = "STR")]
    pub shell_cmd: Option<String>,

    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variable for the build.
    #[arg(long = "env", value_name = "K=V", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Encoding of the build output (utf-8, latin-1).
    #[arg(long, value_name = "ENC", default_value = "utf-8")]
    pub encoding: String,

    /// Do not print the start and finish lines.
    #[arg(long)]
    pub quiet: bool,

    /// What the terminal does after the command ends (prompt, manual, auto).
    #[arg(long, value_name = "POLICY")]
    pub terminal_exit: Option<ExitPolicy>,

    /// Do not mirror output.
    #[arg(long)]
    pub no_tee: bool,

    /// Result pattern with groups (file, line, column, message).
    #[arg(long, value_name = "RE", default_value = "")]
    pub file_regex: String,

    /// Result pattern with groups (line, column, message) for the preceding file.
    #[arg(long, value_name = "RE", default_value = "")]
    pub line_regex: String,

    /// Search path used to locate the command, e.g. `/opt/sdk/bin:$PATH`.
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    #[arg(long)]
    pub show_panel: bool,

    /// Show the command for editing on the terminal before it runs.
    #[arg(long)]
    pub prompt: bool,
}

impl RunArgs {
    pub fn to_request(&self) -> RunRequest {
        RunRequest {
            cmd: (!self.cmd.is_empty()).then(|| CommandValue::Argv(self.cmd.clone())),
            shell_cmd: self.shell_cmd.clone().map(CommandValue::Line),
            working_dir: self.working_dir.clone(),
            env: self.env.iter().cloned().collect(),
            encoding: self.encoding.clone(),
            quiet: self.quiet,
            kill: false,
            terminal_exit: self.terminal_exit,
            tee: !self.no_tee,
            file_regex: self.file_regex.clone(),
            line_regex: self.line_regex.clone(),
            path: self.path.clone(),
            show_panel_on_build: self.show_panel,
        }
    }
}

/// Offer the request's command line for editing.
///
/// An empty answer keeps the command unchanged; anything else replaces it
/// as a shell line.
pub fn prompt_command(
    mut request: RunRequest,
    mut input: impl BufRead,
    mut output: impl Write,
) -> io::Result<RunRequest> {
    let current = request
        .command()
        .map(|command| command.to_shell_line())
        .unwrap_or_default();
    write!(output, "$ [{current}]: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let edited = answer.trim();
    if !edited.is_empty() {
        request.cmd = None;
        request.shell_cmd = Some(CommandValue::Line(edited.to_string()));
    }
    Ok(request)
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_map_to_request() {
        let args = CliArgs::try_parse_from([
            "buildterm",
            "run",
            "--cmd",
            "echo",
            "--cmd",
            "hi there",
            "--env",
            "A=1=2",
            "--terminal-exit",
            "auto",
            "--no-tee",
        ])
        .unwrap();

        let CliCommand::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        let req = run.to_request();
        assert_eq!(
            req.cmd,
            Some(CommandValue::Argv(vec!["echo".into(), "hi there".into()]))
        );
        assert_eq!(req.env.get("A").map(String::as_str), Some("1=2"));
        assert_eq!(req.terminal_exit, Some(ExitPolicy::Auto));
        assert!(!req.tee);
    }

    #[test]
    fn cmd_and_shell_cmd_conflict() {
        let res = CliArgs::try_parse_from([
            "buildterm",
            "run",
            "--cmd",
            "make",
            "--shell-cmd",
            "make",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn prompt_replaces_command_with_edited_line() {
        let request = RunRequest::argv(["make", "all"]);
        let mut shown = Vec::new();
        let edited = prompt_command(request, io::Cursor::new("make -j4 check\n"), &mut shown).unwrap();

        assert_eq!(String::from_utf8(shown).unwrap(), "$ [make all]: ");
        assert_eq!(edited.cmd, None);
        assert_eq!(edited.shell_cmd, Some(CommandValue::Line("make -j4 check".into())));
    }

    #[test]
    fn empty_prompt_answer_keeps_command() {
        let request = RunRequest::shell("cargo build");
        let kept = prompt_command(request.clone(), io::Cursor::new("\n"), io::sink()).unwrap();
        assert_eq!(kept.shell_cmd, request.shell_cmd);

        let at_eof = prompt_command(request.clone(), io::Cursor::new(""), io::sink()).unwrap();
        assert_eq!(at_eof.shell_cmd, request.shell_cmd);
    }

    #[test]
    fn prompt_flag_is_parsed() {
        let args = CliArgs::try_parse_from(["buildterm", "run", "--shell-cmd", "make", "--prompt"]).unwrap();
        let CliCommand::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        assert!(run.prompt);
    }

    #[test]
    fn env_requires_key() {
        assert!(parse_key_val("=x").is_err());
        assert!(parse_key_val("novalue").is_err());
    }
}

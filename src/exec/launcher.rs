// src/exec/launcher.rs

//! Building and spawning the terminal command.
//!
//! The user command is wrapped into a single shell line that
//! 1. runs the command,
//! 2. tees its combined stdout/stderr into the run's log file,
//! 3. keeps (or closes) the terminal according to the [`ExitPolicy`].
//!
//! That line is then started either inside a native terminal window
//! ([`TerminalLauncher`]) or directly in a background shell
//! ([`HeadlessLauncher`]). Both spawn the process so its whole tree can be
//! terminated later (new process group on POSIX, `taskkill /T` on Windows).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::env::EnvMap;
use crate::errors::{BuildTermError, Result};
use crate::exec::process::TerminalProcess;
use crate::types::{ExitPolicy, Platform, TerminalGeometry};

/// `CREATE_NO_WINDOW` process creation flag.
pub const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Everything needed to launch one run's terminal.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// The user command as a shell line.
    pub command: String,
    /// Fully resolved child environment.
    pub env: EnvMap,
    pub exit_policy: ExitPolicy,
    /// Log file receiving the tee'd output; `None` disables the tee stage.
    pub log_file: Option<PathBuf>,
    /// tee executable (already variable-expanded).
    pub tee_path: String,
    pub geometry: Option<TerminalGeometry>,
    pub working_dir: Option<PathBuf>,
}

/// Spawns the process for a [`LaunchSpec`].
pub trait Launcher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<TerminalProcess>;
}

/// Program + arguments of the process to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Pass `args` to the program verbatim (Windows `cmd` quoting).
    pub raw_args: bool,
}

impl TerminalCommand {
    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Shell snippet appended after the user command.
pub fn exit_suffix(policy: ExitPolicy, platform: Platform) -> &'static str {
    match (platform.is_windows(), policy) {
        (true, ExitPolicy::Prompt) => "pause && exit",
        (true, ExitPolicy::Manual) => "waitfor exit",
        (true, ExitPolicy::Auto) => "exit",
        (false, ExitPolicy::Prompt) => "echo && echo Press ENTER to continue && read && exit",
        (false, ExitPolicy::Manual) => "sleep infinity",
        (false, ExitPolicy::Auto) => "exit",
    }
}

/// Compose the shell line run inside the terminal.
pub fn compose_shell_line(
    command: &str,
    log_file: Option<&Path>,
    tee_path: &str,
    policy: ExitPolicy,
    platform: Platform,
) -> String {
    let command = match log_file {
        Some(log) => format!("{command} 2>&1 | \"{tee_path}\" \"{}\"", log.display()),
        None => command.to_string(),
    };

    let separator = if platform.is_windows() { " & " } else { "; " };
    format!("{command}{separator}{}", exit_suffix(policy, platform))
}

/// Launches the shell line inside a visible terminal window.
#[derive(Debug, Clone)]
pub struct TerminalLauncher {
    platform: Platform,
    /// POSIX terminal emulator program, e.g. `xterm`.
    terminal: String,
}

impl TerminalLauncher {
    pub fn new(terminal: impl Into<String>) -> Self {
        Self::for_platform(Platform::current(), terminal)
    }

    pub fn for_platform(platform: Platform, terminal: impl Into<String>) -> Self {
        Self {
            platform,
            terminal: terminal.into(),
        }
    }

    /// The full process invocation for `spec` on this launcher's platform.
    pub fn terminal_command(&self, spec: &LaunchSpec) -> TerminalCommand {
        let line = compose_shell_line(
            &spec.command,
            spec.log_file.as_deref(),
            &spec.tee_path,
            spec.exit_policy,
            self.platform,
        );

        match self.platform {
            Platform::Windows => {
                let line = match spec.geometry {
                    Some(g) => format!(
                        "powershell -command \"[console]::WindowWidth={}; [console]::WindowHeight={}; [console]::BufferWidth=[console]::WindowWidth\" & {line}",
                        g.columns, g.lines
                    ),
                    None => line,
                };
                // `start /wait` keeps this launcher alive until the window closes.
                TerminalCommand {
                    program: "cmd".to_string(),
                    args: vec![
                        "/C".to_string(),
                        format!("start /wait cmd /k \"{line}\""),
                    ],
                    raw_args: true,
                }
            }
            Platform::Osx | Platform::Linux => {
                let terminal = match spec.geometry {
                    Some(g) => format!("{} -geometry {}x{}", self.terminal, g.columns, g.lines),
                    None => self.terminal.clone(),
                };
                let script = format!("{terminal} -e bash -c {}", shell_words::quote(&line));

                // A login shell on macOS so the user's profile sets up PATH etc.
                let mut args = vec!["bash".to_string()];
                if self.platform == Platform::Osx {
                    args.push("-l".to_string());
                }
                args.push("-c".to_string());
                args.push(script);

                TerminalCommand {
                    program: "/usr/bin/env".to_string(),
                    args,
                    raw_args: false,
                }
            }
        }
    }
}

impl Launcher for TerminalLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<TerminalProcess> {
        let invocation = self.terminal_command(spec);
        info!(
            platform = %self.platform,
            command = %invocation.display(),
            "launching terminal"
        );
        spawn(&invocation, spec, Stdio::null)
    }
}

/// Runs the shell line in a background shell without opening a window.
///
/// Used for CI and tests; the tee stage still mirrors output into the log
/// file, everything else the command prints is discarded.
#[derive(Debug, Clone)]
pub struct HeadlessLauncher {
    platform: Platform,
}

impl HeadlessLauncher {
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
        }
    }

    pub fn terminal_command(&self, spec: &LaunchSpec) -> TerminalCommand {
        let line = compose_shell_line(
            &spec.command,
            spec.log_file.as_deref(),
            &spec.tee_path,
            spec.exit_policy,
            self.platform,
        );

        if self.platform.is_windows() {
            TerminalCommand {
                program: "cmd".to_string(),
                args: vec!["/C".to_string(), line],
                raw_args: true,
            }
        } else {
            TerminalCommand {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), line],
                raw_args: false,
            }
        }
    }
}

impl Default for HeadlessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for HeadlessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<TerminalProcess> {
        let invocation = self.terminal_command(spec);
        debug!(command = %invocation.display(), "launching headless shell");
        spawn(&invocation, spec, Stdio::null)
    }
}

fn spawn(
    invocation: &TerminalCommand,
    spec: &LaunchSpec,
    stdio: impl Fn() -> Stdio,
) -> Result<TerminalProcess> {
    let mut cmd = Command::new(&invocation.program);

    if invocation.raw_args {
        add_raw_args(&mut cmd, &invocation.args);
    } else {
        cmd.args(&invocation.args);
    }

    cmd.env_clear()
        .envs(&spec.env)
        .stdin(stdio())
        .stdout(stdio())
        .stderr(stdio());

    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let launch_error = |source| BuildTermError::Launch {
        command: invocation.display(),
        source,
    };

    let child = cmd.spawn().map_err(launch_error)?;
    let process = TerminalProcess::new(child).map_err(launch_error)?;
    debug!(pid = process.pid(), "terminal process spawned");
    Ok(process)
}

#[cfg(windows)]
fn add_raw_args(cmd: &mut Command, args: &[String]) {
    for arg in args {
        cmd.raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn add_raw_args(cmd: &mut Command, args: &[String]) {
    cmd.args(args);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(log: Option<&str>, policy: ExitPolicy, geometry: Option<TerminalGeometry>) -> LaunchSpec {
        LaunchSpec {
            command: "make all".to_string(),
            env: EnvMap::new(),
            exit_policy: policy,
            log_file: log.map(PathBuf::from),
            tee_path: "tee".to_string(),
            geometry,
            working_dir: None,
        }
    }

    #[test]
    fn posix_line_tees_and_prompts() {
        let line = compose_shell_line(
            "make all",
            Some(Path::new("/tmp/x.log")),
            "tee",
            ExitPolicy::Prompt,
            Platform::Linux,
        );
        assert_eq!(
            line,
            "make all 2>&1 | \"tee\" \"/tmp/x.log\"; echo && echo Press ENTER to continue && read && exit"
        );
    }

    #[test]
    fn windows_line_uses_ampersand_and_pause() {
        let line = compose_shell_line("nmake", None, "tee", ExitPolicy::Prompt, Platform::Windows);
        assert_eq!(line, "nmake & pause && exit");

        let manual = compose_shell_line("nmake", None, "tee", ExitPolicy::Manual, Platform::Windows);
        assert!(manual.ends_with("& waitfor exit"));
    }

    #[test]
    fn linux_terminal_uses_plain_shell_and_geometry() {
        let launcher = TerminalLauncher::for_platform(Platform::Linux, "xterm");
        let geometry = TerminalGeometry { columns: 120, lines: 40 };
        let cmd = launcher.terminal_command(&spec(Some("/tmp/a.log"), ExitPolicy::Auto, Some(geometry)));

        assert_eq!(cmd.program, "/usr/bin/env");
        assert_eq!(&cmd.args[..2], &["bash".to_string(), "-c".to_string()]);
        assert!(cmd.args[2].starts_with("xterm -geometry 120x40 -e bash -c '"));
        assert!(cmd.args[2].contains("make all 2>&1 |"));
        assert!(cmd.args[2].ends_with("; exit'"));
        assert!(!cmd.raw_args);
    }

    #[test]
    fn osx_terminal_uses_login_shell() {
        let launcher = TerminalLauncher::for_platform(Platform::Osx, "xterm");
        let cmd = launcher.terminal_command(&spec(None, ExitPolicy::Manual, None));

        assert_eq!(&cmd.args[..3], &["bash".to_string(), "-l".to_string(), "-c".to_string()]);
        assert!(cmd.args[3].starts_with("xterm -e bash -c "));
        assert!(cmd.args[3].contains("sleep infinity"));
    }

    #[test]
    fn windows_terminal_waits_and_resizes() {
        let launcher = TerminalLauncher::for_platform(Platform::Windows, "unused");
        let geometry = TerminalGeometry { columns: 100, lines: 30 };
        let cmd = launcher.terminal_command(&spec(Some("C:\\c\\a.log"), ExitPolicy::Auto, Some(geometry)));

        assert_eq!(cmd.program, "cmd");
        assert!(cmd.raw_args);
        assert_eq!(cmd.args[0], "/C");
        assert!(cmd.args[1].starts_with("start /wait cmd /k \"powershell -command \"[console]::WindowWidth=100; [console]::WindowHeight=30;"));
        assert!(cmd.args[1].contains("make all 2>&1 | \"tee\" \"C:\\c\\a.log\" & exit"));
    }
}

// src/exec/process.rs

//! OS handle of a spawned terminal process and process-tree termination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::process::Child;
use tracing::{debug, info, warn};

/// A spawned terminal (or headless shell) process.
///
/// On POSIX the process is the leader of its own process group, so the whole
/// tree underneath it can be signalled at once.
///
/// `running()` is true iff the process has not exited. Once it has been
/// observed as exited it stays exited; a new run needs a new handle.
#[derive(Debug)]
pub struct TerminalProcess {
    pid: u32,
    child: Mutex<Child>,
    exited: AtomicBool,
}

impl TerminalProcess {
    pub fn new(child: Child) -> std::io::Result<Self> {
        let pid = child.id().ok_or_else(|| {
            std::io::Error::other("spawned process exited before its pid was read")
        })?;
        Ok(Self {
            pid,
            child: Mutex::new(child),
            exited: AtomicBool::new(false),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn running(&self) -> bool {
        if self.exited.load(Ordering::Acquire) {
            return false;
        }

        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = self.pid, exit_code = ?status.code(), "terminal process exited");
                self.exited.store(true, Ordering::Release);
                false
            }
            Err(e) => {
                warn!(pid = self.pid, error = %e, "failed to poll terminal process; treating as exited");
                self.exited.store(true, Ordering::Release);
                false
            }
        }
    }

    /// Kill the process together with all its descendants.
    ///
    /// A process that has already exited is left alone.
    pub fn terminate(&self) {
        if !self.running() {
            return;
        }

        info!(pid = self.pid, "terminating terminal process tree");
        kill_tree(self.pid);

        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = child.start_kill() {
            debug!(pid = self.pid, error = %e, "terminal process already gone");
        }
    }
}

impl Drop for TerminalProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(unix)]
fn kill_tree(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range; cannot signal process group");
        return;
    };

    match killpg(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "failed to signal process group"),
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) {
    use std::os::windows::process::CommandExt;

    // Terminating cmd.exe alone would orphan the command it started.
    let res = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .creation_flags(super::launcher::CREATE_NO_WINDOW)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();

    if let Err(e) = res {
        warn!(pid, error = %e, "failed to run taskkill");
    }
}

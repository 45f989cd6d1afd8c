use std::sync::{Arc, Mutex};

use buildterm::errors::{BuildTermError, Result};
use buildterm::exec::{HeadlessLauncher, LaunchSpec, Launcher, TerminalProcess};

/// A launcher that:
/// - records every `LaunchSpec` it was given
/// - runs the command headless, so output still flows through the log file.
#[derive(Default)]
pub struct RecordingLauncher {
    inner: HeadlessLauncher,
    launched: Arc<Mutex<Vec<LaunchSpec>>>,
}

impl RecordingLauncher {
    pub fn new(launched: Arc<Mutex<Vec<LaunchSpec>>>) -> Self {
        Self {
            inner: HeadlessLauncher::new(),
            launched,
        }
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<TerminalProcess> {
        self.launched.lock().unwrap().push(spec.clone());
        self.inner.launch(spec)
    }
}

/// A launcher whose spawn always fails.
pub struct FailingLauncher;

impl Launcher for FailingLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<TerminalProcess> {
        Err(BuildTermError::Launch {
            command: spec.command.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such terminal"),
        })
    }
}

// src/exec/async_process.rs

//! A launched terminal plus the background task relaying its output.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::env::{self, EnvMap, SearchPathScope};
use crate::errors::{BuildTermError, Result};
use crate::exec::launcher::{LaunchSpec, Launcher};
use crate::exec::log_file::LogFile;
use crate::exec::process::TerminalProcess;
use crate::exec::tailer::LogTailer;
use crate::types::{ExitPolicy, TerminalGeometry, TextEncoding};

/// Identity of one run; distinct for every [`AsyncProcess`] in this process.
pub type RunId = u64;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Receives the output of an [`AsyncProcess`].
///
/// Callbacks are made from the process's background task, in the order the
/// lines were read.
pub trait ProcessListener: Send + Sync {
    /// One non-empty line (or trailing fragment) of output.
    fn on_data(&self, process: &Arc<AsyncProcess>, data: String);

    /// Called exactly once after the last `on_data`, unless the process was
    /// killed first.
    fn on_finished(&self, process: &Arc<AsyncProcess>);
}

/// Parameters for [`AsyncProcess::launch`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// The user command as a shell line.
    pub command: String,
    /// Overrides merged over the process environment.
    pub env: EnvMap,
    pub exit_policy: ExitPolicy,
    pub tee: bool,
    /// Temporary search path used while spawning.
    pub path: Option<String>,
    pub encoding: TextEncoding,
    pub working_dir: Option<PathBuf>,
    pub cache_dir: PathBuf,
    /// tee executable; `$VAR` references are expanded against the child env.
    pub tee_path: String,
    pub geometry: Option<TerminalGeometry>,
}

/// Orchestrates launcher + tailer for one run.
///
/// [`AsyncProcess::launch`] spawns the terminal; [`AsyncProcess::relay_output`]
/// then starts the single background task that forwards output to the
/// listener. [`AsyncProcess::start`] does both.
pub struct AsyncProcess {
    id: RunId,
    started: Instant,
    command: String,
    process: Arc<TerminalProcess>,
    log_file: Arc<LogFile>,
    listener: Mutex<Option<Arc<dyn ProcessListener>>>,
    tailer: Mutex<Option<LogTailer>>,
    killed: AtomicBool,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AsyncProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncProcess")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("pid", &self.process.pid())
            .field("killed", &self.killed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AsyncProcess {
    /// Launch and immediately start relaying output to `listener`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        options: ProcessOptions,
        launcher: &dyn Launcher,
        listener: Arc<dyn ProcessListener>,
    ) -> Result<Arc<Self>> {
        let process = Self::launch(options, launcher, listener)?;
        process.relay_output();
        Ok(process)
    }

    /// Create the log file, open the tailer and spawn the terminal.
    ///
    /// No output is relayed until [`AsyncProcess::relay_output`] is called.
    /// Must be called from within a Tokio runtime.
    pub fn launch(
        options: ProcessOptions,
        launcher: &dyn Launcher,
        listener: Arc<dyn ProcessListener>,
    ) -> Result<Arc<Self>> {
        if options.command.trim().is_empty() {
            return Err(BuildTermError::InvalidRequest(
                "shell_cmd or cmd is required".to_string(),
            ));
        }

        let id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let log_file = Arc::new(LogFile::create(&options.cache_dir, &options.command)?);
        let cancel = CancellationToken::new();
        let tailer = LogTailer::open(Arc::clone(&log_file), options.encoding, cancel.clone())?;

        let process = {
            // PATH is overridden only for the span of building the env and spawning.
            let _search_path = SearchPathScope::acquire(options.path.as_deref());
            let child_env = env::resolve(&env::process_env(), &options.env);
            let tee_path = env::expand_vars(&options.tee_path, |name| child_env.get(name).cloned());

            let spec = LaunchSpec {
                command: options.command.clone(),
                env: child_env,
                exit_policy: options.exit_policy,
                log_file: options.tee.then(|| log_file.path().to_path_buf()),
                tee_path,
                geometry: options.geometry,
                working_dir: options.working_dir.clone(),
            };
            launcher.launch(&spec)?
        };

        info!(
            run_id = id,
            pid = process.pid(),
            log_file = ?log_file.path(),
            "run started"
        );

        Ok(Arc::new(Self {
            id,
            started: Instant::now(),
            command: options.command,
            process: Arc::new(process),
            log_file,
            listener: Mutex::new(Some(listener)),
            tailer: Mutex::new(Some(tailer)),
            killed: AtomicBool::new(false),
            cancel,
            worker: Mutex::new(None),
        }))
    }

    /// Spawn the background task that drains the tailer into the listener.
    ///
    /// Only the first call has an effect.
    pub fn relay_output(self: &Arc<Self>) {
        let Some(tailer) = self.tailer.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return;
        };

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.pump(tailer).await;
        });
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    async fn pump(self: Arc<Self>, mut tailer: LogTailer) {
        let process = Arc::clone(&self.process);
        let is_alive = move || process.running();

        loop {
            match tailer.next_line(&is_alive).await {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(listener) = self.listener() {
                        listener.on_data(&self, line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(run_id = self.id, error = %e, "reading log file failed; ending run output");
                    break;
                }
            }
        }

        self.log_file.remove();

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match listener {
            Some(listener) => {
                debug!(run_id = self.id, "output finished");
                listener.on_finished(&self);
            }
            None => debug!(run_id = self.id, "output finished after kill; listener detached"),
        }
    }

    fn listener(&self) -> Option<Arc<dyn ProcessListener>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Kill the process tree and detach the listener.
    ///
    /// Returns `true` for the call that actually performed the kill; later
    /// calls do nothing and return `false`.
    pub fn kill(&self) -> bool {
        if self.killed.swap(true, Ordering::AcqRel) {
            return false;
        }

        info!(run_id = self.id, pid = self.process.pid(), "killing run");
        self.cancel.cancel();
        self.process.terminate();
        self.log_file.remove();
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        true
    }

    /// Whether the terminal process is still running.
    pub fn poll(&self) -> bool {
        self.process.running()
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file.path().to_path_buf()
    }

    /// Wait for the background task to end.
    pub async fn join(&self) {
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(run_id = self.id, error = %e, "output task panicked");
            }
        }
    }
}

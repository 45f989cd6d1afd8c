// src/engine/orchestrator.rs

//! The build orchestrator: owns the single active run and the results panel.
//!
//! Output flows like this:
//!
//! ```text
//! AsyncProcess task --on_data--> OutputQueue --ServiceTextQueue--> panel
//!                   --on_finished--> Finish --> summary line --> Publish
//! ```
//!
//! Lock order is `panel` before `queue`. Starting a run holds the panel lock
//! while it clears the queue, so a drain in flight cannot deliver text of
//! the previous run into the freshly configured panel.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::env::EnvMap;
use crate::errors::{BuildTermError, Result};
use crate::exec::{
    AsyncProcess, HeadlessLauncher, Launcher, ProcessListener, ProcessOptions, RunId,
    RunRequest, TerminalLauncher,
};
use crate::panel::{ErrorIndex, ResultsPanel};

use super::queue::{AppendOutcome, OutputQueue};
use super::ui::{TICK, UiHandle, UiHandler, UiTask, run_ui_loop};
use super::{BuildSummary, Phase, RunStatus};

/// What the host knows about the view a build was triggered from.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    /// The active document; its directory is the default working dir.
    pub active_file: Option<PathBuf>,
    /// Per-view environment overrides, applied over the request's `env`.
    pub build_env: EnvMap,
}

#[derive(Debug)]
struct Session {
    phase: Phase,
    quiet: bool,
    /// Diagnostic block appended after a failed build.
    debug_text: String,
    show_errors_inline: bool,
    errors: ErrorIndex,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            quiet: false,
            debug_text: String::new(),
            show_errors_inline: false,
            errors: ErrorIndex::new(),
        }
    }
}

/// Shared state behind a [`BuildOrchestrator`].
///
/// It is the [`ProcessListener`] of every run it starts and the
/// [`UiHandler`] of its UI loop.
pub struct OrchestratorState<P: ResultsPanel> {
    settings: Settings,
    launcher: Arc<dyn Launcher>,
    panel: Mutex<P>,
    queue: Mutex<OutputQueue>,
    current: Mutex<Option<Arc<AsyncProcess>>>,
    session: Mutex<Session>,
    ui: UiHandle,
    status: watch::Sender<RunStatus>,
}

/// Starts, cancels and reports builds. Cheap to clone.
pub struct BuildOrchestrator<P: ResultsPanel + 'static> {
    state: Arc<OrchestratorState<P>>,
}

impl<P: ResultsPanel + 'static> Clone for BuildOrchestrator<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: ResultsPanel + 'static> std::fmt::Debug for BuildOrchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("phase", &self.phase())
            .field("current", &lock(&self.state.current).as_ref().map(|p| p.id()))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: ResultsPanel + 'static> BuildOrchestrator<P> {
    /// Create an orchestrator using the launcher selected by `settings`.
    ///
    /// Must be called from within a Tokio runtime: the UI loop is spawned
    /// here.
    pub fn new(settings: Settings, panel: P) -> Self {
        let launcher: Arc<dyn Launcher> = if settings.headless {
            Arc::new(HeadlessLauncher::new())
        } else {
            Arc::new(TerminalLauncher::new(settings.terminal.clone()))
        };
        Self::with_launcher(settings, launcher, panel)
    }

    pub fn with_launcher(settings: Settings, launcher: Arc<dyn Launcher>, panel: P) -> Self {
        let (ui, rx) = UiHandle::channel();
        let (status, _) = watch::channel(RunStatus::Idle);

        let state = Arc::new(OrchestratorState {
            settings,
            launcher,
            panel: Mutex::new(panel),
            queue: Mutex::new(OutputQueue::new()),
            current: Mutex::new(None),
            session: Mutex::new(Session::default()),
            ui,
            status,
        });

        tokio::spawn(run_ui_loop(rx, Arc::downgrade(&state)));

        Self { state }
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    /// Start a build, or cancel the active one if `request.kill` is set.
    /// Any run still active is killed first.
    ///
    /// Returns the id of the started run. Invalid requests and launch
    /// failures are reported in the panel and return `None`.
    pub fn start(&self, request: RunRequest, view: &ViewContext) -> Option<RunId> {
        let state = &self.state;

        if request.kill {
            self.kill();
            return None;
        }

        let command = match request.command() {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "rejecting build request");
                let previous = {
                    let mut panel = lock(&state.panel);
                    lock(&state.queue).clear();
                    let previous = lock(&state.current).take();
                    panel.configure(&request.file_regex, &request.line_regex, None);

                    let mut session = lock(&state.session);
                    panel.clear_errors(&session.errors);
                    session.errors.clear();
                    session.debug_text.clear();
                    session.phase = Phase::Idle;
                    previous
                };
                stop_superseded(previous);
                state.append_string(None, &format!("{e}\n"));
                state.ui.post(UiTask::Publish(RunStatus::Failed(e.to_string())));
                return None;
            }
        };

        let working_dir = request
            .working_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty())
            .or_else(|| {
                view.active_file
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            });

        let display = command.to_shell_line();
        let quiet = request.quiet;

        let previous = {
            let mut panel = lock(&state.panel);
            lock(&state.queue).clear();
            let previous = lock(&state.current).take();

            panel.configure(&request.file_regex, &request.line_regex, working_dir.as_deref());
            if !quiet {
                panel.set_status("Building");
            }
            if request.show_panel_on_build || state.settings.show_panel_on_build {
                panel.show();
            }

            let mut session = lock(&state.session);
            panel.clear_errors(&session.errors);
            session.errors.clear();
            session.show_errors_inline = state.settings.show_errors_inline;
            session.quiet = quiet;
            session.debug_text.clear();
            session.phase = Phase::Starting;
            previous
        };
        stop_superseded(previous);

        if !quiet {
            state.append_string(None, &format!("Running {display}\n"));
        }

        let mut env = request.env.clone();
        env.extend(view.build_env.clone());

        let entered = enter_dir(working_dir.as_deref());
        let debug_text = debug_text(&command.debug_line(), &env);
        lock(&state.session).debug_text = debug_text.clone();

        match entered.and_then(|()| self.launch(&request, display, env, working_dir)) {
            Ok(process) => {
                let id = process.id();
                lock(&state.queue).set_owner(Some(id));
                *lock(&state.current) = Some(Arc::clone(&process));
                lock(&state.session).phase = Phase::Running;
                state.status.send_replace(RunStatus::Running(id));
                process.relay_output();
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "build failed to start");
                lock(&state.session).phase = Phase::Idle;
                state.append_string(None, &format!("{e}\n"));
                state.append_string(None, &debug_text);
                if !quiet {
                    state.append_string(None, "\n[Finished]");
                }
                state.ui.post(UiTask::Publish(RunStatus::Failed(e.to_string())));
                None
            }
        }
    }

    fn launch(
        &self,
        request: &RunRequest,
        display: String,
        env: EnvMap,
        working_dir: Option<PathBuf>,
    ) -> Result<Arc<AsyncProcess>> {
        let settings = &self.state.settings;
        let options = ProcessOptions {
            command: display,
            env,
            exit_policy: request.terminal_exit.unwrap_or(settings.terminal_exit),
            tee: request.tee,
            path: request.path.clone(),
            encoding: request.text_encoding(),
            working_dir,
            cache_dir: settings.cache_dir.clone(),
            tee_path: settings.tee_path().to_string(),
            geometry: settings.terminal_geometry,
        };

        let listener: Arc<dyn ProcessListener> = self.state.clone();
        AsyncProcess::launch(options, self.state.launcher.as_ref(), listener)
    }

    /// Cancel the active run. Returns `false` if there was none.
    pub fn kill(&self) -> bool {
        let state = &self.state;

        lock(&state.queue).clear();
        let Some(process) = lock(&state.current).take() else {
            debug!("kill requested without an active run");
            return false;
        };

        lock(&state.session).phase = Phase::Cancelling;
        info!(run_id = process.id(), "cancelling build");
        process.kill();
        state.append_string(None, "[Cancelled]");
        lock(&state.session).phase = Phase::Idle;
        state.ui.post(UiTask::Publish(RunStatus::Cancelled(process.id())));
        true
    }

    /// Whether the command is currently available. Cancelling needs a
    /// running build; starting is always possible.
    pub fn is_enabled(&self, kill: bool) -> bool {
        if !kill {
            return true;
        }
        lock(&self.state.current)
            .as_ref()
            .is_some_and(|process| process.poll())
    }

    /// Remove inline annotations and stop showing new ones for this build.
    pub fn hide_errors(&self) {
        let mut panel = lock(&self.state.panel);
        let mut session = lock(&self.state.session);
        panel.clear_errors(&session.errors);
        session.errors.clear();
        session.show_errors_inline = false;
    }

    /// Re-render the current annotations, e.g. after a view was reloaded.
    pub fn update_errors(&self) {
        let mut panel = lock(&self.state.panel);
        let session = lock(&self.state.session);
        if session.show_errors_inline {
            panel.render_errors(&session.errors);
        }
    }

    /// Annotations currently attached, keyed by file.
    pub fn errors(&self) -> ErrorIndex {
        lock(&self.state.session).errors.clone()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state.session).phase
    }

    pub fn current(&self) -> Option<Arc<AsyncProcess>> {
        lock(&self.state.current).clone()
    }

    /// Run `f` with the panel locked.
    pub fn with_panel<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut lock(&self.state.panel))
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.state.status.subscribe()
    }

    /// Wait until `run` finished, was cancelled or got superseded.
    pub async fn wait_for(&self, run: RunId) -> RunStatus {
        let mut rx = self.subscribe();
        loop {
            {
                let status = rx.borrow_and_update();
                if status.settles(run) {
                    return status.clone();
                }
            }
            if rx.changed().await.is_err() {
                return RunStatus::Idle;
            }
        }
    }
}

/// A new request replaces whatever run is still active.
fn stop_superseded(previous: Option<Arc<AsyncProcess>>) {
    if let Some(process) = previous {
        info!(run_id = process.id(), "stopping superseded build");
        process.kill();
    }
}

/// The working directory is process-wide state.
fn enter_dir(dir: Option<&Path>) -> Result<()> {
    let Some(dir) = dir else {
        return Ok(());
    };
    std::env::set_current_dir(dir).map_err(|source| BuildTermError::Launch {
        command: format!("cd {}", dir.display()),
        source,
    })
}

fn debug_text(command_line: &str, env: &EnvMap) -> String {
    let dir = std::env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    let path = env
        .get("PATH")
        .cloned()
        .or_else(|| std::env::var("PATH").ok())
        .unwrap_or_default();
    format!("{command_line}\n[dir: {dir}]\n[path: {path}]")
}

/// `\r\n` and lone `\r` become `\n`.
fn normalize_newlines(data: &str) -> String {
    data.replace("\r\n", "\n").replace('\r', "\n")
}

impl<P: ResultsPanel> OrchestratorState<P> {
    /// Queue `text` for the panel, scheduling a drain if the queue was idle.
    ///
    /// Output of a run that no longer owns the queue kills that run.
    fn append_string(&self, producer: Option<&Arc<AsyncProcess>>, text: &str) {
        let outcome = lock(&self.queue).append(producer.map(|p| p.id()), text);
        match outcome {
            AppendOutcome::Queued { was_empty: true } => {
                self.ui.post(UiTask::ServiceTextQueue);
            }
            AppendOutcome::Queued { was_empty: false } => {}
            AppendOutcome::Stale => {
                if let Some(process) = producer {
                    debug!(run_id = process.id(), "output from superseded run; killing it");
                    process.kill();
                }
            }
        }
    }

    fn is_current(&self, process: &Arc<AsyncProcess>) -> bool {
        lock(&self.current)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, process))
    }

    fn service_text_queue(&self) {
        let mut panel = lock(&self.panel);
        let Some((text, now_empty)) = lock(&self.queue).pop_front() else {
            return;
        };

        panel.append(&text);

        if text.contains('\n') {
            let mut session = lock(&self.session);
            if session.show_errors_inline {
                session.errors = ErrorIndex::from_results(panel.find_all_results());
                panel.render_errors(&session.errors);
            }
        }
        drop(panel);

        if !now_empty {
            self.ui.post_after(UiTask::ServiceTextQueue, TICK);
        }
    }

    fn finish(&self, process: Arc<AsyncProcess>) {
        if !self.is_current(&process) {
            debug!(run_id = process.id(), "finish of superseded run ignored");
            return;
        }

        // All output has to reach the panel before results are counted.
        if !lock(&self.queue).is_empty() {
            self.ui.post_after(UiTask::Finish(process), TICK);
            return;
        }

        let elapsed = process.started().elapsed();
        let secs = elapsed.as_secs_f64();

        let (quiet, debug_text) = {
            let mut session = lock(&self.session);
            session.phase = Phase::Finishing;
            (session.quiet, session.debug_text.clone())
        };

        let mut panel = lock(&self.panel);
        let errors = panel.find_all_results().len();

        if errors == 0 {
            panel.set_status("Build finished");
            if !quiet {
                self.append_string(Some(&process), &format!("[Finished in {secs:.1}]"));
            }
            if self.settings.hide_panel_without_errors {
                panel.hide();
            }
        } else {
            panel.set_status(&format!("Build finished with {errors} errors"));
            if !quiet {
                self.append_string(
                    Some(&process),
                    &format!("[Finished in {secs:.1} with {errors} errors]\n"),
                );
                self.append_string(Some(&process), &debug_text);
            }
            panel.show();
        }
        drop(panel);

        info!(run_id = process.id(), errors, elapsed = ?elapsed, "build finished");
        lock(&self.session).phase = Phase::Idle;

        self.ui.post(UiTask::Publish(RunStatus::Finished(BuildSummary {
            run_id: process.id(),
            elapsed,
            errors,
        })));
    }

    fn publish(&self, status: RunStatus) {
        if !lock(&self.queue).is_empty() {
            self.ui.post_after(UiTask::Publish(status), TICK);
            return;
        }
        self.status.send_replace(status);
    }
}

impl<P: ResultsPanel + 'static> ProcessListener for OrchestratorState<P> {
    fn on_data(&self, process: &Arc<AsyncProcess>, data: String) {
        self.append_string(Some(process), &normalize_newlines(&data));
    }

    fn on_finished(&self, process: &Arc<AsyncProcess>) {
        self.ui.post(UiTask::Finish(Arc::clone(process)));
    }
}

impl<P: ResultsPanel + 'static> UiHandler for OrchestratorState<P> {
    fn handle(&self, task: UiTask) {
        match task {
            UiTask::ServiceTextQueue => self.service_text_queue(),
            UiTask::Finish(process) => self.finish(process),
            UiTask::Publish(status) => self.publish(status),
        }
    }
}

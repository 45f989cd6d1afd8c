#![allow(dead_code)]

pub use buildterm_test_utils::builders;
pub use buildterm_test_utils::fake_launcher;
pub use buildterm_test_utils::{eventually, init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;

use buildterm::config::Settings;
use buildterm::engine::{BuildOrchestrator, RunStatus, ViewContext};
use buildterm::exec::{Launcher, RunId, RunRequest};
use buildterm::panel::BufferPanel;

use self::builders::SettingsBuilder;

pub type Orchestrator = BuildOrchestrator<BufferPanel>;

/// Headless orchestrator writing its logs below `cache_dir`.
pub fn orchestrator(cache_dir: &Path) -> Orchestrator {
    BuildOrchestrator::new(SettingsBuilder::new(cache_dir).build(), BufferPanel::new())
}

pub fn orchestrator_with(settings: Settings, launcher: Arc<dyn Launcher>) -> Orchestrator {
    BuildOrchestrator::with_launcher(settings, launcher, BufferPanel::new())
}

pub fn start(orch: &Orchestrator, request: RunRequest) -> RunId {
    orch.start(request, &ViewContext::default())
        .expect("build should start")
}

/// Start `request` and wait for its final status.
pub async fn run_to_end(orch: &Orchestrator, request: RunRequest) -> RunStatus {
    let id = start(orch, request);
    with_timeout(orch.wait_for(id)).await
}

pub fn panel_text(orch: &Orchestrator) -> String {
    orch.with_panel(|p| p.text().to_string())
}

/// Files left in the log cache directory.
pub fn cached_logs(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Restores the process working directory on drop.
pub struct CwdGuard(Option<std::path::PathBuf>);

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            let _ = std::env::set_current_dir(dir);
        }
    }
}

/// Builds that set a working directory change it for the whole test binary.
pub fn keep_cwd() -> CwdGuard {
    CwdGuard(std::env::current_dir().ok())
}

#![cfg(unix)]

mod common;
use crate::common::builders::RunRequestBuilder;
use crate::common::{cached_logs, eventually, init_tracing, orchestrator, panel_text, start, with_timeout};

use std::error::Error;

use buildterm::engine::{Phase, RunStatus, ViewContext};
use buildterm::exec::RunRequest;
use buildterm::types::ExitPolicy;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_cancels_the_run_once() -> TestResult {
    init_tracing();
    let cache = tempfile::tempdir()?;
    let orch = orchestrator(cache.path());

    let id = start(&orch, RunRequest::shell("sh -c 'echo started; sleep 30'"));
    eventually(|| panel_text(&orch).contains("started\n")).await;
    let process = orch.current().expect("active run");
    assert!(orch.is_enabled(true));

    assert!(orch.kill());
    assert!(!orch.kill(), "second kill has nothing to cancel");
    assert!(!process.kill(), "process kill is idempotent");

    let status = with_timeout(orch.wait_for(id)).await;
    assert_eq!(status, RunStatus::Cancelled(id));
    assert!(panel_text(&orch).ends_with("[Cancelled]"));

    eventually(|| !process.poll()).await;
    assert!(!orch.is_enabled(true));
    eventually(|| cached_logs(cache.path()) == 0).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_request_without_active_run_is_a_no_op() -> TestResult {
    init_tracing();
    let cache = tempfile::tempdir()?;
    let orch = orchestrator(cache.path());

    assert!(!orch.is_enabled(true));
    assert!(orch.is_enabled(false));
    assert!(!orch.kill());
    assert_eq!(orch.start(RunRequest::kill(), &ViewContext::default()), None);
    assert_eq!(panel_text(&orch), "");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_request_cancels_active_run() -> TestResult {
    init_tracing();
    let cache = tempfile::tempdir()?;
    let orch = orchestrator(cache.path());

    let id = start(&orch, RunRequest::shell("sleep 30"));
    assert_eq!(orch.start(RunRequest::kill(), &ViewContext::default()), None);

    let status = with_timeout(orch.wait_for(id)).await;
    assert_eq!(status, RunStatus::Cancelled(id));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_run_supersedes_and_silences_the_old_one() -> TestResult {
    init_tracing();
    let cache = tempfile::tempdir()?;
    let orch = orchestrator(cache.path());

    let first = start(
        &orch,
        RunRequest::shell("for i in 1 2 3 4 5 6 7 8 9 10; do echo old$i; sleep 0.2; done"),
    );
    eventually(|| panel_text(&orch).contains("old1\n")).await;
    let old = orch.current().expect("first run active");

    let second = start(&orch, RunRequest::argv(["echo", "new"]));
    assert_ne!(first, second);

    let status = with_timeout(orch.wait_for(second)).await;
    assert!(matches!(status, RunStatus::Finished(s) if s.run_id == second));

    let text = panel_text(&orch);
    assert!(text.starts_with("Running echo new\nnew\n[Finished in "), "unexpected panel text: {text:?}");
    assert!(!text.contains("old"));

    // Starting the second run killed the first.
    eventually(|| old.is_killed()).await;
    eventually(|| !old.poll()).await;
    assert!(!panel_text(&orch).contains("old"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_run_kills_a_silent_previous_run() -> TestResult {
    init_tracing();
    let cache = tempfile::tempdir()?;
    let orch = orchestrator(cache.path());

    start(&orch, RunRequest::shell("sleep 30"));
    let old = orch.current().expect("first run active");
    assert!(old.poll());

    let second = start(&orch, RunRequest::argv(["echo", "new"]));
    assert!(old.is_killed(), "superseded run is killed on start");

    let status = with_timeout(orch.wait_for(second)).await;
    assert!(matches!(status, RunStatus::Finished(s) if s.run_id == second));
    eventually(|| !old.poll()).await;
    Ok(())
}

/// Processes in group `pgid` that have not exited yet.
#[cfg(target_os = "linux")]
fn live_group_members(pgid: u32) -> usize {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return 0;
    };
    entries
        .filter_map(|e| std::fs::read_to_string(e.ok()?.path().join("stat")).ok())
        .filter(|stat| {
            // "pid (comm) state ppid pgrp ..."
            let Some((_, rest)) = stat.rsplit_once(')') else {
                return false;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            fields.len() > 2 && fields[0] != "Z" && fields[2] == pgid.to_string()
        })
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_exit_keeps_running_until_killed() -> TestResult {
    init_tracing();
    let cache = tempfile::tempdir()?;
    let orch = orchestrator(cache.path());

    let request = RunRequestBuilder::shell("echo ready")
        .terminal_exit(ExitPolicy::Manual)
        .quiet()
        .build();
    let id = start(&orch, request);
    eventually(|| panel_text(&orch) == "ready\n").await;

    // The command is done but the terminal waits to be closed.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let process = orch.current().expect("manual run stays active");
    assert!(process.poll());
    assert!(orch.is_enabled(true));
    assert_eq!(orch.phase(), Phase::Running);

    assert!(orch.kill());
    let status = with_timeout(orch.wait_for(id)).await;
    assert_eq!(status, RunStatus::Cancelled(id));

    eventually(|| !process.poll()).await;
    #[cfg(target_os = "linux")]
    eventually(|| live_group_members(process.pid()) == 0).await;
    Ok(())
}

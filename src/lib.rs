// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod panel;
pub mod types;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::{CliArgs, CliCommand, RunArgs, prompt_command};
use crate::config::{Settings, load_or_default};
use crate::engine::{BuildOrchestrator, RunStatus, ViewContext};
use crate::exec::clear_cache;
use crate::panel::BufferPanel;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading
/// - the orchestrator with a stdout-echoing panel
/// - Ctrl-C handling (cancels the build)
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = load_or_default(args.config.as_deref()).context("failed to load settings")?;

    match args.command {
        CliCommand::ClearCache => {
            let removed = clear_cache(&settings.cache_dir).with_context(|| {
                format!("failed to clear {}", settings.cache_dir.display())
            })?;
            println!(
                "removed {removed} log file(s) from {}",
                settings.cache_dir.display()
            );
            Ok(())
        }
        CliCommand::Run(run_args) => run_build(settings, &run_args).await,
    }
}

async fn run_build(settings: Settings, args: &RunArgs) -> Result<()> {
    let orchestrator = BuildOrchestrator::new(settings, BufferPanel::echoing());
    let mut status = orchestrator.subscribe();

    let mut request = args.to_request();
    if args.prompt {
        request = prompt_command(request, std::io::stdin().lock(), std::io::stderr())
            .context("failed to read the edited command")?;
    }

    let Some(run_id) = orchestrator.start(request, &ViewContext::default()) else {
        // Let the failure text reach stdout before exiting.
        let failed = status
            .wait_for(|s| matches!(s, RunStatus::Failed(_)))
            .await
            .map(|s| s.clone());
        println!();
        match failed {
            Ok(RunStatus::Failed(message)) => bail!("build did not start: {message}"),
            _ => bail!("build did not start"),
        }
    };

    let outcome = tokio::select! {
        outcome = orchestrator.wait_for(run_id) => outcome,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            info!(run_id, "Ctrl+C received; cancelling build");
            orchestrator.kill();
            orchestrator.wait_for(run_id).await
        }
    };
    println!();

    match outcome {
        RunStatus::Finished(summary) if summary.errors > 0 => {
            bail!("build finished with {} errors", summary.errors)
        }
        RunStatus::Finished(_) => Ok(()),
        RunStatus::Cancelled(_) => bail!("build cancelled"),
        other => bail!("build ended unexpectedly: {other:?}"),
    }
}

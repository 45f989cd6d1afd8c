// src/engine/ui.rs

//! Cooperative single-consumer UI loop.
//!
//! Everything that touches the results panel on behalf of a running build
//! is posted here as a [`UiTask`] and executed one at a time, in order, by
//! [`run_ui_loop`]. Tasks can re-post themselves with a delay, which is how
//! the output queue is drained one block per tick.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::exec::AsyncProcess;

use super::RunStatus;

/// Delay between two drained output blocks.
pub const TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub enum UiTask {
    /// Deliver the oldest queued block to the panel.
    ServiceTextQueue,
    /// The given run's output ended.
    Finish(Arc<AsyncProcess>),
    /// Publish a status change once all queued output has been delivered.
    Publish(RunStatus),
}

/// Executes [`UiTask`]s on the UI loop.
pub trait UiHandler: Send + Sync + 'static {
    fn handle(&self, task: UiTask);
}

/// Posting side of the UI loop.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiTask>,
}

impl UiHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Run `task` as soon as the loop gets to it.
    pub fn post(&self, task: UiTask) {
        if self.tx.send(task).is_err() {
            debug!("ui loop closed; dropping task");
        }
    }

    /// Run `task` after `delay`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn post_after(&self, task: UiTask, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(task);
        });
    }
}

/// Consume tasks until the channel closes or the handler is dropped.
pub async fn run_ui_loop<H: UiHandler>(mut rx: mpsc::UnboundedReceiver<UiTask>, handler: Weak<H>) {
    debug!("ui loop started");

    while let Some(task) = rx.recv().await {
        let Some(handler) = handler.upgrade() else {
            break;
        };
        trace!(?task, "ui task");
        handler.handle(task);
    }

    debug!("ui loop finished");
}

//! Single-slot task executor.
//!
//! # Responsibilities
//! - Run at most one handler body at a time, across both protocols
//! - Observe the previous worker's completion before starting the next
//!
//! # Design Decisions
//! - The at-most-one invariant is structural: `submit` joins the prior
//!   task before spawning, so there is no window with two live handlers
//! - A panicking worker is logged and treated as a completed `Continue`

use std::future::Future;

use tokio::task::JoinHandle;

use crate::proto::HandlerOutcome;

/// Holds the one live (or just-finished, not yet joined) worker task.
#[derive(Default)]
pub struct SingleSlot {
    handle: Option<JoinHandle<HandlerOutcome>>,
}

impl SingleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler body is currently executing.
    pub fn is_busy(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// A task is tracked, finished or not.
    pub fn has_task(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the next handler. Joins the previous worker first — its
    /// completion is observed before the new task exists — and returns
    /// that worker's outcome, if there was one.
    pub async fn submit<F>(&mut self, task: F) -> Option<HandlerOutcome>
    where
        F: Future<Output = HandlerOutcome> + Send + 'static,
    {
        let previous = match self.handle.take() {
            Some(handle) => Some(join(handle).await),
            None => None,
        };
        self.handle = Some(tokio::spawn(task));
        previous
    }

    /// Wait for the tracked worker and take its outcome. Pending forever
    /// when no task is tracked, so it composes with select loops.
    ///
    /// Cancellation-safe: the task stays tracked until it has actually
    /// been joined.
    pub async fn join_next(&mut self) -> HandlerOutcome {
        match self.handle.as_mut() {
            Some(handle) => {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(error = %e, "Worker task failed");
                        HandlerOutcome::Continue
                    }
                };
                self.handle = None;
                outcome
            }
            None => std::future::pending().await,
        }
    }
}

async fn join(handle: JoinHandle<HandlerOutcome>) -> HandlerOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Worker task failed");
            HandlerOutcome::Continue
        }
    }
}

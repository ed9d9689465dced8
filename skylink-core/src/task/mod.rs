//! Task set for the channel loops of one link session.
//!
//! Every loop is spawned with a child of the same [`CancellationToken`]
//! and tracked by name so teardown can report which loop misbehaved.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct NamedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Spawned channel loops sharing one cancellation token.
pub struct ChannelTasks {
    cancel: CancellationToken,
    tasks: Vec<NamedTask>,
}

impl ChannelTasks {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// The token every spawned loop observes.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn `f(token)` as a tracked task.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(f(self.cancel.child_token()));
        debug!(task = name, "channel task spawned");
        self.tasks.push(NamedTask { name, handle });
    }

    /// Names of the tracked tasks, in spawn order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name).collect()
    }

    /// Whether every tracked task has returned.
    pub fn all_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.handle.is_finished())
    }

    /// Signal every loop to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel, then wait for every task. Tasks still running after
    /// `grace` are aborted.
    pub async fn join_all(&mut self, grace: Duration) {
        self.cancel();
        for mut task in self.tasks.drain(..) {
            match tokio::time::timeout(grace, &mut task.handle).await {
                Ok(Ok(())) => debug!(task = task.name, "channel task joined"),
                Ok(Err(e)) => warn!(task = task.name, error = %e, "channel task panicked"),
                Err(_) => {
                    warn!(task = task.name, ?grace, "channel task ignored cancellation, aborting");
                    task.handle.abort();
                }
            }
        }
    }
}

impl Default for ChannelTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChannelTasks {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Tests ────────────────────────────────────────────────────────

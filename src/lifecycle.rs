// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Start/stop/status switches for the long-running loops
//!
//! Each loop (sync, monitor, handler) lives in a [`LoopSlot`]: a run flag and
//! the task handle of the loop. The flag is a [`CancellationToken`]: it is set
//! while the token is live and cleared by cancelling it, which the loop
//! observes at its next await point. Stopping never aborts in-flight work.
//!
//! The reported [`LoopStatus`] is derived from both halves:
//!
//! | flag  | task alive | status   |
//! |-------|------------|----------|
//! | set   | yes        | RUNNING  |
//! | clear | yes        | STOPPING |
//! | clear | no         | DEAD     |
//! | set   | no         | CRASH    |

use std::{fmt, future::Future};

use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Observable state of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoopStatus {
    /// Flag set, task alive
    Running,
    /// Flag cleared, task still finishing its current iteration
    Stopping,
    /// Flag cleared, no task
    Dead,
    /// Flag set but the task ended on its own: it failed or panicked
    Crash,
}

impl LoopStatus {
    /// Status for a `(flag set, task alive)` pair.
    pub fn from_flags(flag_set: bool, alive: bool) -> Self {
        match (flag_set, alive) {
            (true, true) => LoopStatus::Running,
            (false, true) => LoopStatus::Stopping,
            (false, false) => LoopStatus::Dead,
            (true, false) => LoopStatus::Crash,
        }
    }

    /// Whether the loop's task is still alive.
    pub fn is_alive(self) -> bool {
        matches!(self, LoopStatus::Running | LoopStatus::Stopping)
    }
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopStatus::Running => "RUNNING",
            LoopStatus::Stopping => "STOPPING",
            LoopStatus::Dead => "DEAD",
            LoopStatus::Crash => "CRASH",
        })
    }
}

/// Run flag and task handle of one loop.
#[derive(Debug)]
pub struct LoopSlot<T> {
    name: &'static str,
    flag: Option<CancellationToken>,
    task: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> LoopSlot<T> {
    /// An idle slot; `name` labels its log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            flag: None,
            task: None,
        }
    }

    /// Whether the run flag is set.
    pub fn flag_set(&self) -> bool {
        self.flag.as_ref().is_some_and(|flag| !flag.is_cancelled())
    }

    /// Whether the loop's task is alive.
    pub fn alive(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Current status.
    pub fn status(&self) -> LoopStatus {
        LoopStatus::from_flags(self.flag_set(), self.alive())
    }

    /// Set the flag and spawn `task` with it, unless the loop is running.
    ///
    /// A loop that is still stopping is awaited first. Returns whether a task
    /// was spawned.
    pub async fn start<F, Fut>(&mut self, task: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        if self.status() == LoopStatus::Running {
            debug!(task = self.name, "Already running");
            return false;
        }
        if let Some(Err(e)) = self.join().await {
            warn!(task = self.name, error = %e, "Previous task did not finish cleanly");
        }

        let flag = CancellationToken::new();
        self.task = Some(tokio::spawn(task(flag.clone())));
        self.flag = Some(flag);
        debug!(task = self.name, "Started");
        true
    }

    /// Clear the flag. The task finishes its current step and exits.
    pub fn stop(&mut self) {
        if let Some(flag) = &self.flag {
            if !flag.is_cancelled() {
                debug!(task = self.name, "Stop requested");
            }
            flag.cancel();
        }
    }

    /// Wait for the task, if any, and return its output.
    pub async fn join(&mut self) -> Option<Result<T, JoinError>> {
        let task = self.task.take()?;
        Some(task.await)
    }

    /// Output of a task that already ended; `None` while it runs.
    pub async fn finished(&mut self) -> Option<Result<T, JoinError>> {
        if self.task.as_ref().is_some_and(JoinHandle::is_finished) {
            self.join().await
        } else {
            None
        }
    }

    /// Clear the flag and wait for the task.
    pub async fn shutdown(&mut self) -> Option<Result<T, JoinError>> {
        self.stop();
        self.join().await
    }
}

impl<T> Drop for LoopSlot<T> {
    fn drop(&mut self) {
        // Detached tasks would otherwise run on with their flag still set
        if let Some(flag) = &self.flag {
            flag.cancel();
        }
    }
}

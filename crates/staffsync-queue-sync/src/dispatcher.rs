//! Task dispatcher: replays queued mutations against the remote API.
//!
//! One call to [`Dispatcher::drain`] is one pass over the tasks that were
//! eligible when it started. Tasks are processed strictly one at a time in
//! FIFO order, and each outcome is committed to the store before the next
//! task is touched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use staffsync_queue_core::{MalformedTask, QueuedTask, TaskId, MAX_RETRIES};
use staffsync_queue_store::QueueStore;

use crate::error::Result;
use crate::remote::{RemoteError, RemoteMutationApi};

/// Configuration for dispatch behavior.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Failed dispatches after which a task is discarded.
    pub max_retries: u32,
    /// Upper bound on a single remote call.
    pub call_timeout: Duration,
    /// Ask the API whether the backend is reachable before draining.
    pub probe_before_drain: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            call_timeout: Duration::from_secs(30),
            probe_before_drain: false,
        }
    }
}

/// What happened to a single task during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The remote call succeeded; the task was removed.
    Succeeded,
    /// The remote call failed; the task stays queued.
    Retrying { attempts: u32 },
    /// The remote call failed for the last time; the task was removed.
    Exhausted { attempts: u32 },
    /// The payload can never be dispatched; the task was removed.
    Malformed(MalformedTask),
    /// The task disappeared from the store mid-drain.
    Vanished,
}

/// Result of a drain.
#[derive(Debug, Default, Clone)]
pub struct DrainReport {
    /// Remote calls issued.
    pub dispatched: usize,
    /// Tasks removed after a successful call.
    pub succeeded: usize,
    /// Tasks kept for another attempt.
    pub retried: usize,
    /// Tasks discarded after their last allowed failure.
    pub exhausted: usize,
    /// Tasks discarded because their payload could not be decoded.
    pub malformed: usize,
    /// Every task touched, in processing order.
    pub processed: Vec<TaskId>,
    /// The reachability probe failed, so nothing was attempted.
    pub skipped_unreachable: bool,
}

impl DrainReport {
    fn record(&mut self, id: TaskId, outcome: &TaskOutcome) {
        self.processed.push(id);
        match outcome {
            TaskOutcome::Succeeded => {
                self.dispatched += 1;
                self.succeeded += 1;
            }
            TaskOutcome::Retrying { .. } => {
                self.dispatched += 1;
                self.retried += 1;
            }
            TaskOutcome::Exhausted { .. } => {
                self.dispatched += 1;
                self.exhausted += 1;
            }
            TaskOutcome::Malformed(_) => self.malformed += 1,
            TaskOutcome::Vanished => self.dispatched += 1,
        }
    }

    /// Whether the drain found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.processed.is_empty()
    }
}

/// Serialized, FIFO, bounded-retry dispatcher.
///
/// Concurrent calls to `drain` are serialized: a second caller waits for the
/// running drain and then reads the committed state, so no task is ever
/// dispatched twice by overlapping drains.
pub struct Dispatcher<S: ?Sized, A: ?Sized> {
    /// The queue.
    store: Arc<S>,
    /// The remote API collaborator.
    api: Arc<A>,
    /// Configuration.
    config: DispatcherConfig,
    /// Held for the whole of a drain.
    gate: Mutex<()>,
}

impl<S, A> Dispatcher<S, A>
where
    S: QueueStore + ?Sized,
    A: RemoteMutationApi + ?Sized,
{
    /// Create a new dispatcher.
    pub fn new(store: Arc<S>, api: Arc<A>, config: DispatcherConfig) -> Self {
        Self {
            store,
            api,
            config,
            gate: Mutex::new(()),
        }
    }

    /// Process every currently eligible task once.
    ///
    /// A failing task never stops the drain; a store error does, since no
    /// further outcome could be committed.
    pub async fn drain(&self) -> Result<DrainReport> {
        let _guard = self.gate.lock().await;
        let mut report = DrainReport::default();

        if self.config.probe_before_drain && !self.api.is_reachable().await {
            tracing::debug!("backend unreachable; drain skipped");
            report.skipped_unreachable = true;
            return Ok(report);
        }

        let tasks = self.store.list_eligible(self.config.max_retries).await?;
        if tasks.is_empty() {
            return Ok(report);
        }
        tracing::debug!(eligible = tasks.len(), "draining offline queue");

        for task in &tasks {
            let outcome = self.process(task).await?;
            report.record(task.id, &outcome);
        }

        tracing::debug!(
            succeeded = report.succeeded,
            retried = report.retried,
            exhausted = report.exhausted,
            malformed = report.malformed,
            "drain finished"
        );
        Ok(report)
    }

    /// Dispatch a single task and commit its outcome.
    async fn process(&self, task: &QueuedTask) -> Result<TaskOutcome> {
        let mutation = match task.mutation() {
            Ok(mutation) => mutation,
            Err(reason) => {
                tracing::error!(
                    task_id = %task.id,
                    kind = reason.kind(),
                    error = %reason,
                    "discarding malformed task"
                );
                self.store.remove(task.id).await?;
                return Ok(TaskOutcome::Malformed(reason));
            }
        };

        let call = self.api.apply(&mutation);
        let result = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.config.call_timeout)),
        };

        match result {
            Ok(()) => {
                self.store.remove(task.id).await?;
                tracing::debug!(
                    task_id = %task.id,
                    action = mutation.action(),
                    "queued task delivered"
                );
                Ok(TaskOutcome::Succeeded)
            }
            Err(err) => match self.store.increment_attempts(task.id).await? {
                None => Ok(TaskOutcome::Vanished),
                Some(attempts) if attempts >= self.config.max_retries => {
                    self.store.remove(task.id).await?;
                    tracing::warn!(
                        task_id = %task.id,
                        action = mutation.action(),
                        attempts,
                        error = %err,
                        "discarding task: retries exhausted"
                    );
                    Ok(TaskOutcome::Exhausted { attempts })
                }
                Some(attempts) => {
                    tracing::warn!(
                        task_id = %task.id,
                        action = mutation.action(),
                        attempts,
                        error = %err,
                        "queued task failed; will retry"
                    );
                    Ok(TaskOutcome::Retrying { attempts })
                }
            },
        }
    }
}

//! The SyncManager: owns the queue, the dispatcher, and the connectivity
//! monitor, and is the only integration point producers and the host
//! lifecycle use.
//!
//! Drains run on a single worker task owned by the manager. Triggers from
//! `enqueue` and from connectivity edges are funneled through a channel of
//! capacity one: a trigger that arrives while a drain is already pending is
//! coalesced into it, and a trigger that arrives while a drain is running
//! schedules exactly one follow-up.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use staffsync_queue_core::{Mutation, TaskId, TaskPayload};
use staffsync_queue_store::QueueStore;
use staffsync_queue_sync::{
    ConnectivityHook, ConnectivityMonitor, Dispatcher, DispatcherConfig, DrainReport,
    RemoteMutationApi,
};

use crate::error::{QueueError, Result};

/// Configuration for the SyncManager.
#[derive(Debug, Clone)]
pub struct SyncManagerConfig {
    /// Dispatch configuration.
    pub dispatcher: DispatcherConfig,
    /// Kick a drain right after an enqueue when the network is up.
    pub drain_on_enqueue: bool,
}

impl Default for SyncManagerConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            drain_on_enqueue: true,
        }
    }
}

/// Orchestrates durable capture and replay of failed mutations.
///
/// Must be started inside a tokio runtime. Dropping the manager shuts it
/// down.
pub struct SyncManager<S: ?Sized, A: ?Sized> {
    /// The durable queue.
    store: Arc<S>,
    /// Shared with the worker task.
    dispatcher: Arc<Dispatcher<S, A>>,
    /// Connectivity edges trigger drains.
    monitor: ConnectivityMonitor,
    /// Drain requests to the worker.
    trigger: mpsc::Sender<()>,
    /// Stops the worker between drains.
    cancel: CancellationToken,
    /// The worker task, until someone waits for it.
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Configuration.
    config: SyncManagerConfig,
}

impl<S, A> SyncManager<S, A>
where
    S: QueueStore + ?Sized + 'static,
    A: RemoteMutationApi + ?Sized + 'static,
{
    /// Create the manager, spawn its drain worker, and start monitoring
    /// connectivity.
    ///
    /// A connectivity registration failure is logged and tolerated: the
    /// manager then relies on the last known state and on explicit
    /// [`drain_now`](Self::drain_now) calls.
    pub fn start(
        store: Arc<S>,
        api: Arc<A>,
        hook: Arc<dyn ConnectivityHook>,
        config: SyncManagerConfig,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            api,
            config.dispatcher.clone(),
        ));
        let (trigger, requests) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run_worker(dispatcher.clone(), requests, cancel.clone()));

        let monitor = ConnectivityMonitor::new(hook);
        let on_available = trigger.clone();
        if let Err(e) = monitor.start(move || request_drain(&on_available, "connectivity")) {
            tracing::error!(
                error = %e,
                "connectivity monitoring unavailable; using last known state"
            );
        }

        Self {
            store,
            dispatcher,
            monitor,
            trigger,
            cancel,
            worker: Mutex::new(Some(worker)),
            config,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Producer API
    // ─────────────────────────────────────────────────────────────────────────

    /// Durably record a failed mutation for later replay.
    ///
    /// Returns once the task is stored. If the network is up, a drain is
    /// requested but not awaited. Storage failures are returned to the caller
    /// so the mutation is never silently lost.
    pub async fn enqueue(&self, payload: &TaskPayload) -> Result<TaskId> {
        let id = self.store.insert(payload).await?;
        tracing::debug!(task_id = %id, action = payload.action(), "task queued");

        if self.config.drain_on_enqueue && !self.is_shut_down() && self.monitor.is_connected() {
            request_drain(&self.trigger, "enqueue");
        }
        Ok(id)
    }

    /// Typed variant of [`enqueue`](Self::enqueue).
    pub async fn enqueue_mutation(&self, mutation: &Mutation) -> Result<TaskId> {
        self.enqueue(&mutation.to_payload()).await
    }

    /// Enqueue a payload the host already holds as JSON text.
    ///
    /// Text that is not a JSON object is rejected up front. An unknown
    /// `action` is accepted here and dropped by the dispatcher.
    pub async fn enqueue_json(&self, request_data: &str) -> Result<TaskId> {
        let payload = TaskPayload::from_json(request_data)?;
        self.enqueue(&payload).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Host Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Drain the queue now and wait for the result.
    ///
    /// Serialized with triggered drains.
    pub async fn drain_now(&self) -> Result<DrainReport> {
        if self.is_shut_down() {
            return Err(QueueError::ShutDown);
        }
        Ok(self.dispatcher.drain().await?)
    }

    /// Stop connectivity-triggered drains and the worker. Idempotent.
    ///
    /// A drain already running is allowed to finish.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.monitor.stop();
        self.cancel.cancel();
        tracing::debug!("sync manager shut down");
    }

    /// Shut down and wait for the worker to exit.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let worker = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "drain worker ended abnormally");
            }
        }
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ─────────────────────────────────────────────────────────────────────────

    /// Point-in-time reachability.
    pub fn is_connected(&self) -> bool {
        self.monitor.is_connected()
    }

    /// Observe reachability, e.g. to show an offline banner.
    pub fn subscribe_connectivity(&self) -> watch::Receiver<bool> {
        self.monitor.subscribe()
    }

    /// Tasks still stored, eligible or not.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration in effect.
    pub fn config(&self) -> &SyncManagerConfig {
        &self.config
    }
}

impl<S: ?Sized, A: ?Sized> Drop for SyncManager<S, A> {
    fn drop(&mut self) {
        self.monitor.stop();
        self.cancel.cancel();
    }
}

/// Ask the worker for a drain without waiting for it.
fn request_drain(trigger: &mpsc::Sender<()>, source: &'static str) {
    match trigger.try_send(()) {
        Ok(()) => tracing::debug!(source, "drain requested"),
        Err(mpsc::error::TrySendError::Full(())) => {
            tracing::debug!(source, "drain already pending; coalesced")
        }
        Err(mpsc::error::TrySendError::Closed(())) => {
            tracing::error!(source, "drain worker stopped; request dropped")
        }
    }
}

/// The single drain worker. Cancellation is only observed between drains.
///
/// Each drain runs as its own task so that a panicking collaborator ends
/// that drain only.
async fn run_worker<S, A>(
    dispatcher: Arc<Dispatcher<S, A>>,
    mut requests: mpsc::Receiver<()>,
    cancel: CancellationToken,
) where
    S: QueueStore + ?Sized + 'static,
    A: RemoteMutationApi + ?Sized + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            request = requests.recv() => {
                if request.is_none() {
                    break;
                }
                let drain = tokio::spawn({
                    let dispatcher = dispatcher.clone();
                    async move { dispatcher.drain().await }
                });
                match drain.await {
                    Ok(Ok(report)) if !report.is_idle() => tracing::info!(
                        succeeded = report.succeeded,
                        retried = report.retried,
                        exhausted = report.exhausted,
                        malformed = report.malformed,
                        "offline queue drained"
                    ),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "offline queue drain failed"),
                    Err(e) => tracing::error!(error = %e, "offline queue drain aborted"),
                }
            }
        }
    }
    tracing::debug!("drain worker exited");
}

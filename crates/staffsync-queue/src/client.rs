//! Producer wrapper around the remote API.
//!
//! Screens that mutate employees call [`QueuedEmployeeApi`] instead of the
//! REST client. A call that fails is captured by the queue and replayed later,
//! so the screen only has to tell the user "saved, will sync".

use std::sync::Arc;

use serde_json::{Map, Value};

use staffsync_queue_core::{Mutation, TaskId};
use staffsync_queue_store::QueueStore;
use staffsync_queue_sync::{ConnectivityHook, RemoteError, RemoteMutationApi};

use crate::error::Result;
use crate::manager::{SyncManager, SyncManagerConfig};

/// What happened to a mutation submitted through [`QueuedEmployeeApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The backend accepted the call.
    Applied,
    /// The call failed and the mutation is queued for replay.
    QueuedForRetry {
        /// Id of the stored task.
        task_id: TaskId,
        /// The failure that caused the mutation to be queued.
        error: RemoteError,
    },
}

impl MutationOutcome {
    /// Whether the backend already has the change.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// The queued task, if the call was deferred.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Applied => None,
            Self::QueuedForRetry { task_id, .. } => Some(*task_id),
        }
    }
}

/// Employee mutations with offline fallback.
///
/// Owns the [`SyncManager`] and shares the remote API with its dispatcher.
/// The manager never refers back to this wrapper.
pub struct QueuedEmployeeApi<S: ?Sized, A: ?Sized> {
    api: Arc<A>,
    manager: SyncManager<S, A>,
}

impl<S, A> QueuedEmployeeApi<S, A>
where
    S: QueueStore + ?Sized + 'static,
    A: RemoteMutationApi + ?Sized + 'static,
{
    /// Wrap an already running manager. `api` should be the same client the
    /// manager dispatches through.
    pub fn new(api: Arc<A>, manager: SyncManager<S, A>) -> Self {
        Self { api, manager }
    }

    /// Start a manager over `store` and wrap it.
    pub fn start(
        store: Arc<S>,
        api: Arc<A>,
        hook: Arc<dyn ConnectivityHook>,
        config: SyncManagerConfig,
    ) -> Self {
        let manager = SyncManager::start(store, api.clone(), hook, config);
        Self::new(api, manager)
    }

    /// Edit an employee, queueing the edit if the call fails.
    pub async fn edit_employee(
        &self,
        id: i64,
        fields: Map<String, Value>,
    ) -> Result<MutationOutcome> {
        self.submit(Mutation::edit_employee(id, fields)).await
    }

    /// Delete an employee, queueing the delete if the call fails.
    pub async fn delete_employee(&self, id: i64) -> Result<MutationOutcome> {
        self.submit(Mutation::delete_employee(id)).await
    }

    /// Try the call once; on failure hand the mutation to the queue.
    ///
    /// Only an enqueue failure is returned as `Err`; in that case the
    /// mutation was not recorded.
    pub async fn submit(&self, mutation: Mutation) -> Result<MutationOutcome> {
        let timeout = self.manager.config().dispatcher.call_timeout;
        let result = match tokio::time::timeout(timeout, self.api.apply(&mutation)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout)),
        };

        match result {
            Ok(()) => Ok(MutationOutcome::Applied),
            Err(error) => {
                let task_id = self.manager.enqueue_mutation(&mutation).await?;
                tracing::warn!(
                    task_id = %task_id,
                    action = mutation.action(),
                    employee_id = mutation.employee_id(),
                    error = %error,
                    "remote call failed; queued for retry"
                );
                Ok(MutationOutcome::QueuedForRetry { task_id, error })
            }
        }
    }

    /// The manager, for lifecycle and diagnostics.
    pub fn manager(&self) -> &SyncManager<S, A> {
        &self.manager
    }

    /// Shut the manager down.
    pub fn shutdown(&self) {
        self.manager.shutdown();
    }
}

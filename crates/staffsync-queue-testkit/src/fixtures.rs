//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use staffsync_queue_core::{Mutation, TaskId, TaskPayload, DELETE_EMPLOYEE, EDIT_EMPLOYEE};
use staffsync_queue_store::{MemoryQueueStore, QueueStore};
use staffsync_queue_sync::{
    ConnectivityHook, Dispatcher, DispatcherConfig, RemoteError, RemoteMutationApi,
    WatchConnectivity,
};

/// One call observed by [`ScriptedApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub action: &'static str,
    pub employee_id: i64,
}

/// A remote API double with per-employee scripted results.
///
/// Each employee id has a queue of results consumed one per call; once it is
/// empty the default applies (success unless [`fail_by_default`] was set).
///
/// [`fail_by_default`]: ScriptedApi::fail_by_default
#[derive(Default)]
pub struct ScriptedApi {
    scripts: Mutex<HashMap<i64, VecDeque<Result<(), RemoteError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
    failing: AtomicBool,
    unreachable: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedApi {
    /// An API where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// An API where every unscripted call fails.
    pub fn failing() -> Self {
        let api = Self::default();
        api.fail_by_default(true);
        api
    }

    /// Queue explicit results for an employee id.
    pub fn script(
        &self,
        employee_id: i64,
        results: impl IntoIterator<Item = Result<(), RemoteError>>,
    ) {
        lock(&self.scripts)
            .entry(employee_id)
            .or_default()
            .extend(results);
    }

    /// Fail the next `n` calls for an employee id.
    pub fn fail_times(&self, employee_id: i64, n: usize) {
        self.script(
            employee_id,
            (0..n).map(|_| Err(RemoteError::Unreachable("scripted failure".into()))),
        );
    }

    /// Change what unscripted calls return.
    pub fn fail_by_default(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Change what the reachability probe reports.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Make every call take at least this long.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Employee ids of all calls so far, in order.
    pub fn called_ids(&self) -> Vec<i64> {
        lock(&self.calls).iter().map(|c| c.employee_id).collect()
    }

    /// Number of calls made for an employee id.
    pub fn calls_for(&self, employee_id: i64) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.employee_id == employee_id)
            .count()
    }

    /// Total number of calls.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    async fn respond(&self, action: &'static str, employee_id: i64) -> Result<(), RemoteError> {
        lock(&self.calls).push(RecordedCall {
            action,
            employee_id,
        });

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = lock(&self.scripts)
            .get_mut(&employee_id)
            .and_then(|results| results.pop_front());
        match scripted {
            Some(result) => result,
            None if self.failing.load(Ordering::SeqCst) => {
                Err(RemoteError::Status {
                    code: 503,
                    message: "service unavailable".into(),
                })
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteMutationApi for ScriptedApi {
    async fn edit_employee(
        &self,
        id: i64,
        _fields: &Map<String, Value>,
    ) -> Result<(), RemoteError> {
        self.respond(EDIT_EMPLOYEE, id).await
    }

    async fn delete_employee(&self, id: i64) -> Result<(), RemoteError> {
        self.respond(DELETE_EMPLOYEE, id).await
    }

    async fn is_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }
}

/// A test fixture with a memory store, a scripted API, and a network switch.
pub struct TestFixture {
    pub store: Arc<MemoryQueueStore>,
    pub api: Arc<ScriptedApi>,
    pub network: Arc<WatchConnectivity>,
}

impl TestFixture {
    /// Create a fixture that starts offline with a succeeding API.
    pub fn new() -> Self {
        Self::with_api(ScriptedApi::new(), false)
    }

    /// Create a fixture that starts online.
    pub fn online() -> Self {
        Self::with_api(ScriptedApi::new(), true)
    }

    /// Create a fixture around a prepared API.
    pub fn with_api(api: ScriptedApi, online: bool) -> Self {
        Self {
            store: Arc::new(MemoryQueueStore::new()),
            api: Arc::new(api),
            network: Arc::new(WatchConnectivity::new(online)),
        }
    }

    /// The network switch as a connectivity hook.
    pub fn hook(&self) -> Arc<dyn ConnectivityHook> {
        self.network.clone()
    }

    /// A dispatcher over the fixture's store and API.
    pub fn dispatcher(
        &self,
        config: DispatcherConfig,
    ) -> Dispatcher<MemoryQueueStore, ScriptedApi> {
        Dispatcher::new(self.store.clone(), self.api.clone(), config)
    }

    /// Store a mutation directly, bypassing any manager.
    pub async fn seed(&self, mutation: &Mutation) -> TaskId {
        self.store
            .insert(&mutation.to_payload())
            .await
            .unwrap_or_else(|e| panic!("seeding the store failed: {e}"))
    }

    /// Current attempt count of a task, `None` once it is gone.
    pub async fn attempts(&self, id: TaskId) -> Option<u32> {
        self.store
            .get(id)
            .await
            .unwrap_or_else(|e| panic!("reading the store failed: {e}"))
            .map(|task| task.attempts)
    }

    /// Number of tasks still stored.
    pub async fn pending(&self) -> usize {
        self.store
            .count()
            .await
            .unwrap_or_else(|e| panic!("reading the store failed: {e}"))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for an edit of `employee_id` that changes their first name.
pub fn edit_payload(employee_id: i64, firstname: &str) -> TaskPayload {
    let mut fields = Map::new();
    fields.insert("firstname".into(), json!(firstname));
    Mutation::edit_employee(employee_id, fields).to_payload()
}

/// Payload for a delete of `employee_id`.
pub fn delete_payload(employee_id: i64) -> TaskPayload {
    Mutation::delete_employee(employee_id).to_payload()
}

/// Payload whose action the dispatcher does not know.
pub fn unknown_payload(action: &str) -> TaskPayload {
    TaskPayload::new().with("action", action).with("id", 1)
}

/// Poll `check` until it returns true or `timeout` elapses.
///
/// Returns the final result of `check`.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_results_then_default() {
        let api = ScriptedApi::new();
        api.fail_times(7, 2);

        assert!(api.delete_employee(7).await.is_err());
        assert!(api.delete_employee(7).await.is_err());
        assert!(api.delete_employee(7).await.is_ok());
        assert!(api.delete_employee(8).await.is_ok());

        assert_eq!(api.calls_for(7), 3);
        assert_eq!(api.called_ids(), vec![7, 7, 7, 8]);
    }

    #[tokio::test]
    async fn test_failing_api_reports_status() {
        let api = ScriptedApi::failing();
        let err = api.edit_employee(1, &Map::new()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Status { code: 503, .. }));
        assert_eq!(
            api.calls(),
            vec![RecordedCall {
                action: EDIT_EMPLOYEE,
                employee_id: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_fixture_seed_and_attempts() {
        let fixture = TestFixture::new();
        let id = fixture.seed(&Mutation::delete_employee(3)).await;

        assert_eq!(fixture.attempts(id).await, Some(0));
        assert_eq!(fixture.pending().await, 1);
        assert!(!fixture.hook().current());
    }

    #[tokio::test]
    async fn test_eventually_times_out() {
        assert!(eventually(Duration::from_millis(30), || async { true }).await);
        assert!(!eventually(Duration::from_millis(30), || async { false }).await);
    }

    #[test]
    fn test_payload_helpers() {
        let edit = edit_payload(7, "Alice");
        assert_eq!(edit.action(), Some(EDIT_EMPLOYEE));
        assert_eq!(
            Mutation::from_payload(&edit).unwrap().employee_id(),
            7
        );

        assert_eq!(delete_payload(9).action(), Some(DELETE_EMPLOYEE));
        assert!(Mutation::from_payload(&unknown_payload("unknown_op")).is_err());
    }
}

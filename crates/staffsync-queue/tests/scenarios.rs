//! End-to-end replay scenarios through the SyncManager.
//!
//! The network starts down in every scenario so that drains only happen
//! when the test asks for them.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use staffsync_queue::core::{Mutation, TaskId, MAX_RETRIES};
use staffsync_queue::store::QueueStore;
use staffsync_queue::sync::{DispatcherConfig, RemoteError};
use staffsync_queue::{MemoryQueueStore, QueueError, SyncManager, SyncManagerConfig};
use staffsync_queue_testkit::{
    delete_payload, edit_payload, unknown_payload, RecordedCall, ScriptedApi, TestFixture,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn start(fixture: &TestFixture) -> SyncManager<MemoryQueueStore, ScriptedApi> {
    init_tracing();
    SyncManager::start(
        fixture.store.clone(),
        fixture.api.clone(),
        fixture.hook(),
        SyncManagerConfig::default(),
    )
}

async fn attempts(manager: &SyncManager<MemoryQueueStore, ScriptedApi>, id: TaskId) -> Option<u32> {
    manager.store().get(id).await.unwrap().map(|t| t.attempts)
}

#[tokio::test]
async fn test_edit_fails_twice_then_succeeds() {
    let fixture = TestFixture::new();
    fixture.api.fail_times(7, 2);
    let manager = start(&fixture);

    let id = manager.enqueue(&edit_payload(7, "Alice")).await.unwrap();
    assert_eq!(attempts(&manager, id).await, Some(0));

    manager.drain_now().await.unwrap();
    assert_eq!(attempts(&manager, id).await, Some(1));

    manager.drain_now().await.unwrap();
    assert_eq!(attempts(&manager, id).await, Some(2));

    let report = manager.drain_now().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(attempts(&manager, id).await, None);
    assert_eq!(fixture.api.calls_for(7), 3);
}

#[tokio::test]
async fn test_unknown_action_is_dropped_without_a_call() {
    let fixture = TestFixture::new();
    let manager = start(&fixture);

    let id = manager.enqueue(&unknown_payload("unknown_op")).await.unwrap();
    let report = manager.drain_now().await.unwrap();

    assert_eq!(report.malformed, 1);
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.processed, vec![id]);
    assert_eq!(fixture.api.call_count(), 0);
    assert_eq!(manager.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_undecodable_request_data_is_dropped() {
    let fixture = TestFixture::new();
    let manager = start(&fixture);

    manager.store().insert_raw("{not json").await.unwrap();
    manager.store().insert_raw("[1, 2, 3]").await.unwrap();
    let report = manager.drain_now().await.unwrap();

    assert_eq!(report.malformed, 2);
    assert_eq!(fixture.api.call_count(), 0);
    assert_eq!(manager.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_always_failing_tasks_exhaust_after_max_retries() {
    let fixture = TestFixture::with_api(ScriptedApi::failing(), false);
    let manager = start(&fixture);

    let ids = vec![
        manager.enqueue(&edit_payload(1, "Ann")).await.unwrap(),
        manager.enqueue(&delete_payload(2)).await.unwrap(),
        manager.enqueue(&edit_payload(3, "Cid")).await.unwrap(),
    ];

    for round in 1..=MAX_RETRIES {
        let report = manager.drain_now().await.unwrap();
        assert_eq!(report.processed, ids);
        if round < MAX_RETRIES {
            assert_eq!(report.retried, 3);
        } else {
            assert_eq!(report.exhausted, 3);
        }
    }

    assert!(manager.store().list_eligible(MAX_RETRIES).await.unwrap().is_empty());
    assert_eq!(manager.pending_count().await.unwrap(), 0);

    // Nothing left to dispatch
    let report = manager.drain_now().await.unwrap();
    assert!(report.is_idle());
    assert_eq!(fixture.api.call_count(), 3 * MAX_RETRIES as usize);
}

#[tokio::test]
async fn test_fifo_order_regardless_of_outcome() {
    let fixture = TestFixture::new();
    fixture.api.fail_times(20, 1);
    let manager = start(&fixture);

    for id in [10, 20, 30] {
        manager.enqueue(&delete_payload(id)).await.unwrap();
    }
    manager.drain_now().await.unwrap();
    assert_eq!(fixture.api.called_ids(), vec![10, 20, 30]);

    // The failed task kept its place at the head of the queue
    manager.enqueue(&delete_payload(40)).await.unwrap();
    manager.drain_now().await.unwrap();
    assert_eq!(fixture.api.called_ids(), vec![10, 20, 30, 20, 40]);
}

#[tokio::test]
async fn test_second_drain_after_empty_makes_no_calls() {
    let fixture = TestFixture::new();
    let manager = start(&fixture);

    manager.enqueue(&delete_payload(5)).await.unwrap();
    manager.drain_now().await.unwrap();
    assert_eq!(fixture.api.call_count(), 1);

    let report = manager.drain_now().await.unwrap();
    assert!(report.is_idle());
    assert_eq!(fixture.api.call_count(), 1);
}

#[tokio::test]
async fn test_concurrent_drains_dispatch_each_task_once() {
    let fixture = TestFixture::new();
    fixture.api.set_delay(Some(std::time::Duration::from_millis(20)));
    let manager = start(&fixture);

    for id in 1..=4 {
        manager.enqueue(&delete_payload(id)).await.unwrap();
    }

    let (a, b) = tokio::join!(manager.drain_now(), manager.drain_now());
    let total = a.unwrap().succeeded + b.unwrap().succeeded;

    assert_eq!(total, 4);
    assert_eq!(fixture.api.called_ids(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_edit_payload_reaches_api_as_edit() {
    let fixture = TestFixture::new();
    let manager = start(&fixture);

    let mut fields = serde_json::Map::new();
    fields.insert("department".into(), serde_json::json!("Sales"));
    manager
        .enqueue_mutation(&Mutation::edit_employee(12, fields))
        .await
        .unwrap();
    manager.enqueue_json(r#"{"action":"delete_employee","id":"13"}"#).await.unwrap();
    manager.drain_now().await.unwrap();

    assert_eq!(
        fixture.api.calls(),
        vec![
            RecordedCall {
                action: "edit_employee",
                employee_id: 12
            },
            RecordedCall {
                action: "delete_employee",
                employee_id: 13
            },
        ]
    );
}

#[tokio::test]
async fn test_enqueue_json_rejects_non_objects() {
    let fixture = TestFixture::new();
    let manager = start(&fixture);

    let err = manager.enqueue_json("42").await.unwrap_err();
    assert!(matches!(err, QueueError::Malformed(_)));
    assert_eq!(manager.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_hanging_call_times_out_and_counts_as_failure() {
    let fixture = TestFixture::new();
    fixture.api.set_delay(Some(std::time::Duration::from_secs(5)));
    let config = SyncManagerConfig {
        dispatcher: DispatcherConfig {
            call_timeout: std::time::Duration::from_millis(50),
            ..DispatcherConfig::default()
        },
        ..SyncManagerConfig::default()
    };
    init_tracing();
    let manager = SyncManager::start(
        fixture.store.clone(),
        fixture.api.clone(),
        fixture.hook(),
        config,
    );

    let id = manager.enqueue(&delete_payload(9)).await.unwrap();
    let report = manager.drain_now().await.unwrap();

    assert_eq!(report.retried, 1);
    assert_eq!(attempts(&manager, id).await, Some(1));
}

#[tokio::test]
async fn test_unreachable_probe_skips_drain_without_burning_attempts() {
    let fixture = TestFixture::new();
    fixture.api.set_reachable(false);
    let config = SyncManagerConfig {
        dispatcher: DispatcherConfig {
            probe_before_drain: true,
            ..DispatcherConfig::default()
        },
        ..SyncManagerConfig::default()
    };
    init_tracing();
    let manager = SyncManager::start(
        fixture.store.clone(),
        fixture.api.clone(),
        fixture.hook(),
        config,
    );

    let id = manager.enqueue(&delete_payload(4)).await.unwrap();
    let report = manager.drain_now().await.unwrap();
    assert!(report.skipped_unreachable);
    assert_eq!(attempts(&manager, id).await, Some(0));

    fixture.api.set_reachable(true);
    let report = manager.drain_now().await.unwrap();
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn test_scripted_status_error_is_retried() {
    let fixture = TestFixture::new();
    fixture.api.script(
        3,
        [Err(RemoteError::Status {
            code: 500,
            message: "internal error".into(),
        })],
    );
    let manager = SyncManager::start(
        Arc::new(MemoryQueueStore::new()),
        fixture.api.clone(),
        fixture.hook(),
        SyncManagerConfig::default(),
    );

    manager.enqueue(&delete_payload(3)).await.unwrap();
    assert_eq!(manager.drain_now().await.unwrap().retried, 1);
    assert_eq!(manager.drain_now().await.unwrap().succeeded, 1);
}

/// Records the level and message of every event.
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedEvents {
    fn with_message(&self, message: &str) -> Vec<Level> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m == message)
            .map(|(level, _)| *level)
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

#[tokio::test]
async fn test_malformed_and_exhausted_discards_log_distinct_events() {
    let events = CapturedEvents::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

    let fixture = TestFixture::with_api(ScriptedApi::failing(), false);
    let config = SyncManagerConfig {
        dispatcher: DispatcherConfig {
            max_retries: 1,
            ..DispatcherConfig::default()
        },
        ..SyncManagerConfig::default()
    };
    let manager = SyncManager::start(
        fixture.store.clone(),
        fixture.api.clone(),
        fixture.hook(),
        config,
    );

    manager.enqueue(&unknown_payload("unknown_op")).await.unwrap();
    manager.enqueue(&delete_payload(6)).await.unwrap();
    let report = manager.drain_now().await.unwrap();
    assert_eq!((report.malformed, report.exhausted), (1, 1));

    assert_eq!(events.with_message("discarding malformed task"), vec![Level::ERROR]);
    assert_eq!(
        events.with_message("discarding task: retries exhausted"),
        vec![Level::WARN]
    );
}

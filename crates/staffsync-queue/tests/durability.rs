//! Queued tasks survive a restart when backed by SQLite.

use std::sync::Arc;

use tempfile::TempDir;

use staffsync_queue::store::QueueStore;
use staffsync_queue::{SqliteQueueStore, SyncManager, SyncManagerConfig};
use staffsync_queue_testkit::{delete_payload, edit_payload, ScriptedApi, TestFixture};

fn start(
    store: Arc<SqliteQueueStore>,
    fixture: &TestFixture,
) -> SyncManager<SqliteQueueStore, ScriptedApi> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SyncManager::start(store, fixture.api.clone(), fixture.hook(), SyncManagerConfig::default())
}

#[tokio::test]
async fn test_tasks_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("offline_queue.db");
    let fixture = TestFixture::new();

    let first = {
        let manager = start(Arc::new(SqliteQueueStore::open(&path).unwrap()), &fixture);
        let first = manager.enqueue(&edit_payload(1, "Ann")).await.unwrap();
        manager.enqueue(&delete_payload(2)).await.unwrap();
        manager.shutdown_and_wait().await;
        first
    };

    let manager = start(Arc::new(SqliteQueueStore::open(&path).unwrap()), &fixture);
    assert_eq!(manager.pending_count().await.unwrap(), 2);

    let report = manager.drain_now().await.unwrap();
    assert_eq!(report.processed[0], first);
    assert_eq!(report.succeeded, 2);
    assert_eq!(fixture.api.called_ids(), vec![1, 2]);
}

#[tokio::test]
async fn test_attempts_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("offline_queue.db");
    let fixture = TestFixture::with_api(ScriptedApi::failing(), false);

    let id = {
        let manager = start(Arc::new(SqliteQueueStore::open(&path).unwrap()), &fixture);
        let id = manager.enqueue(&delete_payload(3)).await.unwrap();
        manager.drain_now().await.unwrap();
        manager.drain_now().await.unwrap();
        manager.shutdown_and_wait().await;
        id
    };

    let store = Arc::new(SqliteQueueStore::open(&path).unwrap());
    assert_eq!(store.get(id).await.unwrap().unwrap().attempts, 2);

    // One attempt left
    let manager = start(store, &fixture);
    let report = manager.drain_now().await.unwrap();
    assert_eq!(report.exhausted, 1);
    assert_eq!(manager.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ids_not_reused_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("offline_queue.db");
    let fixture = TestFixture::new();

    let first = {
        let manager = start(Arc::new(SqliteQueueStore::open(&path).unwrap()), &fixture);
        let id = manager.enqueue(&delete_payload(1)).await.unwrap();
        manager.drain_now().await.unwrap();
        manager.shutdown_and_wait().await;
        id
    };

    let manager = start(Arc::new(SqliteQueueStore::open(&path).unwrap()), &fixture);
    let second = manager.enqueue(&delete_payload(1)).await.unwrap();
    assert!(second > first);
}

//! Network reachability monitoring.
//!
//! The platform reports connectivity through a [`ConnectivityHook`]. The
//! [`ConnectivityMonitor`] turns that level signal into edge events: its
//! callback fires once per unavailable → available transition and never on
//! repeated "still available" notifications.
//!
//! Hooks publish a [`LinkState`] that counts rising edges, so a down/up pair
//! reported faster than the watcher runs is still seen as a reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ConnectivityError;

/// Reachability as published by a [`ConnectivityHook`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    /// Network reachable now.
    pub available: bool,
    /// Unavailable → available transitions reported so far.
    pub rising_edges: u64,
}

impl LinkState {
    /// Initial state, with no transitions yet.
    pub fn new(available: bool) -> Self {
        Self {
            available,
            rising_edges: 0,
        }
    }

    /// Apply a platform report. Returns whether anything changed.
    pub fn report(&mut self, available: bool) -> bool {
        if self.available == available {
            return false;
        }
        if available {
            self.rising_edges = self.rising_edges.wrapping_add(1);
        }
        self.available = available;
        true
    }

    /// Whether the link came back since `earlier` and is up now.
    pub fn reconnected_since(&self, earlier: &LinkState) -> bool {
        self.available && self.rising_edges != earlier.rising_edges
    }
}

/// Platform connectivity source.
///
/// Implementations bridge an OS network-state callback into a watch channel
/// carrying the current [`LinkState`].
pub trait ConnectivityHook: Send + Sync {
    /// Point-in-time reachability.
    fn current(&self) -> bool;

    /// Subscribe to reachability changes.
    ///
    /// May fail when the platform refuses the registration.
    fn register(&self) -> Result<watch::Receiver<LinkState>, ConnectivityError>;
}

/// A hook fed by host glue code.
///
/// The host's OS callback calls [`set_available`](Self::set_available);
/// repeated reports of the same state are swallowed here.
#[derive(Debug)]
pub struct WatchConnectivity {
    tx: watch::Sender<LinkState>,
}

impl WatchConnectivity {
    /// Create a hook with the given initial state.
    pub fn new(initially_available: bool) -> Self {
        let (tx, _rx) = watch::channel(LinkState::new(initially_available));
        Self { tx }
    }

    /// Report the current reachability.
    pub fn set_available(&self, available: bool) {
        self.tx.send_if_modified(|state| state.report(available));
    }
}

impl ConnectivityHook for WatchConnectivity {
    fn current(&self) -> bool {
        self.tx.borrow().available
    }

    fn register(&self) -> Result<watch::Receiver<LinkState>, ConnectivityError> {
        Ok(self.tx.subscribe())
    }
}

/// A running watcher: its cancellation token, task, and live receiver.
struct Running {
    cancel: CancellationToken,
    receiver: watch::Receiver<LinkState>,
    _task: JoinHandle<()>,
}

/// Edge-triggered connectivity monitor.
///
/// Before `start`, after `stop`, or when registration failed, the monitor
/// reports the last state it saw.
pub struct ConnectivityMonitor {
    hook: Arc<dyn ConnectivityHook>,
    last_known: Arc<AtomicBool>,
    published: Arc<watch::Sender<bool>>,
    running: Mutex<Option<Running>>,
}

impl ConnectivityMonitor {
    /// Create a monitor over the given hook. Does not register yet.
    pub fn new(hook: Arc<dyn ConnectivityHook>) -> Self {
        let initial = hook.current();
        let (published, _rx) = watch::channel(initial);
        Self {
            hook,
            last_known: Arc::new(AtomicBool::new(initial)),
            published: Arc::new(published),
            running: Mutex::new(None),
        }
    }

    /// Register with the platform and begin watching for transitions.
    ///
    /// `on_available` runs on the watcher task once per unavailable →
    /// available edge. It is never invoked from `start` itself, even when the
    /// network is already up. Must be called within a tokio runtime.
    pub fn start<F>(&self, on_available: F) -> Result<(), ConnectivityError>
    where
        F: Fn() + Send + 'static,
    {
        let mut running = self
            .running
            .lock()
            .map_err(|e| ConnectivityError::Registration(e.to_string()))?;
        if running.is_some() {
            return Err(ConnectivityError::AlreadyStarted);
        }

        let mut rx = self.hook.register()?;
        let receiver = rx.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let last_known = self.last_known.clone();
        let published = self.published.clone();

        let mut previous = *rx.borrow_and_update();
        record(&last_known, &published, previous.available);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            tracing::debug!("connectivity source closed");
                            break;
                        }
                        let now = *rx.borrow_and_update();
                        record(&last_known, &published, now.available);

                        if now.reconnected_since(&previous) {
                            tracing::info!(
                                rising_edges = now.rising_edges,
                                "network became available"
                            );
                            on_available();
                        } else if !now.available && previous.available {
                            tracing::info!("network lost");
                        }
                        previous = now;
                    }
                }
            }
        });

        *running = Some(Running {
            cancel,
            receiver,
            _task: task,
        });
        Ok(())
    }

    /// Point-in-time reachability.
    pub fn is_connected(&self) -> bool {
        if let Ok(running) = self.running.lock() {
            if let Some(running) = running.as_ref() {
                return running.receiver.borrow().available;
            }
        }
        self.last_known.load(Ordering::SeqCst)
    }

    /// Observe reachability as the monitor sees it.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.published.subscribe()
    }

    /// Whether a watcher is currently registered.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    /// Deregister. Idempotent; safe when never started.
    pub fn stop(&self) {
        let taken = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(running) = taken {
            self.last_known
                .store(running.receiver.borrow().available, Ordering::SeqCst);
            running.cancel.cancel();
            tracing::debug!("connectivity monitor stopped");
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record(last_known: &AtomicBool, published: &watch::Sender<bool>, available: bool) {
    last_known.store(available, Ordering::SeqCst);
    published.send_if_modified(|current| {
        let changed = *current != available;
        *current = available;
        changed
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct RefusingHook;

    impl ConnectivityHook for RefusingHook {
        fn current(&self) -> bool {
            true
        }

        fn register(&self) -> Result<watch::Receiver<LinkState>, ConnectivityError> {
            Err(ConnectivityError::Registration("permission denied".into()))
        }
    }

    fn counting_monitor(
        hook: Arc<WatchConnectivity>,
    ) -> (ConnectivityMonitor, Arc<AtomicUsize>) {
        let monitor = ConnectivityMonitor::new(hook);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        monitor
            .start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        (monitor, fired)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_start_while_connected_does_not_fire() {
        let hook = Arc::new(WatchConnectivity::new(true));
        let (monitor, fired) = counting_monitor(hook);

        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn test_fires_once_per_rising_edge() {
        let hook = Arc::new(WatchConnectivity::new(false));
        let (monitor, fired) = counting_monitor(hook.clone());

        hook.set_available(true);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // available -> available is not an edge
        hook.set_available(true);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        hook.set_available(false);
        settle().await;
        assert!(!monitor.is_connected());

        hook.set_available(true);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_flap_without_yield_still_fires() {
        let hook = Arc::new(WatchConnectivity::new(true));
        let (monitor, fired) = counting_monitor(hook.clone());

        // The watcher never runs between these two reports
        hook.set_available(false);
        assert!(!monitor.is_connected());
        hook.set_available(true);
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn test_up_then_down_without_yield_does_not_fire() {
        let hook = Arc::new(WatchConnectivity::new(false));
        let (_monitor, fired) = counting_monitor(hook.clone());

        hook.set_available(true);
        hook.set_available(false);
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_link_state_counts_rising_edges() {
        let mut state = LinkState::new(false);
        let start = state;

        assert!(!state.report(false));
        assert!(state.report(true));
        assert!(!state.report(true));
        assert!(state.report(false));
        assert!(state.report(true));

        assert_eq!(state.rising_edges, 2);
        assert!(state.reconnected_since(&start));
        assert!(!state.reconnected_since(&state));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let hook = Arc::new(WatchConnectivity::new(false));
        let (monitor, fired) = counting_monitor(hook.clone());

        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());

        hook.set_available(true);
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let never_started = ConnectivityMonitor::new(hook);
        never_started.stop();
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let hook = Arc::new(WatchConnectivity::new(false));
        let (monitor, _fired) = counting_monitor(hook);

        assert_eq!(
            monitor.start(|| {}),
            Err(ConnectivityError::AlreadyStarted)
        );
    }

    #[tokio::test]
    async fn test_registration_failure_degrades() {
        let monitor = ConnectivityMonitor::new(Arc::new(RefusingHook));

        let err = monitor.start(|| {}).unwrap_err();
        assert!(matches!(err, ConnectivityError::Registration(_)));
        assert!(!monitor.is_running());

        // Falls back to the last state seen
        assert!(monitor.is_connected());
        monitor.stop();
    }

    #[tokio::test]
    async fn test_subscribe_tracks_transitions() {
        let hook = Arc::new(WatchConnectivity::new(false));
        let (monitor, _fired) = counting_monitor(hook.clone());
        let mut rx = monitor.subscribe();

        hook.set_available(true);
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(*rx.borrow());
    }
}

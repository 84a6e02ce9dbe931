use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;
use wb_domain::event::RunEvent;

const BROADCAST_CAPACITY: usize = 256;
const SETTLE_DELAY: Duration = Duration::from_millis(500);

struct Topic {
    sender: broadcast::Sender<RunEvent>,
    first_subscriber: Arc<Notify>,
    has_subscriber: Arc<std::sync::atomic::AtomicBool>,
}

/// Per-run pub/sub fan-out for `/live/{run_id}` subscribers.
///
/// A run is registered before anyone has connected — the HTTP handler that
/// creates it needs an id to hand back immediately. [`EventBus::await_ready`]
/// implements the late-subscriber handshake: it waits up to `connect_timeout`
/// for the first subscriber to show up, then waits an additional settle
/// delay so the subscriber's own receive loop has time to start, before
/// letting the orchestrator begin emitting real events. A client that never
/// connects doesn't block the run forever — it just starts blind.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<RwLock<HashMap<Uuid, Topic>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register(&self, run_id: Uuid) {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        self.topics.write().insert(
            run_id,
            Topic {
                sender,
                first_subscriber: Arc::new(Notify::new()),
                has_subscriber: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            },
        );
    }

    pub fn subscribe(&self, run_id: Uuid) -> Option<broadcast::Receiver<RunEvent>> {
        let topics = self.topics.read();
        let topic = topics.get(&run_id)?;
        let rx = topic.sender.subscribe();
        if !topic.has_subscriber.swap(true, std::sync::atomic::Ordering::SeqCst) {
            topic.first_subscriber.notify_waiters();
        }
        Some(rx)
    }

    pub fn emit(&self, event: RunEvent) {
        let topics = self.topics.read();
        if let Some(topic) = topics.get(&event.run_id()) {
            // No subscribers is routine — a run can complete entirely unwatched.
            let _ = topic.sender.send(event);
        }
    }

    pub fn cleanup(&self, run_id: Uuid) {
        self.topics.write().remove(&run_id);
    }

    /// Wait for the first subscriber (up to `connect_timeout`), then for the
    /// settle delay, before the orchestration loop is allowed to start.
    pub async fn await_ready(&self, run_id: Uuid, connect_timeout: Duration) {
        let topic = {
            let topics = self.topics.read();
            topics
                .get(&run_id)
                .map(|t| (t.first_subscriber.clone(), t.has_subscriber.clone()))
        };
        if let Some((notify, has_subscriber)) = topic {
            // Construct the `Notified` future before checking the flag: Tokio
            // guarantees a `notify_waiters()` call that happens after this
            // point, even before the future is awaited, is not missed. Doing
            // the check first (only constructing the future on demand) would
            // leave a window between the check and the await where a
            // concurrent `subscribe()` could fire its notification unseen.
            let notified = notify.notified();
            if !has_subscriber.load(std::sync::atomic::Ordering::SeqCst) {
                let _ = tokio::time::timeout(connect_timeout, notified).await;
            }
        }
        tokio::time::sleep(SETTLE_DELAY).await;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscriber_does_not_panic() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        bus.register(run_id);
        bus.emit(RunEvent::RunCreated { run_id });
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        bus.register(run_id);
        let mut rx = bus.subscribe(run_id).unwrap();
        bus.emit(RunEvent::RunCreated { run_id });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id(), run_id);
    }

    #[tokio::test]
    async fn await_ready_returns_promptly_once_subscribed() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        bus.register(run_id);

        let bus2 = bus.clone();
        let handle = tokio::spawn(async move {
            bus2.await_ready(run_id, Duration::from_secs(5)).await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let _rx = bus.subscribe(run_id).unwrap();

        tokio::time::timeout(Duration::from_millis(700), handle)
            .await
            .expect("await_ready should finish shortly after the settle delay")
            .unwrap();
    }

    #[tokio::test]
    async fn await_ready_times_out_when_nobody_subscribes() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        bus.register(run_id);

        let start = std::time::Instant::now();
        bus.await_ready(run_id, Duration::from_millis(50)).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn cleanup_removes_the_topic() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        bus.register(run_id);
        bus.cleanup(run_id);
        assert!(bus.subscribe(run_id).is_none());
    }
}

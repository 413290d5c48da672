use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{info, warn};

use marquee_types::events::LiveEvent;

const CHANNEL_CAPACITY: usize = 1024;

/// In-process fan-out of live events. The broadcast channel only exists
/// while at least one [`Subscription`] is alive; publishing with no
/// subscribers is a no-op.
#[derive(Clone, Default)]
pub struct LiveUpdates {
    inner: Arc<Mutex<LiveState>>,
}

#[derive(Default)]
struct LiveState {
    tx: Option<broadcast::Sender<LiveEvent>>,
    subscribers: usize,
}

impl LiveUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the service on the first subscriber.
    pub fn subscribe(&self) -> Subscription {
        let mut state = self.lock();
        let tx = state.tx.get_or_insert_with(|| {
            info!("Live updates started");
            broadcast::channel(CHANNEL_CAPACITY).0
        });
        let rx = tx.subscribe();
        state.subscribers += 1;

        Subscription {
            rx,
            owner: self.clone(),
        }
    }

    pub fn publish(&self, event: LiveEvent) {
        if let Some(tx) = &self.lock().tx {
            let _ = tx.send(event);
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().tx.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers
    }

    /// Stops the service when the last subscriber leaves.
    fn release(&self) {
        let mut state = self.lock();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 && state.tx.take().is_some() {
            info!("Live updates stopped");
        }
    }
}

/// Receiving end held by one consumer. Dropping it releases the service.
pub struct Subscription {
    rx: broadcast::Receiver<LiveEvent>,
    owner: LiveUpdates,
}

impl Subscription {
    /// Next event, or `None` once the service has stopped.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Live subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Live subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.owner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_types::{ContentKind, Counter, Namespace};
    use uuid::Uuid;

    fn counter_event() -> LiveEvent {
        LiveEvent::CounterChanged {
            namespace: Namespace::new(ContentKind::Scene, Uuid::new_v4()),
            counter: Counter::Likes,
            value: 1,
        }
    }

    #[test]
    fn starts_and_stops_with_subscribers() {
        let live = LiveUpdates::new();
        assert!(!live.is_running());

        let first = live.subscribe();
        let second = live.subscribe();
        assert!(live.is_running());
        assert_eq!(live.subscriber_count(), 2);

        drop(first);
        assert!(live.is_running());

        drop(second);
        assert!(!live.is_running());
        assert_eq!(live.subscriber_count(), 0);
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let live = LiveUpdates::new();
        live.publish(counter_event());

        let mut sub = live.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let live = LiveUpdates::new();
        let mut a = live.subscribe();
        let mut b = live.subscribe();

        let event = counter_event();
        live.publish(event.clone());

        assert_eq!(a.recv().await, Some(event.clone()));
        assert_eq!(b.recv().await, Some(event));
    }

    #[test]
    fn restarts_after_stop() {
        let live = LiveUpdates::new();
        drop(live.subscribe());
        assert!(!live.is_running());

        let mut sub = live.subscribe();
        live.publish(counter_event());
        assert!(sub.try_recv().is_some());
    }
}

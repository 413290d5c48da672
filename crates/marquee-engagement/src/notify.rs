use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use marquee_types::events::{LiveEvent, NotificationEvent};
use marquee_types::{NotificationSink, StoreError};

use crate::config::NotifierConfig;
use crate::live::LiveUpdates;

/// A notification that exhausted its delivery attempts.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: NotificationEvent,
    pub error: String,
    pub attempts: u32,
}

enum Job {
    Deliver(NotificationEvent),
    Flush(oneshot::Sender<()>),
}

/// Best-effort notification delivery. Events go through a bounded queue
/// drained by one worker task that retries with exponential backoff and
/// dead-letters what it cannot deliver. Enqueueing never blocks or fails
/// the caller.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Job>,
    dead_letters: Arc<Mutex<VecDeque<DeadLetter>>>,
    dead_letter_capacity: usize,
}

impl Notifier {
    /// Spawns the delivery worker on the current tokio runtime. The worker
    /// exits once every `Notifier` clone is dropped.
    pub fn spawn(sink: Arc<dyn NotificationSink>, live: LiveUpdates, config: NotifierConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dead_letters = Arc::new(Mutex::new(VecDeque::new()));

        let notifier = Self {
            tx,
            dead_letters: dead_letters.clone(),
            dead_letter_capacity: config.dead_letter_capacity,
        };

        let worker = Worker {
            sink,
            live,
            config,
            dead_letters: notifier.clone_dead_letters(),
        };
        tokio::spawn(worker.run(rx));

        notifier
    }

    fn clone_dead_letters(&self) -> DeadLetters {
        DeadLetters {
            entries: self.dead_letters.clone(),
            capacity: self.dead_letter_capacity,
        }
    }

    pub fn notify(&self, event: NotificationEvent) {
        match self.tx.try_send(Job::Deliver(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(Job::Deliver(event))) => {
                self.clone_dead_letters().push(event, "notification queue full".into(), 0);
            }
            Err(TrySendError::Closed(Job::Deliver(event))) => {
                self.clone_dead_letters().push(event, "notifier stopped".into(), 0);
            }
            Err(_) => {}
        }
    }

    /// Waits until everything queued before this call has been delivered or
    /// dead-lettered.
    pub async fn drain(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Job::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

struct DeadLetters {
    entries: Arc<Mutex<VecDeque<DeadLetter>>>,
    capacity: usize,
}

impl DeadLetters {
    fn push(&self, event: NotificationEvent, error: String, attempts: u32) {
        error!(
            "Dead-lettered {} notification for {} on {}/{} after {} attempts: {}",
            event.kind.as_str(),
            event.owner_id,
            event.content_kind,
            event.content_id,
            attempts,
            error
        );

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if self.capacity == 0 {
            return;
        }
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(DeadLetter {
            event,
            error,
            attempts,
        });
    }
}

struct Worker {
    sink: Arc<dyn NotificationSink>,
    live: LiveUpdates,
    config: NotifierConfig,
    dead_letters: DeadLetters,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Job>) {
        while let Some(job) = rx.recv().await {
            match job {
                Job::Deliver(event) => self.deliver(event).await,
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        info!("Notifier stopped");
    }

    async fn deliver(&self, event: NotificationEvent) {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.base_backoff;

        for attempt in 1..=max_attempts {
            let sink = self.sink.clone();
            let job = event.clone();
            let result = tokio::task::spawn_blocking(move || sink.deliver(&job))
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))
                .and_then(|r| r);

            match result {
                Ok(()) => {
                    debug!(
                        "Delivered {} notification to {}",
                        event.kind.as_str(),
                        event.owner_id
                    );
                    self.live.publish(LiveEvent::Notification(event));
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Notification delivery attempt {}/{} failed: {}",
                        attempt, max_attempts, e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    self.dead_letters.push(event, e.to_string(), attempt);
                    return;
                }
            }
        }
    }
}

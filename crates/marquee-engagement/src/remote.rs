use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use marquee_types::{Store, StoreError, StoreResult};

use crate::error::{EngagementError, Result};

pub type SharedStore = Arc<dyn Store>;

/// Runs store calls off the async runtime with a bounded timeout.
#[derive(Clone)]
pub struct Remote {
    store: SharedStore,
    timeout: Duration,
}

impl Remote {
    pub fn new(store: SharedStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// One round trip. A timed-out call is abandoned, not cancelled: the
    /// store may still apply it.
    pub async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Store) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(EngagementError::from),
            Ok(Err(e)) => {
                error!("spawn_blocking join error in {}: {}", op, e);
                Err(EngagementError::Remote(StoreError::Unavailable(e.to_string())))
            }
            Err(_) => {
                warn!("{} timed out after {:?}", op, self.timeout);
                Err(EngagementError::Timeout {
                    op,
                    after: self.timeout,
                })
            }
        }
    }
}

use tracing::{debug, info};

use marquee_types::{Counter, Interaction, Namespace};

use crate::error::{EngagementError, Result};
use crate::remote::Remote;

/// A counter that disagreed with its rows and was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drift {
    pub counter: Counter,
    pub stored: u64,
    pub actual: u64,
}

/// Recomputes denormalized counters from the interaction and repost rows.
/// Repairs whatever a failed compensation left behind.
#[derive(Clone)]
pub struct Reconciler {
    remote: Remote,
}

impl Reconciler {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    pub async fn reconcile(&self, ns: Namespace) -> Result<Vec<Drift>> {
        let counters = self
            .remote
            .call("counters", move |s| s.counters(ns))
            .await?
            .ok_or_else(|| EngagementError::not_found(ns))?;

        let mut actual = Vec::with_capacity(4);
        for interaction in Interaction::ALL {
            let count = self
                .remote
                .call("count_rows", move |s| s.count_rows(ns, interaction))
                .await?;
            actual.push((interaction.counter(), count));
        }
        if !ns.kind.is_repost() {
            let (kind, id) = (ns.kind.base(), ns.id);
            let count = self
                .remote
                .call("count_reposts", move |s| s.count_reposts(kind, id))
                .await?;
            actual.push((Counter::Reposts, count));
        }

        let mut drifts = Vec::new();
        for (counter, count) in actual {
            let stored = counters.get(counter);
            if stored == count {
                continue;
            }
            self.remote
                .call("set_count", move |s| s.set_count(ns, counter, count))
                .await?;
            info!("Reconciled {} {} from {} to {}", ns, counter.column(), stored, count);
            drifts.push(Drift {
                counter,
                stored,
                actual: count,
            });
        }

        if drifts.is_empty() {
            debug!("Counters on {} are consistent", ns);
        }
        Ok(drifts)
    }
}

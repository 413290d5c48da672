//! Engagement core: likes, comments, shares, views and reposts over any
//! content namespace, content loaders, the merged home feed and the
//! optimistic update layer used by interactive clients.

pub mod client;
pub mod config;
pub mod error;
pub mod feed;
pub mod live;
pub mod loaders;
pub mod notify;
pub mod optimistic;
pub mod reconcile;
pub mod remote;
pub mod reposts;
pub mod session;

use std::sync::Arc;

use marquee_types::NotificationSink;

pub use client::EngagementClient;
pub use config::{EngagementConfig, NotifierConfig};
pub use error::{EngagementError, Result};
pub use feed::{Feed, FeedAggregator, FeedStream};
pub use live::{LiveUpdates, Subscription};
pub use loaders::{ContentLoader, Loaders};
pub use notify::Notifier;
pub use optimistic::{EngagementState, Optimistic, OptimisticEngagement};
pub use reconcile::Reconciler;
pub use remote::{Remote, SharedStore};
pub use reposts::RepostManager;
pub use session::Session;

/// Every engagement service wired to one store. Cheap to clone.
#[derive(Clone)]
pub struct Engagement {
    pub client: EngagementClient,
    pub reposts: RepostManager,
    pub loaders: Loaders,
    pub feed: FeedAggregator,
    pub reconciler: Reconciler,
    pub live: LiveUpdates,
    pub notifier: Notifier,
}

impl Engagement {
    /// Must be called inside a tokio runtime; spawns the notifier worker.
    pub fn new(store: SharedStore, sink: Arc<dyn NotificationSink>, config: EngagementConfig) -> Self {
        let remote = Remote::new(store, config.request_timeout);
        let live = LiveUpdates::new();
        let notifier = Notifier::spawn(sink, live.clone(), config.notifier.clone());
        let client = EngagementClient::new(remote.clone(), notifier.clone(), live.clone(), &config.public_origin);

        let reposts = RepostManager::new(client.clone());
        let loaders = Loaders::new(&client, config.feed_source_limit);
        let feed = FeedAggregator::new(loaders.clone(), reposts.clone(), config.feed_source_limit);

        Self {
            client,
            reposts,
            loaders,
            feed,
            reconciler: Reconciler::new(remote),
            live,
            notifier,
        }
    }

    /// Optimistic controls for one viewer.
    pub fn optimistic(&self, session: Session) -> OptimisticEngagement {
        OptimisticEngagement::new(self.client.clone(), self.reposts.clone(), session)
    }
}

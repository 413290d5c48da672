//! Home feed: eight independently fetched streams merged into one
//! newest-first list that is revealed a page at a time.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use marquee_types::BaseKind;
use marquee_types::api::FeedPage;
use marquee_types::models::FeedEntry;

use crate::error::{EngagementError, Result};
use crate::loaders::Loaders;
use crate::reposts::RepostManager;

pub const PAGE_SIZE: usize = 10;

/// Distance from the bottom of the list, in pixels, that counts as near.
pub const LOAD_MORE_THRESHOLD_PX: f64 = 500.0;

/// Quiet period after the last scroll event before the trigger is evaluated.
pub const SCROLL_SETTLE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedStream {
    Content(BaseKind),
    Reposts(BaseKind),
}

impl FeedStream {
    /// Group order used when concatenating before the sort.
    pub const ALL: [FeedStream; 8] = [
        FeedStream::Content(BaseKind::Scene),
        FeedStream::Content(BaseKind::Monologue),
        FeedStream::Content(BaseKind::Character),
        FeedStream::Content(BaseKind::Frame),
        FeedStream::Reposts(BaseKind::Scene),
        FeedStream::Reposts(BaseKind::Monologue),
        FeedStream::Reposts(BaseKind::Character),
        FeedStream::Reposts(BaseKind::Frame),
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeedStream::Content(kind) => kind.content_table(),
            FeedStream::Reposts(kind) => kind.reposts_table(),
        }
    }

    fn index(self) -> usize {
        match self {
            FeedStream::Content(kind) => kind as usize,
            FeedStream::Reposts(kind) => BaseKind::ALL.len() + kind as usize,
        }
    }
}

/// Concatenates `groups` in order and sorts newest first. The sort is
/// stable, so entries sharing a timestamp keep their group order.
pub fn merge(groups: impl IntoIterator<Item = Vec<FeedEntry>>) -> Vec<FeedEntry> {
    let mut merged: Vec<FeedEntry> = groups.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

#[derive(Debug, Clone, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Loading,
    Ready(Vec<FeedEntry>),
    Failed(EngagementError),
}

/// Debounced "near the bottom" detector. Every scroll event restarts the
/// settle timer; the latest position is checked once the timer expires.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    threshold: f64,
    settle: Duration,
    pending: Option<(Instant, f64)>,
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new(LOAD_MORE_THRESHOLD_PX, SCROLL_SETTLE)
    }
}

impl ScrollTrigger {
    pub fn new(threshold: f64, settle: Duration) -> Self {
        Self {
            threshold,
            settle,
            pending: None,
        }
    }

    pub fn on_scroll(&mut self, distance_to_bottom: f64, now: Instant) {
        self.pending = Some((now, distance_to_bottom));
    }

    /// Fires at most once per settled scroll.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some((at, distance)) if now.saturating_duration_since(at) >= self.settle => {
                self.pending = None;
                distance <= self.threshold
            }
            _ => false,
        }
    }
}

/// Client-side feed state: per-stream load state, the merged list and how
/// much of it is revealed.
#[derive(Debug, Clone)]
pub struct Feed {
    streams: [StreamState; 8],
    merged: Vec<FeedEntry>,
    visible: usize,
    scroll: ScrollTrigger,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            streams: Default::default(),
            merged: Vec::new(),
            visible: PAGE_SIZE,
            scroll: ScrollTrigger::default(),
        }
    }
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(&self, stream: FeedStream) -> &StreamState {
        &self.streams[stream.index()]
    }

    /// Marks every stream loading. The revealed count is kept.
    pub fn begin_refresh(&mut self) {
        for state in &mut self.streams {
            *state = StreamState::Loading;
        }
    }

    pub fn complete(&mut self, stream: FeedStream, result: Result<Vec<FeedEntry>>) {
        self.streams[stream.index()] = match result {
            Ok(entries) => {
                debug!("Feed stream {} returned {} entries", stream.name(), entries.len());
                StreamState::Ready(entries)
            }
            Err(e) => {
                warn!("Feed stream {} failed: {}", stream.name(), e);
                StreamState::Failed(e)
            }
        };

        if !self.is_loading() {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        if self.error().is_some() {
            self.merged.clear();
            return;
        }
        let groups = self.streams.iter().filter_map(|state| match state {
            StreamState::Ready(entries) => Some(entries.clone()),
            _ => None,
        });
        self.merged = merge(groups);
    }

    /// True while any stream is still loading.
    pub fn is_loading(&self) -> bool {
        self.streams.iter().any(|s| matches!(s, StreamState::Loading))
    }

    /// The first failed stream, in group order.
    pub fn error(&self) -> Option<EngagementError> {
        FeedStream::ALL.iter().find_map(|&stream| match self.stream(stream) {
            StreamState::Failed(e) => Some(EngagementError::PartialFeed {
                stream: stream.name(),
                source: Box::new(e.clone()),
            }),
            _ => None,
        })
    }

    pub fn merged(&self) -> &[FeedEntry] {
        &self.merged
    }

    pub fn visible_count(&self) -> usize {
        self.visible.min(self.merged.len())
    }

    /// Revealed entries. Empty while loading or failed; successful streams
    /// are not shown on their own.
    pub fn display(&self) -> &[FeedEntry] {
        if self.is_loading() || self.error().is_some() {
            return &[];
        }
        &self.merged[..self.visible_count()]
    }

    pub fn page(&self) -> FeedPage {
        let items = self.display().to_vec();
        FeedPage {
            visible_count: items.len(),
            total: self.merged.len(),
            items,
        }
    }

    /// Reveals one more page. Returns whether anything new became visible.
    pub fn load_more(&mut self) -> bool {
        let before = self.visible_count();
        let next = (before + PAGE_SIZE).min(self.merged.len());
        self.visible = self.visible.max(next);
        self.visible_count() > before
    }

    pub fn on_scroll(&mut self, distance_to_bottom: f64, now: Instant) {
        self.scroll.on_scroll(distance_to_bottom, now);
    }

    /// Evaluates a settled scroll and reveals a page if it ended near the
    /// bottom.
    pub fn poll_scroll(&mut self, now: Instant) -> bool {
        self.scroll.poll(now) && self.load_more()
    }
}

/// Fetches every feed stream concurrently.
#[derive(Clone)]
pub struct FeedAggregator {
    loaders: Loaders,
    reposts: RepostManager,
    limit: u32,
}

impl FeedAggregator {
    pub fn new(loaders: Loaders, reposts: RepostManager, limit: u32) -> Self {
        Self {
            loaders,
            reposts,
            limit,
        }
    }

    async fn fetch(&self, stream: FeedStream, viewer: Option<Uuid>) -> Result<Vec<FeedEntry>> {
        match stream {
            FeedStream::Content(kind) => {
                let cards = self.loaders.get(kind).load(viewer).await?;
                Ok(cards.into_iter().map(FeedEntry::content).collect())
            }
            FeedStream::Reposts(kind) => {
                let cards = self.reposts.load_reposts(viewer, kind, self.limit).await?;
                Ok(cards.into_iter().map(FeedEntry::repost).collect())
            }
        }
    }

    async fn fetch_all(&self, viewer: Option<Uuid>) -> Vec<(FeedStream, Result<Vec<FeedEntry>>)> {
        let results = join_all(FeedStream::ALL.map(|stream| self.fetch(stream, viewer))).await;
        FeedStream::ALL.into_iter().zip(results).collect()
    }

    /// Re-fetches all streams into `feed`. Also serves as the retry after a
    /// failed load.
    pub async fn refresh(&self, feed: &mut Feed, viewer: Option<Uuid>) -> Result<()> {
        feed.begin_refresh();
        for (stream, result) in self.fetch_all(viewer).await {
            feed.complete(stream, result);
        }
        match feed.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// One-shot merged feed. Any failed stream fails the whole load.
    pub async fn load(&self, viewer: Option<Uuid>) -> Result<Vec<FeedEntry>> {
        let mut feed = Feed::new();
        self.refresh(&mut feed, viewer).await?;
        Ok(feed.merged)
    }
}

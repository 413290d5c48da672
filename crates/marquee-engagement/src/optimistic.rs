//! Optimistic updates: a local state change is applied before the server
//! confirms it, committed from the authoritative response on success and
//! rolled back to the pre-mutation value on failure.
//!
//! At most one mutation of a given name may be in flight per key; a second
//! one is rejected with [`EngagementError::Busy`] rather than queued.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use marquee_types::api::{CommentResponse, LikeOutcome, RepostOutcome, ShareOutcome};
use marquee_types::{BaseKind, Namespace};

use crate::client::EngagementClient;
use crate::error::{EngagementError, Result};
use crate::reposts::RepostManager;
use crate::session::Session;

pub trait Command<S> {
    type Output;

    /// Mutation name; one per key may be in flight.
    const NAME: &'static str;

    /// Speculative change, remembering whatever `rollback` needs.
    fn apply(&mut self, state: &mut S);

    fn rollback(&self, state: &mut S);

    /// Replace the speculative values with the server's.
    fn commit(&self, state: &mut S, output: &Self::Output);
}

struct Inner<K, S> {
    states: HashMap<K, S>,
    pending: HashSet<(K, &'static str)>,
}

/// Per-key local state plus per-(key, mutation) pending flags.
pub struct Optimistic<K, S> {
    inner: Arc<Mutex<Inner<K, S>>>,
}

impl<K, S> Clone for Optimistic<K, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, S> Default for Optimistic<K, S> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                states: HashMap::new(),
                pending: HashSet::new(),
            })),
        }
    }
}

impl<K, S> Optimistic<K, S>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    S: Clone + Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the local state with an authoritative snapshot.
    pub fn seed(&self, key: K, state: S) {
        self.lock().states.insert(key, state);
    }

    pub fn state(&self, key: &K) -> S {
        self.lock().states.get(key).cloned().unwrap_or_default()
    }

    pub fn is_pending(&self, key: &K, name: &'static str) -> bool {
        self.lock().pending.contains(&(key.clone(), name))
    }

    /// Apply `command`, await `request`, then commit or roll back. Dropping
    /// the returned future mid-flight rolls back too.
    pub async fn run<C, F>(&self, key: K, mut command: C, request: F) -> Result<C::Output>
    where
        C: Command<S>,
        F: Future<Output = Result<C::Output>>,
    {
        {
            let mut inner = self.lock();
            if !inner.pending.insert((key.clone(), C::NAME)) {
                return Err(EngagementError::Busy(format!("{} on {:?}", C::NAME, key)));
            }
            command.apply(inner.states.entry(key.clone()).or_default());
        }

        let in_flight = InFlight {
            owner: self,
            key,
            command: Some(command),
        };
        let result = request.await;
        in_flight.settle(&result);
        result
    }
}

/// Releases the pending flag exactly once, rolling back unless settled with
/// a success.
struct InFlight<'a, K, S, C>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    S: Clone + Default,
    C: Command<S>,
{
    owner: &'a Optimistic<K, S>,
    key: K,
    command: Option<C>,
}

impl<K, S, C> InFlight<'_, K, S, C>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    S: Clone + Default,
    C: Command<S>,
{
    fn settle(mut self, result: &Result<C::Output>) {
        let Some(command) = self.command.take() else {
            return;
        };

        let mut inner = self.owner.lock();
        inner.pending.remove(&(self.key.clone(), C::NAME));
        let state = inner.states.entry(self.key.clone()).or_default();
        match result {
            Ok(output) => command.commit(state, output),
            Err(e) => {
                warn!("{} on {:?} failed, rolling back: {}", C::NAME, self.key, e);
                command.rollback(state);
            }
        }
    }
}

impl<K, S, C> Drop for InFlight<'_, K, S, C>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    S: Clone + Default,
    C: Command<S>,
{
    fn drop(&mut self) {
        if let Some(command) = self.command.take() {
            debug!("{} on {:?} abandoned, rolling back", C::NAME, self.key);
            let mut inner = self.owner.lock();
            inner.pending.remove(&(self.key.clone(), C::NAME));
            if let Some(state) = inner.states.get_mut(&self.key) {
                command.rollback(state);
            }
        }
    }
}

// -- Engagement state and commands --

/// What a viewer sees of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngagementState {
    pub liked: bool,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub reposted: bool,
    pub repost_id: Option<Uuid>,
    pub repost_count: u64,
}

#[derive(Default)]
pub struct ToggleLike {
    previous: Option<(bool, u64)>,
}

impl Command<EngagementState> for ToggleLike {
    type Output = LikeOutcome;
    const NAME: &'static str = "like";

    fn apply(&mut self, state: &mut EngagementState) {
        self.previous = Some((state.liked, state.like_count));
        state.liked = !state.liked;
        state.like_count = if state.liked {
            state.like_count + 1
        } else {
            state.like_count.saturating_sub(1)
        };
    }

    fn rollback(&self, state: &mut EngagementState) {
        if let Some((liked, like_count)) = self.previous {
            state.liked = liked;
            state.like_count = like_count;
        }
    }

    fn commit(&self, state: &mut EngagementState, output: &LikeOutcome) {
        state.liked = output.liked;
        state.like_count = output.like_count;
    }
}

#[derive(Default)]
pub struct AddComment {
    previous: Option<u64>,
}

impl Command<EngagementState> for AddComment {
    type Output = CommentResponse;
    const NAME: &'static str = "comment";

    fn apply(&mut self, state: &mut EngagementState) {
        self.previous = Some(state.comment_count);
        state.comment_count += 1;
    }

    fn rollback(&self, state: &mut EngagementState) {
        if let Some(count) = self.previous {
            state.comment_count = count;
        }
    }

    fn commit(&self, state: &mut EngagementState, output: &CommentResponse) {
        state.comment_count = output.comment_count;
    }
}

#[derive(Default)]
pub struct Share {
    previous: Option<u64>,
}

impl Command<EngagementState> for Share {
    type Output = ShareOutcome;
    const NAME: &'static str = "share";

    fn apply(&mut self, state: &mut EngagementState) {
        self.previous = Some(state.share_count);
        state.share_count += 1;
    }

    fn rollback(&self, state: &mut EngagementState) {
        if let Some(count) = self.previous {
            state.share_count = count;
        }
    }

    fn commit(&self, state: &mut EngagementState, output: &ShareOutcome) {
        state.share_count = output.share_count;
    }
}

type RepostSnapshot = (bool, Option<Uuid>, u64);

fn repost_snapshot(state: &EngagementState) -> RepostSnapshot {
    (state.reposted, state.repost_id, state.repost_count)
}

fn restore_repost(state: &mut EngagementState, (reposted, repost_id, count): RepostSnapshot) {
    state.reposted = reposted;
    state.repost_id = repost_id;
    state.repost_count = count;
}

#[derive(Default)]
pub struct CreateRepost {
    previous: Option<RepostSnapshot>,
}

impl Command<EngagementState> for CreateRepost {
    type Output = RepostOutcome;
    const NAME: &'static str = "repost";

    fn apply(&mut self, state: &mut EngagementState) {
        self.previous = Some(repost_snapshot(state));
        state.reposted = true;
        state.repost_count += 1;
    }

    fn rollback(&self, state: &mut EngagementState) {
        if let Some(snapshot) = self.previous {
            restore_repost(state, snapshot);
        }
    }

    fn commit(&self, state: &mut EngagementState, output: &RepostOutcome) {
        state.reposted = true;
        state.repost_id = Some(output.repost.id);
        state.repost_count = output.repost_count;
    }
}

#[derive(Default)]
pub struct DeleteRepost {
    previous: Option<RepostSnapshot>,
}

impl Command<EngagementState> for DeleteRepost {
    type Output = u64;
    const NAME: &'static str = "repost";

    fn apply(&mut self, state: &mut EngagementState) {
        self.previous = Some(repost_snapshot(state));
        state.reposted = false;
        state.repost_id = None;
        state.repost_count = state.repost_count.saturating_sub(1);
    }

    fn rollback(&self, state: &mut EngagementState) {
        if let Some(snapshot) = self.previous {
            restore_repost(state, snapshot);
        }
    }

    fn commit(&self, state: &mut EngagementState, output: &u64) {
        state.repost_count = *output;
    }
}

/// Optimistic front for one session's engagement controls.
#[derive(Clone)]
pub struct OptimisticEngagement {
    client: EngagementClient,
    reposts: RepostManager,
    session: Session,
    states: Optimistic<Namespace, EngagementState>,
}

impl OptimisticEngagement {
    pub fn new(client: EngagementClient, reposts: RepostManager, session: Session) -> Self {
        Self {
            client,
            reposts,
            session,
            states: Optimistic::new(),
        }
    }

    pub fn state(&self, ns: Namespace) -> EngagementState {
        self.states.state(&ns)
    }

    pub fn is_pending(&self, ns: Namespace, mutation: &'static str) -> bool {
        self.states.is_pending(&ns, mutation)
    }

    /// Loads authoritative counters and viewer flags for `ns`.
    pub async fn track(&self, ns: Namespace) -> Result<EngagementState> {
        let counters = self.client.counters(ns).await?;
        let mut state = EngagementState {
            like_count: counters.like_count,
            comment_count: counters.comment_count,
            share_count: counters.share_count,
            repost_count: counters.repost_count,
            ..EngagementState::default()
        };

        if let Some(user_id) = self.session.user_id() {
            state.liked = self.client.is_liked(ns, user_id).await?;
            if !ns.kind.is_repost() {
                let repost = self.reposts.find_repost(ns.kind.base(), user_id, ns.id).await?;
                state.reposted = repost.is_some();
                state.repost_id = repost.map(|r| r.id);
            }
        }

        self.states.seed(ns, state.clone());
        Ok(state)
    }

    pub async fn toggle_like(&self, ns: Namespace) -> Result<LikeOutcome> {
        self.session.require_user()?;
        let request = self.client.toggle_like(&self.session, ns);
        self.states.run(ns, ToggleLike::default(), request).await
    }

    pub async fn add_comment(&self, ns: Namespace, text: &str) -> Result<CommentResponse> {
        self.session.require_user()?;
        let request = self.client.add_comment(&self.session, ns, text);
        self.states.run(ns, AddComment::default(), request).await
    }

    pub async fn share(&self, ns: Namespace) -> Result<ShareOutcome> {
        self.session.require_user()?;
        let request = self.client.record_share(&self.session, ns);
        self.states.run(ns, Share::default(), request).await
    }

    /// Reposts the item, or removes the viewer's repost if it has one.
    pub async fn toggle_repost(&self, kind: BaseKind, content_id: Uuid) -> Result<EngagementState> {
        self.session.require_user()?;
        let ns = Namespace::new(kind.kind(), content_id);

        match self.states.state(&ns).repost_id {
            Some(repost_id) => {
                let request = self.reposts.delete_repost(&self.session, kind, repost_id);
                self.states.run(ns, DeleteRepost::default(), request).await?;
            }
            None => {
                let request = self.reposts.create_repost(&self.session, kind, content_id);
                self.states.run(ns, CreateRepost::default(), request).await?;
            }
        }

        Ok(self.states.state(&ns))
    }
}

//! Engagement flows against the SQLite store opened in memory. `FaultyStore`
//! wraps it to inject counter and feed-source failures, slow counters, and
//! rows that a concurrent caller wrote or removed first.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use marquee_db::Database;
use marquee_types::events::{LiveEvent, NotificationKind};
use marquee_types::models::{
    AuthoredContent, CommentRecord, ContentBody, ContentItem, ContentStatus, Counters, LikeRecord,
    Profile, Repost, ShareRecord,
};
use marquee_types::{
    BaseKind, ContentKind, Counter, Interaction, Namespace, Store, StoreError, StoreResult,
};

use marquee_engagement::feed::{Feed, FeedStream};
use marquee_engagement::{Engagement, EngagementConfig, EngagementError, NotifierConfig, Session};

struct FaultyStore {
    inner: Arc<Database>,
    fail_counters: AtomicBool,
    fail_listing: Mutex<Option<BaseKind>>,
    list_calls: AtomicU32,
    counter_delay: Mutex<Option<Duration>>,
    lose_insert_race: AtomicBool,
    lose_delete_race: AtomicBool,
}

impl FaultyStore {
    fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            fail_counters: AtomicBool::new(false),
            fail_listing: Mutex::new(None),
            list_calls: AtomicU32::new(0),
            counter_delay: Mutex::new(None),
            lose_insert_race: AtomicBool::new(false),
            lose_delete_race: AtomicBool::new(false),
        }
    }

    /// Counter calls block this long before they commit.
    fn slow_counters(&self, delay: Option<Duration>) {
        *self.counter_delay.lock().unwrap() = delay;
    }

    /// Like and repost inserts behave as if a concurrent caller committed the
    /// same row and its counter just before: the row lands, then `Conflict`.
    fn lose_insert_race(&self, lose: bool) {
        self.lose_insert_race.store(lose, Ordering::SeqCst);
    }

    /// Like deletes behave as if a concurrent caller removed the row and
    /// decremented the counter first.
    fn lose_delete_race(&self, lose: bool) {
        self.lose_delete_race.store(lose, Ordering::SeqCst);
    }

    fn fail_counters(&self, fail: bool) {
        self.fail_counters.store(fail, Ordering::SeqCst);
    }

    fn fail_listing(&self, kind: Option<BaseKind>) {
        *self.fail_listing.lock().unwrap() = kind;
    }

    fn counter_fault(&self) -> StoreResult<()> {
        let delay = *self.counter_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.fail_counters.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("counter rpc dropped".into()));
        }
        Ok(())
    }
}

impl Store for FaultyStore {
    fn owner_of(&self, namespace: Namespace) -> StoreResult<Option<Uuid>> {
        self.inner.owner_of(namespace)
    }

    fn counters(&self, namespace: Namespace) -> StoreResult<Option<Counters>> {
        self.inner.counters(namespace)
    }

    fn list_published(&self, kind: BaseKind, limit: u32) -> StoreResult<Vec<AuthoredContent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_listing.lock().unwrap() == Some(kind) {
            return Err(StoreError::Unavailable(format!("{} loader offline", kind)));
        }
        self.inner.list_published(kind, limit)
    }

    fn get_contents(&self, kind: BaseKind, ids: &[Uuid]) -> StoreResult<Vec<AuthoredContent>> {
        self.inner.get_contents(kind, ids)
    }

    fn delete_content(&self, kind: BaseKind, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_content(kind, id)
    }

    fn profiles(&self, user_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Profile>> {
        self.inner.profiles(user_ids)
    }

    fn find_like(&self, namespace: Namespace, user_id: Uuid) -> StoreResult<Option<LikeRecord>> {
        self.inner.find_like(namespace, user_id)
    }

    fn insert_like(&self, like: &LikeRecord) -> StoreResult<()> {
        if self.lose_insert_race.load(Ordering::SeqCst) {
            self.inner.insert_like(like)?;
            self.inner.increment_count(like.namespace, Counter::Likes)?;
            return Err(StoreError::Conflict("likes(parent, user)".into()));
        }
        self.inner.insert_like(like)
    }

    fn delete_like(&self, namespace: Namespace, like_id: Uuid) -> StoreResult<bool> {
        if self.lose_delete_race.load(Ordering::SeqCst) {
            self.inner.delete_like(namespace, like_id)?;
            self.inner.decrement_count(namespace, Counter::Likes)?;
            return Ok(false);
        }
        self.inner.delete_like(namespace, like_id)
    }

    fn liked_ids(
        &self,
        kind: ContentKind,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        self.inner.liked_ids(kind, user_id, ids)
    }

    fn insert_comment(&self, comment: &CommentRecord) -> StoreResult<()> {
        self.inner.insert_comment(comment)
    }

    fn get_comment(
        &self,
        namespace: Namespace,
        comment_id: Uuid,
    ) -> StoreResult<Option<CommentRecord>> {
        self.inner.get_comment(namespace, comment_id)
    }

    fn delete_comment(&self, namespace: Namespace, comment_id: Uuid) -> StoreResult<bool> {
        self.inner.delete_comment(namespace, comment_id)
    }

    fn list_comments(&self, namespace: Namespace) -> StoreResult<Vec<CommentRecord>> {
        self.inner.list_comments(namespace)
    }

    fn insert_share(&self, share: &ShareRecord) -> StoreResult<()> {
        self.inner.insert_share(share)
    }

    fn delete_share(&self, namespace: Namespace, share_id: Uuid) -> StoreResult<bool> {
        self.inner.delete_share(namespace, share_id)
    }

    fn count_rows(&self, namespace: Namespace, interaction: Interaction) -> StoreResult<u64> {
        self.inner.count_rows(namespace, interaction)
    }

    fn increment_count(&self, namespace: Namespace, counter: Counter) -> StoreResult<u64> {
        self.counter_fault()?;
        self.inner.increment_count(namespace, counter)
    }

    fn decrement_count(&self, namespace: Namespace, counter: Counter) -> StoreResult<u64> {
        self.counter_fault()?;
        self.inner.decrement_count(namespace, counter)
    }

    fn set_count(&self, namespace: Namespace, counter: Counter, value: u64) -> StoreResult<()> {
        self.inner.set_count(namespace, counter, value)
    }

    fn find_repost(
        &self,
        kind: BaseKind,
        user_id: Uuid,
        content_id: Uuid,
    ) -> StoreResult<Option<Repost>> {
        self.inner.find_repost(kind, user_id, content_id)
    }

    fn get_repost(&self, kind: BaseKind, repost_id: Uuid) -> StoreResult<Option<Repost>> {
        self.inner.get_repost(kind, repost_id)
    }

    fn insert_repost(&self, repost: &Repost) -> StoreResult<()> {
        if self.lose_insert_race.load(Ordering::SeqCst) {
            self.inner.insert_repost(repost)?;
            self.inner.increment_count(repost.original(), Counter::Reposts)?;
            return Err(StoreError::Conflict("reposts(user, content)".into()));
        }
        self.inner.insert_repost(repost)
    }

    fn delete_repost(&self, kind: BaseKind, repost_id: Uuid) -> StoreResult<bool> {
        self.inner.delete_repost(kind, repost_id)
    }

    fn list_reposts(&self, kind: BaseKind, limit: u32) -> StoreResult<Vec<Repost>> {
        self.inner.list_reposts(kind, limit)
    }

    fn reposted_ids(
        &self,
        kind: BaseKind,
        user_id: Uuid,
        content_ids: &[Uuid],
    ) -> StoreResult<HashSet<Uuid>> {
        self.inner.reposted_ids(kind, user_id, content_ids)
    }

    fn count_reposts(&self, kind: BaseKind, content_id: Uuid) -> StoreResult<u64> {
        self.inner.count_reposts(kind, content_id)
    }
}

struct Fixture {
    db: Arc<Database>,
    store: Arc<FaultyStore>,
    engagement: Engagement,
}

fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_secs(5))
}

fn fixture_with_timeout(request_timeout: Duration) -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(FaultyStore::new(db.clone()));
    let config = EngagementConfig {
        public_origin: "https://marquee.test/".to_string(),
        request_timeout,
        feed_source_limit: 50,
        notifier: NotifierConfig {
            base_backoff: Duration::from_millis(1),
            ..NotifierConfig::default()
        },
    };
    let engagement = Engagement::new(store.clone(), db.clone(), config);
    Fixture {
        db,
        store,
        engagement,
    }
}

fn user(db: &Database, username: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    db.upsert_profile(&Profile {
        user_id,
        username: username.to_string(),
        display_name: None,
        avatar_url: None,
    })
    .unwrap();
    user_id
}

fn publish(db: &Database, kind: BaseKind, owner_id: Uuid, counters: Counters, minute: u32) -> Uuid {
    let id = Uuid::new_v4();
    db.insert_content(&ContentItem {
        id,
        owner_id,
        status: ContentStatus::Published,
        body: ContentBody::from_fields(kind, format!("{} {}", kind, minute), "body".into()),
        counters,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
    })
    .unwrap();
    id
}

fn counters(f: &Fixture, ns: Namespace) -> Counters {
    f.db.counters(ns).unwrap().unwrap()
}

// -- Likes --

#[tokio::test]
async fn like_then_unlike_round_trips_and_notifies_once() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));
    let session = Session::user(alice);

    let liked = f.engagement.client.toggle_like(&session, scene).await.unwrap();
    assert!(liked.liked);
    assert_eq!(liked.like_count, 1);
    assert!(f.db.find_like(scene, alice).unwrap().is_some());

    let unliked = f.engagement.client.toggle_like(&session, scene).await.unwrap();
    assert!(!unliked.liked);
    assert_eq!(unliked.like_count, 0);
    assert!(f.db.find_like(scene, alice).unwrap().is_none());

    f.engagement.notifier.drain().await;
    let notifications = f.db.notifications_for(owner, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].event.kind, NotificationKind::Like);
    assert_eq!(notifications[0].event.actor_id, alice);
}

#[tokio::test]
async fn liking_own_content_sends_no_notification() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));

    f.engagement.client.toggle_like(&Session::user(owner), scene).await.unwrap();
    f.engagement.notifier.drain().await;

    assert!(f.db.notifications_for(owner, 10).unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_like_is_rejected_before_any_write() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));

    let err = f.engagement.client.toggle_like(&Session::anonymous(), scene).await.unwrap_err();
    assert!(matches!(err, EngagementError::Unauthenticated));
    assert_eq!(f.db.count_rows(scene, Interaction::Like).unwrap(), 0);
}

#[tokio::test]
async fn like_on_missing_content_is_not_found() {
    let f = fixture();
    let alice = user(&f.db, "alice");
    let ghost = Namespace::new(ContentKind::Monologue, Uuid::new_v4());

    let err = f.engagement.client.toggle_like(&Session::user(alice), ghost).await.unwrap_err();
    assert!(matches!(err, EngagementError::NotFound(_)));
}

#[tokio::test]
async fn failed_counter_update_undoes_the_like() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));

    f.store.fail_counters(true);
    let err = f.engagement.client.toggle_like(&Session::user(alice), scene).await.unwrap_err();
    assert!(matches!(err, EngagementError::Remote(StoreError::Unavailable(_))));

    assert!(f.db.find_like(scene, alice).unwrap().is_none());
    assert_eq!(counters(&f, scene).like_count, 0);
}

#[tokio::test]
async fn timed_out_counter_keeps_the_like_it_may_have_counted() {
    let f = fixture_with_timeout(Duration::from_millis(100));
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));

    f.store.slow_counters(Some(Duration::from_millis(300)));
    let err = f.engagement.client.toggle_like(&Session::user(alice), scene).await.unwrap_err();
    assert!(matches!(err, EngagementError::Timeout { op: "increment_count", .. }));

    // Let the abandoned increment commit.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(f.db.count_rows(scene, Interaction::Like).unwrap(), 1);
    assert_eq!(counters(&f, scene).like_count, 1);
}

#[tokio::test]
async fn like_that_lost_an_insert_race_reports_the_winner() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));

    f.store.lose_insert_race(true);
    let outcome = f.engagement.client.toggle_like(&Session::user(alice), scene).await.unwrap();

    assert!(outcome.liked);
    assert_eq!(outcome.like_count, 1);
    assert_eq!(f.db.count_rows(scene, Interaction::Like).unwrap(), 1);
    assert_eq!(counters(&f, scene).like_count, 1);
}

#[tokio::test]
async fn unlike_of_an_already_removed_like_reports_the_current_state() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));
    let session = Session::user(alice);

    f.engagement.client.toggle_like(&session, scene).await.unwrap();
    f.store.lose_delete_race(true);
    let outcome = f.engagement.client.toggle_like(&session, scene).await.unwrap();

    assert!(!outcome.liked);
    assert_eq!(outcome.like_count, 0);
    assert_eq!(f.db.count_rows(scene, Interaction::Like).unwrap(), 0);
}

#[tokio::test]
async fn failed_counter_update_restores_the_unliked_row() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let scene = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));
    let session = Session::user(alice);

    f.engagement.client.toggle_like(&session, scene).await.unwrap();
    f.store.fail_counters(true);
    let err = f.engagement.client.toggle_like(&session, scene).await.unwrap_err();
    assert!(matches!(err, EngagementError::Remote(StoreError::Unavailable(_))));

    assert!(f.db.find_like(scene, alice).unwrap().is_some());
    assert_eq!(counters(&f, scene).like_count, 1);
}

#[tokio::test]
async fn likes_on_a_repost_stay_in_its_own_namespace() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let frame_id = publish(&f.db, BaseKind::Frame, owner, Counters::default(), 0);

    let repost = f
        .engagement
        .reposts
        .create_repost(&Session::user(bob), BaseKind::Frame, frame_id)
        .await
        .unwrap()
        .repost;
    let repost_ns = repost.namespace();
    assert_eq!(repost_ns.kind, ContentKind::FrameRepost);

    let liked = f.engagement.client.toggle_like(&Session::user(owner), repost_ns).await.unwrap();
    assert_eq!(liked.like_count, 1);
    assert_eq!(counters(&f, Namespace::new(ContentKind::Frame, frame_id)).like_count, 0);
}

// -- Comments, shares, views --

#[tokio::test]
async fn only_the_author_can_delete_a_comment() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let bob = user(&f.db, "bob");
    let ns = Namespace::new(ContentKind::Character, publish(&f.db, BaseKind::Character, owner, Counters::default(), 0));

    let added = f
        .engagement
        .client
        .add_comment(&Session::user(alice), ns, "  what a twist  ")
        .await
        .unwrap();
    assert_eq!(added.comment.text, "what a twist");
    assert_eq!(added.comment_count, 1);

    let err = f
        .engagement
        .client
        .delete_comment(&Session::user(bob), ns, added.comment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Forbidden(_)));
    assert_eq!(counters(&f, ns).comment_count, 1);

    let remaining = f
        .engagement
        .client
        .delete_comment(&Session::user(alice), ns, added.comment.id)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(f.engagement.client.list_comments(ns).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_counter_update_restores_the_deleted_comment() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let ns = Namespace::new(ContentKind::Monologue, publish(&f.db, BaseKind::Monologue, owner, Counters::default(), 0));
    let session = Session::user(alice);

    let added = f.engagement.client.add_comment(&session, ns, "bravo").await.unwrap();
    f.store.fail_counters(true);
    let err = f
        .engagement
        .client
        .delete_comment(&session, ns, added.comment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Remote(_)));

    let comments = f.db.list_comments(ns).unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, added.comment.id);
    assert_eq!(counters(&f, ns).comment_count, 1);
}

#[tokio::test]
async fn comments_list_oldest_first() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let ns = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));
    let session = Session::user(owner);

    for text in ["first", "second", "third"] {
        f.engagement.client.add_comment(&session, ns, text).await.unwrap();
    }

    let texts: Vec<String> = f
        .engagement
        .client
        .list_comments(ns)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.text)
        .collect();
    assert_eq!(texts, ["first", "second", "third"]);
}

#[tokio::test]
async fn share_counts_every_event_and_builds_the_url() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let id = publish(&f.db, BaseKind::Monologue, owner, Counters::default(), 0);
    let ns = Namespace::new(ContentKind::Monologue, id);

    f.engagement.client.record_share(&Session::user(alice), ns).await.unwrap();
    let second = f.engagement.client.record_share(&Session::user(alice), ns).await.unwrap();

    assert_eq!(second.share_count, 2);
    assert_eq!(second.url, format!("https://marquee.test/monologue/{}", id));
}

#[tokio::test]
async fn views_only_apply_to_original_content() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let id = publish(&f.db, BaseKind::Frame, owner, Counters::default(), 0);

    let views = f
        .engagement
        .client
        .record_view(Namespace::new(ContentKind::Frame, id))
        .await
        .unwrap();
    assert_eq!(views, 1);

    let err = f
        .engagement
        .client
        .record_view(Namespace::new(ContentKind::FrameRepost, Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Invalid(_)));
}

// -- Reposts --

#[tokio::test]
async fn repost_is_idempotent_and_undo_restores_the_count() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let frame_id = publish(
        &f.db,
        BaseKind::Frame,
        owner,
        Counters {
            repost_count: 2,
            ..Counters::default()
        },
        0,
    );
    let frame = Namespace::new(ContentKind::Frame, frame_id);
    let session = Session::user(bob);

    let first = f
        .engagement
        .reposts
        .create_repost(&session, BaseKind::Frame, frame_id)
        .await
        .unwrap();
    assert!(!first.already_reposted);
    assert_eq!(first.repost_count, 3);

    let second = f
        .engagement
        .reposts
        .create_repost(&session, BaseKind::Frame, frame_id)
        .await
        .unwrap();
    assert!(second.already_reposted);
    assert_eq!(second.repost.id, first.repost.id);
    assert_eq!(counters(&f, frame).repost_count, 3);
    assert_eq!(f.db.count_reposts(BaseKind::Frame, frame_id).unwrap(), 1);

    let after = f
        .engagement
        .reposts
        .delete_repost(&session, BaseKind::Frame, first.repost.id)
        .await
        .unwrap();
    assert_eq!(after, 2);
    assert!(f.db.get_repost(BaseKind::Frame, first.repost.id).unwrap().is_none());
}

#[tokio::test]
async fn repost_delete_never_drops_the_count_below_zero() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let scene_id = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0);

    let repost = Repost {
        id: Uuid::new_v4(),
        base: BaseKind::Scene,
        user_id: bob,
        content_id: scene_id,
        counters: Counters::default(),
        created_at: Utc::now(),
    };
    f.db.insert_repost(&repost).unwrap();

    let count = f
        .engagement
        .reposts
        .delete_repost(&Session::user(bob), BaseKind::Scene, repost.id)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn only_the_reposter_can_undo() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let scene_id = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0);

    let outcome = f
        .engagement
        .reposts
        .create_repost(&Session::user(bob), BaseKind::Scene, scene_id)
        .await
        .unwrap();

    let err = f
        .engagement
        .reposts
        .delete_repost(&Session::user(owner), BaseKind::Scene, outcome.repost.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Forbidden(_)));
    assert_eq!(counters(&f, Namespace::new(ContentKind::Scene, scene_id)).repost_count, 1);
}

#[tokio::test]
async fn deleting_a_repost_removes_its_own_engagement() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let scene_id = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0);

    let repost = f
        .engagement
        .reposts
        .create_repost(&Session::user(bob), BaseKind::Scene, scene_id)
        .await
        .unwrap()
        .repost;
    let ns = repost.namespace();
    f.engagement.client.toggle_like(&Session::user(owner), ns).await.unwrap();
    f.engagement.client.add_comment(&Session::user(owner), ns, "nice pick").await.unwrap();

    f.engagement
        .reposts
        .delete_repost(&Session::user(bob), BaseKind::Scene, repost.id)
        .await
        .unwrap();

    assert_eq!(f.db.count_rows(ns, Interaction::Like).unwrap(), 0);
    assert_eq!(f.db.count_rows(ns, Interaction::Comment).unwrap(), 0);
}

#[tokio::test]
async fn failed_repost_counter_undoes_the_repost() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let scene_id = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0);

    f.store.fail_counters(true);
    let err = f
        .engagement
        .reposts
        .create_repost(&Session::user(bob), BaseKind::Scene, scene_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngagementError::Remote(_)));
    assert!(f.db.find_repost(BaseKind::Scene, bob, scene_id).unwrap().is_none());
}

#[tokio::test]
async fn repost_that_lost_an_insert_race_returns_the_winner() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let scene_id = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0);
    let scene = Namespace::new(ContentKind::Scene, scene_id);

    f.store.lose_insert_race(true);
    let outcome = f
        .engagement
        .reposts
        .create_repost(&Session::user(bob), BaseKind::Scene, scene_id)
        .await
        .unwrap();

    assert!(outcome.already_reposted);
    assert_eq!(outcome.repost_count, 1);
    assert_eq!(f.db.count_reposts(BaseKind::Scene, scene_id).unwrap(), 1);
    assert_eq!(counters(&f, scene).repost_count, 1);
}

// -- Content --

#[tokio::test]
async fn loaders_attach_viewer_flags() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let liked = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 1);
    let reposted = publish(&f.db, BaseKind::Scene, owner, Counters::default(), 2);
    let session = Session::user(alice);

    f.engagement
        .client
        .toggle_like(&session, Namespace::new(ContentKind::Scene, liked))
        .await
        .unwrap();
    f.engagement
        .reposts
        .create_repost(&session, BaseKind::Scene, reposted)
        .await
        .unwrap();

    let cards = f.engagement.loaders.get(BaseKind::Scene).load(Some(alice)).await.unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].item.id, reposted);
    assert!(cards[0].is_reposted && !cards[0].is_liked);
    assert!(cards[1].is_liked && !cards[1].is_reposted);
    assert_eq!(cards[1].author.username, "owner");

    let anonymous = f.engagement.loaders.get(BaseKind::Scene).load(None).await.unwrap();
    assert!(anonymous.iter().all(|c| !c.is_liked && !c.is_reposted));
}

#[tokio::test]
async fn content_delete_is_owner_only() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let id = publish(&f.db, BaseKind::Character, owner, Counters::default(), 0);
    let loader = f.engagement.loaders.get(BaseKind::Character);

    let err = loader.delete(&Session::user(alice), id).await.unwrap_err();
    assert!(matches!(err, EngagementError::Forbidden(_)));

    loader.delete(&Session::user(owner), id).await.unwrap();
    assert!(f.db.owner_of(Namespace::new(ContentKind::Character, id)).unwrap().is_none());
}

// -- Feed --

#[tokio::test]
async fn feed_merges_content_and_reposts_newest_first() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    publish(&f.db, BaseKind::Scene, owner, Counters::default(), 1);
    let frame = publish(&f.db, BaseKind::Frame, owner, Counters::default(), 2);
    publish(&f.db, BaseKind::Monologue, owner, Counters::default(), 3);

    f.engagement
        .reposts
        .create_repost(&Session::user(bob), BaseKind::Frame, frame)
        .await
        .unwrap();

    let entries = f.engagement.feed.load(Some(bob)).await.unwrap();
    let kinds: Vec<ContentKind> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        [ContentKind::FrameRepost, ContentKind::Monologue, ContentKind::Frame, ContentKind::Scene]
    );
}

#[tokio::test]
async fn failed_source_fails_the_feed_until_retry() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    for (i, kind) in BaseKind::ALL.into_iter().enumerate() {
        publish(&f.db, kind, owner, Counters::default(), i as u32);
    }

    f.store.fail_listing(Some(BaseKind::Frame));
    let mut feed = Feed::new();
    let err = f.engagement.feed.refresh(&mut feed, None).await.unwrap_err();
    match err {
        EngagementError::PartialFeed { stream, .. } => assert_eq!(stream, FeedStream::Content(BaseKind::Frame).name()),
        other => panic!("expected partial feed, got {:?}", other),
    }
    assert!(feed.display().is_empty());
    assert_eq!(f.store.list_calls.load(Ordering::SeqCst), 4);

    f.store.fail_listing(None);
    f.engagement.feed.refresh(&mut feed, None).await.unwrap();
    assert_eq!(f.store.list_calls.load(Ordering::SeqCst), 8);
    assert_eq!(feed.display().len(), 4);
}

// -- Optimistic layer --

#[tokio::test]
async fn optimistic_like_rolls_back_on_remote_failure() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let ns = Namespace::new(
        ContentKind::Scene,
        publish(
            &f.db,
            BaseKind::Scene,
            owner,
            Counters {
                like_count: 4,
                ..Counters::default()
            },
            0,
        ),
    );
    let controls = f.engagement.optimistic(Session::user(alice));
    controls.track(ns).await.unwrap();

    f.store.fail_counters(true);
    assert!(controls.toggle_like(ns).await.is_err());
    let state = controls.state(ns);
    assert!(!state.liked);
    assert_eq!(state.like_count, 4);

    f.store.fail_counters(false);
    let outcome = controls.toggle_like(ns).await.unwrap();
    assert_eq!(outcome.like_count, 5);
    assert_eq!(controls.state(ns).like_count, 5);
}

#[tokio::test]
async fn optimistic_repost_toggles_back_and_forth() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let bob = user(&f.db, "bob");
    let id = publish(&f.db, BaseKind::Monologue, owner, Counters::default(), 0);
    let controls = f.engagement.optimistic(Session::user(bob));
    controls.track(Namespace::new(ContentKind::Monologue, id)).await.unwrap();

    let reposted = controls.toggle_repost(BaseKind::Monologue, id).await.unwrap();
    assert!(reposted.reposted);
    assert!(reposted.repost_id.is_some());
    assert_eq!(reposted.repost_count, 1);

    let undone = controls.toggle_repost(BaseKind::Monologue, id).await.unwrap();
    assert!(!undone.reposted);
    assert_eq!(undone.repost_count, 0);
    assert!(f.db.find_repost(BaseKind::Monologue, bob, id).unwrap().is_none());
}

#[tokio::test]
async fn anonymous_optimistic_mutation_changes_nothing() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let ns = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));
    let controls = f.engagement.optimistic(Session::anonymous());
    controls.track(ns).await.unwrap();

    let err = controls.share(ns).await.unwrap_err();
    assert!(matches!(err, EngagementError::Unauthenticated));
    assert_eq!(controls.state(ns).share_count, 0);
}

// -- Reconciliation and live updates --

#[tokio::test]
async fn reconciler_repairs_drifted_counters() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let alice = user(&f.db, "alice");
    let id = publish(
        &f.db,
        BaseKind::Frame,
        owner,
        Counters {
            like_count: 7,
            repost_count: 3,
            ..Counters::default()
        },
        0,
    );
    let ns = Namespace::new(ContentKind::Frame, id);
    f.db.insert_like(&LikeRecord {
        id: Uuid::new_v4(),
        user_id: alice,
        namespace: ns,
        created_at: Utc::now(),
    })
    .unwrap();

    let drifts = f.engagement.reconciler.reconcile(ns).await.unwrap();
    let repaired: HashMap<Counter, (u64, u64)> =
        drifts.iter().map(|d| (d.counter, (d.stored, d.actual))).collect();
    assert_eq!(repaired.get(&Counter::Likes), Some(&(7, 1)));
    assert_eq!(repaired.get(&Counter::Reposts), Some(&(3, 0)));

    let fixed = counters(&f, ns);
    assert_eq!((fixed.like_count, fixed.repost_count), (1, 0));
    assert!(f.engagement.reconciler.reconcile(ns).await.unwrap().is_empty());
}

#[tokio::test]
async fn counter_changes_reach_live_subscribers() {
    let f = fixture();
    let owner = user(&f.db, "owner");
    let ns = Namespace::new(ContentKind::Scene, publish(&f.db, BaseKind::Scene, owner, Counters::default(), 0));

    let mut sub = f.engagement.live.subscribe();
    f.engagement.client.record_view(ns).await.unwrap();

    assert_eq!(
        sub.recv().await,
        Some(LiveEvent::CounterChanged {
            namespace: ns,
            counter: Counter::Views,
            value: 1,
        })
    );
}

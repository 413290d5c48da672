use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::namespace::{ContentKind, Counter, Namespace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
        }
    }
}

/// Addressed to the owner of the content an actor engaged with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub owner_id: Uuid,
    pub content_id: Uuid,
    pub content_kind: ContentKind,
}

impl NotificationEvent {
    /// Returns `None` when the actor owns the content: nobody is notified
    /// about their own activity.
    pub fn addressed(
        kind: NotificationKind,
        actor_id: Uuid,
        owner_id: Uuid,
        namespace: Namespace,
    ) -> Option<Self> {
        (actor_id != owner_id).then_some(Self {
            kind,
            actor_id,
            owner_id,
            content_id: namespace.id,
            content_kind: namespace.kind,
        })
    }
}

/// Events fanned out to in-process live subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LiveEvent {
    /// A denormalized counter on a parent row changed
    CounterChanged {
        namespace: Namespace,
        counter: Counter,
        value: u64,
    },

    /// A repost wrapper was created
    RepostCreated {
        namespace: Namespace,
        original: Namespace,
        user_id: Uuid,
    },

    /// A repost wrapper was removed
    RepostDeleted {
        namespace: Namespace,
        original: Namespace,
    },

    /// A notification reached its sink
    Notification(NotificationEvent),
}

impl LiveEvent {
    /// The namespace this event is scoped to, if any. Notifications are
    /// addressed to a user rather than a namespace.
    pub fn namespace(&self) -> Option<Namespace> {
        match self {
            Self::CounterChanged { namespace, .. } => Some(*namespace),
            Self::RepostCreated { original, .. } => Some(*original),
            Self::RepostDeleted { original, .. } => Some(*original),
            Self::Notification(_) => None,
        }
    }
}

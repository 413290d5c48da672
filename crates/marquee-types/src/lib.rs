//! Shared vocabulary of the marquee engagement platform: content kinds and
//! their storage routes, row models, events and the persistence contract.

pub mod api;
pub mod events;
pub mod models;
pub mod namespace;
pub mod store;

pub use namespace::{BaseKind, ContentKind, Counter, Interaction, Namespace, Route};
pub use store::{NotificationSink, Store, StoreError, StoreResult};

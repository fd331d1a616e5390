//! Domain events and a synchronous, priority-ordered event bus.
//!
//! Handlers are registered explicitly at process start. Dispatch is
//! fire-and-forget: every subscribed handler runs inline, lower priority
//! values first, registration order breaking ties.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entities::PostId;
use crate::domain::types::PostStatus;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::events";
const METRIC_EVENT_DISPATCHED_TOTAL: &str = "tinycache_event_dispatched_total";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Priority of a subscription; lower runs earlier.
pub type Priority = i32;

/// Domain mutations that may invalidate cached renderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PostSaved { post_id: PostId },
    PostEdited { post_id: PostId },
    PostDeleted { post_id: PostId },
    PostTrashed { post_id: PostId },
    PostCacheCleaned { post_id: PostId },
    PostStatusChanged {
        post_id: PostId,
        old: PostStatus,
        new: PostStatus,
    },
    NavMenuCreated { menu_id: u64 },
    NavMenuUpdated { menu_id: u64 },
    NavMenuDeleted { menu_id: u64 },
    SharedTermSplit { term_id: u64 },
}

/// Subscription name of an [`EventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventName {
    PostSaved,
    PostEdited,
    PostDeleted,
    PostTrashed,
    PostCacheCleaned,
    PostStatusChanged,
    NavMenuCreated,
    NavMenuUpdated,
    NavMenuDeleted,
    SharedTermSplit,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::PostSaved => "post_saved",
            EventName::PostEdited => "post_edited",
            EventName::PostDeleted => "post_deleted",
            EventName::PostTrashed => "post_trashed",
            EventName::PostCacheCleaned => "post_cache_cleaned",
            EventName::PostStatusChanged => "post_status_changed",
            EventName::NavMenuCreated => "nav_menu_created",
            EventName::NavMenuUpdated => "nav_menu_updated",
            EventName::NavMenuDeleted => "nav_menu_deleted",
            EventName::SharedTermSplit => "shared_term_split",
        }
    }
}

impl EventKind {
    pub fn name(&self) -> EventName {
        match self {
            EventKind::PostSaved { .. } => EventName::PostSaved,
            EventKind::PostEdited { .. } => EventName::PostEdited,
            EventKind::PostDeleted { .. } => EventName::PostDeleted,
            EventKind::PostTrashed { .. } => EventName::PostTrashed,
            EventKind::PostCacheCleaned { .. } => EventName::PostCacheCleaned,
            EventKind::PostStatusChanged { .. } => EventName::PostStatusChanged,
            EventKind::NavMenuCreated { .. } => EventName::NavMenuCreated,
            EventKind::NavMenuUpdated { .. } => EventName::NavMenuUpdated,
            EventKind::NavMenuDeleted { .. } => EventName::NavMenuDeleted,
            EventKind::SharedTermSplit { .. } => EventName::SharedTermSplit,
        }
    }

    /// The post the event is about, if any.
    pub fn post_id(&self) -> Option<PostId> {
        match self {
            EventKind::PostSaved { post_id }
            | EventKind::PostEdited { post_id }
            | EventKind::PostDeleted { post_id }
            | EventKind::PostTrashed { post_id }
            | EventKind::PostCacheCleaned { post_id }
            | EventKind::PostStatusChanged { post_id, .. } => Some(*post_id),
            _ => None,
        }
    }

    /// Status transitions only matter when they cross the published boundary.
    ///
    /// Every other event kind always passes.
    pub fn crosses_publish_boundary(&self) -> bool {
        match self {
            EventKind::PostStatusChanged { old, new, .. } => {
                old != new && (old.is_published() || new.is_published())
            }
            _ => true,
        }
    }
}

/// An event as delivered to handlers.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for log correlation (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

pub type Handler = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct Subscription {
    priority: Priority,
    seq: u64,
    handler: Handler,
}

/// Synchronous event bus.
pub struct EventBus {
    subscriptions: RwLock<BTreeMap<EventName, Vec<Subscription>>>,
    seq_counter: AtomicU64,
    epoch_counter: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            seq_counter: AtomicU64::new(0),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn subscribe<F>(&self, name: EventName, priority: Priority, handler: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let mut subscriptions = rw_write(&self.subscriptions, SOURCE, "subscribe");
        let handlers = subscriptions.entry(name).or_default();
        handlers.push(Subscription {
            priority,
            seq,
            handler: Arc::new(handler),
        });
        handlers.sort_by_key(|subscription| (subscription.priority, subscription.seq));
        debug!(event = name.as_str(), priority, "handler subscribed");
    }

    /// Number of handlers subscribed to `name`.
    pub fn subscriber_count(&self, name: EventName) -> usize {
        rw_read(&self.subscriptions, SOURCE, "subscriber_count")
            .get(&name)
            .map_or(0, Vec::len)
    }

    /// Deliver `kind` to its handlers in priority order. Returns how many ran.
    pub fn dispatch(&self, kind: EventKind) -> usize {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::SeqCst);
        let event = CacheEvent::new(kind, epoch);
        let name = event.kind.name();

        // Snapshot handlers so they may subscribe or dispatch without deadlocking.
        let handlers: Vec<Handler> = rw_read(&self.subscriptions, SOURCE, "dispatch")
            .get(&name)
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .map(|subscription| subscription.handler.clone())
                    .collect()
            })
            .unwrap_or_default();

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            handlers = handlers.len(),
            "Cache event dispatched"
        );
        counter!(METRIC_EVENT_DISPATCHED_TOTAL, "event" => name.as_str()).increment(1);

        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn event_creation() {
        let event = CacheEvent::new(EventKind::NavMenuUpdated { menu_id: 3 }, 42);

        assert_eq!(event.epoch, 42);
        assert_eq!(event.kind.name(), EventName::NavMenuUpdated);
        assert!(!event.id.is_nil());
    }

    #[test]
    fn handlers_run_in_priority_then_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (label, priority) in [("late", 10), ("first", 0), ("second", 0)] {
            let seen = seen.clone();
            bus.subscribe(EventName::PostSaved, priority, move |_| {
                seen.lock().expect("lock").push(label);
            });
        }

        let ran = bus.dispatch(EventKind::PostSaved { post_id: 1 });

        assert_eq!(ran, 3);
        assert_eq!(*seen.lock().expect("lock"), vec!["first", "second", "late"]);
    }

    #[test]
    fn dispatch_only_reaches_matching_subscribers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));

        let counter = hits.clone();
        bus.subscribe(EventName::NavMenuDeleted, 0, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.dispatch(EventKind::PostSaved { post_id: 1 }), 0);
        assert_eq!(bus.dispatch(EventKind::NavMenuDeleted { menu_id: 1 }), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventName::NavMenuDeleted), 1);
    }

    #[test]
    fn epochs_are_monotonic() {
        let bus = EventBus::new();
        let epochs = Arc::new(Mutex::new(Vec::new()));

        let sink = epochs.clone();
        bus.subscribe(EventName::SharedTermSplit, 0, move |event| {
            sink.lock().expect("lock").push(event.epoch);
        });
        bus.dispatch(EventKind::SharedTermSplit { term_id: 1 });
        bus.dispatch(EventKind::SharedTermSplit { term_id: 2 });

        let epochs = epochs.lock().expect("lock");
        assert!(epochs[0] < epochs[1]);
    }

    #[test]
    fn publish_boundary_detection() {
        let transition = |old, new| EventKind::PostStatusChanged {
            post_id: 1,
            old,
            new,
        };

        assert!(transition(PostStatus::Draft, PostStatus::Published).crosses_publish_boundary());
        assert!(transition(PostStatus::Published, PostStatus::Trash).crosses_publish_boundary());
        assert!(!transition(PostStatus::Published, PostStatus::Published).crosses_publish_boundary());
        assert!(!transition(PostStatus::Draft, PostStatus::Pending).crosses_publish_boundary());
        assert!(EventKind::PostSaved { post_id: 1 }.crosses_publish_boundary());
    }

    #[test]
    fn post_id_is_extracted_from_post_events() {
        assert_eq!(EventKind::PostTrashed { post_id: 9 }.post_id(), Some(9));
        assert_eq!(EventKind::NavMenuCreated { menu_id: 9 }.post_id(), None);
    }
}

//! Invalidation trigger.
//!
//! Maps domain events to invalidation actions through a static rule table.
//! Entity-scoped entries are deleted directly by the key derived from the
//! entity id; groups whose keys cannot be derived from the mutated entity are
//! flushed wholesale through the [`KeyRegistry`]. Deletions are synchronous and
//! best-effort: failures are logged, never retried.

use std::sync::Arc;

use tracing::{debug, warn};

use super::events::{CacheEvent, EventBus, EventName, Priority};
use super::keys::CacheKey;
use super::registry::KeyRegistry;
use super::store::ObjectStore;

/// What to do when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationAction {
    /// Delete the entry keyed by the event's entity id in `group`.
    DeleteEntity { group: &'static str },
    /// Flush every registered key of `group`.
    FlushGroup { group: &'static str },
}

/// One row of the event → action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationRule {
    pub event: EventName,
    pub priority: Priority,
    pub action: InvalidationAction,
}

impl InvalidationRule {
    pub const fn delete_entity(event: EventName, priority: Priority, group: &'static str) -> Self {
        Self {
            event,
            priority,
            action: InvalidationAction::DeleteEntity { group },
        }
    }

    pub const fn flush_group(event: EventName, priority: Priority, group: &'static str) -> Self {
        Self {
            event,
            priority,
            action: InvalidationAction::FlushGroup { group },
        }
    }
}

pub struct InvalidationTrigger {
    store: Arc<dyn ObjectStore>,
    registry: KeyRegistry,
    rules: Vec<InvalidationRule>,
}

impl InvalidationTrigger {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: KeyRegistry,
        rules: impl IntoIterator<Item = InvalidationRule>,
    ) -> Self {
        Self {
            store,
            registry,
            rules: rules.into_iter().collect(),
        }
    }

    pub fn rules(&self) -> &[InvalidationRule] {
        &self.rules
    }

    /// Subscribe one handler per rule on `bus`, at the rule's priority.
    pub fn register(self: &Arc<Self>, bus: &EventBus) {
        for rule in &self.rules {
            let trigger = Arc::clone(self);
            let rule = *rule;
            bus.subscribe(rule.event, rule.priority, move |event| {
                trigger.apply(&rule, event);
            });
        }
    }

    /// Apply every rule matching `event`. Returns how many actions ran.
    ///
    /// Usable without an event bus.
    pub fn handle(&self, event: &CacheEvent) -> usize {
        let name = event.kind.name();
        self.rules
            .iter()
            .filter(|rule| rule.event == name)
            .filter(|rule| self.apply(rule, event))
            .count()
    }

    fn apply(&self, rule: &InvalidationRule, event: &CacheEvent) -> bool {
        if rule.event != event.kind.name() {
            return false;
        }
        if !event.kind.crosses_publish_boundary() {
            debug!(event_id = %event.id, event_kind = ?event.kind, "status change ignored");
            return false;
        }

        match rule.action {
            InvalidationAction::DeleteEntity { group } => {
                let Some(post_id) = event.kind.post_id() else {
                    warn!(event_kind = ?event.kind, group, "event carries no entity id");
                    return false;
                };
                let key = CacheKey::from_id(post_id);
                match self.store.delete(group, key.as_str()) {
                    Ok(removed) => {
                        debug!(event_id = %event.id, group, key = %key, removed, "cached entry invalidated");
                    }
                    Err(err) => {
                        warn!(event_id = %event.id, group, key = %key, error = %err, "cache delete failed");
                    }
                }
                true
            }
            InvalidationAction::FlushGroup { group } => {
                self.registry.flush_all(group);
                true
            }
        }
    }
}

//! Read-through rendering cache with group invalidation.
//!
//! - **Policy**: decides per request whether the cache may be used at all
//! - **Read-through**: get-or-populate with add-if-absent writes
//! - **Registry**: per-group key index so non-derivable keys can be flushed
//! - **Trigger**: maps domain events to entity deletes and group flushes
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `tinycache.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! content_ttl_seconds = 86400
//! navmenu_excludes = "footer|social"
//! # ... see config.rs for all options
//! ```

pub mod config;
pub mod context;
pub mod events;
pub mod keys;
pub(crate) mod lock;
pub mod policy;
pub mod read_through;
pub mod registry;
pub mod store;
pub mod trigger;

pub use config::CacheConfig;
pub use context::{PageKind, RequestContext};
pub use events::{CacheEvent, Epoch, EventBus, EventKind, EventName, Priority};
pub use keys::{CacheKey, KeyBuilder};
pub use policy::{Bypass, CacheabilityPolicy};
pub use read_through::{GenerationMarker, ReadThroughCache, Rendered};
pub use registry::{KeyRegistry, REGISTRY_KEY};
pub use store::{MemoryStore, ObjectStore, StoreError, UnavailableStore};
pub use trigger::{InvalidationAction, InvalidationRule, InvalidationTrigger};

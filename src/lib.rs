//! Read-through rendering cache with group-based invalidation.
//!
//! The [`cache`] module holds the reusable machinery: key derivation, the
//! object store seam, the cacheability policy, the read-through protocol,
//! per-group key registries and the event-driven invalidation trigger.
//! [`application`] wires three cache instances (post content, navigation
//! menus and translation catalogs) into a small demo site served by
//! [`infra::http`].

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

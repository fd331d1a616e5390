//! Application services: the cache instances and the demo host built on them.

pub mod content;
pub mod error;
pub mod navigation;
pub mod site;
pub mod translation;

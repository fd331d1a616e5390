#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tinycache::cache::{MemoryStore, ObjectStore, StoreError};

/// One call observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Get { group: String, key: String },
    Set { group: String, key: String },
    Add { group: String, key: String, written: bool },
    Delete { group: String, key: String },
}

impl StoreCall {
    pub fn group(&self) -> &str {
        match self {
            StoreCall::Get { group, .. }
            | StoreCall::Set { group, .. }
            | StoreCall::Add { group, .. }
            | StoreCall::Delete { group, .. } => group,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, StoreCall::Get { .. })
    }
}

/// Memory store that records every call made through it.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_write).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("calls lock").clear();
    }

    /// Read straight from the backing store without recording.
    pub fn peek(&self, group: &str, key: &str) -> Option<String> {
        self.inner.get(group, key).expect("memory store get")
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

impl ObjectStore for RecordingStore {
    fn get(&self, group: &str, key: &str) -> Result<Option<String>, StoreError> {
        self.record(StoreCall::Get {
            group: group.to_string(),
            key: key.to_string(),
        });
        self.inner.get(group, key)
    }

    fn set(&self, group: &str, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.record(StoreCall::Set {
            group: group.to_string(),
            key: key.to_string(),
        });
        self.inner.set(group, key, value, ttl)
    }

    fn add(
        &self,
        group: &str,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let written = self.inner.add(group, key, value, ttl)?;
        self.record(StoreCall::Add {
            group: group.to_string(),
            key: key.to_string(),
            written,
        });
        Ok(written)
    }

    fn delete(&self, group: &str, key: &str) -> Result<bool, StoreError> {
        self.record(StoreCall::Delete {
            group: group.to_string(),
            key: key.to_string(),
        });
        self.inner.delete(group, key)
    }
}

/// Marker timestamp used by tests that pin the clock.
pub fn fixed_clock() -> time::OffsetDateTime {
    time::macros::datetime!(2024-05-01 12:00:00 UTC)
}

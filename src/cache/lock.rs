//! Poison-tolerant access to in-process locks.
//!
//! Everything guarded this way (subscriber lists, the demo site's records) stays
//! usable after a panicking writer, so the guard is recovered and the event logged.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, owner, op, "read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, owner, op, "write"))
}

fn recover<G>(poisoned: PoisonError<G>, owner: &'static str, op: &'static str, mode: &'static str) -> G {
    warn!(owner, op, mode, "lock poisoned by a panicking holder; continuing with current state");
    poisoned.into_inner()
}

//! Stores behind the core: artifact registry, change log, trace graph and
//! the optional durable change journal.
//!
//! # Responsibility
//! - Own in-memory model state and enforce write-time invariants.
//! - Hand out owned snapshots so callers never alias internal state.
//!
//! # Invariants
//! - Every write validates before mutating; failed writes leave no trace.
//! - Readers never observe a half-applied mutation.

pub mod artifact_registry;
pub mod change_journal;
pub mod change_log;
pub mod trace_graph;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A panicking writer never leaves partial state behind (mutations are
// validated first and applied last), so poisoned guards are still usable.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

// A poisoned store lock means a panic elsewhere; the maps only ever grow, so
// the recovered state is safe to keep serving.

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    module: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            module,
            op,
            mode = "read",
            "cache lock poisoned; continuing with recovered state"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    module: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            module,
            op,
            mode = "write",
            "cache lock poisoned; continuing with recovered state"
        );
        poisoned.into_inner()
    })
}

/*!
 * Reentrancy Detection
 *
 * Closures passed to `compute` and `compute_if_absent` run while a stripe
 * lock is held. A mutating call back into the same map from inside such a
 * closure would block on a stripe this thread already owns (its own, or one
 * needed to help a resize). Each thread tracks the maps it is currently
 * mutating, and nested entry into the same map panics instead of hanging.
 * Lock-free reads never enter a scope and are always allowed.
 */

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Allocate a process-unique map identity
pub(crate) fn next_map_id() -> u64 {
    NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)
}

/// RAII marker for an in-progress mutation on one map
pub(crate) struct MutationScope {
    map_id: u64,
}

impl MutationScope {
    /// Enter a mutation on `map_id`; panics if this thread is already inside one
    pub(crate) fn enter(map_id: u64) -> Self {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&map_id) {
                drop(active);
                panic!("reentrant mutation of StripedMap from inside a compute closure");
            }
            active.push(map_id);
        });
        Self { map_id }
    }

    /// Whether this thread is currently mutating `map_id`
    #[cfg(test)]
    pub(crate) fn is_active(map_id: u64) -> bool {
        ACTIVE.with(|active| active.borrow().contains(&map_id))
    }
}

impl Drop for MutationScope {
    fn drop(&mut self) {
        let map_id = self.map_id;
        // try_with: thread-local may already be torn down during thread exit
        let _ = ACTIVE.try_with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|id| *id == map_id) {
                active.remove(pos);
            }
        });
    }
}

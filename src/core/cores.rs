//! Logical core introspection, generalized from `core::cpu_cores::Cores`
//! in the teacher: counting, enumerating and identifying "the current
//! core" without DPDK's EAL underneath it. Enumeration and affinity
//! themselves are delegated to a [`CoreHal`](crate::hal::CoreHal); this
//! module only adds the notion of "which lcore is the reactor running
//! this OS thread responsible for", tracked in thread-local storage and
//! set exactly once, when a reactor's OS thread starts its loop.

use crate::hal::CoreHal;
use std::cell::Cell;

thread_local! {
    static CURRENT_LCORE: Cell<Option<u32>> = Cell::new(None);
}

/// Bind the calling OS thread to `lcore` for the lifetime of the thread.
/// Called exactly once, by the reactor loop entry point, before any
/// event or poller callback runs on this thread.
pub(crate) fn bind_current_thread(lcore: u32) {
    CURRENT_LCORE.with(|c| c.set(Some(lcore)));
}

/// Introspection surface exposed to callers (`core_count`, `current_core`,
/// `core_mask` in §6).
pub struct Cores;

impl Cores {
    /// Total number of logical cores known to the host HAL, enabled or not.
    pub fn count(hal: &dyn CoreHal) -> u32 {
        hal.max_cores()
    }

    /// The lcore the calling OS thread is bound to. Panics outside of a
    /// reactor thread: there is no meaningful "current core" for e.g. a
    /// bare test-harness thread that never entered a reactor loop.
    pub fn current() -> u32 {
        Self::try_current().expect(
            "Cores::current() called from a thread that is not a reactor",
        )
    }

    /// Non-panicking variant of [`Cores::current`].
    pub fn try_current() -> Option<u32> {
        CURRENT_LCORE.with(|c| c.get())
    }

    /// The lowest enabled lcore reported by the HAL; by convention the
    /// master core unless overridden by the mask.
    pub fn first(hal: &dyn CoreHal) -> u32 {
        (0..hal.max_cores())
            .find(|&c| hal.is_enabled(c))
            .expect("HAL reports no enabled cores")
    }

    /// Iterate the lcores selected by `mask`, ascending.
    pub fn iter_mask(mask: u64) -> impl Iterator<Item = u32> {
        (0..64).filter(move |i| mask & (1u64 << i) != 0)
    }
}

//! Registered, persistent callbacks (§3 "Poller"). Generalizes
//! `core::poller::Poller`/`Builder` from the teacher -- there a thin
//! wrapper around `spdk_poller_register`/`_unregister` -- into a pure
//! Rust handle whose schedule membership is tracked explicitly via
//! [`PollerLocation`], per the tagged-enum design note in the original
//! specification (§9).
//!
//! A `PollerHandle` is owned by its registrant for as long as they hold
//! it; the core never frees it. It is *borrowed*, for scheduling
//! purposes, by exactly one reactor between register and unregister.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Where a poller currently lives. Mutated only by the reactor that
/// owns it at the time, during event dispatch -- never concurrently
/// with a poll-loop iteration on that same reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerLocation {
    Unregistered,
    Active(u32),
    Timer(u32, u64),
}

pub(crate) struct PollerInner {
    pub(crate) period_ticks: u64,
    pub(crate) func: Mutex<Box<dyn FnMut() + Send>>,
    location: Mutex<PollerLocation>,
    /// Duplicated out of `location` as a plain atomic so
    /// `PollerHandle::lcore()` can be read from any thread without
    /// contending the callback lock held while the poller is firing.
    lcore: AtomicU64,
}

/// A registered poller. Cheap to clone (an `Arc` underneath); clones
/// refer to the same schedule membership.
#[derive(Clone)]
pub struct PollerHandle(pub(crate) Arc<PollerInner>);

impl fmt::Debug for PollerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollerHandle")
            .field("period_ticks", &self.0.period_ticks)
            .field("location", &self.location())
            .finish()
    }
}

const NO_CORE: u64 = u64::MAX;

impl PollerHandle {
    /// Build a poller that is not yet registered on any reactor.
    /// `period_ticks` is `0` for an always-run poller, or the already
    /// tick-converted period for a periodic one (§4.5 converts
    /// microseconds to ticks at registration time).
    pub fn new<F>(period_ticks: u64, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        PollerHandle(Arc::new(PollerInner {
            period_ticks,
            func: Mutex::new(Box::new(f)),
            location: Mutex::new(PollerLocation::Unregistered),
            lcore: AtomicU64::new(NO_CORE),
        }))
    }

    pub fn period_ticks(&self) -> u64 {
        self.0.period_ticks
    }

    pub fn is_periodic(&self) -> bool {
        self.0.period_ticks != 0
    }

    /// Current schedule membership.
    pub fn location(&self) -> PollerLocation {
        *self.0.location.lock()
    }

    /// The lcore this poller currently runs on, if registered.
    pub fn lcore(&self) -> Option<u32> {
        match self.0.lcore.load(Ordering::SeqCst) {
            NO_CORE => None,
            v => Some(v as u32),
        }
    }

    pub(crate) fn set_location(&self, location: PollerLocation) {
        let lcore = match location {
            PollerLocation::Unregistered => NO_CORE,
            PollerLocation::Active(c) => c as u64,
            PollerLocation::Timer(c, _) => c as u64,
        };
        self.0.lcore.store(lcore, Ordering::SeqCst);
        *self.0.location.lock() = location;
    }

    /// Invoke the poller's callback. Called only by the reactor that
    /// currently owns it, never concurrently with a register/unregister
    /// mutation of the same poller (both happen via events serialized
    /// on that reactor's single consumer).
    pub(crate) fn fire(&self) {
        (self.0.func.lock())();
    }

    pub(crate) fn next_run_tick(&self) -> u64 {
        match self.location() {
            PollerLocation::Timer(_, tick) => tick,
            _ => 0,
        }
    }
}

impl PartialEq for PollerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unregistered() {
        let p = PollerHandle::new(0, || {});
        assert_eq!(p.location(), PollerLocation::Unregistered);
        assert_eq!(p.lcore(), None);
    }

    #[test]
    fn clone_shares_state() {
        use assert_matches::assert_matches;

        let p = PollerHandle::new(10, || {});
        let q = p.clone();
        p.set_location(PollerLocation::Active(3));
        assert_eq!(q.lcore(), Some(3));
        assert_matches!(q.location(), PollerLocation::Active(3));
        assert_eq!(p, q);
    }
}

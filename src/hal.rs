//! Stand-in for the lower HAL layer the specification assumes: something
//! that already knows how many logical cores exist, which of them are
//! enabled, and which NUMA socket each belongs to, with fixed affinity.
//!
//! The reactor core never enumerates `/sys` or calls into DPDK's EAL
//! itself; it only calls through [`CoreHal`]. [`HostHal`] is the default,
//! single-socket implementation used outside of tests. Tests substitute
//! [`TestHal`] so the size of the core mask does not depend on how many
//! CPUs the machine running the test suite actually has.

use std::sync::atomic::{AtomicU32, Ordering};

/// Queried by `Cores` and the mask parser; never by reactor callbacks.
pub trait CoreHal: Send + Sync {
    /// Total number of logical cores known to the host, enabled or not.
    fn max_cores(&self) -> u32;

    /// Whether `lcore` is enabled and may be selected by a core mask.
    fn is_enabled(&self, lcore: u32) -> bool;

    /// NUMA socket that `lcore` is pinned to.
    fn socket_of(&self, lcore: u32) -> u32;

    /// Pin the calling OS thread to `lcore`. Best-effort: a failure here
    /// is logged, not fatal, since affinity is an optimization, not a
    /// correctness requirement of the reactor protocol.
    fn pin_current_thread(&self, lcore: u32);
}

/// Default HAL: every CPU reported by [`num_cpus::get`] is enabled and
/// lives on socket 0. Real multi-socket topology discovery is exactly
/// the kind of HAL/EAL internal the specification excludes.
#[derive(Debug, Default)]
pub struct HostHal;

impl CoreHal for HostHal {
    fn max_cores(&self) -> u32 {
        num_cpus::get() as u32
    }

    fn is_enabled(&self, lcore: u32) -> bool {
        lcore < self.max_cores()
    }

    fn socket_of(&self, _lcore: u32) -> u32 {
        0
    }

    fn pin_current_thread(&self, lcore: u32) {
        let mut set = nix::sched::CpuSet::new();
        if let Err(e) = set.set(lcore as usize) {
            warn!("lcore {} out of range for affinity mask: {}", lcore, e);
            return;
        }
        if let Err(e) = nix::sched::sched_setaffinity(
            nix::unistd::Pid::from_raw(0),
            &set,
        ) {
            warn!("failed to pin current thread to lcore {}: {}", lcore, e);
        }
    }
}

/// A deterministic HAL for tests: a fixed number of cores, distributed
/// round-robin over a fixed number of sockets, with a toggle for marking
/// specific cores disabled so mask-clearing behaviour can be exercised
/// (scenario S5).
#[derive(Debug)]
pub struct TestHal {
    cores: u32,
    sockets: u32,
    disabled: AtomicU32,
}

impl TestHal {
    pub fn new(cores: u32, sockets: u32) -> Self {
        Self {
            cores,
            sockets: sockets.max(1),
            disabled: AtomicU32::new(0),
        }
    }

    /// Mark `lcore` as disabled; used to exercise mask validation.
    pub fn disable(&self, lcore: u32) {
        self.disabled.fetch_or(1 << lcore, Ordering::SeqCst);
    }
}

impl CoreHal for TestHal {
    fn max_cores(&self) -> u32 {
        self.cores
    }

    fn is_enabled(&self, lcore: u32) -> bool {
        lcore < self.cores
            && self.disabled.load(Ordering::SeqCst) & (1 << lcore) == 0
    }

    fn socket_of(&self, lcore: u32) -> u32 {
        lcore % self.sockets
    }

    fn pin_current_thread(&self, _lcore: u32) {
        // Affinity is not asserted in-process during tests.
    }
}

//! The per-socket event free-list (§4.1). Generalizes
//! `core::mempool::MemoryPool<T>` from the teacher -- there backed by
//! `rte_mempool`, here backed by a lock-free bounded queue per
//! populated socket -- to the one fixed element type the core actually
//! needs to pool: [`Event`].
//!
//! Allocation and release are local to the caller's socket; under
//! steady state an event therefore crosses at most two sockets (the
//! producer's and the destination's), never a third party's free list.

use crate::core::event::{Event, EventFn};
use crossbeam::queue::ArrayQueue;
use std::collections::HashMap;

/// Total event slots shared across all populated sockets, matching the
/// `262144` constant in the original C reactor.
pub const TOTAL_EVENT_CAPACITY: usize = 262_144;

pub struct EventPool {
    sockets: HashMap<u32, ArrayQueue<Box<Event>>>,
}

impl EventPool {
    /// Build one bounded pool per entry in `populated_sockets`, each
    /// sized `total_capacity / populated_sockets.len()`.
    pub fn new(populated_sockets: &[u32], total_capacity: usize) -> Self {
        assert!(!populated_sockets.is_empty(), "no populated sockets");
        let per_socket = (total_capacity / populated_sockets.len()).max(1);

        let mut sockets = HashMap::with_capacity(populated_sockets.len());
        for &socket in populated_sockets {
            let queue = Self::create_socket_pool(socket, per_socket)
                .or_else(|| {
                    warn!(
                        "event pool allocation for socket {} failed, \
                         retrying on any available memory",
                        socket
                    );
                    Self::create_socket_pool(socket, per_socket)
                })
                .unwrap_or_else(|| {
                    panic!(
                        "event pool exhausted: could not allocate {} \
                         events for socket {}",
                        per_socket, socket
                    )
                });
            info!(
                "event pool for socket {} created with {} elements",
                socket, per_socket
            );
            sockets.insert(socket, queue);
        }

        EventPool { sockets }
    }

    fn create_socket_pool(
        _socket: u32,
        capacity: usize,
    ) -> Option<ArrayQueue<Box<Event>>> {
        let queue = ArrayQueue::new(capacity);
        for _ in 0..capacity {
            queue
                .push(Box::new(Event::vacant()))
                .expect("capacity matches fill count");
        }
        Some(queue)
    }

    /// Draw a fresh event from `producer_socket`'s pool, filling in its
    /// fields. Aborts the process if that socket's pool is exhausted:
    /// pool sizing is the operator's responsibility (§5), not something
    /// the core can recover from mid-run.
    pub fn allocate(
        &self,
        producer_socket: u32,
        dest_cpu: u32,
        func: EventFn,
        arg1: *mut (),
        arg2: *mut (),
        next: Option<Box<Event>>,
    ) -> Box<Event> {
        let pool = self.sockets.get(&producer_socket).unwrap_or_else(|| {
            panic!("no event pool for socket {}", producer_socket)
        });

        let mut event = pool.pop().unwrap_or_else(|| {
            panic!(
                "event pool exhausted on socket {}: increase pool capacity \
                 or reduce in-flight events",
                producer_socket
            )
        });

        event.lcore = dest_cpu;
        event.func = func;
        event.arg1 = arg1;
        event.arg2 = arg2;
        event.next = next;
        event
    }

    /// Return `event` to the pool of the socket that `cpu_running`
    /// belongs to, after the destination reactor has invoked it.
    pub fn release(&self, socket_of_cpu_running: u32, mut event: Box<Event>) {
        event.arg1 = std::ptr::null_mut();
        event.arg2 = std::ptr::null_mut();
        event.next = None;

        let pool =
            self.sockets.get(&socket_of_cpu_running).unwrap_or_else(|| {
                panic!("no event pool for socket {}", socket_of_cpu_running)
            });

        pool.push(event)
            .unwrap_or_else(|_| panic!("event pool overflow on release"));
    }

    /// Number of free slots remaining on `socket`; used by tests to
    /// assert that no events leak across a run (scenario S1).
    pub fn free_count(&self, socket: u32) -> usize {
        self.sockets
            .get(&socket)
            .map(|q| q.len())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Event) {}

    #[test]
    fn allocate_and_release_roundtrip_conserves_pool() {
        let pool = EventPool::new(&[0], 16);
        assert_eq!(pool.free_count(0), 16);

        let event = pool.allocate(0, 0, noop, std::ptr::null_mut(), std::ptr::null_mut(), None);
        assert_eq!(pool.free_count(0), 15);

        pool.release(0, event);
        assert_eq!(pool.free_count(0), 16);
    }

    #[test]
    #[should_panic(expected = "event pool exhausted")]
    fn exhausted_pool_is_fatal() {
        let pool = EventPool::new(&[0], 1);
        let _held = pool.allocate(0, 0, noop, std::ptr::null_mut(), std::ptr::null_mut(), None);
        let _ = pool.allocate(0, 0, noop, std::ptr::null_mut(), std::ptr::null_mut(), None);
    }
}

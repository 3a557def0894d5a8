//! The reactor main loop and the process-wide reactor set (§3 "Reactor",
//! "Reactor Set"; §4.4; §4.6). Generalizes `core::reactor::{Reactor,
//! Reactors}` from the teacher: the DPDK/SPDK plumbing
//! (`spdk_thread_lib_init`, `spdk_env_thread_launch_pinned`, ...) is
//! replaced with plain `std::thread` plus the [`CoreHal`] shim, but the
//! shape -- a `Vec<Reactor>` behind a lazily-initialized global, a
//! `flags`/`state` word advancing monotonically, one inline master loop
//! and N remote loops joined at shutdown -- is unchanged.

use crate::core::cores::{bind_current_thread, Cores};
use crate::core::event::Event;
use crate::core::mask::parse_mask;
use crate::core::mempool::{EventPool, TOTAL_EVENT_CAPACITY};
use crate::core::poller::{PollerHandle, PollerLocation};
use crate::core::tick::now_ticks;
use crate::error::{CoreError, MissingMasterCore, NoSuchCore, WrongState};
use crate::hal::CoreHal;
use crossbeam::queue::ArrayQueue;
use once_cell::sync::OnceCell;
use snafu::ensure;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// Bound on each reactor's inbound event queue, matching the `65536`
/// constant of the original C reactor's per-core `rte_ring`.
pub const EVENT_QUEUE_CAPACITY: usize = 65_536;

pub(crate) const INVALID: usize = 0;
pub(crate) const INITIALIZED: usize = 1;
pub(crate) const RUNNING: usize = 2;
pub(crate) const EXITING: usize = 3;
pub(crate) const SHUTDOWN: usize = 4;

fn state_name(state: usize) -> &'static str {
    match state {
        INVALID => "Invalid",
        INITIALIZED => "Initialized",
        RUNNING => "Running",
        EXITING => "Exiting",
        SHUTDOWN => "Shutdown",
        _ => "Unknown",
    }
}

/// One logical CPU's reactor: its inbound event queue and its two
/// poller schedules.
///
/// `active_pollers`/`timer_pollers` are mutated only by the single OS
/// thread that is currently running this reactor's loop -- mutations
/// happen inside event callbacks dispatched from [`Reactor::drain`],
/// which itself only ever runs on that thread. Other threads reach a
/// `Reactor` solely through its thread-safe `queue`. That invariant is
/// what makes `unsafe impl Sync` below sound.
#[repr(C, align(64))]
pub struct Reactor {
    lcore: u32,
    socket: u32,
    queue: ArrayQueue<Box<Event>>,
    active_pollers: RefCell<VecDeque<PollerHandle>>,
    timer_pollers: RefCell<VecDeque<PollerHandle>>,
}

unsafe impl Sync for Reactor {}
unsafe impl Send for Reactor {}

impl Reactor {
    fn new(lcore: u32, socket: u32) -> Self {
        Reactor {
            lcore,
            socket,
            queue: ArrayQueue::new(EVENT_QUEUE_CAPACITY),
            active_pollers: RefCell::new(VecDeque::new()),
            timer_pollers: RefCell::new(VecDeque::new()),
        }
    }

    pub fn lcore(&self) -> u32 {
        self.lcore
    }

    pub(crate) fn socket(&self) -> u32 {
        self.socket
    }

    /// Enqueue `event` for this reactor. Fatal if the queue is full:
    /// callers are expected to bound outstanding events via upstream
    /// backpressure (§4.2).
    pub(crate) fn enqueue(&self, event: Box<Event>) {
        self.queue.push(event).unwrap_or_else(|_| {
            panic!(
                "event queue for lcore {} is full (capacity {})",
                self.lcore, EVENT_QUEUE_CAPACITY
            )
        });
    }

    /// Install `poller` into the schedule its `period_ticks` selects.
    /// Called only from within an event callback executing on this
    /// reactor's own thread (the "add poller" event of §4.5).
    pub(crate) fn install_poller(&self, poller: PollerHandle, now: u64) {
        if poller.is_periodic() {
            let next_run = now + poller.period_ticks();
            poller.set_location(PollerLocation::Timer(self.lcore, next_run));
            self.insert_timer_sorted(poller);
        } else {
            poller.set_location(PollerLocation::Active(self.lcore));
            self.active_pollers.borrow_mut().push_back(poller);
        }
    }

    /// Remove `poller` from whichever schedule it currently occupies.
    /// Called only from the "remove poller" event of §4.5.
    pub(crate) fn remove_poller(&self, poller: &PollerHandle) {
        match poller.location() {
            PollerLocation::Active(_) => {
                self.active_pollers
                    .borrow_mut()
                    .retain(|p| p != poller);
            }
            PollerLocation::Timer(_, _) => {
                self.timer_pollers.borrow_mut().retain(|p| p != poller);
            }
            PollerLocation::Unregistered => {}
        }
        poller.set_location(PollerLocation::Unregistered);
    }

    /// Insert `poller` into the timer schedule keeping it ordered by
    /// ascending `next_run_tick`, scanning from the tail as the original
    /// `spdk_poller_insert_timer` does: the new poller lands after the
    /// first (from the tail) entry whose tick is `<=` its own, which
    /// keeps equal-key ties in insertion order on the tail side of the
    /// run (§4.3).
    fn insert_timer_sorted(&self, poller: PollerHandle) {
        let mut timers = self.timer_pollers.borrow_mut();
        let new_tick = poller.next_run_tick();

        let insert_after = timers
            .iter()
            .enumerate()
            .rev()
            .find(|(_, p)| p.next_run_tick() <= new_tick)
            .map(|(i, _)| i + 1);

        match insert_after {
            Some(pos) => timers.insert(pos, poller),
            None => timers.push_front(poller),
        }
    }

    /// Drain exactly the events present at the start of this call
    /// (§4.2); events enqueued during the drain run on the next
    /// iteration. Drained events are released to `pool` on the socket
    /// of the CPU that just ran them (this reactor's own socket).
    pub(crate) fn drain(&self, pool: &EventPool) {
        let count = self.queue.len();
        for _ in 0..count {
            let mut event = match self.queue.pop() {
                Some(e) => e,
                None => break,
            };
            event.fire();
            let next = event.take_next();
            pool.release(self.socket, event);
            if let Some(next) = next {
                dispatch_event(next);
            }
        }
    }

    /// Rotate exactly one always-run poller, if any are registered
    /// (§4.3).
    pub(crate) fn rotate_active(&self) {
        let head = self.active_pollers.borrow_mut().pop_front();
        if let Some(poller) = head {
            poller.fire();
            self.active_pollers.borrow_mut().push_back(poller);
        }
    }

    /// Fire the earliest-due timer poller, if any, and reschedule it
    /// (§4.3).
    pub(crate) fn fire_due_timer(&self, now: u64) {
        let due = {
            let timers = self.timer_pollers.borrow();
            matches!(timers.front(), Some(p) if now >= p.next_run_tick())
        };
        if !due {
            return;
        }
        let poller = self
            .timer_pollers
            .borrow_mut()
            .pop_front()
            .expect("checked non-empty above");
        poller.fire();
        let next_run = now + poller.period_ticks();
        poller.set_location(PollerLocation::Timer(self.lcore, next_run));
        self.insert_timer_sorted(poller);
    }

    /// One iteration of the main loop (§4.4 steps 1, 3, 4; step 2, the
    /// host's low-resolution timer tick, has nothing to advance in this
    /// implementation beyond reading the monotonic tick source below).
    pub(crate) fn run_once(&self, pool: &EventPool) {
        self.drain(pool);
        let now = now_ticks();
        self.rotate_active();
        self.fire_due_timer(now);
    }

    /// Number of always-run pollers currently registered here. Test/
    /// introspection only.
    pub fn active_poller_count(&self) -> usize {
        self.active_pollers.borrow().len()
    }

    /// Number of periodic pollers currently registered here. Test/
    /// introspection only.
    pub fn timer_poller_count(&self) -> usize {
        self.timer_pollers.borrow().len()
    }
}

struct ReactorsInner {
    hal: Box<dyn CoreHal>,
    reactors: Vec<Reactor>,
    index: HashMap<u32, usize>,
    mask: AtomicU64,
    state: AtomicUsize,
    pool: EventPool,
}

impl ReactorsInner {
    fn get(&self, lcore: u32) -> Option<&Reactor> {
        self.index.get(&lcore).map(|&i| &self.reactors[i])
    }
}

static REACTOR_LIST: OnceCell<ReactorsInner> = OnceCell::new();

/// Process-wide registry of reactors and the global lifecycle state
/// machine (§3 "Reactor Set", §4.6). A zero-sized facade over the
/// lazily-initialized [`REACTOR_LIST`] singleton, mirroring the
/// teacher's `Reactors` / `REACTOR_LIST: OnceCell<Reactors>` split.
pub struct Reactors;

impl Reactors {
    /// `reactors_init` (§6). Requires `state == Invalid` (i.e. this is
    /// the first and only call); parses `mask`, requires the master
    /// core's bit, constructs one reactor per selected lcore and one
    /// event pool per populated socket.
    pub fn init(hal: Box<dyn CoreHal>, mask: &str) -> Result<(), CoreError> {
        ensure!(
            REACTOR_LIST.get().is_none(),
            WrongState {
                expected: "Invalid",
                actual: "Initialized or later",
            }
        );

        let parsed_mask = parse_mask(hal.as_ref(), mask)?;
        let master = Cores::first(hal.as_ref());
        ensure!(
            parsed_mask & (1u64 << master) != 0,
            MissingMasterCore {
                master,
                mask: parsed_mask,
            }
        );

        let lcores: Vec<u32> = Cores::iter_mask(parsed_mask).collect();
        let mut sockets: Vec<u32> =
            lcores.iter().map(|&c| hal.socket_of(c)).collect();
        sockets.sort_unstable();
        sockets.dedup();

        let pool = EventPool::new(&sockets, TOTAL_EVENT_CAPACITY);

        let mut reactors = Vec::with_capacity(lcores.len());
        let mut index = HashMap::with_capacity(lcores.len());
        for (i, &lcore) in lcores.iter().enumerate() {
            reactors.push(Reactor::new(lcore, hal.socket_of(lcore)));
            index.insert(lcore, i);
        }

        info!("reactor set occupies core mask 0x{:x}", parsed_mask);

        let inner = ReactorsInner {
            hal,
            reactors,
            index,
            mask: AtomicU64::new(parsed_mask),
            state: AtomicUsize::new(INITIALIZED),
            pool,
        };

        REACTOR_LIST
            .set(inner)
            .unwrap_or_else(|_| panic!("reactors initialized concurrently"));
        Ok(())
    }

    /// `reactors_start` (§6, §4.6). Must be called from the thread that
    /// is to become the master reactor's thread; pins it, then runs the
    /// master loop inline after launching every other selected lcore on
    /// its own OS thread. Returns once every reactor has exited its
    /// loop, after which the state is `Shutdown`.
    pub fn start() -> Result<(), CoreError> {
        let inner = inner();
        let state = inner.state.load(Ordering::SeqCst);
        ensure!(
            state == INITIALIZED,
            WrongState {
                expected: "Initialized",
                actual: state_name(state),
            }
        );

        let master = Cores::first(inner.hal.as_ref());
        let mask = inner.mask.load(Ordering::SeqCst);

        inner.state.store(RUNNING, Ordering::SeqCst);

        let handles: Vec<JoinHandle<()>> = Cores::iter_mask(mask)
            .filter(|&lcore| lcore != master)
            .map(Self::launch_remote)
            .collect();

        Self::run_reactor_loop(master);

        for handle in handles {
            let _ = handle.join();
        }

        inner.state.store(SHUTDOWN, Ordering::SeqCst);
        Ok(())
    }

    /// `reactors_stop` (§6). A single relaxed-enough atomic store:
    /// every reactor observes it at its next iteration boundary, after
    /// its current drain and poller step, and exits.
    pub fn stop() {
        if let Some(inner) = REACTOR_LIST.get() {
            inner.state.store(EXITING, Ordering::SeqCst);
        }
    }

    fn launch_remote(lcore: u32) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name(format!("reactor_{}", lcore))
            .spawn(move || Self::run_reactor_loop(lcore))
            .unwrap_or_else(|e| {
                panic!("failed to launch reactor thread for lcore {}: {}", lcore, e)
            })
    }

    fn run_reactor_loop(lcore: u32) {
        let inner = inner();
        inner.hal.pin_current_thread(lcore);
        bind_current_thread(lcore);

        let reactor = inner
            .get(lcore)
            .unwrap_or_else(|| panic!("no reactor constructed for lcore {}", lcore));

        debug!("reactor {} entering poll loop", lcore);
        loop {
            reactor.run_once(&inner.pool);
            if inner.state.load(Ordering::SeqCst) != RUNNING {
                break;
            }
        }
        debug!("reactor {} exiting poll loop", lcore);
    }

    /// Look up the reactor owning `lcore`, if it was selected by the
    /// mask passed to [`Reactors::init`].
    pub fn get_by_core(lcore: u32) -> Option<&'static Reactor> {
        REACTOR_LIST.get().and_then(|inner| inner.get(lcore))
    }

    /// The reactor for the lcore this OS thread is bound to.
    pub fn current() -> &'static Reactor {
        Self::get_by_core(Cores::current())
            .expect("no reactor allocated for the current core")
    }

    /// The reactor for the master lcore.
    pub fn master() -> &'static Reactor {
        let master = Cores::first(inner().hal.as_ref());
        Self::get_by_core(master).expect("master reactor missing")
    }

    /// Iterate every constructed reactor.
    pub fn iter() -> impl Iterator<Item = &'static Reactor> {
        inner().reactors.iter()
    }

    /// The currently-active core mask.
    pub fn core_mask() -> u64 {
        inner().mask.load(Ordering::SeqCst)
    }

    /// Human-readable lifecycle state, for logging/diagnostics.
    pub fn state_name() -> &'static str {
        state_name(inner().state.load(Ordering::SeqCst))
    }

    pub(crate) fn pool() -> &'static EventPool {
        &inner().pool
    }

    /// Free event slots remaining on `lcore`'s socket. Test/
    /// introspection only -- used to assert that a run leaks no events
    /// (scenario S1).
    pub fn pool_free_count(lcore: u32) -> usize {
        let inner = inner();
        inner.pool.free_count(inner.hal.socket_of(lcore))
    }

    pub(crate) fn hal() -> &'static dyn CoreHal {
        inner().hal.as_ref()
    }

    pub(crate) fn require_core(lcore: u32) -> Result<(), CoreError> {
        ensure!(
            Self::core_mask() & (1u64 << lcore) != 0,
            NoSuchCore { lcore }
        );
        Ok(())
    }
}

fn inner() -> &'static ReactorsInner {
    REACTOR_LIST
        .get()
        .expect("Reactors::init must be called before this operation")
}

/// Enqueue `event` on its destination reactor (`event_call`, §6). The
/// only place outside of `Reactor::drain` that posts to a queue.
pub(crate) fn dispatch_event(event: Box<Event>) {
    let lcore = event.lcore();
    let reactor = Reactors::get_by_core(lcore).unwrap_or_else(|| {
        panic!("event targets lcore {} which has no reactor", lcore)
    });
    reactor.enqueue(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Arc;

    fn pool(sockets: &[u32]) -> EventPool {
        EventPool::new(sockets, 64)
    }

    fn bump(e: &mut Event) {
        unsafe { e.arg1::<StdAtomicUsize>() }.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn drain_runs_exactly_events_present_at_start() {
        let reactor = Reactor::new(0, 0);
        let event_pool = pool(&[0]);

        let seen: &'static StdAtomicUsize =
            Box::leak(Box::new(StdAtomicUsize::new(0)));
        let counter_ptr = seen as *const StdAtomicUsize as *mut ();

        for _ in 0..3 {
            let event =
                event_pool.allocate(0, 0, bump, counter_ptr, std::ptr::null_mut(), None);
            reactor.enqueue(event);
        }

        reactor.drain(&event_pool);
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        // events enqueued during the drain must not run until the next call
        let event =
            event_pool.allocate(0, 0, bump, counter_ptr, std::ptr::null_mut(), None);
        reactor.enqueue(event);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        reactor.drain(&event_pool);
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn round_robin_rotation_is_fair() {
        let reactor = Reactor::new(0, 0);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            let poller = PollerHandle::new(0, move || order.lock().push(id));
            reactor.install_poller(poller, 0);
        }

        for _ in 0..9 {
            reactor.rotate_active();
        }

        assert_eq!(
            *order.lock(),
            vec![0, 1, 2, 0, 1, 2, 0, 1, 2]
        );
    }

    #[test]
    fn timer_schedule_orders_by_next_run_ascending() {
        let reactor = Reactor::new(0, 0);
        let fires = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mk = |period: u64, id: &'static str, fires: Arc<parking_lot::Mutex<Vec<&'static str>>>| {
            PollerHandle::new(period, move || fires.lock().push(id))
        };

        reactor.install_poller(mk(30, "p30", fires.clone()), 0);
        reactor.install_poller(mk(10, "p10", fires.clone()), 0);
        reactor.install_poller(mk(20, "p20", fires.clone()), 0);

        // ascending by next_run_tick: p10@10, p20@20, p30@30
        let ticks: Vec<u64> = {
            let timers = reactor.timer_pollers.borrow();
            timers.iter().map(|p| p.next_run_tick()).collect()
        };
        assert_eq!(ticks, vec![10, 20, 30]);

        reactor.fire_due_timer(10);
        assert_eq!(*fires.lock(), vec!["p10"]);

        // count fires by t=60ms matching scenario S3: periods 10/20/30
        fires.lock().clear();
        let reactor = Reactor::new(0, 0);
        let mut counts = std::collections::HashMap::new();
        for (period, id) in [(10, "p10"), (20, "p20"), (30, "p30")] {
            let counts_fires = fires.clone();
            reactor.install_poller(
                PollerHandle::new(period, move || counts_fires.lock().push(id)),
                0,
            );
        }
        for t in 1..=60u64 {
            reactor.fire_due_timer(t);
        }
        for id in fires.lock().iter() {
            *counts.entry(*id).or_insert(0) += 1;
        }
        assert_eq!(counts.get("p10"), Some(&6));
        assert_eq!(counts.get("p20"), Some(&3));
        assert_eq!(counts.get("p30"), Some(&2));
    }
}

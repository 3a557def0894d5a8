//! The cross-reactor dispatch primitives built on top of [`Event`]:
//! `send_to` (a boxed-closure trampoline, generalizing the teacher's
//! `Mthread::send_msg`/`on_core` helpers in `core::event`), and the
//! poller register/unregister/migrate protocol of §4.5, each phrased as
//! one or two events posted to the owning reactor rather than a direct
//! mutation from the calling thread.

use crate::core::cores::Cores;
use crate::core::event::{Event, EventFn};
use crate::core::mempool::EventPool;
use crate::core::poller::PollerHandle;
use crate::core::reactor::{dispatch_event, Reactor, Reactors};
use crate::core::tick::{now_ticks, ticks_from_micros};
use crate::error::CoreError;
use std::ptr;

fn pool() -> &'static EventPool {
    Reactors::pool()
}

/// The socket an event built by the calling thread should be allocated
/// from: the reactor socket if called from inside a reactor loop, the
/// master's socket otherwise (§4.1, "allocation... is local to the
/// caller's socket").
fn producer_socket() -> u32 {
    let hal = Reactors::hal();
    let lcore = Cores::try_current().unwrap_or_else(|| Cores::first(hal));
    hal.socket_of(lcore)
}

fn boxed_closure_event(
    dest_cpu: u32,
    closure: Box<dyn FnOnce() + Send>,
    next: Option<Box<Event>>,
) -> Box<Event> {
    fn run_boxed(e: &mut Event) {
        let boxed: Box<Box<dyn FnOnce() + Send>> =
            unsafe { Box::from_raw(e.arg1 as *mut Box<dyn FnOnce() + Send>) };
        (*boxed)();
    }

    let raw = Box::into_raw(Box::new(closure)) as *mut ();
    pool().allocate(producer_socket(), dest_cpu, run_boxed, raw, ptr::null_mut(), next)
}

/// Post `f` to run once on `dest_cpu`'s reactor thread (§6 `send_to`).
/// `f` never runs on the calling thread, including when `dest_cpu` is
/// the caller's own lcore: it always goes through the target's event
/// queue, preserving the single-consumer invariant on that reactor's
/// poller schedules.
pub fn send_to<F>(dest_cpu: u32, f: F) -> Result<(), CoreError>
where
    F: FnOnce() + Send + 'static,
{
    Reactors::require_core(dest_cpu)?;
    let event = boxed_closure_event(dest_cpu, Box::new(f), None);
    dispatch_event(event);
    Ok(())
}

/// Allocate a raw event addressed to `dest_cpu` without dispatching it
/// (`event_allocate`, §6). Exposed for callers, such as the NVMe-oF
/// dispatcher, that build chained completions directly rather than via
/// [`send_to`]'s closure trampoline.
pub fn event_allocate(
    dest_cpu: u32,
    func: EventFn,
    arg1: *mut (),
    arg2: *mut (),
) -> Box<Event> {
    pool().allocate(producer_socket(), dest_cpu, func, arg1, arg2, None)
}

/// Dispatch a previously allocated event (`event_call`, §6).
pub fn event_call(event: Box<Event>) {
    dispatch_event(event);
}

/// Register `f` as a poller on `dest_cpu` (§4.5). `period_us == 0`
/// registers an always-run poller; otherwise `f` fires no more often
/// than every `period_us` microseconds. Returns immediately with a
/// handle whose schedule membership becomes visible once the
/// registration event has been processed by `dest_cpu`'s reactor, at
/// which point `on_complete`, if given, fires.
pub fn poller_register<F, C>(
    dest_cpu: u32,
    period_us: u64,
    f: F,
    on_complete: Option<C>,
) -> Result<PollerHandle, CoreError>
where
    F: FnMut() + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    Reactors::require_core(dest_cpu)?;
    let handle = PollerHandle::new(ticks_from_micros(period_us), f);
    let installed = handle.clone();
    send_to(dest_cpu, move || {
        reactor_for(dest_cpu).install_poller(installed, now_ticks());
        if let Some(cb) = on_complete {
            cb();
        }
    })?;
    Ok(handle)
}

/// Unregister `handle` from whichever reactor currently owns it,
/// firing `on_complete` once removed. A no-op (and an immediate
/// `on_complete`, if given) if it is not currently registered
/// anywhere.
pub fn poller_unregister<C>(
    handle: PollerHandle,
    on_complete: Option<C>,
) -> Result<(), CoreError>
where
    C: FnOnce() + Send + 'static,
{
    let lcore = match handle.lcore() {
        Some(lcore) => lcore,
        None => {
            if let Some(cb) = on_complete {
                cb();
            }
            return Ok(());
        }
    };
    send_to(lcore, move || {
        reactor_for(lcore).remove_poller(&handle);
        if let Some(cb) = on_complete {
            cb();
        }
    })
}

/// Move `handle` from its current reactor to `dest_cpu` (§4.5). Built
/// as a single unregister event whose completion is itself the
/// register event on `dest_cpu`, chained via `Event::next` -- the
/// poller is never concurrently scheduled on two reactors, and it
/// briefly runs on neither while the chain is in flight. `on_complete`
/// fires strictly after the register event runs on `dest_cpu`.
pub fn poller_migrate<C>(
    handle: PollerHandle,
    dest_cpu: u32,
    on_complete: Option<C>,
) -> Result<(), CoreError>
where
    C: FnOnce() + Send + 'static,
{
    let src_lcore = handle.lcore().ok_or(CoreError::WrongState {
        expected: "registered",
        actual: "unregistered",
    })?;
    Reactors::require_core(dest_cpu)?;

    if src_lcore == dest_cpu {
        if let Some(cb) = on_complete {
            cb();
        }
        return Ok(());
    }

    let register_target = handle.clone();
    let register_event = boxed_closure_event(
        dest_cpu,
        Box::new(move || {
            reactor_for(dest_cpu).install_poller(register_target, now_ticks());
            if let Some(cb) = on_complete {
                cb();
            }
        }),
        None,
    );

    let unregister_target = handle;
    let unregister_event = boxed_closure_event(
        src_lcore,
        Box::new(move || {
            reactor_for(src_lcore).remove_poller(&unregister_target);
        }),
        Some(register_event),
    );

    dispatch_event(unregister_event);
    Ok(())
}

fn reactor_for(lcore: u32) -> &'static Reactor {
    Reactors::get_by_core(lcore)
        .unwrap_or_else(|| panic!("lcore {} has no reactor", lcore))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_to_same_core_is_a_noop() {
        // handle with no reactor set will exercise the early lcore()
        // None path in poller_migrate via the public API once a
        // Reactors set exists; schedule-level behaviour is covered by
        // the integration tests that drive a live reactor set.
        let handle = PollerHandle::new(0, || {});
        assert!(handle.lcore().is_none());
    }
}

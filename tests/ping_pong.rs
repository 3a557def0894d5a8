//! Scenario S1 (ping-pong): two reactors bounce a chain of events back
//! and forth, each round trip incrementing a shared counter, until no
//! events are leaked and the counter reaches the expected total.

use reactor_core::hal::TestHal;
use reactor_core::{event_allocate, event_call, Event, Reactors};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const ROUND_TRIPS: usize = 1000;

struct PingPongCtx {
    counter: AtomicUsize,
    cpu_a: u32,
    cpu_b: u32,
}

fn on_a(e: &mut Event) {
    let ctx = unsafe { e.arg1::<PingPongCtx>() };
    let done = ctx.counter.fetch_add(1, Ordering::SeqCst) + 1;
    if done < ROUND_TRIPS {
        let raw = ctx as *const PingPongCtx as *mut ();
        let next = event_allocate(ctx.cpu_b, on_b, raw, std::ptr::null_mut());
        event_call(next);
    }
}

fn on_b(e: &mut Event) {
    let ctx = unsafe { e.arg1::<PingPongCtx>() };
    let raw = ctx as *const PingPongCtx as *mut ();
    let next = event_allocate(ctx.cpu_a, on_a, raw, std::ptr::null_mut());
    event_call(next);
}

#[test]
fn ping_pong_round_trips_conserve_the_event_pool() {
    Reactors::init(Box::new(TestHal::new(2, 1)), "0x3")
        .expect("reactor set init failed");

    let cpu_a = 0;
    let cpu_b = 1;
    let before = Reactors::pool_free_count(cpu_a);

    let ctx: &'static PingPongCtx = Box::leak(Box::new(PingPongCtx {
        counter: AtomicUsize::new(0),
        cpu_a,
        cpu_b,
    }));

    let raw = ctx as *const PingPongCtx as *mut ();
    let first = event_allocate(cpu_b, on_b, raw, std::ptr::null_mut());
    event_call(first);

    std::thread::spawn(move || loop {
        if ctx.counter.load(Ordering::SeqCst) >= ROUND_TRIPS {
            Reactors::stop();
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    });

    Reactors::start().expect("reactor set run failed");

    assert_eq!(ctx.counter.load(Ordering::SeqCst), ROUND_TRIPS);
    assert_eq!(Reactors::pool_free_count(cpu_a), before);
}

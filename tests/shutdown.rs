//! Scenario S6 (shutdown): `stop` called from a poller running on a
//! non-master reactor brings every reactor's loop to a halt and the
//! set to `Shutdown`; `start` returns to its caller.

use reactor_core::hal::TestHal;
use reactor_core::{poller_register, Reactors};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn stop_from_a_non_master_reactor_halts_every_reactor() {
    Reactors::init(Box::new(TestHal::new(3, 1)), "0x7")
        .expect("reactor set init failed");

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();

    // Always-run poller on CPU 1 (non-master) that signals shutdown
    // after it has run a few times.
    poller_register::<_, fn()>(
        1,
        0,
        move || {
            if ran_clone.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                Reactors::stop();
            }
        },
        None,
    )
    .expect("poller registration failed");

    Reactors::start().expect("reactor set run failed");

    assert_eq!(Reactors::state_name(), "Shutdown");
    assert!(ran.load(Ordering::SeqCst) >= 3);
}

//! Scenario S4 (migrate): an always-run poller registered on CPU 0 is
//! migrated to CPU 1; once its completion fires, it is absent from
//! CPU 0's active schedule and present on CPU 1's.

use reactor_core::hal::TestHal;
use reactor_core::{poller_migrate, poller_register, Reactors};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn migrated_poller_ends_up_on_the_destination_reactor() {
    Reactors::init(Box::new(TestHal::new(2, 1)), "0x3")
        .expect("reactor set init failed");

    let fired = Arc::new(AtomicBool::new(false));
    let fired_clone = fired.clone();

    let handle = poller_register::<_, fn()>(
        0,
        0,
        move || {
            fired_clone.store(true, Ordering::SeqCst);
        },
        None,
    )
    .expect("poller registration failed");

    let migrated = Arc::new(AtomicBool::new(false));
    let migrated_clone = migrated.clone();

    let handle_for_watcher = handle.clone();
    std::thread::spawn(move || {
        // wait until the poller has actually run at least once on CPU 0
        while !fired.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(5));
        }

        poller_migrate(
            handle_for_watcher,
            1,
            Some(move || {
                migrated_clone.store(true, Ordering::SeqCst);
            }),
        )
        .expect("migration failed");

        while !migrated.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(5));
        }

        Reactors::stop();
    });

    Reactors::start().expect("reactor set run failed");

    assert_eq!(handle.lcore(), Some(1));
    assert_eq!(Reactors::get_by_core(0).unwrap().active_poller_count(), 0);
    assert_eq!(Reactors::get_by_core(1).unwrap().active_poller_count(), 1);
}

//! The "low-resolution timer facility" referenced by the main loop
//! (§4.4 step 2): a monotonic tick source used only to order and fire
//! periodic pollers. Timer-wheel internals are explicitly out of scope;
//! this is just `now()` and a fixed `tick_hz`.

use once_cell::sync::Lazy;
use std::time::Instant;

/// One tick equals one microsecond. This makes `period_us -> ticks`
/// conversion the identity function, which is enough to honor the
/// ordering contract in §4.3/§4.4 without pulling in a real cycle
/// counter; real deployments would source ticks from the CPU TSC.
pub const TICK_HZ: u64 = 1_000_000;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Current tick count since process start.
pub fn now_ticks() -> u64 {
    EPOCH.elapsed().as_micros() as u64
}

/// Convert a period expressed in microseconds into ticks. `0` stays `0`
/// (the always-run sentinel).
pub fn ticks_from_micros(period_us: u64) -> u64 {
    if period_us == 0 {
        0
    } else {
        (TICK_HZ * period_us) / 1_000_000
    }
}

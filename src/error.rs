//! Error types returned by the reactor core's lifecycle and validation
//! entry points.
//!
//! Fatal invariant breaches (pool exhaustion, queue overflow, a reactor
//! set in the wrong state for a mutating call that should never be
//! reachable in a correctly wired caller) are not represented here: the
//! core aborts the process on those with `panic!`, matching the `RTE_VERIFY`
//! asserts of the original C implementation.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum CoreError {
    #[snafu(display("core mask '{}' is not a valid hexadecimal bitmask", mask))]
    InvalidMask { mask: String },

    #[snafu(display(
        "master core {} must be set in the core mask 0x{:x}",
        master,
        mask
    ))]
    MissingMasterCore { master: u32, mask: u64 },

    #[snafu(display(
        "operation requires reactor set state {}, but it is {}",
        expected,
        actual
    ))]
    WrongState {
        expected: &'static str,
        actual: &'static str,
    },

    #[snafu(display("lcore {} is not part of the active core mask", lcore))]
    NoSuchCore { lcore: u32 },
}

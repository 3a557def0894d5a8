//! Logging setup, in the manner of `mayastor::logger`: a thin wrapper
//! around `env_logger` so `RUST_LOG` keeps working, with a fixed default
//! filter level chosen by the caller (typically driven by a CLI flag).

use env_logger::{Builder, Env};
use std::io::Write;

/// Initialize the global logger. Safe to call more than once; only the
/// first call takes effect, matching `env_logger`'s own idempotence.
pub fn init(level: &str) {
    let mut builder =
        Builder::from_env(Env::default().default_filter_or(level.to_string()));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}:{}] {}",
            buf.timestamp_nanos(),
            record.level(),
            record.target(),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    let _ = builder.try_init();
}

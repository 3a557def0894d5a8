//! Command-line surface for the crate's demo binary, in the manner of
//! `MayastorCliArgs`: a `structopt`-derived struct with the handful of
//! knobs the reactor lifecycle actually needs.

use structopt::StructOpt;

#[derive(Debug, Clone, StructOpt)]
#[structopt(
    name = "reactor-demo",
    about = "Shared-nothing, per-CPU reactor runtime demo"
)]
pub struct ReactorCliArgs {
    #[structopt(short = "m", long = "reactor-mask", default_value = "0x1")]
    /// Core mask selecting which logical cores run a reactor.
    pub reactor_mask: String,

    #[structopt(long = "log-level", default_value = "INFO")]
    /// Log level passed to the logger unless RUST_LOG overrides it.
    pub log_level: String,
}

impl Default for ReactorCliArgs {
    fn default() -> Self {
        ReactorCliArgs {
            reactor_mask: "0x1".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

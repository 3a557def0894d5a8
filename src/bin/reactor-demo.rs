//! Smoke-tests the whole reactor lifecycle end to end: parse the core
//! mask, initialize the reactor set, register a couple of pollers,
//! start, let it run briefly, then stop -- in the same spirit as
//! `mayastor`'s `bin/mayastor.rs` entrypoint, minus the storage/gRPC
//! surfaces that entrypoint also wires up.

#[macro_use]
extern crate log;

use reactor_core::{logger, poller_register, HostHal, ReactorCliArgs, Reactors};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

fn main() {
    let args = ReactorCliArgs::from_args();
    logger::init(&args.log_level);

    info!("initializing reactor set with mask {}", args.reactor_mask);
    Reactors::init(Box::new(HostHal), &args.reactor_mask)
        .unwrap_or_else(|e| panic!("failed to initialize reactors: {}", e));

    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();
    let master = reactor_core::Cores::first(&HostHal);
    poller_register::<_, fn()>(
        master,
        0,
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        None,
    )
    .unwrap_or_else(|e| panic!("failed to register poller: {}", e));

    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        info!("stopping reactor set");
        Reactors::stop();
    });

    info!("starting reactor set");
    Reactors::start().unwrap_or_else(|e| panic!("reactor set failed: {}", e));

    info!(
        "reactor set shut down after {} always-run poller iterations",
        ticks.load(Ordering::SeqCst)
    );
}

//! A shared-nothing, per-CPU reactor runtime: each selected logical
//! core runs its own cooperative event loop, communicating with the
//! others only by posting messages onto each other's event queues,
//! never through shared memory. Generalizes the `core` module of
//! `mayastor` (itself a thin Rust layer over SPDK's reactor) from an
//! SPDK/DPDK-backed implementation to a pure Rust one driven by a small
//! [`hal::CoreHal`] shim instead of the DPDK EAL.
//!
//! Start here:
//! - [`core::reactor::Reactors`] -- the process-wide lifecycle:
//!   `init`, `start`, `stop`.
//! - [`core::dispatch`] -- `send_to` and the poller register/
//!   unregister/migrate protocol built on top of it.
//! - [`core::event`] / [`core::poller`] -- the two schedulable unit
//!   types.
//! - [`nvmf`] -- a small illustration of a higher layer built on the
//!   same dispatch primitives.

#[macro_use]
extern crate log;

pub mod cli;
pub mod core;
pub mod error;
pub mod hal;
pub mod logger;
pub mod nvmf;

pub use cli::ReactorCliArgs;
pub use core::cores::Cores;
pub use core::dispatch::{
    event_allocate, event_call, poller_migrate, poller_register, poller_unregister, send_to,
};
pub use core::event::Event;
pub use core::mempool::EventPool;
pub use core::poller::{PollerHandle, PollerLocation};
pub use core::reactor::{Reactor, Reactors};
pub use error::CoreError;
pub use hal::{CoreHal, HostHal};

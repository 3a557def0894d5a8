//! A small illustration of a higher layer built on the reactor core's
//! dispatch primitives, grounded in `lib/nvmf/request.c`. The NVMe-oF
//! command set, transports and controllers themselves are out of
//! scope; only the two `send_to` call sites that route a request to
//! its processing CPU and route its completion back are modeled.

pub mod request;

pub use request::{NvmfRequest, QpairType};

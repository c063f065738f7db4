//! Library surface for `disttar`: the tar byte-layout engine, the
//! coordinator/worker dispatch protocol, and the shared-file write
//! discipline. `src/main.rs` is a thin binary wrapper over this crate so
//! the scenario and property tests under `tests/` can exercise the core
//! without spinning up a message-passing universe.

pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod metadata;
pub mod path_source;
pub mod planner;
pub mod progress;
pub mod sharedfile;
pub mod tar;
pub mod transport;
pub mod worker;

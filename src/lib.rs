#![allow(unused_assignments)]

//! # port-selector
//!
//! Stable TCP port assignment for development directories.
//!
//! ## Features
//!
//! - **Stable ports**: the same directory (and allocation name) gets the same port on every run
//! - **Named allocations**: one project can hold `web`, `api`, `db`, ... side by side
//! - **Locking**: pin a port to a directory so it is never expired or silently handed elsewhere
//! - **Round-robin issuance**: fresh ports resume after the last issued one
//! - **Freeze period**: recently used ports stay out of circulation for a while
//! - **TTL reclamation**: unlocked allocations idle for too long are reclaimed
//! - **Multi-process safety**: every mutation runs under an exclusive advisory file lock
//!   and is written atomically
//!
//! ## Quick Start
//!
//! ```no_run
//! use port_selector::{allocation, Context};
//!
//! # fn example() -> Result<(), port_selector::Error> {
//! let ctx = Context::load(None, false)?;
//! let policy = ctx.policy();
//!
//! let selection = ctx.with_store(|store| {
//!     allocation::select_port(store, "/home/dev/app", "main", &policy, ctx.prober())
//! })?;
//! println!("{}", selection.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Each invocation is a short-lived single-threaded process. Invocations are
//! serialized by a blocking lock on `allocations.lock` next to the
//! allocations file; the whole load, select, save cycle runs while it is held.

pub mod allocation;
pub mod config;
pub mod context;
pub mod error;
pub mod port;

// Re-export commonly used types
pub use allocation::{AllocationInfo, Policy, Store};
pub use config::{Config, Parser};
pub use context::Context;
pub use error::{Error, Result};
pub use port::{PortProber, ProcessInfo, StaticProber, SystemProber};

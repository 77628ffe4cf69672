//! Configuration parsing and types.
//!
//! - `types` - `Config` and its defaults
//! - `duration` - human-readable duration strings ("30m", "30d")
//! - `parser` - locating and loading `config.yaml`
//! - `validation` - range and TTL checks

mod duration;
mod parser;
mod types;
mod validation;

pub use duration::*;
pub use parser::*;
pub use types::*;

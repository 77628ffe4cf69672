//! Persistent directory-to-port allocations.
//!
//! [`Store`] is the in-memory model, [`with_store`] the only sanctioned
//! read-modify-write path to disk, and [`select_port`] / [`lock`] /
//! [`scan_range`] the operations run inside it.

mod info;
mod locker;
mod persist;
mod pin;
mod scan;
mod select;
mod store;

pub use info::{
    is_unknown_directory, normalize_directory, normalize_name, unknown_directory, AllocationInfo,
    DEFAULT_NAME,
};
#[cfg(any(unix, windows))]
pub use locker::FileLocker;
pub use locker::{platform_locker, Locker, NoopLocker};
pub use persist::{
    decode, encode, load, read_store, save, with_store, with_store_using, StorePaths,
    ALLOCATIONS_FILE_NAME, LOCK_FILE_NAME,
};
pub use pin::{lock, unlock, LockOutcome, LockRequest};
pub use scan::{scan_range, ScanReport};
pub use select::{
    find_by_directory_and_name_with_priority, find_free_port, scan_order, select_port, Policy,
    Priority, Selection, SelectionSource,
};
pub use store::Store;

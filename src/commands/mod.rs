mod expire;
mod forget;
mod get;
mod list;
mod lock;
mod scan;

pub use expire::run_expire;
pub use forget::{run_forget, ForgetTarget};
pub use get::run_get;
pub use list::run_list;
pub use lock::{run_lock, run_unlock};
pub use scan::run_scan;

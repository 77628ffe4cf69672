pub mod prober;

pub use prober::{PortProber, ProcessInfo, StaticProber, SystemProber};

//! Dual-mode (TCP/UDP) port scanning with nmap.
//!
//! [`PortScanner::run_parallel_scan`] runs a version-detection TCP scan and
//! a UDP scan of the common service ports at the same time and returns both
//! results, or the first failure.

pub mod model;
mod raw;
pub mod scanner;

pub use model::{CombinedScan, NmapHost, NmapPort, NmapRun};
pub use scanner::{NmapConfig, PortScanner, TCP_VERSION_SCAN, UDP_SCAN, UDP_SERVICE_PORTS};

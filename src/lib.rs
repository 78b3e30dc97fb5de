//! Network Probe
//!
//! Reachability and latency probing of remote hosts with ICMP echo and TCP
//! connect probes. A session resolves the target once, enumerates every
//! (iteration, address, port) operation, dispatches them sequentially or
//! through a bounded worker pool, and reduces the results into loss and
//! latency statistics.

pub mod app;
pub mod cli;
pub mod config;
pub mod dns;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{CancelHandle, Orchestrator, ProbeEngine};
pub use models::{Config, ProbeConfig, ProbeResult, ResolvedTarget, SessionSummary};
pub use probe::{ProbeStrategy, ProbeTarget};
pub use stats::{ProbeStats, StatsAggregator};
pub use types::{DispatchMode, ProbeErrorKind, ProbeMode, ProbeStatus};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// `--version` long output, stamped by build.rs
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT"),
    "\nbuilt: ",
    env!("BUILD_TIME"),
    "\ntarget: ",
    env!("TARGET_TRIPLE"),
);

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_COUNT: u32 = 1;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_DELAY_MS: u64 = 1000;
    pub const DEFAULT_PAYLOAD_BYTES: usize = 4;
    pub const DEFAULT_THROTTLE: bool = false;
    pub const DEFAULT_FROM_PORT: u16 = 1;
    pub const DEFAULT_TO_PORT: u16 = 80;
    pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(5000);
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Upper bound (exclusive) of the randomized throttle delay
    pub const MAX_THROTTLE_DELAY_MS: u64 = 10_000;

    pub const MTU: usize = 1500;
    /// Largest echo payload accepted: MTU minus IP, ICMP and bookkeeping overhead
    pub const MAX_PAYLOAD_BYTES: usize = MTU - 16 - 20 - 16;
    pub const PAYLOAD_FILL_BYTE: u8 = b'd';

    /// Sequence numbers on the wire are 16 bits wide
    pub const MAX_ICMP_OPERATIONS: u64 = u16::MAX as u64 + 1;

    /// Every operation keeps its result in memory until the session ends
    pub const MAX_SESSION_OPERATIONS: u64 = 10_000_000;

    pub const MAX_COUNT: u32 = 100_000;
    pub const MAX_TIMEOUT_SECS: u64 = 300;

    pub const MIN_IN_FLIGHT: usize = 16;
    pub const MAX_IN_FLIGHT: usize = 256;
}

//! Data models shared by the engine, the statistics and the output layer

pub mod config;
pub mod metrics;
pub mod session;

// Re-export main model types
pub use config::{Config, PortSpec, ProbeConfig};
pub use metrics::{duration_micros, ProbeError, ProbeResult, ProbeTarget};
pub use session::{DnsLookup, InputParams, ResolvedTarget, SessionSummary};

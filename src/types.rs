//! Type definitions shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Command mode, one per subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// ICMP echo against every resolved address
    Ping,
    /// TCP connect against a single port
    Telnet,
    /// TCP connect against a port range
    Nmap,
    /// HTTP request pinned to each resolved address
    Web,
}

impl ProbeMode {
    /// Module name used in banners and JSON output
    pub fn module_name(&self) -> &'static str {
        match self {
            ProbeMode::Ping => "icmp",
            ProbeMode::Telnet => "telnet",
            ProbeMode::Nmap => "nmap",
            ProbeMode::Web => "web",
        }
    }

    /// Transport protocol name reported in input parameters
    pub fn protocol(&self) -> &'static str {
        match self {
            ProbeMode::Ping => "icmp",
            ProbeMode::Telnet | ProbeMode::Nmap | ProbeMode::Web => "tcp",
        }
    }

    /// Which probe strategy serves this mode
    pub fn probe_kind(&self) -> ProbeKind {
        match self {
            ProbeMode::Ping => ProbeKind::IcmpEcho,
            ProbeMode::Telnet | ProbeMode::Nmap => ProbeKind::TcpConnect,
            ProbeMode::Web => ProbeKind::HttpGet,
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_name())
    }
}

/// Probe strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    IcmpEcho,
    TcpConnect,
    HttpGet,
}

/// How operations are consumed from the dispatch queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One operation in flight at a time
    Sequential,
    /// Up to `max_in_flight` operations at a time
    Parallel,
}

impl Default for DispatchMode {
    fn default() -> Self {
        Self::Sequential
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Reply received or connection established
    Success,
    /// The probe failed before its deadline
    Failed,
    /// No reply before the per-probe deadline
    Timeout,
    /// Never dispatched because the session was cancelled
    Cancelled,
}

/// Classification of a per-probe failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeErrorKind {
    Timeout,
    Refused,
    WriteError,
    MalformedReply,
    SocketReadError,
    Unreachable,
    Cancelled,
    Other,
}

impl ProbeErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::Refused => "refused",
            ProbeErrorKind::WriteError => "write-error",
            ProbeErrorKind::MalformedReply => "malformed-reply",
            ProbeErrorKind::SocketReadError => "socket-read-error",
            ProbeErrorKind::Unreachable => "unreachable",
            ProbeErrorKind::Cancelled => "cancelled",
            ProbeErrorKind::Other => "other",
        }
    }

    /// Status a failed result carries for this kind
    pub fn status(&self) -> ProbeStatus {
        match self {
            ProbeErrorKind::Timeout => ProbeStatus::Timeout,
            ProbeErrorKind::Cancelled => ProbeStatus::Cancelled,
            _ => ProbeStatus::Failed,
        }
    }
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

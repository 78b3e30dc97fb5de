//! Probe result data models

use crate::types::{ProbeErrorKind, ProbeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Serde helpers that store a `Duration` as integral microseconds
pub mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_micros)
    }
}

/// Where a single operation is aimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub address: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ProbeTarget {
    pub fn new(address: IpAddr, port: Option<u16>) -> Self {
        Self { address, port }
    }

    pub fn host(address: IpAddr) -> Self {
        Self { address, port: None }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.address, port),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Classified failure attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of exactly one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub address: IpAddr,

    /// Session-wide sequence number; ICMP carries its low 16 bits on the wire
    pub sequence: u32,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<u16>,

    pub success: bool,

    pub status: ProbeStatus,

    #[serde(rename = "sent_unixtime_us", with = "chrono::serde::ts_microseconds")]
    pub sent_at: DateTime<Utc>,

    #[serde(
        rename = "received_unixtime_us",
        with = "chrono::serde::ts_microseconds_option",
        default
    )]
    pub received_at: Option<DateTime<Utc>>,

    /// Round-trip time on success, elapsed time until failure otherwise
    #[serde(rename = "time_taken_us", with = "duration_micros")]
    pub latency: Duration,

    /// Bytes carried by the echo reply
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload_bytes: Option<usize>,

    /// HTTP status for web probes
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status_code: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ProbeError>,
}

impl ProbeResult {
    /// Reply received or connection established after `latency`
    pub fn success(target: &ProbeTarget, sequence: u32, sent_at: DateTime<Utc>, latency: Duration) -> Self {
        let received_at = chrono::Duration::from_std(latency)
            .ok()
            .and_then(|elapsed| sent_at.checked_add_signed(elapsed));

        Self {
            address: target.address,
            sequence,
            port: target.port,
            success: true,
            status: ProbeStatus::Success,
            sent_at,
            received_at,
            latency,
            payload_bytes: None,
            status_code: None,
            error: None,
        }
    }

    /// Probe failed after `elapsed`
    pub fn failed(
        target: &ProbeTarget,
        sequence: u32,
        sent_at: DateTime<Utc>,
        elapsed: Duration,
        kind: ProbeErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            address: target.address,
            sequence,
            port: target.port,
            success: false,
            status: kind.status(),
            sent_at,
            received_at: None,
            latency: elapsed,
            payload_bytes: None,
            status_code: None,
            error: Some(ProbeError::new(kind, message)),
        }
    }

    /// No reply before the per-probe deadline
    pub fn timeout(target: &ProbeTarget, sequence: u32, sent_at: DateTime<Utc>, timeout: Duration) -> Self {
        Self::failed(
            target,
            sequence,
            sent_at,
            timeout,
            ProbeErrorKind::Timeout,
            format!("no response within {:?}", timeout),
        )
    }

    /// Operation never dispatched because the session was cancelled
    pub fn cancelled(target: &ProbeTarget, sequence: u32) -> Self {
        Self::failed(
            target,
            sequence,
            Utc::now(),
            Duration::ZERO,
            ProbeErrorKind::Cancelled,
            "session cancelled before dispatch",
        )
    }

    pub fn with_payload_bytes(mut self, payload_bytes: usize) -> Self {
        self.payload_bytes = Some(payload_bytes);
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn target(&self) -> ProbeTarget {
        ProbeTarget::new(self.address, self.port)
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn was_dispatched(&self) -> bool {
        self.status != ProbeStatus::Cancelled
    }

    pub fn error_kind(&self) -> Option<ProbeErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn target() -> ProbeTarget {
        ProbeTarget::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), Some(22))
    }

    #[test]
    fn test_success_result() {
        let sent = Utc::now();
        let result = ProbeResult::success(&target(), 7, sent, Duration::from_millis(12));

        assert!(result.is_successful());
        assert_eq!(result.status, ProbeStatus::Success);
        assert_eq!(result.sequence, 7);
        assert_eq!(result.port, Some(22));
        assert_eq!(result.received_at, Some(sent + chrono::Duration::milliseconds(12)));
        assert_eq!(result.latency_ms(), 12.0);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_timeout_result() {
        let result = ProbeResult::timeout(&target(), 1, Utc::now(), Duration::from_secs(5));

        assert!(!result.is_successful());
        assert_eq!(result.status, ProbeStatus::Timeout);
        assert_eq!(result.error_kind(), Some(ProbeErrorKind::Timeout));
        assert!(result.received_at.is_none());
        assert!(result.was_dispatched());
    }

    #[test]
    fn test_cancelled_result() {
        let result = ProbeResult::cancelled(&target(), 3);

        assert_eq!(result.status, ProbeStatus::Cancelled);
        assert!(!result.was_dispatched());
        assert_eq!(result.latency, Duration::ZERO);
    }

    #[test]
    fn test_result_json_fields() {
        let result = ProbeResult::success(&target(), 2, Utc::now(), Duration::from_micros(1500))
            .with_status_code(204);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["time_taken_us"], 1500);
        assert_eq!(json["address"], "192.0.2.1");
        assert_eq!(json["status"], "success");
        assert_eq!(json["status_code"], 204);
        assert!(json.get("error").is_none());
        assert!(json["sent_unixtime_us"].is_i64());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(target().to_string(), "192.0.2.1:22");
        let host = ProbeTarget::host(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(host.to_string(), "127.0.0.1");
    }
}

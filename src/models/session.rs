//! Session-level data models: resolved targets and the final summary

use super::config::ProbeConfig;
use super::metrics::{duration_micros, ProbeResult};
use crate::stats::ProbeStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Host name together with its de-duplicated addresses in resolver order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub hostname: String,
    addresses: Vec<IpAddr>,
}

impl ResolvedTarget {
    /// Duplicates are dropped; first occurrence wins
    pub fn new(hostname: impl Into<String>, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut unique: Vec<IpAddr> = Vec::new();
        for address in addresses {
            if !unique.contains(&address) {
                unique.push(address);
            }
        }

        Self {
            hostname: hostname.into(),
            addresses: unique,
        }
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Resolution outcome as reported in the session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsLookup {
    pub hostname: String,
    pub resolved_addresses: Vec<String>,
    pub error: Option<String>,
    pub success: bool,
    #[serde(rename = "time_taken_us", with = "duration_micros")]
    pub time_taken: Duration,
}

impl DnsLookup {
    pub fn resolved(target: &ResolvedTarget, time_taken: Duration) -> Self {
        Self {
            hostname: target.hostname.clone(),
            resolved_addresses: target.addresses().iter().map(|a| a.to_string()).collect(),
            error: None,
            success: true,
            time_taken,
        }
    }

    pub fn failed(hostname: impl Into<String>, error: impl Into<String>, time_taken: Duration) -> Self {
        Self {
            hostname: hostname.into(),
            resolved_addresses: Vec::new(),
            error: Some(error.into()),
            success: false,
            time_taken,
        }
    }
}

/// Echo of the parameters a session ran with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParams {
    pub module_name: String,
    pub sequential: bool,
    pub throttle: bool,
    pub host: String,
    pub from_port: u16,
    pub to_port: u16,
    pub protocol: String,
    pub timeout_ms: u64,
    pub count: u32,
    pub delay_ms: u64,
    pub payload_bytes: usize,
    pub max_in_flight: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

impl From<&ProbeConfig> for InputParams {
    fn from(config: &ProbeConfig) -> Self {
        let (from_port, to_port) = config.ports.bounds();
        Self {
            module_name: config.mode.module_name().to_string(),
            sequential: config.dispatch == crate::types::DispatchMode::Sequential,
            throttle: config.throttle,
            host: config.host.clone(),
            from_port,
            to_port,
            protocol: config.mode.protocol().to_string(),
            timeout_ms: config.timeout.as_millis() as u64,
            count: config.count,
            delay_ms: config.delay.as_millis() as u64,
            payload_bytes: config.payload_bytes,
            max_in_flight: config.max_in_flight,
            url: config.url.clone(),
        }
    }
}

/// Everything a finished session produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub input_params: InputParams,
    pub module_name: String,
    pub dns_lookup: DnsLookup,
    /// Ordered by sequence number
    pub results: Vec<ProbeResult>,
    pub stats: ProbeStats,
    #[serde(rename = "start_time_unixtime_us", with = "chrono::serde::ts_microseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "end_time_unixtime_us", with = "chrono::serde::ts_microseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "total_time_taken_us", with = "duration_micros")]
    pub total_time: Duration,
    /// Session-fatal error, if any
    pub error: Option<String>,
    pub cancelled: bool,
    /// Process exit code of the fatal error that ended the session early
    #[serde(skip)]
    pub fatal_exit_code: Option<i32>,
}

impl SessionSummary {
    /// True when the session stopped before dispatching anything
    pub fn is_fatal(&self) -> bool {
        self.error.is_some() && self.stats.attempted == 0
    }

    pub fn has_success(&self) -> bool {
        self.stats.succeeded > 0
    }

    /// 0 with at least one success, 1 on total loss, the error's code when
    /// the session never probed
    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.fatal_exit_code {
            return code;
        }
        if self.has_success() {
            0
        } else if self.cancelled && self.stats.attempted == 0 {
            130
        } else {
            1
        }
    }

    pub fn successful_results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.is_successful())
    }
}

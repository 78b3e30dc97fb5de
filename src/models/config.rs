//! Configuration data model and validation

use crate::defaults;
use crate::types::{AppError, DispatchMode, ProbeMode, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ports probed per address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSpec {
    /// ICMP and web probes carry no port dimension
    None,
    Single(u16),
    /// Inclusive range
    Range { from: u16, to: u16 },
}

impl PortSpec {
    /// Number of operations each (iteration, address) pair expands into
    pub fn len(&self) -> usize {
        match *self {
            PortSpec::None | PortSpec::Single(_) => 1,
            PortSpec::Range { from, to } if from <= to => (to - from) as usize + 1,
            PortSpec::Range { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ports in dispatch order; `None` stands for the single portless probe
    pub fn ports(&self) -> Vec<Option<u16>> {
        match *self {
            PortSpec::None => vec![None],
            PortSpec::Single(port) => vec![Some(port)],
            PortSpec::Range { from, to } => (from..=to).map(Some).collect(),
        }
    }

    /// (from, to) as reported in input parameters
    pub fn bounds(&self) -> (u16, u16) {
        match *self {
            PortSpec::None => (0, 0),
            PortSpec::Single(port) => (port, port),
            PortSpec::Range { from, to } => (from, to),
        }
    }
}

/// Immutable per-session probe parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub mode: ProbeMode,
    /// Host name or IPv4 literal to resolve
    pub host: String,
    pub ports: PortSpec,
    /// Request URL for web mode
    pub url: Option<String>,
    pub count: u32,
    pub timeout: Duration,
    pub delay: Duration,
    pub throttle: bool,
    pub dispatch: DispatchMode,
    pub max_in_flight: usize,
    pub payload_bytes: usize,
    pub resolve_timeout: Duration,
    pub session_deadline: Option<Duration>,
}

impl ProbeConfig {
    fn with_mode(mode: ProbeMode, host: impl Into<String>, ports: PortSpec) -> Self {
        Self {
            mode,
            host: host.into(),
            ports,
            url: None,
            count: defaults::DEFAULT_COUNT,
            timeout: defaults::DEFAULT_TIMEOUT,
            delay: Duration::from_millis(defaults::DEFAULT_DELAY_MS),
            throttle: defaults::DEFAULT_THROTTLE,
            dispatch: DispatchMode::Sequential,
            max_in_flight: 1,
            payload_bytes: defaults::DEFAULT_PAYLOAD_BYTES,
            resolve_timeout: defaults::DEFAULT_RESOLVE_TIMEOUT,
            session_deadline: None,
        }
    }

    /// ICMP echo session against every address of `host`
    pub fn ping(host: impl Into<String>) -> Self {
        Self::with_mode(ProbeMode::Ping, host, PortSpec::None)
    }

    /// Repeated TCP connect to a single port
    pub fn telnet(host: impl Into<String>, port: u16) -> Self {
        Self::with_mode(ProbeMode::Telnet, host, PortSpec::Single(port))
    }

    /// TCP connect scan over an inclusive port range
    pub fn nmap(host: impl Into<String>, from: u16, to: u16) -> Self {
        Self::with_mode(ProbeMode::Nmap, host, PortSpec::Range { from, to })
    }

    /// HTTP request against `url`, pinned to each resolved address of its host
    pub fn web(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::config(format!("URL has no host: {}", url)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| AppError::config(format!("URL has no known port: {}", url)))?;

        let mut config = Self::with_mode(ProbeMode::Web, host, PortSpec::Single(port));
        config.url = Some(parsed.to_string());
        Ok(config)
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sequential dispatch forces a single in-flight probe
    pub fn with_dispatch(mut self, dispatch: DispatchMode, max_in_flight: usize) -> Self {
        self.dispatch = dispatch;
        self.max_in_flight = match dispatch {
            DispatchMode::Sequential => 1,
            DispatchMode::Parallel => max_in_flight,
        };
        self
    }

    pub fn with_payload_bytes(mut self, payload_bytes: usize) -> Self {
        self.payload_bytes = payload_bytes;
        self
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    pub fn with_session_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.session_deadline = deadline;
        self
    }

    /// Operations each resolved address expands into
    pub fn operations_per_address(&self) -> u64 {
        self.count as u64 * self.ports.len() as u64
    }

    /// Total operations for `address_count` resolved addresses
    pub fn requested_operations(&self, address_count: usize) -> u64 {
        self.operations_per_address() * address_count as u64
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(AppError::config("Host cannot be empty"));
        }

        if self.count == 0 {
            return Err(AppError::config("Count must be greater than 0"));
        }

        if self.count > defaults::MAX_COUNT {
            return Err(AppError::config(format!("Count cannot exceed {}", defaults::MAX_COUNT)));
        }

        if self.timeout.is_zero() {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout.as_secs() > defaults::MAX_TIMEOUT_SECS {
            return Err(AppError::config(format!(
                "Timeout cannot exceed {} seconds",
                defaults::MAX_TIMEOUT_SECS
            )));
        }

        if self.resolve_timeout.is_zero() {
            return Err(AppError::config("Resolve timeout must be greater than 0"));
        }

        if self.max_in_flight == 0 {
            return Err(AppError::config("Max in-flight probes must be greater than 0"));
        }

        if self.dispatch == DispatchMode::Sequential && self.max_in_flight != 1 {
            return Err(AppError::config("Sequential dispatch allows exactly one probe in flight"));
        }

        match (self.mode, self.ports) {
            (ProbeMode::Ping, PortSpec::None) => {
                if self.payload_bytes > defaults::MAX_PAYLOAD_BYTES {
                    return Err(AppError::config(format!(
                        "Payload of {} bytes exceeds the maximum of {} bytes",
                        self.payload_bytes,
                        defaults::MAX_PAYLOAD_BYTES
                    )));
                }
            }
            (ProbeMode::Telnet, PortSpec::Single(port)) | (ProbeMode::Web, PortSpec::Single(port)) => {
                if port == 0 {
                    return Err(AppError::config("Port must be between 1 and 65535"));
                }
            }
            (ProbeMode::Nmap, PortSpec::Range { from, to }) => {
                if from == 0 {
                    return Err(AppError::config("Port range must start at 1 or above"));
                }
                if from > to {
                    return Err(AppError::config(format!(
                        "Invalid port range: from port {} is greater than to port {}",
                        from, to
                    )));
                }
            }
            (mode, ports) => {
                return Err(AppError::config(format!(
                    "Port specification {:?} does not fit {} mode",
                    ports, mode
                )));
            }
        }

        if self.mode == ProbeMode::Web && self.url.is_none() {
            return Err(AppError::config("Web mode requires a URL"));
        }

        Ok(())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_mode")]
    pub mode: ProbeMode,

    /// Host name or address to probe
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for telnet mode
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default = "default_from_port")]
    pub from_port: u16,

    #[serde(default = "default_to_port")]
    pub to_port: u16,

    /// URL for web mode
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_payload_bytes")]
    pub payload_bytes: usize,

    #[serde(default)]
    pub throttle: bool,

    #[serde(default)]
    pub parallel: bool,

    /// Explicit in-flight bound; detected from the host when unset
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// Session-wide deadline in seconds
    #[serde(default)]
    pub deadline_seconds: Option<u64>,

    #[serde(default)]
    pub json_output: bool,

    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            host: default_host(),
            port: None,
            from_port: default_from_port(),
            to_port: default_to_port(),
            url: None,
            count: default_count(),
            timeout_seconds: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            payload_bytes: default_payload_bytes(),
            throttle: false,
            parallel: false,
            max_in_flight: None,
            resolve_timeout_ms: default_resolve_timeout_ms(),
            deadline_seconds: None,
            json_output: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// In-flight bound the session will run with
    pub fn effective_max_in_flight(&self) -> usize {
        if !self.parallel {
            return 1;
        }
        self.max_in_flight
            .unwrap_or_else(|| crate::executor::SystemResources::detect().optimal_in_flight)
    }

    /// Build the immutable probe parameters for a session
    pub fn probe_config(&self) -> Result<ProbeConfig> {
        let base = match self.mode {
            ProbeMode::Ping => ProbeConfig::ping(self.host.clone()),
            ProbeMode::Telnet => {
                let port = self
                    .port
                    .ok_or_else(|| AppError::config("Telnet mode requires a port"))?;
                ProbeConfig::telnet(self.host.clone(), port)
            }
            ProbeMode::Nmap => ProbeConfig::nmap(self.host.clone(), self.from_port, self.to_port),
            ProbeMode::Web => {
                let url = self
                    .url
                    .as_deref()
                    .ok_or_else(|| AppError::config("Web mode requires a URL"))?;
                ProbeConfig::web(url)?
            }
        };

        let dispatch = if self.parallel {
            DispatchMode::Parallel
        } else {
            DispatchMode::Sequential
        };

        let config = base
            .with_count(self.count)
            .with_timeout(self.timeout())
            .with_delay(Duration::from_millis(self.delay_ms))
            .with_throttle(self.throttle)
            .with_dispatch(dispatch, self.effective_max_in_flight())
            .with_payload_bytes(self.payload_bytes)
            .with_resolve_timeout(Duration::from_millis(self.resolve_timeout_ms))
            .with_session_deadline(self.deadline_seconds.map(Duration::from_secs));

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.max_in_flight {
            return Err(AppError::config("Max in-flight probes must be greater than 0"));
        }

        if let Some(0) = self.deadline_seconds {
            return Err(AppError::config("Session deadline must be greater than 0"));
        }

        self.probe_config().map(|_| ())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(count) = std::env::var("PROBE_COUNT") {
            self.count = count
                .parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_COUNT value '{}': {}", count, e)))?;
        }

        if let Ok(timeout) = std::env::var("PROBE_TIMEOUT_SECONDS") {
            self.timeout_seconds = timeout.parse().map_err(|e| {
                AppError::config(format!("Invalid PROBE_TIMEOUT_SECONDS value '{}': {}", timeout, e))
            })?;
        }

        if let Ok(delay) = std::env::var("PROBE_DELAY_MS") {
            self.delay_ms = delay
                .parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_DELAY_MS value '{}': {}", delay, e)))?;
        }

        if let Ok(payload) = std::env::var("PROBE_PAYLOAD_BYTES") {
            self.payload_bytes = payload.parse().map_err(|e| {
                AppError::config(format!("Invalid PROBE_PAYLOAD_BYTES value '{}': {}", payload, e))
            })?;
        }

        if let Ok(throttle) = std::env::var("PROBE_THROTTLE") {
            self.throttle = throttle.parse().map_err(|e| {
                AppError::config(format!("Invalid PROBE_THROTTLE value '{}': {}", throttle, e))
            })?;
        }

        if let Ok(parallel) = std::env::var("PROBE_PARALLEL") {
            self.parallel = parallel.parse().map_err(|e| {
                AppError::config(format!("Invalid PROBE_PARALLEL value '{}': {}", parallel, e))
            })?;
        }

        if let Ok(max_in_flight) = std::env::var("PROBE_MAX_IN_FLIGHT") {
            self.max_in_flight = Some(max_in_flight.parse().map_err(|e| {
                AppError::config(format!("Invalid PROBE_MAX_IN_FLIGHT value '{}': {}", max_in_flight, e))
            })?);
        }

        if let Ok(resolve_timeout) = std::env::var("PROBE_RESOLVE_TIMEOUT_MS") {
            self.resolve_timeout_ms = resolve_timeout.parse().map_err(|e| {
                AppError::config(format!(
                    "Invalid PROBE_RESOLVE_TIMEOUT_MS value '{}': {}",
                    resolve_timeout, e
                ))
            })?;
        }

        if let Ok(deadline) = std::env::var("PROBE_DEADLINE_SECONDS") {
            self.deadline_seconds = Some(deadline.parse().map_err(|e| {
                AppError::config(format!("Invalid PROBE_DEADLINE_SECONDS value '{}': {}", deadline, e))
            })?);
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.parse().map_err(|e| {
                AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e))
            })?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_mode() -> ProbeMode {
    ProbeMode::Ping
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_from_port() -> u16 {
    defaults::DEFAULT_FROM_PORT
}

fn default_to_port() -> u16 {
    defaults::DEFAULT_TO_PORT
}

fn default_count() -> u32 {
    defaults::DEFAULT_COUNT
}

fn default_timeout_secs() -> u64 {
    defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_delay_ms() -> u64 {
    defaults::DEFAULT_DELAY_MS
}

fn default_payload_bytes() -> usize {
    defaults::DEFAULT_PAYLOAD_BYTES
}

fn default_resolve_timeout_ms() -> u64 {
    defaults::DEFAULT_RESOLVE_TIMEOUT.as_millis() as u64
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.count, 1);
        assert_eq!(config.timeout_seconds, 5);
        assert_eq!(config.delay_ms, 1000);
        assert_eq!(config.payload_bytes, 4);
        assert_eq!(config.from_port, 1);
        assert_eq!(config.to_port, 80);
    }

    #[test]
    fn test_port_spec_expansion() {
        assert_eq!(PortSpec::None.ports(), vec![None]);
        assert_eq!(PortSpec::Single(22).len(), 1);

        let range = PortSpec::Range { from: 20, to: 25 };
        assert_eq!(range.len(), 6);
        assert_eq!(range.ports().first(), Some(&Some(20)));
        assert_eq!(range.ports().last(), Some(&Some(25)));
        assert_eq!(range.bounds(), (20, 25));

        assert!(PortSpec::Range { from: 9, to: 3 }.is_empty());
    }

    #[test]
    fn test_requested_operations() {
        let config = ProbeConfig::nmap("example.com", 1, 80).with_count(3);
        assert_eq!(config.operations_per_address(), 240);
        assert_eq!(config.requested_operations(2), 480);
        assert_eq!(config.requested_operations(0), 0);
    }

    #[test]
    fn test_zero_count_invalid() {
        let config = ProbeConfig::ping("example.com").with_count(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_payload_limit() {
        let at_limit = ProbeConfig::ping("example.com").with_payload_bytes(defaults::MAX_PAYLOAD_BYTES);
        assert!(at_limit.validate().is_ok());

        let over = ProbeConfig::ping("example.com").with_payload_bytes(defaults::MAX_PAYLOAD_BYTES + 1);
        let error = over.validate().unwrap_err();
        assert!(error.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn test_inverted_port_range_invalid() {
        let config = ProbeConfig::nmap("example.com", 80, 20);
        assert!(config.validate().is_err());

        let config = ProbeConfig::nmap("example.com", 0, 20);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sequential_forces_single_in_flight() {
        let config = ProbeConfig::ping("example.com").with_dispatch(DispatchMode::Sequential, 64);
        assert_eq!(config.max_in_flight, 1);

        let config = ProbeConfig::ping("example.com").with_dispatch(DispatchMode::Parallel, 64);
        assert_eq!(config.max_in_flight, 64);
    }

    #[test]
    fn test_web_config_from_url() {
        let config = ProbeConfig::web("https://example.com/health").unwrap();
        assert_eq!(config.host, "example.com");
        assert_eq!(config.ports, PortSpec::Single(443));
        assert_eq!(config.url.as_deref(), Some("https://example.com/health"));

        let config = ProbeConfig::web("http://127.0.0.1:8080/").unwrap();
        assert_eq!(config.ports, PortSpec::Single(8080));

        assert!(ProbeConfig::web("not a url").is_err());
    }

    #[test]
    fn test_config_to_probe_config() {
        let config = Config {
            mode: ProbeMode::Nmap,
            host: "scanme.example".to_string(),
            from_port: 20,
            to_port: 25,
            count: 2,
            delay_ms: 0,
            parallel: true,
            max_in_flight: Some(8),
            ..Default::default()
        };

        let probe = config.probe_config().unwrap();
        assert_eq!(probe.mode, ProbeMode::Nmap);
        assert_eq!(probe.ports, PortSpec::Range { from: 20, to: 25 });
        assert_eq!(probe.dispatch, DispatchMode::Parallel);
        assert_eq!(probe.max_in_flight, 8);
        assert_eq!(probe.delay, Duration::ZERO);
        assert_eq!(probe.requested_operations(1), 12);
    }

    #[test]
    fn test_telnet_requires_port() {
        let config = Config {
            mode: ProbeMode::Telnet,
            port: None,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_in_flight_invalid() {
        let config = Config {
            parallel: true,
            max_in_flight: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

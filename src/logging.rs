//! Structured logging for probe sessions
//!
//! This module provides:
//! - Leveled, structured log entries with JSON fields
//! - Console, JSON and compact output formats
//! - Session correlation through a per-session UUID
//! - A probe-domain logger for resolution, dispatch and results

use crate::error::{AppError, Result};
use crate::models::{Config, ProbeResult, ProbeTarget, ResolvedTarget};
use crate::stats::ProbeStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Nothing is written at this level
    Off = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Off => "OFF",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Off => "",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "OFF" => Ok(LogLevel::Off),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// One JSON object per line
    Json,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger with configurable level, format and shared session context
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            format: LogFormat::Console,
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// debug: Debug + JSON + location, verbose: Info, otherwise Warn
    pub fn with_config(name: impl Into<String>, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name: name.into(),
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Logger that writes nothing
    pub fn disabled(name: impl Into<String>) -> Self {
        let mut logger = Self::new(name);
        logger.min_level = LogLevel::Off;
        logger
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub async fn set_session_id(&self, session_id: String) {
        self.context.write().await.session_id = Some(session_id);
    }

    /// Add context field for all subsequent log entries
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.context.write().await.context_fields.insert(key, json_value);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        self.min_level != LogLevel::Off && level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry
                .fields
                .insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = self.format_entry(&entry);

        // Warnings and errors go to stderr so stdout stays parseable
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn format_entry(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
            LogFormat::Compact => self.format_compact(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        serde_json::to_string(entry).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": {:?}}}",
                entry.message
            )
        })
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Attach the outcome of one probe
    pub fn probe_result(self, result: &ProbeResult) -> Self {
        let builder = self
            .field("address", result.address.to_string())
            .field("sequence", result.sequence)
            .field("success", result.success)
            .field("latency_us", result.latency.as_micros() as u64);

        let builder = match result.port {
            Some(port) => builder.field("port", port),
            None => builder,
        };

        match &result.error {
            Some(error) => builder.field("error_kind", error.kind).field("error", &error.message),
            None => builder,
        }
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for the probe engine's lifecycle events
#[derive(Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(config: &Config) -> Self {
        Self::from_logger(Logger::with_config("PROBE", config))
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn disabled() -> Self {
        Self::from_logger(Logger::disabled("PROBE"))
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn log_resolution(&self, target: &ResolvedTarget, duration: Duration) {
        self.logger
            .info(&format!("Resolved {} to {} addresses", target.hostname, target.len()))
            .field("hostname", &target.hostname)
            .field(
                "addresses",
                target.addresses().iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            )
            .field("duration_us", duration.as_micros() as u64)
            .log()
            .await;
    }

    pub async fn log_resolution_failure(&self, hostname: &str, error: &AppError, duration: Duration) {
        self.logger
            .error(&format!("Resolution failed for {}", hostname))
            .field("hostname", hostname)
            .field("duration_us", duration.as_micros() as u64)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn log_session_start(&self, mode: &str, requested: u64, max_in_flight: usize) {
        self.logger
            .info(&format!("Starting {} session with {} operations", mode, requested))
            .field("mode", mode)
            .field("requested", requested)
            .field("max_in_flight", max_in_flight)
            .log()
            .await;
    }

    pub async fn log_transport(&self, transport: &str, identifier: u16) {
        self.logger
            .debug(&format!("ICMP transport selected: {} (identifier {:#06x})", transport, identifier))
            .field("transport", transport)
            .field("identifier", identifier)
            .log()
            .await;
    }

    pub async fn log_dispatch(&self, target: &ProbeTarget, sequence: u32, delay: Duration) {
        self.logger
            .debug(&format!("Dispatching probe #{} to {}", sequence, target))
            .field("sequence", sequence)
            .field("delay_ms", delay.as_millis() as u64)
            .log()
            .await;
    }

    pub async fn log_result(&self, result: &ProbeResult) {
        let message = if result.success {
            format!("Probe #{} to {} succeeded", result.sequence, result.target())
        } else {
            format!("Probe #{} to {} failed", result.sequence, result.target())
        };
        self.logger.debug(&message).probe_result(result).log().await;
    }

    /// Packets the reader dropped without attributing them
    pub async fn log_discarded(&self, reason: &str, source: std::net::IpAddr) {
        self.logger
            .trace(&format!("Discarded inbound packet: {}", reason))
            .field("source", source.to_string())
            .log()
            .await;
    }

    pub async fn log_socket_error(&self, error: &io::Error, outstanding: usize) {
        self.logger
            .warn(&format!("ICMP socket read failed: {}", error))
            .field("outstanding", outstanding)
            .log()
            .await;
    }

    pub async fn log_cancelled(&self, reason: &str, undispatched: u64) {
        self.logger
            .warn(&format!("Session cancelled: {}", reason))
            .field("undispatched", undispatched)
            .log()
            .await;
    }

    pub async fn log_summary(&self, stats: &ProbeStats) {
        self.logger
            .info(&format!(
                "Session finished: {}/{} succeeded",
                stats.succeeded, stats.requested
            ))
            .field("requested", stats.requested)
            .field("attempted", stats.attempted)
            .field("succeeded", stats.succeeded)
            .field("loss", stats.loss)
            .field("success_percent", stats.success_percent)
            .field("total_time_us", stats.total_time.as_micros() as u64)
            .log()
            .await;
    }
}

/// Creates loggers that share one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name, &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_probe_logger(&self) -> ProbeLogger {
        ProbeLogger::from_logger(self.create_logger("PROBE").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Error < LogLevel::Off);
    }

    #[test]
    fn test_logger_with_config() {
        let config = Config {
            debug: true,
            enable_color: false,
            ..Default::default()
        };
        let logger = Logger::with_config("TEST", &config);
        assert_eq!(logger.min_level, LogLevel::Debug);
        assert_eq!(logger.format, LogFormat::Json);
        assert!(logger.include_location);

        let quiet = Logger::with_config("TEST", &Config::default());
        assert_eq!(quiet.min_level, LogLevel::Warn);
    }

    #[test]
    fn test_would_log() {
        let mut logger = Logger::new("TEST");
        logger.set_level(LogLevel::Warn);
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Error));

        let disabled = Logger::disabled("TEST");
        assert!(!disabled.would_log(LogLevel::Error));
    }

    #[tokio::test]
    async fn test_session_id_management() {
        let logger = Logger::new("TEST");
        logger.set_session_id("session-1".to_string()).await;
        let context = logger.context.read().await;
        assert_eq!(context.session_id.as_deref(), Some("session-1"));
    }

    #[test]
    fn test_console_format() {
        let mut logger = Logger::new("PROBE");
        logger.set_color(false);

        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: "hello".to_string(),
            logger: "PROBE".to_string(),
            correlation_id: Some("0123456789abcdef".to_string()),
            fields: HashMap::from([("b".to_string(), serde_json::json!(2)), ("a".to_string(), serde_json::json!(1))]),
            location: None,
        };

        let output = logger.format_entry(&entry);
        assert!(output.contains(" INFO [PROBE] hello [01234567]"));
        assert!(output.ends_with("{a=1, b=2}"));

        logger.set_format(LogFormat::Compact);
        assert!(logger.format_entry(&entry).ends_with("I PROBE: hello"));

        logger.set_format(LogFormat::Json);
        let json: serde_json::Value = serde_json::from_str(&logger.format_entry(&entry)).unwrap();
        assert_eq!(json["message"], "hello");
    }

    #[tokio::test]
    async fn test_probe_logger_events() {
        let logger = ProbeLogger::disabled();
        let target = ProbeTarget::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Some(22));
        let result = ProbeResult::timeout(&target, 0, Utc::now(), Duration::from_secs(1));

        logger.log_dispatch(&target, 0, Duration::ZERO).await;
        logger.log_result(&result).await;
        logger.log_transport("scripted", 0x1234).await;
    }

    #[tokio::test]
    async fn test_logging_macros_respect_level() {
        let mut logger = Logger::new("APP");
        logger.set_level(LogLevel::Off);
        crate::log_debug!(logger, "debug {}", 1);
        crate::log_info!(logger, "info {}", 2);
        crate::log_warn!(logger, "warn {}", 3);
        crate::log_error!(logger, "error {}", 4);
        assert!(!logger.would_log(LogLevel::Error));

        logger.set_level(LogLevel::Warn);
        assert!(logger.would_log(LogLevel::Error));
        assert!(!logger.would_log(LogLevel::Info));
    }

    #[tokio::test]
    async fn test_logger_factory() {
        let factory = LoggerFactory::new(Config::default());
        let logger = factory.create_probe_logger().await;
        assert_eq!(logger.logger().name(), "PROBE");
        assert!(Uuid::parse_str(factory.session_id()).is_ok());

        let context = logger.logger().context.read().await;
        assert_eq!(context.session_id.as_deref(), Some(factory.session_id()));
    }
}

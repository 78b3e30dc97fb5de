//! Error handling for the probe engine
//!
//! Session-fatal conditions (bad configuration, resolution failure, socket
//! setup failure) are `AppError`s. Per-probe failures never surface here:
//! they are recorded on the individual `ProbeResult` instead.

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input that passed parsing but breaks a constraint
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parsing errors (numbers, addresses, URLs, JSON)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Hostname could not be resolved
    #[error("DNS resolution error: {0}")]
    DnsResolution(String),

    /// The probe socket could not be opened or configured
    #[error("Socket setup error: {0}")]
    SocketSetup(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP client errors (web mode only)
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Probe execution errors
    #[error("Probe error: {0}")]
    Probe(String),

    /// Session cancelled by the user or by the session deadline
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new DNS resolution error
    pub fn dns_resolution<S: Into<String>>(message: S) -> Self {
        Self::DnsResolution(message.into())
    }

    /// Create a new socket setup error
    pub fn socket_setup<S: Into<String>>(message: S) -> Self {
        Self::SocketSetup(message.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    /// Create a new HTTP request error
    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new probe error
    pub fn probe<S: Into<String>>(message: S) -> Self {
        Self::Probe(message.into())
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Same error kind with `context` prepended to its message
    pub fn with_prefix(self, context: &str) -> Self {
        let prefix = |message: String| format!("{}: {}", context, message);
        match self {
            Self::Config(m) => Self::Config(prefix(m)),
            Self::Validation(m) => Self::Validation(prefix(m)),
            Self::Parse(m) => Self::Parse(prefix(m)),
            Self::DnsResolution(m) => Self::DnsResolution(prefix(m)),
            Self::SocketSetup(m) => Self::SocketSetup(prefix(m)),
            Self::Network(m) => Self::Network(prefix(m)),
            Self::HttpRequest(m) => Self::HttpRequest(prefix(m)),
            Self::Timeout(m) => Self::Timeout(prefix(m)),
            Self::Io(m) => Self::Io(prefix(m)),
            Self::Probe(m) => Self::Probe(prefix(m)),
            Self::Cancelled(m) => Self::Cancelled(prefix(m)),
            Self::Internal(m) => Self::Internal(prefix(m)),
        }
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::DnsResolution(_) => "DNS",
            Self::SocketSetup(_) => "SOCKET",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO",
            Self::Probe(_) => "PROBE",
            Self::Cancelled(_) => "CANCELLED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recoverable (running again may succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_) | Self::DnsResolution(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::SocketSetup(_) => false,
            Self::Io(_) | Self::Probe(_) | Self::Cancelled(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your .env file or command line arguments.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid input: {}\n\nSuggestion: Reduce --count or the port range, or check the host and port values.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse input: {}\n\nSuggestion: Check the format of numbers, ports and addresses.", msg)
            }
            Self::DnsResolution(msg) => {
                format!("DNS resolution failed: {}\n\nSuggestion: Check that the host name exists, or pass an IPv4 address directly.", msg)
            }
            Self::SocketSetup(msg) => {
                format!("Could not open probe socket: {}\n\nSuggestion: ICMP needs either net.ipv4.ping_group_range to include your group or raw socket privileges (root or CAP_NET_RAW).", msg)
            }
            Self::Network(msg) => {
                format!("Network connectivity issue: {}\n\nSuggestion: Check your network connection and try again.", msg)
            }
            Self::HttpRequest(msg) => {
                format!("HTTP request failed: {}\n\nSuggestion: Check the URL and that the server accepts requests.", msg)
            }
            Self::Timeout(msg) => {
                format!("Operation timed out: {}\n\nSuggestion: Increase the timeout value using --timeout or --resolve-timeout.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and disk space.", msg)
            }
            Self::Probe(msg) => {
                format!("Probe execution failed: {}\n\nSuggestion: This may be a temporary issue. Try running the probe again.", msg)
            }
            Self::Cancelled(msg) => {
                format!("Session cancelled: {}\n\nSuggestion: Raise --deadline if the session needs more time.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::DnsResolution(_) | Self::HttpRequest(_) => 2,
            Self::Timeout(_) => 3,
            Self::SocketSetup(_) => 4,
            Self::Io(_) => 5,
            Self::Probe(_) => 6,
            Self::Cancelled(_) => 130,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Network(_) | Self::DnsResolution(_) | Self::HttpRequest(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) | Self::Cancelled(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::SocketSetup(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Io(_) | Self::Probe(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<trust_dns_resolver::error::ResolveError> for AppError {
    fn from(error: trust_dns_resolver::error::ResolveError) -> Self {
        Self::dns_resolution(error.to_string())
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("IP address parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Probe task failed: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error
    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_prefix(&f()))
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Error reporter for user-facing error output
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Render an error the way `report_error` prints it
    pub fn render(&self, error: &AppError) -> String {
        let mut output = error.format_for_console(self.use_color);

        if self.verbose {
            output.push_str("\n\n");
            output.push_str(&error.user_friendly_message());

            if error.is_recoverable() {
                let hint = "This error might be temporary. You can try running the command again.";
                output.push_str("\n\n");
                if self.use_color {
                    use colored::Colorize;
                    output.push_str(&hint.green().to_string());
                } else {
                    output.push_str(hint);
                }
            }
        }

        output
    }

    /// Report an error to the user on stderr
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let dns_error = AppError::dns_resolution("no such host");
        assert_eq!(dns_error.category(), "DNS");
        assert!(dns_error.is_recoverable());
        assert_eq!(dns_error.exit_code(), 2);
    }

    #[test]
    fn test_error_display() {
        let error = AppError::socket_setup("permission denied");
        let display = error.to_string();
        assert!(display.contains("Socket setup error"));
        assert!(display.contains("permission denied"));
    }

    #[test]
    fn test_error_categories() {
        let errors = [
            AppError::config("config"),
            AppError::validation("validation"),
            AppError::parse("parse"),
            AppError::dns_resolution("dns"),
            AppError::socket_setup("socket"),
            AppError::network("network"),
            AppError::http_request("http"),
            AppError::timeout("timeout"),
            AppError::io("io"),
            AppError::probe("probe"),
            AppError::cancelled("cancelled"),
            AppError::internal("internal"),
        ];

        let expected_categories = [
            "CONFIG", "VALIDATION", "PARSE", "DNS", "SOCKET", "NETWORK",
            "HTTP", "TIMEOUT", "IO", "PROBE", "CANCELLED", "INTERNAL",
        ];

        for (error, expected) in errors.iter().zip(expected_categories.iter()) {
            assert_eq!(error.category(), *expected);
        }
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(AppError::network("test").is_recoverable());
        assert!(AppError::timeout("test").is_recoverable());
        assert!(AppError::dns_resolution("test").is_recoverable());

        assert!(!AppError::config("test").is_recoverable());
        assert!(!AppError::socket_setup("test").is_recoverable());
        assert!(!AppError::cancelled("test").is_recoverable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::config("test").exit_code(), 1);
        assert_eq!(AppError::dns_resolution("test").exit_code(), 2);
        assert_eq!(AppError::timeout("test").exit_code(), 3);
        assert_eq!(AppError::socket_setup("test").exit_code(), 4);
        assert_eq!(AppError::io("test").exit_code(), 5);
        assert_eq!(AppError::probe("test").exit_code(), 6);
        assert_eq!(AppError::cancelled("test").exit_code(), 130);
        assert_eq!(AppError::internal("test").exit_code(), 99);
    }

    #[test]
    fn test_user_friendly_messages() {
        let error = AppError::socket_setup("Operation not permitted");
        let message = error.user_friendly_message();
        assert!(message.contains("Could not open probe socket"));
        assert!(message.contains("Suggestion:"));
        assert!(message.contains("ping_group_range"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "not_a_number".parse::<u16>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let addr_error = "not-an-ip".parse::<std::net::IpAddr>().unwrap_err();
        let app_error: AppError = addr_error.into();
        assert!(app_error.to_string().contains("IP address parse error"));
    }

    #[test]
    fn test_url_and_dotenv_conversions() {
        let url_error = url::Url::parse("not a url").unwrap_err();
        let app_error: AppError = url_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let dotenv_error = dotenv::Error::LineParse(".env".to_string(), 1);
        let app_error: AppError = dotenv_error.into();
        assert_eq!(app_error.category(), "CONFIG");
        assert!(app_error.to_string().contains("Environment file error"));
    }

    #[test]
    fn test_error_context_trait() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));

        let error = result.context("While opening ICMP socket").unwrap_err();
        assert_eq!(error.category(), "IO");
        assert!(error.to_string().contains("While opening ICMP socket"));
        assert!(error.to_string().contains("denied"));
    }

    #[test]
    fn test_context_keeps_error_kind() {
        let result: Result<()> = Err(AppError::config("PROBE_COUNT must be at least 1"));
        let error = result.with_context(|| "Reading .env".to_string()).unwrap_err();
        assert_eq!(error.category(), "CONFIG");
        assert_eq!(error.exit_code(), AppError::config("x").exit_code());
        assert!(error.to_string().contains("Reading .env: PROBE_COUNT must be at least 1"));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::config("Test error");
        let plain = error.format_for_console(false);
        assert_eq!(plain, "[CONFIG] Configuration error: Test error");

        let colored = error.format_for_console(true);
        assert!(colored.contains("CONFIG"));
        assert!(colored.contains("Test error"));
    }

    #[test]
    fn test_error_reporter_render() {
        let reporter = ErrorReporter::new(false, true);
        let rendered = reporter.render(&AppError::timeout("resolve took too long"));
        assert!(rendered.starts_with("[TIMEOUT]"));
        assert!(rendered.contains("Suggestion:"));
        assert!(rendered.contains("might be temporary"));

        let terse = ErrorReporter::new(false, false).render(&AppError::config("bad"));
        assert_eq!(terse, "[CONFIG] Configuration error: bad");
    }

    #[test]
    fn test_anyhow_integration() {
        let app_error: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(app_error.category(), "INTERNAL");

        let wrapped = anyhow::anyhow!(AppError::config("Test config error"));
        assert!(wrapped.to_string().contains("Configuration error"));
    }
}

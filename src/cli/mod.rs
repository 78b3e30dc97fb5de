//! Command-line interface

pub mod help;

pub use help::HelpSystem;

use crate::types::ProbeMode;
use clap::{Parser, Subcommand};

/// Network Probe - ICMP echo, TCP connect and HTTP reachability probing
#[derive(Parser, Debug, Clone)]
#[command(name = "nprobe")]
#[command(version, long_version = crate::LONG_VERSION, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Number of probe iterations per address and port
    #[arg(short, long, global = true)]
    pub count: Option<u32>,

    /// Per-probe timeout in seconds
    #[arg(short, long, global = true, value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Delay before each probe in milliseconds
    #[arg(short, long, global = true)]
    pub delay: Option<u64>,

    /// ICMP echo payload size in bytes
    #[arg(short, long, global = true)]
    pub payload: Option<usize>,

    /// Replace the fixed delay with a random one in [0, 10000) ms
    #[arg(long, global = true)]
    pub throttle: bool,

    /// Run probes concurrently instead of one at a time
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Upper bound on concurrent probes in parallel mode
    #[arg(long, global = true, value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Stop dispatching new probes after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub deadline: Option<u64>,

    /// Hostname resolution timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub resolve_timeout: Option<u64>,

    /// Print the session summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Force colored output
    #[arg(long, global = true)]
    pub color: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Show failed range-scan ports, percentiles and progress details
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Show help for a specific topic (examples, env, exit-codes, modes)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,

    /// Write an example .env file to PATH and exit
    #[arg(long, value_name = "PATH")]
    pub init_env: Option<std::path::PathBuf>,
}

/// Probe modes
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send ICMP echo requests to every address of HOST
    Ping {
        host: String,
    },
    /// Open a TCP connection to PORT on every address of HOST
    Telnet {
        host: String,
        #[arg(value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
    },
    /// Scan a TCP port range on every address of HOST
    Nmap {
        host: String,
        /// First port of the range
        #[arg(long, default_value_t = crate::defaults::DEFAULT_FROM_PORT, value_parser = clap::value_parser!(u16).range(1..))]
        from: u16,
        /// Last port of the range (inclusive)
        #[arg(long, default_value_t = crate::defaults::DEFAULT_TO_PORT, value_parser = clap::value_parser!(u16).range(1..))]
        to: u16,
    },
    /// Issue HTTP GET requests to URL, pinned to each resolved address
    Web {
        url: String,
    },
}

impl Command {
    pub fn mode(&self) -> ProbeMode {
        match self {
            Command::Ping { .. } => ProbeMode::Ping,
            Command::Telnet { .. } => ProbeMode::Telnet,
            Command::Nmap { .. } => ProbeMode::Nmap,
            Command::Web { .. } => ProbeMode::Web,
        }
    }
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.help_topic.is_some() || self.init_env.is_some() {
            return Ok(());
        }

        match &self.command {
            None => Err("A probe mode is required: ping, telnet, nmap or web".to_string()),
            Some(Command::Nmap { from, to, .. }) if from > to => {
                Err(format!("Invalid port range: --from {} is greater than --to {}", from, to))
            }
            Some(_) => Ok(()),
        }
    }

    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Help text for `--help-topic`
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        match &self.help_topic {
            Some(topic) => help_system.display_topic_help(topic, use_colors).unwrap_or_else(|| {
                format!(
                    "Unknown help topic: '{}'\n\nAvailable topics: {}\n",
                    topic,
                    HelpSystem::TOPICS.join(", ")
                )
            }),
            None => help_system.display_topic_help("modes", use_colors).unwrap_or_default(),
        }
    }
}

/// Per-probe timeout in whole seconds, 1..=300
fn parse_timeout(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid timeout: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid timeout: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Timeout must be greater than 0".to_string())
            } else if secs > crate::defaults::MAX_TIMEOUT_SECS {
                Err(format!(
                    "Timeout cannot exceed {} seconds",
                    crate::defaults::MAX_TIMEOUT_SECS
                ))
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_parsing() {
        let cli = Cli::parse_from(["nprobe", "ping", "example.com", "-c", "4", "--timeout", "2"]);
        assert_eq!(
            cli.command,
            Some(Command::Ping {
                host: "example.com".to_string()
            })
        );
        assert_eq!(cli.count, Some(4));
        assert_eq!(cli.timeout, Some(2));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::parse_from(["nprobe", "--parallel", "--max-in-flight", "8", "telnet", "localhost", "22"]);
        assert!(cli.parallel);
        assert_eq!(cli.max_in_flight, Some(8));
        assert_eq!(cli.command.as_ref().map(Command::mode), Some(ProbeMode::Telnet));
    }

    #[test]
    fn test_nmap_defaults_and_range() {
        let cli = Cli::parse_from(["nprobe", "nmap", "10.0.0.1"]);
        match cli.command {
            Some(Command::Nmap { from, to, .. }) => assert_eq!((from, to), (1, 80)),
            other => panic!("unexpected command {:?}", other),
        }

        let reversed = Cli::parse_from(["nprobe", "nmap", "10.0.0.1", "--from", "100", "--to", "10"]);
        assert!(reversed.validate().unwrap_err().contains("Invalid port range"));
    }

    #[test]
    fn test_port_zero_rejected() {
        assert!(Cli::try_parse_from(["nprobe", "telnet", "localhost", "0"]).is_err());
        assert!(Cli::try_parse_from(["nprobe", "telnet", "localhost", "65536"]).is_err());
        assert!(Cli::try_parse_from(["nprobe", "nmap", "h", "--from", "0"]).is_err());
    }

    #[test]
    fn test_web_parsing() {
        let cli = Cli::parse_from(["nprobe", "web", "https://example.com/health", "--json"]);
        assert!(cli.json);
        assert_eq!(cli.command.as_ref().map(Command::mode), Some(ProbeMode::Web));
    }

    #[test]
    fn test_validation() {
        let conflict = Cli::parse_from(["nprobe", "--color", "--no-color", "ping", "h"]);
        assert!(conflict.validate().unwrap_err().contains("--color and --no-color"));

        let missing = Cli::parse_from(["nprobe"]);
        assert!(missing.validate().unwrap_err().contains("probe mode is required"));

        let topic = Cli::parse_from(["nprobe", "--help-topic", "env"]);
        assert!(topic.validate().is_ok());
        assert!(topic.should_show_topic_help());
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!(parse_timeout("1").unwrap(), 1);
        assert_eq!(parse_timeout("300").unwrap(), 300);
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("301").is_err());
        assert!(parse_timeout("+10").is_err());
        assert!(parse_timeout("1.5").is_err());
        assert!(parse_timeout("").is_err());
    }

    #[test]
    fn test_use_colors_flags() {
        let forced = Cli::parse_from(["nprobe", "--color", "ping", "h"]);
        assert!(forced.use_colors());

        let disabled = Cli::parse_from(["nprobe", "--no-color", "ping", "h"]);
        assert!(!disabled.use_colors());
    }

    #[test]
    fn test_unknown_help_topic() {
        let cli = Cli::parse_from(["nprobe", "--no-color", "--help-topic", "bogus"]);
        let help = cli.display_help();
        assert!(help.contains("Unknown help topic: 'bogus'"));
        assert!(help.contains("exit-codes"));
    }
}

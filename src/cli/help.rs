//! Topic help for `--help-topic`
//!
//! clap renders the flag reference; these topics cover what it cannot:
//! worked examples, the environment variables, and exit codes.

use crate::config::env::EnvManager;
use colored::*;

/// Topic help renderer
pub struct HelpSystem {
    binary: &'static str,
}

impl HelpSystem {
    pub const TOPICS: [&'static str; 4] = ["modes", "examples", "env", "exit-codes"];

    pub fn new() -> Self {
        Self { binary: "nprobe" }
    }

    /// `None` for an unknown topic
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        let body = match topic.to_lowercase().as_str() {
            "modes" | "mode" => self.modes(),
            "examples" | "example" => self.examples(),
            "env" | "environment" => EnvManager::display_env_help(),
            "exit-codes" | "exit" => self.exit_codes(),
            _ => return None,
        };

        let title = format!("{} {}", self.binary, topic.to_uppercase());
        let header = if use_colors {
            title.bold().blue().to_string()
        } else {
            title
        };
        Some(format!("{}\n\n{}", header, body))
    }

    fn modes(&self) -> String {
        [
            "  ping <host>                    ICMP echo to every resolved address",
            "  telnet <host> <port>           TCP connect to one port",
            "  nmap <host> --from A --to B    TCP connect across a port range",
            "  web <url>                      HTTP GET pinned to each resolved address",
            "",
            "Each mode runs count x addresses x ports probes, one at a time by",
            "default or concurrently with --parallel.",
        ]
        .join("\n")
    }

    fn examples(&self) -> String {
        let b = self.binary;
        [
            format!("  {} ping example.com -c 5", b),
            format!("  {} telnet db.internal 5432 --timeout 2", b),
            format!("  {} nmap 10.0.0.5 --from 1 --to 1024 --parallel --delay 0", b),
            format!("  {} ping example.com -c 100 --throttle --deadline 60", b),
            format!("  {} web https://example.com/health -c 3 --json", b),
        ]
        .join("\n")
    }

    fn exit_codes(&self) -> String {
        [
            "  0    at least one probe succeeded",
            "  1    every probe failed, or invalid arguments",
            "  2    hostname resolution failed",
            "  3    resolution timed out",
            "  4    probe socket could not be opened (ICMP needs privileges)",
            "  5    I/O error",
            "  130  cancelled before any probe ran",
        ]
        .join("\n")
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_topic_renders() {
        let help = HelpSystem::new();
        for topic in HelpSystem::TOPICS {
            let text = help.display_topic_help(topic, false).unwrap();
            assert!(text.starts_with("nprobe "));
        }
        assert!(help.display_topic_help("nope", false).is_none());
    }

    #[test]
    fn test_topics_case_insensitive() {
        let help = HelpSystem::new();
        let text = help.display_topic_help("ENV", false).unwrap();
        assert!(text.contains("PROBE_COUNT"));
    }

    #[test]
    fn test_exit_codes_listed() {
        let text = HelpSystem::new().display_topic_help("exit-codes", false).unwrap();
        assert!(text.contains("130"));
        assert!(text.contains("resolution failed"));
    }
}

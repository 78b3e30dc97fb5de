//! Environment variable handling and .env file management

use crate::defaults;
use crate::error::{AppError, ErrorContext, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load an env file if it exists
    ///
    /// Variables already set in the process environment are not replaced.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        format!(
            r#"# Network Probe Configuration
#
# Values here are defaults for every run. Process environment variables
# override this file, and command-line flags override both.

# Probe iterations per address and port (1-{max_count})
# PROBE_COUNT={count}

# Per-probe timeout in seconds (1-{max_timeout})
# PROBE_TIMEOUT_SECONDS={timeout}

# Delay before each probe in milliseconds
# PROBE_DELAY_MS={delay}

# ICMP echo payload size in bytes (0-{max_payload})
# PROBE_PAYLOAD_BYTES={payload}

# Random delay in [0, {max_throttle}) ms instead of the fixed delay (true/false)
# PROBE_THROTTLE=false

# Run probes concurrently (true/false)
# PROBE_PARALLEL=false

# Concurrent probe bound in parallel mode (detected from CPU count when unset)
# PROBE_MAX_IN_FLIGHT=64

# Hostname resolution timeout in milliseconds
# PROBE_RESOLVE_TIMEOUT_MS={resolve}

# Stop dispatching new probes after this many seconds
# PROBE_DEADLINE_SECONDS=60

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#,
            max_count = defaults::MAX_COUNT,
            count = defaults::DEFAULT_COUNT,
            max_timeout = defaults::MAX_TIMEOUT_SECS,
            timeout = defaults::DEFAULT_TIMEOUT.as_secs(),
            delay = defaults::DEFAULT_DELAY_MS,
            max_payload = defaults::MAX_PAYLOAD_BYTES,
            payload = defaults::DEFAULT_PAYLOAD_BYTES,
            max_throttle = defaults::MAX_THROTTLE_DELAY_MS,
            resolve = defaults::DEFAULT_RESOLVE_TIMEOUT.as_millis(),
        )
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(AppError::config(format!("{} already exists", path.display())));
        }
        std::fs::write(path, Self::create_example_env_content())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Validate one variable's value before it is merged
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "PROBE_COUNT" => {
                let count = parse_number::<u32>(key, value)?;
                if count == 0 || count > defaults::MAX_COUNT {
                    return Err(AppError::config(format!(
                        "PROBE_COUNT must be between 1 and {}, got: {}",
                        defaults::MAX_COUNT,
                        count
                    )));
                }
            }
            "PROBE_TIMEOUT_SECONDS" => {
                let timeout = parse_number::<u64>(key, value)?;
                if timeout == 0 || timeout > defaults::MAX_TIMEOUT_SECS {
                    return Err(AppError::config(format!(
                        "PROBE_TIMEOUT_SECONDS must be between 1 and {}, got: {}",
                        defaults::MAX_TIMEOUT_SECS,
                        timeout
                    )));
                }
            }
            "PROBE_DELAY_MS" => {
                parse_number::<u64>(key, value)?;
            }
            "PROBE_PAYLOAD_BYTES" => {
                let payload = parse_number::<usize>(key, value)?;
                if payload > defaults::MAX_PAYLOAD_BYTES {
                    return Err(AppError::config(format!(
                        "PROBE_PAYLOAD_BYTES cannot exceed {}, got: {}",
                        defaults::MAX_PAYLOAD_BYTES,
                        payload
                    )));
                }
            }
            "PROBE_MAX_IN_FLIGHT" | "PROBE_RESOLVE_TIMEOUT_MS" | "PROBE_DEADLINE_SECONDS" => {
                if parse_number::<u64>(key, value)? == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "PROBE_THROTTLE" | "PROBE_PARALLEL" | "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Name, description and example of every supported variable
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PROBE_COUNT", "Probe iterations per address and port", "5"),
            ("PROBE_TIMEOUT_SECONDS", "Per-probe timeout in seconds (1-300)", "2"),
            ("PROBE_DELAY_MS", "Delay before each probe in milliseconds", "250"),
            ("PROBE_PAYLOAD_BYTES", "ICMP echo payload size in bytes", "56"),
            ("PROBE_THROTTLE", "Randomize the delay", "true"),
            ("PROBE_PARALLEL", "Run probes concurrently", "true"),
            ("PROBE_MAX_IN_FLIGHT", "Concurrent probe bound", "64"),
            ("PROBE_RESOLVE_TIMEOUT_MS", "Hostname resolution timeout in milliseconds", "3000"),
            ("PROBE_DEADLINE_SECONDS", "Session-wide deadline in seconds", "60"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n\n");
        help.push_str("Write a commented example with: nprobe --init-env .env\n");

        help
    }

    /// Warnings for every supported variable currently set to a bad value
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the `KEY=value` lines of an env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

        let warnings = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                Self::validate_env_var(key.trim(), value.trim())
                    .err()
                    .map(|e| format!("Line '{}': {}", line, e))
            })
            .collect();

        Ok(Some(warnings))
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

//! Configuration parsing from CLI arguments and environment variables

use crate::cli::{Cli, Command};
use crate::config::env::EnvManager;
use crate::error::{AppError, Result};
use crate::models::Config;
use std::path::PathBuf;

/// Builds a [`Config`]: defaults, then `.env`, then the process
/// environment, then CLI flags
pub struct ConfigParser {
    cli: Cli,
    env_file: Option<PathBuf>,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: Some(PathBuf::from(".env")),
        }
    }

    /// Read a different env file, or none at all
    pub fn with_env_file(mut self, env_file: Option<PathBuf>) -> Self {
        self.env_file = env_file;
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        self.cli.validate().map_err(AppError::config)?;

        let mut config = Config::default();

        if self.cli.debug {
            for warning in self.env_warnings()? {
                eprintln!("{}", warning);
            }
        }

        if let Some(path) = &self.env_file {
            EnvManager::load_env_file_from(path, self.cli.debug)?;
        }
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Bad values in the env file and the process environment
    pub fn env_warnings(&self) -> Result<Vec<String>> {
        let mut warnings = match &self.env_file {
            Some(path) => EnvManager::check_env_file(path)?.unwrap_or_default(),
            None => Vec::new(),
        };
        warnings.extend(EnvManager::validate_current_env());
        Ok(warnings)
    }

    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        let cli = &self.cli;

        let command = cli
            .command
            .as_ref()
            .ok_or_else(|| AppError::config("A probe mode is required: ping, telnet, nmap or web"))?;
        config.mode = command.mode();

        match command {
            Command::Ping { host } => {
                config.host = host.clone();
            }
            Command::Telnet { host, port } => {
                config.host = host.clone();
                config.port = Some(*port);
            }
            Command::Nmap { host, from, to } => {
                config.host = host.clone();
                config.from_port = *from;
                config.to_port = *to;
            }
            Command::Web { url } => {
                config.url = Some(url.clone());
            }
        }

        if let Some(count) = cli.count {
            config.count = count;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(delay) = cli.delay {
            config.delay_ms = delay;
        }
        if let Some(payload) = cli.payload {
            config.payload_bytes = payload;
        }
        if let Some(max_in_flight) = cli.max_in_flight {
            config.max_in_flight = Some(max_in_flight);
        }
        if let Some(deadline) = cli.deadline {
            config.deadline_seconds = Some(deadline);
        }
        if let Some(resolve_timeout) = cli.resolve_timeout {
            config.resolve_timeout_ms = resolve_timeout;
        }

        // Flags only ever switch these on
        config.throttle |= cli.throttle;
        config.parallel |= cli.parallel;

        if cli.color || cli.no_color {
            config.enable_color = cli.use_colors();
        } else {
            config.enable_color = config.enable_color && cli.use_colors();
        }

        config.json_output = cli.json;
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        Ok(())
    }
}

/// Parse a complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// One line per setting, for debug output
pub fn display_config_summary(config: &Config) -> String {
    let target = match (&config.url, config.mode) {
        (Some(url), crate::types::ProbeMode::Web) => url.clone(),
        _ => config.host.clone(),
    };

    let mut summary = vec![
        format!("Mode: {}", config.mode),
        format!("Target: {}", target),
    ];
    match config.mode {
        crate::types::ProbeMode::Telnet => {
            summary.push(format!("Port: {}", config.port.map(|p| p.to_string()).unwrap_or_default()))
        }
        crate::types::ProbeMode::Nmap => summary.push(format!("Ports: {}-{}", config.from_port, config.to_port)),
        _ => {}
    }
    summary.push(format!("Count: {}", config.count));
    summary.push(format!("Timeout: {}s", config.timeout_seconds));
    if config.throttle {
        summary.push(format!("Delay: random below {}ms", crate::defaults::MAX_THROTTLE_DELAY_MS));
    } else {
        summary.push(format!("Delay: {}ms", config.delay_ms));
    }
    summary.push(format!(
        "Dispatch: {}",
        if config.parallel {
            format!("parallel, up to {} in flight", config.effective_max_in_flight())
        } else {
            "sequential".to_string()
        }
    ));
    if let Some(deadline) = config.deadline_seconds {
        summary.push(format!("Deadline: {}s", deadline));
    }
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

//! Line-per-event rendering of the progress stream

use super::formatter::format_duration;
use crate::executor::{ProgressEvent, ProgressReceiver};
use crate::models::ProbeResult;
use crate::types::{ProbeMode, ProbeStatus};
use chrono::{DateTime, Local};
use colored::Colorize;

/// `date`-style prefix on every printed line
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// One rendered progress line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub text: String,
    pub is_error: bool,
}

impl ProgressLine {
    fn info(text: String) -> Self {
        Self { text, is_error: false }
    }

    fn error(text: String) -> Self {
        Self {
            text: format!("Error! {}", text),
            is_error: true,
        }
    }
}

/// Render an event, or `None` for events that print nothing
///
/// Closed ports in a range scan only show up in verbose mode.
pub fn render_event(event: &ProgressEvent, verbose: bool) -> Option<ProgressLine> {
    match event {
        ProgressEvent::Resolved { target, duration } if verbose => Some(ProgressLine::info(format!(
            "Resolved {} to {} in {}",
            target.hostname,
            target
                .addresses()
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            format_duration(*duration)
        ))),
        ProgressEvent::ProbeCompleted { mode, result } => render_result(*mode, result, verbose),
        ProgressEvent::Cancelled { reason, undispatched } => Some(ProgressLine::error(format!(
            "Session cancelled ({}); {} operations not dispatched",
            reason, undispatched
        ))),
        _ => None,
    }
}

fn render_result(mode: ProbeMode, result: &ProbeResult, verbose: bool) -> Option<ProgressLine> {
    let address = result.address;
    let port = result.port.unwrap_or_default();
    let latency = format_duration(result.latency);

    if result.is_successful() {
        let text = match mode {
            ProbeMode::Ping => format!(
                "Received reply for request #{} from {} with {} bytes of data in {}",
                result.sequence,
                address,
                result.payload_bytes.unwrap_or_default(),
                latency
            ),
            ProbeMode::Telnet => format!("Successfully connected to {} on port {} after {}", address, port, latency),
            ProbeMode::Nmap => format!("{} has port {} open", address, port),
            ProbeMode::Web => format!(
                "Received HTTP {} from {} with {} bytes in {}",
                result.status_code.unwrap_or_default(),
                address,
                result.payload_bytes.unwrap_or_default(),
                latency
            ),
        };
        return Some(ProgressLine::info(text));
    }

    if result.status == ProbeStatus::Cancelled {
        return None;
    }

    let reason = result
        .error
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "no response".to_string());

    let text = match mode {
        ProbeMode::Ping => format!("Request #{} to {} failed: {}", result.sequence, address, reason),
        ProbeMode::Telnet => format!("Could not connect to {} on port {}: {}", address, port, reason),
        ProbeMode::Nmap if verbose => format!("{} port {} closed: {}", address, port, reason),
        ProbeMode::Nmap => return None,
        ProbeMode::Web => format!("Request to {} failed: {}", address, reason),
    };
    Some(ProgressLine::error(text))
}

/// Prints the progress stream until every sender is gone
#[derive(Debug, Clone)]
pub struct ProgressPrinter {
    verbose: bool,
    enable_color: bool,
}

impl ProgressPrinter {
    pub fn new(verbose: bool, enable_color: bool) -> Self {
        Self { verbose, enable_color }
    }

    /// The line printed for `event` at `now`
    pub fn line(&self, event: &ProgressEvent, now: DateTime<Local>) -> Option<String> {
        let line = render_event(event, self.verbose)?;
        let text = if self.enable_color && line.is_error {
            line.text.red().to_string()
        } else {
            line.text
        };
        Some(format!("{} {}", now.format(TIMESTAMP_FORMAT), text))
    }

    /// Returns the number of lines printed
    pub async fn run(self, mut events: ProgressReceiver) -> usize {
        let mut printed = 0;
        while let Some(event) = events.recv().await {
            if let Some(line) = self.line(&event, Local::now()) {
                println!("{}", line);
                printed += 1;
            }
        }
        printed
    }
}

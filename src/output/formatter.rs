//! Core formatting trait and the plain text implementation
//!
//! The text summary layout is shared by the plain and colored formatters;
//! they differ only in how each fragment is painted.

use crate::error::{AppError, Result};
use crate::models::{DnsLookup, SessionSummary};
use crate::stats::ProbeStats;
use std::fmt::Write as _;
use std::time::Duration;

/// Formats a finished session for display
pub trait OutputFormatter: Send + Sync {
    /// Full end-of-session report
    fn format_summary(&self, summary: &SessionSummary) -> Result<String>;

    /// One-line error message
    fn format_error(&self, error: &str) -> Result<String>;

    /// One-line warning message
    fn format_warning(&self, warning: &str) -> Result<String>;
}

/// Formatting options
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Adds percentiles and the failure breakdown
    pub verbose_mode: bool,
    /// Width of the statistics banner
    pub banner_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: false,
            verbose_mode: false,
            banner_width: 60,
        }
    }
}

/// Role of a fragment in the summary, mapped to a color by colored output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Header,
    Success,
    Partial,
    Failure,
    Muted,
    Latency(Duration),
}

/// Renders the summary layout, painting each fragment through `paint`
pub(crate) fn write_summary(
    summary: &SessionSummary,
    options: &FormattingOptions,
    paint: &dyn Fn(&str, Tone) -> String,
) -> Result<String> {
    let mut output = String::new();
    let fmt_err = |e: std::fmt::Error| AppError::internal(format!("Failed to format summary: {}", e));

    writeln!(output, "{}", dns_line(&summary.dns_lookup, paint)).map_err(fmt_err)?;

    let title = format!(" {} STATISTICS ", summary.module_name.to_uppercase());
    writeln!(output, "{}", paint(&banner(&title, options.banner_width), Tone::Header)).map_err(fmt_err)?;

    let stats = &summary.stats;
    let success_tone = if stats.succeeded == 0 {
        Tone::Failure
    } else if stats.loss == 0 {
        Tone::Success
    } else {
        Tone::Partial
    };
    writeln!(
        output,
        "Requests sent: {}, Responses received: {}, Lost: {}, Success: {}",
        stats.requested,
        paint(&stats.succeeded.to_string(), success_tone),
        stats.loss,
        paint(&format_percentage(stats.success_percent), success_tone),
    )
    .map_err(fmt_err)?;

    let not_attempted = stats.requested.saturating_sub(stats.attempted);
    if not_attempted > 0 {
        writeln!(output, "Not attempted: {}", paint(&not_attempted.to_string(), Tone::Muted)).map_err(fmt_err)?;
    }

    if stats.succeeded > 0 {
        writeln!(
            output,
            "Latency: minimum {}, average {}, maximum {}, std dev {}",
            paint(&format_duration(stats.min), Tone::Latency(stats.min)),
            paint(&format_duration(stats.avg), Tone::Latency(stats.avg)),
            paint(&format_duration(stats.max), Tone::Latency(stats.max)),
            format_duration(stats.std_dev),
        )
        .map_err(fmt_err)?;
    } else {
        writeln!(output, "Latency: {}", paint("no responses", Tone::Muted)).map_err(fmt_err)?;
    }

    if options.verbose_mode {
        write_details(&mut output, stats, paint).map_err(fmt_err)?;
    }

    if let Some(error) = &summary.error {
        let label = if summary.cancelled { "Cancelled" } else { "Error" };
        writeln!(output, "{}: {}", paint(label, Tone::Failure), error).map_err(fmt_err)?;
    }

    write!(output, "Total time taken: {}", format_duration(summary.total_time)).map_err(fmt_err)?;
    Ok(output)
}

fn write_details(output: &mut String, stats: &ProbeStats, paint: &dyn Fn(&str, Tone) -> String) -> std::fmt::Result {
    if stats.succeeded > 0 {
        writeln!(
            output,
            "Percentiles: p50 {}, p95 {}, p99 {}",
            format_duration(stats.p50),
            format_duration(stats.p95),
            format_duration(stats.p99),
        )?;
    }

    if !stats.failures.is_empty() {
        let breakdown: Vec<String> = stats
            .failures
            .iter()
            .map(|(kind, count)| format!("{} {}", kind, count))
            .collect();
        writeln!(output, "Failures: {}", paint(&breakdown.join(", "), Tone::Muted))?;
    }

    writeln!(output, "Resolution time: {}", format_duration(stats.resolve_time))
}

fn dns_line(lookup: &DnsLookup, paint: &dyn Fn(&str, Tone) -> String) -> String {
    if lookup.success {
        let noun = if lookup.resolved_addresses.len() == 1 { "address" } else { "addresses" };
        format!(
            "DNS lookup {} for {} to {} {} [{}] in {}",
            paint("successful", Tone::Success),
            lookup.hostname,
            lookup.resolved_addresses.len(),
            noun,
            lookup.resolved_addresses.join(", "),
            format_duration(lookup.time_taken),
        )
    } else {
        format!(
            "DNS lookup {} for {} after {}: {}",
            paint("failed", Tone::Failure),
            lookup.hostname,
            format_duration(lookup.time_taken),
            lookup.error.as_deref().unwrap_or("unknown error"),
        )
    }
}

/// `=====  TITLE  =====` centred in `width` columns
pub fn banner(title: &str, width: usize) -> String {
    let fill = width.saturating_sub(title.len());
    let left = fill / 2;
    format!("{}{}{}", "=".repeat(left), title, "=".repeat(fill - left))
}

/// Human-readable duration: `850µs`, `1.2ms`, `2.35s`, `1m5.0s`
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_secs_f64() * 1000.0;
    if ms < 0.1 {
        format!("{}µs", duration.as_micros())
    } else if ms < 1000.0 {
        format!("{:.1}ms", ms)
    } else if ms < 60_000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        let minutes = (ms / 60_000.0) as u64;
        let seconds = (ms % 60_000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

/// Percentage with one decimal; only an exact 100 shows as `100.0%`
pub fn format_percentage(percentage: f64) -> String {
    let percentage = percentage.clamp(0.0, 100.0);
    let rounded = (percentage * 10.0).round() / 10.0;
    let shown = if rounded >= 100.0 && percentage < 100.0 {
        99.9
    } else {
        rounded
    };
    format!("{:.1}%", shown)
}

/// Plain text formatter for scripts and logs
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_summary(&self, summary: &SessionSummary) -> Result<String> {
        write_summary(summary, &self.options, &|text, _| text.to_string())
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("Error! {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("Warning: {}", warning))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{InputParams, ProbeConfig, ProbeResult, ProbeTarget, ResolvedTarget};
    use crate::stats::StatsAggregator;
    use crate::types::ProbeErrorKind;
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};

    pub(crate) fn sample_summary() -> SessionSummary {
        let config = ProbeConfig::ping("example.com").with_count(3);
        let address = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
        let target = ProbeTarget::host(address);
        let results = vec![
            ProbeResult::success(&target, 0, Utc::now(), Duration::from_millis(10)),
            ProbeResult::success(&target, 1, Utc::now(), Duration::from_millis(30)),
            ProbeResult::timeout(&target, 2, Utc::now(), Duration::from_secs(5)),
        ];
        let stats = StatsAggregator::new(3)
            .with_resolve_time(Duration::from_millis(4))
            .with_total_time(Duration::from_millis(2500))
            .aggregate(&results);
        let resolved = ResolvedTarget::new("example.com", vec![address]);

        SessionSummary {
            session_id: "test-session".to_string(),
            input_params: InputParams::from(&config),
            module_name: "icmp".to_string(),
            dns_lookup: DnsLookup::resolved(&resolved, Duration::from_millis(4)),
            results,
            stats,
            start_time: Utc::now(),
            end_time: Utc::now(),
            total_time: Duration::from_millis(2500),
            error: None,
            cancelled: false,
            fatal_exit_code: None,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(40)), "40µs");
        assert_eq!(format_duration(Duration::from_micros(800)), "0.8ms");
        assert_eq!(format_duration(Duration::from_micros(1200)), "1.2ms");
        assert_eq!(format_duration(Duration::from_millis(2350)), "2.35s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m5.0s");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(100.0), "100.0%");
        assert_eq!(format_percentage(66.666), "66.7%");
        assert_eq!(format_percentage(0.0), "0.0%");
    }

    #[test]
    fn test_near_total_success_never_shows_full() {
        // 1 lost out of 2000
        assert_eq!(format_percentage(99.95), "99.9%");
        assert_eq!(format_percentage(99.99), "99.9%");
        assert_eq!(format_percentage(150.0), "100.0%");
        assert_eq!(format_percentage(-1.0), "0.0%");
    }

    #[test]
    fn test_summary_with_one_loss_in_thousands() {
        let mut summary = sample_summary();
        let target = ProbeTarget::host(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)));
        let mut results: Vec<ProbeResult> = (0..1999)
            .map(|seq| ProbeResult::success(&target, seq, Utc::now(), Duration::from_millis(10)))
            .collect();
        results.push(ProbeResult::timeout(&target, 1999, Utc::now(), Duration::from_secs(1)));
        summary.stats = StatsAggregator::new(2000).aggregate(&results);
        summary.results = results;

        let text = PlainFormatter::new(FormattingOptions::default())
            .format_summary(&summary)
            .unwrap();
        assert!(text.contains("Requests sent: 2000, Responses received: 1999, Lost: 1, Success: 99.9%"));
        assert!(!text.contains("Not attempted"));
    }

    #[test]
    fn test_cancelled_summary_counts_requested() {
        let mut summary = sample_summary();
        let target = ProbeTarget::host(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)));
        let mut results = vec![
            ProbeResult::success(&target, 0, Utc::now(), Duration::from_millis(10)),
            ProbeResult::success(&target, 1, Utc::now(), Duration::from_millis(10)),
        ];
        results.extend((2..10).map(|seq| ProbeResult::cancelled(&target, seq)));
        summary.stats = StatsAggregator::new(10).aggregate(&results);
        summary.results = results;
        summary.cancelled = true;
        summary.error = Some("session deadline reached".to_string());

        let text = PlainFormatter::new(FormattingOptions::default())
            .format_summary(&summary)
            .unwrap();
        assert!(text.contains("Requests sent: 10, Responses received: 2, Lost: 8, Success: 20.0%"));
        assert!(text.contains("Not attempted: 8"));
        assert!(text.contains("Cancelled: session deadline reached"));
    }

    #[test]
    fn test_banner_is_centred() {
        let line = banner(" ICMP STATISTICS ", 31);
        assert_eq!(line.len(), 31);
        assert!(line.starts_with("=======  ICMP") || line.starts_with("======= ICMP"));
        assert!(line.ends_with('='));
    }

    #[test]
    fn test_plain_summary_layout() {
        let formatter = PlainFormatter::new(FormattingOptions::default());
        let text = formatter.format_summary(&sample_summary()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "DNS lookup successful for example.com to 1 address [93.184.216.34] in 4.0ms"
        );
        assert!(lines[1].contains(" ICMP STATISTICS "));
        assert_eq!(lines[2], "Requests sent: 3, Responses received: 2, Lost: 1, Success: 66.7%");
        assert_eq!(lines[3], "Latency: minimum 10.0ms, average 20.0ms, maximum 30.0ms, std dev 10.0ms");
        assert_eq!(*lines.last().unwrap(), "Total time taken: 2.50s");
        assert!(!text.contains("Percentiles"));
    }

    #[test]
    fn test_verbose_adds_details() {
        let options = FormattingOptions {
            verbose_mode: true,
            ..FormattingOptions::default()
        };
        let text = PlainFormatter::new(options).format_summary(&sample_summary()).unwrap();

        assert!(text.contains("Percentiles: p50 20.0ms"));
        assert!(text.contains(&format!("Failures: {} 1", ProbeErrorKind::Timeout)));
    }

    #[test]
    fn test_failed_resolution_summary() {
        let mut summary = sample_summary();
        summary.dns_lookup = DnsLookup::failed("nope.invalid", "no such host", Duration::from_millis(2));
        summary.results.clear();
        summary.stats = StatsAggregator::new(3).aggregate(&[]);
        summary.error = Some("DNS resolution failed: no such host".to_string());

        let text = PlainFormatter::new(FormattingOptions::default())
            .format_summary(&summary)
            .unwrap();

        assert!(text.starts_with("DNS lookup failed for nope.invalid after 2.0ms: no such host"));
        assert!(text.contains("Requests sent: 3, Responses received: 0, Lost: 3, Success: 0.0%"));
        assert!(text.contains("Not attempted: 3"));
        assert!(text.contains("Latency: no responses"));
        assert!(text.contains("Error: DNS resolution failed"));
    }
}

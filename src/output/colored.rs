//! Colored formatter for interactive terminals
//!
//! Same layout as the plain formatter, with ANSI colors for the headline
//! numbers and latency graded by [`LatencyLevel`].

use super::formatter::{write_summary, FormattingOptions, OutputFormatter, Tone};
use crate::error::Result;
use crate::models::SessionSummary;
use colored::*;
use std::time::Duration;

/// Latency classification for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyLevel {
    Excellent, // < 50ms
    Good,      // 50-100ms
    Fair,      // 100-300ms
    Poor,      // 300-1000ms
    VeryPoor,  // > 1000ms
}

impl LatencyLevel {
    pub fn from_latency(latency: Duration) -> Self {
        let ms = latency.as_secs_f64() * 1000.0;
        if ms < 50.0 {
            Self::Excellent
        } else if ms < 100.0 {
            Self::Good
        } else if ms < 300.0 {
            Self::Fair
        } else if ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub partial: Color,
    pub failure: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            partial: Color::Yellow,
            failure: Color::Red,
            muted: Color::BrightBlack,
        }
    }
}

pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self { options, color_scheme }
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.options.enable_color {
            return text.to_string();
        }

        let scheme = &self.color_scheme;
        match tone {
            Tone::Header => text.color(scheme.header).bold().to_string(),
            Tone::Success => text.color(scheme.success).bold().to_string(),
            Tone::Partial => text.color(scheme.partial).bold().to_string(),
            Tone::Failure => text.color(scheme.failure).bold().to_string(),
            Tone::Muted => text.color(scheme.muted).to_string(),
            Tone::Latency(latency) => text.color(LatencyLevel::from_latency(latency).color()).to_string(),
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_summary(&self, summary: &SessionSummary) -> Result<String> {
        write_summary(summary, &self.options, &|text, tone| self.paint(text, tone))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.paint("Error!", Tone::Failure), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.paint("Warning:", Tone::Partial), warning))
    }
}

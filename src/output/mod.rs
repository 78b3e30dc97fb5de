//! Output formatting and display
//!
//! End-of-session summaries render as plain text, colored text or JSON.
//! While a session runs, [`ProgressPrinter`] turns the engine's progress
//! stream into one timestamped line per event.

mod colored;
mod formatter;
mod json;
mod progress;

pub use colored::{ColorScheme, ColoredFormatter, LatencyLevel};
pub use formatter::{banner, format_duration, format_percentage, FormattingOptions, OutputFormatter, PlainFormatter, Tone};
pub use json::JsonFormatter;
pub use progress::{render_event, ProgressLine, ProgressPrinter, TIMESTAMP_FORMAT};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// JSON wins over color
    pub fn create_formatter(json: bool, enable_color: bool) -> Box<dyn OutputFormatter> {
        Self::create_with_options(
            json,
            FormattingOptions {
                enable_color,
                ..FormattingOptions::default()
            },
        )
    }

    pub fn create_with_options(json: bool, options: FormattingOptions) -> Box<dyn OutputFormatter> {
        if json {
            Box::new(JsonFormatter::new())
        } else if options.enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Formatter for a parsed [`Config`](crate::models::Config)
    pub fn for_config(config: &crate::models::Config) -> Box<dyn OutputFormatter> {
        Self::create_with_options(
            config.json_output,
            FormattingOptions {
                enable_color: config.enable_color,
                verbose_mode: config.verbose || config.debug,
                ..FormattingOptions::default()
            },
        )
    }
}

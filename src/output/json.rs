//! Machine-readable session summary

use super::formatter::OutputFormatter;
use crate::error::{AppError, Result};
use crate::models::SessionSummary;
use serde_json::json;

/// Pretty-printed JSON of the whole [`SessionSummary`]
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_summary(&self, summary: &SessionSummary) -> Result<String> {
        serde_json::to_string_pretty(summary)
            .map_err(|e| AppError::internal(format!("Failed to serialize summary: {}", e)))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(json!({ "error": error }).to_string())
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(json!({ "warning": warning }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::sample_summary;
    use serde_json::Value;

    #[test]
    fn test_summary_fields() {
        let text = JsonFormatter::new().format_summary(&sample_summary()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["module_name"], "icmp");
        assert_eq!(value["session_id"], "test-session");
        assert_eq!(value["input_params"]["host"], "example.com");
        assert_eq!(value["input_params"]["count"], 3);
        assert_eq!(value["dns_lookup"]["success"], true);
        assert_eq!(value["dns_lookup"]["time_taken_us"], 4000);
        assert_eq!(value["total_time_taken_us"], 2_500_000);
        assert!(value["start_time_unixtime_us"].is_i64());
        assert!(value["error"].is_null());

        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["sequence"], 0);
        assert_eq!(value["stats"]["succeeded"], 2);
        assert_eq!(value["stats"]["loss"], 1);
    }

    #[test]
    fn test_error_is_json() {
        let text = JsonFormatter::new().format_error("no such host").unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["error"], "no such host");
    }

    #[test]
    fn test_summary_never_carries_exit_code() {
        let mut summary = sample_summary();
        summary.fatal_exit_code = Some(2);
        let text = JsonFormatter::new().format_summary(&summary).unwrap();
        assert!(!text.contains("fatal_exit_code"));
    }
}

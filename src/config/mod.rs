//! Configuration management module

pub mod env;
pub mod parser;

pub use env::EnvManager;
pub use parser::{display_config_summary, load_config, ConfigParser};

pub use crate::models::Config;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch the process environment
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn clear_probe_env() {
        for (name, _, _) in EnvManager::get_supported_env_vars() {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_merge_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_probe_env();
        std::env::set_var("PROBE_PARALLEL", "true");
        std::env::set_var("PROBE_MAX_IN_FLIGHT", "12");
        std::env::set_var("PROBE_DEADLINE_SECONDS", "30");
        std::env::set_var("ENABLE_COLOR", "false");

        let mut config = Config::default();
        let merged = config.merge_from_env();
        clear_probe_env();

        merged.unwrap();
        assert!(config.parallel);
        assert_eq!(config.max_in_flight, Some(12));
        assert_eq!(config.effective_max_in_flight(), 12);
        assert_eq!(config.deadline_seconds, Some(30));
        assert!(!config.enable_color);
    }

    #[test]
    fn test_validate_current_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_probe_env();
        assert!(EnvManager::validate_current_env().is_empty());

        std::env::set_var("PROBE_COUNT", "0");
        let warnings = EnvManager::validate_current_env();
        clear_probe_env();

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("PROBE_COUNT"));
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default auto-hide delay for success and failure states.
pub const DEFAULT_AUTO_HIDE_DELAY: Duration = Duration::from_secs(2);

/// Immutable behaviour settings of a [`LoadingManager`](crate::state::LoadingManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingManagerSettings {
    /// How long a success or failure state stays visible before reverting to `None`.
    /// A zero delay hides on the next scheduler tick.
    pub auto_hide_delay: Duration,
}

impl LoadingManagerSettings {
    pub fn new(auto_hide_delay: Duration) -> Self {
        Self { auto_hide_delay }
    }
}

impl Default for LoadingManagerSettings {
    fn default() -> Self {
        Self {
            auto_hide_delay: DEFAULT_AUTO_HIDE_DELAY,
        }
    }
}

/// Debug switches passed explicitly to whatever needs them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugOptions {
    /// Emit per-notification inspection events from renderers
    #[serde(default)]
    pub inspection_enabled: bool,
}

/// Top-level configuration from `Unloader.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnloaderConfig {
    #[serde(default)]
    pub loading_manager: ManagerConfig,

    #[serde(default)]
    pub debug: DebugOptions,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_auto_hide_delay_ms")]
    pub auto_hide_delay_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            auto_hide_delay_ms: default_auto_hide_delay_ms(),
        }
    }
}

impl From<ManagerConfig> for LoadingManagerSettings {
    fn from(config: ManagerConfig) -> Self {
        Self::new(Duration::from_millis(config.auto_hide_delay_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: String,

    #[serde(default = "default_log_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            prefix: default_log_prefix(),
            debug_mode: false,
            console: default_console(),
        }
    }
}

fn default_auto_hide_delay_ms() -> u64 {
    DEFAULT_AUTO_HIDE_DELAY.as_millis() as u64
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "unloader".to_string()
}

fn default_console() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LoadingManagerSettings::default();
        assert_eq!(settings.auto_hide_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "loading_manager:\n  auto_hide_delay_ms: 500\n";
        let config: UnloaderConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.loading_manager.auto_hide_delay_ms, 500);
        assert!(!config.debug.inspection_enabled);
        assert_eq!(config.logging.prefix, "unloader");

        let settings = LoadingManagerSettings::from(config.loading_manager);
        assert_eq!(settings.auto_hide_delay, Duration::from_millis(500));
    }
}

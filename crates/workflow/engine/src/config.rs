//! Configuration for the workflow engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transition engine settings
    #[serde(default)]
    pub engine: EngineSettings,

    /// Scheduled job settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transition engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum automatic transitions taken after one operation
    #[serde(default = "default_max_auto_steps")]
    pub max_auto_steps: usize,

    /// Time budget for one entry side effect
    #[serde(default = "default_side_effect_timeout_ms")]
    pub side_effect_timeout_ms: u64,

    /// History entries returned when a query gives no limit; 0 means all
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl EngineSettings {
    pub fn side_effect_timeout(&self) -> Duration {
        Duration::from_millis(self.side_effect_timeout_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_auto_steps: default_max_auto_steps(),
            side_effect_timeout_ms: default_side_effect_timeout_ms(),
            history_limit: default_history_limit(),
        }
    }
}

/// Scheduled job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the job poller
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_auto_steps() -> usize {
    16
}

fn default_side_effect_timeout_ms() -> u64 {
    5_000
}

fn default_history_limit() -> usize {
    10
}

fn default_poll_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `WORKFLOW_*` environment variables (`__` separates nested keys).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&EngineConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables, e.g. WORKFLOW_ENGINE__MAX_AUTO_STEPS
        builder = builder.add_source(
            config::Environment::with_prefix("WORKFLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.engine.max_auto_steps, 16);
        assert_eq!(config.engine.side_effect_timeout(), Duration::from_secs(5));
        assert!(config.scheduler.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.engine.history_limit, 10);
        assert_eq!(config.scheduler.poll_interval_secs, 60);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[engine]\nmax_auto_steps = 4\n\n[scheduler]\npoll_interval_secs = 5\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = EngineConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.engine.max_auto_steps, 4);
        assert_eq!(config.engine.side_effect_timeout_ms, 5_000);
        assert_eq!(config.scheduler.poll_interval(), Duration::from_secs(5));
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = EngineConfig::load(Some("/nonexistent/workflow-engine.toml")).unwrap();
        assert_eq!(config.engine.max_auto_steps, 16);
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let scheduler = SchedulerConfig {
            enabled: true,
            poll_interval_secs: 0,
        };
        assert_eq!(scheduler.poll_interval(), Duration::from_secs(1));
    }
}

//! Layered configuration using Figment.
//!
//! Configuration is resolved from three layers, each overriding the previous:
//!
//! 1. Built-in defaults ([`MonitorConfig::default`])
//! 2. A TOML file (`config/signal_monitor.toml` unless another path is given);
//!    a missing file is skipped
//! 3. Environment variables prefixed with `SIGNAL_MONITOR_`; nested keys are
//!    separated by double underscores
//!
//! ```text
//! SIGNAL_MONITOR_APPLICATION__LOG_LEVEL=debug
//! SIGNAL_MONITOR_PIPELINE__SLOTS_PER_STREAM=4
//! SIGNAL_MONITOR_DEFAULTS__NTH_BUFFER_TO_USE=1
//! ```
//!
//! # Example
//! ```no_run
//! use signal_monitor::config::MonitorConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok(())
//! # }
//! ```

use crate::error::{MonitorError, MonitorResult};
use crate::settings::MonitorSettings;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Metadata, Profile, Provider,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/signal_monitor.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SIGNAL_MONITOR_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Application name and log level.
    pub application: ApplicationConfig,
    /// Pool, event bus and lost-counter sizing.
    pub pipeline: PipelineConfig,
    /// Scrolling history limits.
    pub history: HistoryConfig,
    /// Settings applied at startup when the host store is empty.
    pub defaults: MonitorSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Name shown in logs.
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Signal Monitor".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Producer/worker pipeline sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Slots in each stream's buffer pool.
    pub slots_per_stream: usize,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Lost-frame count at which the counter restarts at zero.
    pub lost_frame_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slots_per_stream: frame_pool::DEFAULT_SLOT_COUNT,
            event_capacity: crate::events::DEFAULT_EVENT_CAPACITY,
            lost_frame_limit: u32::MAX,
        }
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Describes the first zero-valued field.
    pub fn validate(&self) -> Result<(), String> {
        if self.slots_per_stream == 0 {
            return Err("Invalid slots_per_stream 0. Must be at least 1".to_string());
        }
        if self.event_capacity == 0 {
            return Err("Invalid event_capacity 0. Must be at least 1".to_string());
        }
        if self.lost_frame_limit == 0 {
            return Err("Invalid lost_frame_limit 0. Must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Scrolling history sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Points kept before the history is cleared and restarts.
    pub max_points: usize,
    /// Points shown in the visible window.
    pub visible_points: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_points: crate::history::DEFAULT_MAX_POINTS,
            visible_points: crate::history::DEFAULT_VISIBLE_POINTS,
        }
    }
}

impl Provider for MonitorConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("Signal Monitor Defaults")
    }

    fn data(&self) -> Result<figment::value::Map<Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}

impl MonitorConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    ///
    /// # Errors
    ///
    /// Fails if a layer holds a value of the wrong type.
    pub fn load() -> MonitorResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    ///
    /// # Errors
    ///
    /// Fails if a layer holds a value of the wrong type.
    pub fn load_from<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// The layered provider stack, exposed for callers that merge extra
    /// layers (command line overrides).
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(MonitorConfig::default());
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// [`MonitorError::Configuration`] describing the first invalid value.
    pub fn validate(&self) -> MonitorResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(MonitorError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        self.pipeline
            .validate()
            .map_err(MonitorError::Configuration)?;

        if self.history.max_points == 0 {
            return Err(MonitorError::Configuration(
                "Invalid history.max_points 0. Must be at least 1".to_string(),
            ));
        }
        if self.history.visible_points == 0 || self.history.visible_points > self.history.max_points {
            return Err(MonitorError::Configuration(format!(
                "Invalid history.visible_points {}. Must be 1-{}",
                self.history.visible_points, self.history.max_points
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StreamSource;
    use crate::stats::MetricKind;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.slots_per_stream, 2);
        assert_eq!(config.history.visible_points, 512);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let config = MonitorConfig::load_from("does/not/exist.toml").unwrap();
            assert_eq!(config, MonitorConfig::default());
            Ok(())
        });
    }

    #[test]
    fn file_and_env_layers_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "monitor.toml",
                r#"
                [application]
                log_level = "debug"

                [pipeline]
                slots_per_stream = 3

                [defaults]
                image_source = 1
                metric = 3
                roi_width = 64
                "#,
            )?;
            jail.set_env("SIGNAL_MONITOR_PIPELINE__SLOTS_PER_STREAM", "4");
            jail.set_env("SIGNAL_MONITOR_DEFAULTS__NTH_BUFFER_TO_USE", "1");

            let config = MonitorConfig::load_from("monitor.toml").unwrap();
            assert_eq!(config.application.log_level, "debug");
            assert_eq!(config.application.name, "Signal Monitor");
            assert_eq!(config.pipeline.slots_per_stream, 4);
            assert_eq!(config.defaults.stream_source, StreamSource::Processed);
            assert_eq!(config.defaults.metric, MetricKind::CoeffOfVariation);
            assert_eq!(config.defaults.roi_width, 64);
            assert_eq!(config.defaults.decimation_factor, 1);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = MonitorConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(matches!(
            config.validate(),
            Err(MonitorError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_sizes() {
        let mut config = MonitorConfig::default();
        config.pipeline.event_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.history.visible_points = config.history.max_points + 1;
        assert!(config.validate().is_err());
    }
}

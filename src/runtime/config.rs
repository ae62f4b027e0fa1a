//! Runner configuration.

use crate::error::ConfigError;
use std::time::Duration;

/// Default runner name.
pub const DEFAULT_RUNNER_NAME: &str = "stagehand";

/// Default descriptor-list capacity.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Configuration for a [`Runner`](super::Runner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Name used in log output and diagnostic dumps.
    pub name: String,
    /// Bind the runner to the thread that builds it.
    ///
    /// When false, the runner is bound to whichever thread calls `run_until`
    /// for the duration of that call.
    pub associate_thread: bool,
    /// Initial capacity of the per-iteration descriptor list.
    pub initial_capacity: usize,
    /// Upper bound on a single OS wait. `None` waits as long as the earliest
    /// deadline allows.
    pub max_wait: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_RUNNER_NAME.to_string(),
            associate_thread: false,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_wait: None,
        }
    }
}

impl RunnerConfig {
    /// Checks that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "name".to_string(),
                value: self.name.clone(),
                reason: "runner name must not be empty".to_string(),
            });
        }
        if self.max_wait == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue {
                var: "max_wait".to_string(),
                value: "0".to_string(),
                reason: "a zero wait cap would spin".to_string(),
            });
        }
        Ok(())
    }

    /// Parses a TOML document into a configuration.
    ///
    /// Keys absent from the document keep their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let parsed = super::env_config::parse_toml_str(toml_str)?;
        let mut config = Self::default();
        super::env_config::apply_toml_config(&mut config, &parsed);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RunnerConfig::default();
        assert_eq!(config.name, DEFAULT_RUNNER_NAME);
        assert!(!config.associate_thread);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_wait_cap() {
        let config = RunnerConfig {
            max_wait: Some(Duration::ZERO),
            ..RunnerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref var, .. }) if var == "max_wait"
        ));
    }

    #[test]
    fn rejects_blank_name() {
        let config = RunnerConfig {
            name: "  ".to_string(),
            ..RunnerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn parses_toml() {
        let config = RunnerConfig::from_toml_str(
            "[runner]\nname = \"io\"\nmax_wait_ms = 250\nassociate_thread = true\n",
        )
        .expect("valid toml");
        assert_eq!(config.name, "io");
        assert_eq!(config.max_wait, Some(Duration::from_millis(250)));
        assert!(config.associate_thread);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }
}

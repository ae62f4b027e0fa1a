//! Runner builder.

use crate::error::{Error, Result};
use crate::runtime::config::RunnerConfig;
use crate::runtime::env_config;
use crate::runtime::reactor::{Poller, create_poller};
use crate::runtime::runner::Runner;
use core::fmt;
use std::time::Duration;

/// Builder for constructing a runner with custom configuration.
pub struct RunnerBuilder {
    config: RunnerConfig,
    poller: Option<Box<dyn Poller>>,
}

impl RunnerBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            poller: None,
        }
    }

    /// Create a builder from an existing configuration.
    #[must_use]
    pub fn from_config(config: RunnerConfig) -> Self {
        Self {
            config,
            poller: None,
        }
    }

    /// Create a builder seeded from `STAGEHAND_*` environment variables.
    ///
    /// Builder methods called afterwards take precedence.
    pub fn from_env() -> Result<Self> {
        let mut config = RunnerConfig::default();
        env_config::apply_env_overrides(&mut config)?;
        Ok(Self::from_config(config))
    }

    /// Create a builder from a TOML document, then apply environment overrides.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let parsed = env_config::parse_toml_str(toml_str)?;
        let mut config = RunnerConfig::default();
        env_config::apply_toml_config(&mut config, &parsed);
        env_config::apply_env_overrides(&mut config)?;
        Ok(Self::from_config(config))
    }

    /// Create a builder from a TOML file, then apply environment overrides.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let parsed = env_config::parse_toml_file(path.as_ref())?;
        let mut config = RunnerConfig::default();
        env_config::apply_toml_config(&mut config, &parsed);
        env_config::apply_env_overrides(&mut config)?;
        Ok(Self::from_config(config))
    }

    /// Set the runner name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Bind the runner to the thread that calls [`build`](Self::build).
    #[must_use]
    pub fn associate_thread(mut self, associate: bool) -> Self {
        self.config.associate_thread = associate;
        self
    }

    /// Set the initial descriptor-list capacity.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Cap the duration of a single OS wait.
    #[must_use]
    pub fn max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    /// Use a custom poller instead of the platform default.
    #[must_use]
    pub fn poller(mut self, poller: impl Poller + 'static) -> Self {
        self.poller = Some(Box::new(poller));
        self
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Build a runner from this configuration.
    pub fn build(self) -> Result<Runner> {
        self.config.validate().map_err(Error::from)?;
        let poller = self.poller.unwrap_or_else(create_poller);
        Runner::with_parts(self.config, poller)
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunnerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerBuilder")
            .field("config", &self.config)
            .field("custom_poller", &self.poller.is_some())
            .finish()
    }
}

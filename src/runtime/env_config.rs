//! Environment variable and config file support for [`RunnerBuilder`](super::builder::RunnerBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: builder methods called after `from_env()`
//! 2. **Environment variables**: values from `STAGEHAND_*` env vars
//! 3. **Config file**: values loaded from TOML (requires `config-file` feature)
//! 4. **Defaults**: [`RunnerConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `STAGEHAND_RUNNER_NAME` | `String` | `name` |
//! | `STAGEHAND_ASSOCIATE_THREAD` | `bool` | `associate_thread` |
//! | `STAGEHAND_INITIAL_CAPACITY` | `usize` | `initial_capacity` |
//! | `STAGEHAND_MAX_WAIT_MS` | `u64` | `max_wait` |

use crate::error::ConfigError;
use crate::runtime::config::RunnerConfig;
use std::time::Duration;

/// Environment variable name for the runner name.
pub const ENV_RUNNER_NAME: &str = "STAGEHAND_RUNNER_NAME";
/// Environment variable name for binding the runner to its building thread.
pub const ENV_ASSOCIATE_THREAD: &str = "STAGEHAND_ASSOCIATE_THREAD";
/// Environment variable name for the initial descriptor-list capacity.
pub const ENV_INITIAL_CAPACITY: &str = "STAGEHAND_INITIAL_CAPACITY";
/// Environment variable name for the single-wait cap in milliseconds.
pub const ENV_MAX_WAIT_MS: &str = "STAGEHAND_MAX_WAIT_MS";

/// Apply environment variable overrides to a [`RunnerConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut RunnerConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, read_env)
}

/// Apply overrides using `lookup` in place of the process environment.
pub fn apply_overrides_from<F>(config: &mut RunnerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_RUNNER_NAME) {
        config.name = val;
    }
    if let Some(val) = lookup(ENV_ASSOCIATE_THREAD) {
        config.associate_thread = parse_bool(ENV_ASSOCIATE_THREAD, &val)?;
    }
    if let Some(val) = lookup(ENV_INITIAL_CAPACITY) {
        config.initial_capacity = parse_usize(ENV_INITIAL_CAPACITY, &val)?;
    }
    if let Some(val) = lookup(ENV_MAX_WAIT_MS) {
        config.max_wait = parse_millis(ENV_MAX_WAIT_MS, &val)?;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn invalid(var_name: &str, val: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        var: var_name.to_string(),
        value: val.to_string(),
        reason: reason.into(),
    }
}

fn parse_usize(var_name: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|e| invalid(var_name, val, format!("expected unsigned integer ({e})")))
}

fn parse_bool(var_name: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(
            var_name,
            val,
            "expected bool (true/false/1/0/yes/no)",
        )),
    }
}

/// Parses a millisecond cap; `0` or `none` disables the cap.
fn parse_millis(var_name: &str, val: &str) -> Result<Option<Duration>, ConfigError> {
    let trimmed = val.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let millis = trimmed
        .parse::<u64>()
        .map_err(|e| invalid(var_name, val, format!("expected milliseconds ({e})")))?;
    Ok((millis > 0).then(|| Duration::from_millis(millis)))
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable runner configuration.
///
/// ```toml
/// [runner]
/// name = "io"
/// associate_thread = false
/// initial_capacity = 64
/// max_wait_ms = 500
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct RunnerTomlConfig {
    /// Runner settings.
    #[serde(default)]
    pub runner: RunnerToml,
}

/// Runner section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct RunnerToml {
    /// Runner name.
    pub name: Option<String>,
    /// Bind the runner to its building thread.
    pub associate_thread: Option<bool>,
    /// Initial descriptor-list capacity.
    pub initial_capacity: Option<usize>,
    /// Single-wait cap in milliseconds (0 = no cap).
    pub max_wait_ms: Option<u64>,
}

/// Apply a parsed TOML config to a [`RunnerConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut RunnerConfig, toml: &RunnerTomlConfig) {
    if let Some(ref v) = toml.runner.name {
        config.name.clone_from(v);
    }
    if let Some(v) = toml.runner.associate_thread {
        config.associate_thread = v;
    }
    if let Some(v) = toml.runner.initial_capacity {
        config.initial_capacity = v;
    }
    if let Some(v) = toml.runner.max_wait_ms {
        config.max_wait = (v > 0).then(|| Duration::from_millis(v));
    }
}

/// Parse a TOML string into a [`RunnerTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<RunnerTomlConfig, ConfigError> {
    Ok(toml::from_str(toml_str)?)
}

/// Read and parse a TOML file into a [`RunnerTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<RunnerTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        invalid("config file", &path.display().to_string(), e.to_string())
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // --- parse helpers ---

    #[test]
    fn parse_usize_valid() {
        assert_eq!(parse_usize("TEST", "42").unwrap(), 42);
        assert_eq!(parse_usize("TEST", " 100 ").unwrap(), 100);
        assert!(parse_usize("TEST", "-1").is_err());
    }

    #[test]
    fn parse_bool_variants() {
        for yes in ["true", "1", "YES", "on"] {
            assert!(parse_bool("TEST", yes).unwrap());
        }
        for no in ["false", "0", "No", "off"] {
            assert!(!parse_bool("TEST", no).unwrap());
        }
        assert!(parse_bool("TEST", "maybe").is_err());
    }

    #[test]
    fn parse_millis_zero_disables_cap() {
        assert_eq!(parse_millis("TEST", "0").unwrap(), None);
        assert_eq!(parse_millis("TEST", "none").unwrap(), None);
        assert_eq!(
            parse_millis("TEST", "25").unwrap(),
            Some(Duration::from_millis(25))
        );
        assert!(parse_millis("TEST", "soon").is_err());
    }

    // --- apply_overrides_from ---

    #[test]
    fn overrides_only_touch_set_vars() {
        let mut config = RunnerConfig::default();
        apply_overrides_from(&mut config, lookup_in(&[(ENV_MAX_WAIT_MS, "100")])).unwrap();
        assert_eq!(config.max_wait, Some(Duration::from_millis(100)));
        assert_eq!(config.name, RunnerConfig::default().name);
    }

    #[test]
    fn overrides_apply_all_vars() {
        let mut config = RunnerConfig::default();
        apply_overrides_from(
            &mut config,
            lookup_in(&[
                (ENV_RUNNER_NAME, "net"),
                (ENV_ASSOCIATE_THREAD, "yes"),
                (ENV_INITIAL_CAPACITY, "128"),
            ]),
        )
        .unwrap();
        assert_eq!(config.name, "net");
        assert!(config.associate_thread);
        assert_eq!(config.initial_capacity, 128);
    }

    #[test]
    fn bad_value_names_the_variable() {
        let mut config = RunnerConfig::default();
        let err = apply_overrides_from(&mut config, lookup_in(&[(ENV_INITIAL_CAPACITY, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_INITIAL_CAPACITY));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_unknown_sections_default() {
        let parsed = parse_toml_str("").unwrap();
        let mut config = RunnerConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config, RunnerConfig::default());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_file_is_read_and_applied() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        std::io::Write::write_all(&mut file, b"[runner]\nname = \"disk\"\ninitial_capacity = 8\n")
            .expect("write failed");
        let parsed = parse_toml_file(file.path()).expect("parse failed");
        let mut config = RunnerConfig::default();
        apply_toml_config(&mut config, &parsed);
        assert_eq!(config.name, "disk");
        assert_eq!(config.initial_capacity, 8);

        let builder = crate::runtime::RunnerBuilder::from_toml_file(file.path()).expect("builder");
        assert_eq!(builder.config().initial_capacity, 8);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn missing_toml_file_names_the_path() {
        let err = parse_toml_file(std::path::Path::new("/nonexistent/stagehand.toml")).unwrap_err();
        assert!(err.to_string().contains("stagehand.toml"));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_parse_error_is_reported() {
        assert!(matches!(
            parse_toml_str("[runner\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}

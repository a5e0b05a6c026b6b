//! Client configuration.
//!
//! Sources, lowest priority first: built-in defaults, the TOML file
//! (`~/.buildrules/config.toml` unless a path is given), environment
//! variables, then whatever the CLI sets on the loaded value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{OutputMode, RuleLimits};
use crate::impls::LockSettings;

/// Overrides `state_file`.
pub const STATE_FILE_ENV: &str = "BUILDRULES_STATE_FILE";
/// Overrides `output` (`table` or `json`).
pub const OUTPUT_ENV: &str = "BUILDRULES_OUTPUT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON document holding every task queue's rules.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    #[serde(default)]
    pub output: OutputMode,

    #[serde(default)]
    pub limits: RuleLimits,

    #[serde(default)]
    pub lock: LockSettings,
}

fn default_state_file() -> PathBuf {
    ClientConfig::config_dir().join("rules.json")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            output: OutputMode::default(),
            limits: RuleLimits::default(),
            lock: LockSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `path`, or from the default location when `None`, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// `~/.buildrules`, home of the default config and state files.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".buildrules")
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(state_file) = lookup(STATE_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            self.state_file = PathBuf::from(state_file);
        }
        if let Some(output) = lookup(OUTPUT_ENV) {
            self.output = output
                .parse()
                .map_err(|e: String| ConfigError::ValidationError(format!("{OUTPUT_ENV}: {e}")))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.state_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "state_file must not be empty".into(),
            ));
        }
        if self.limits.max_assignment_rules == 0 || self.limits.max_redirect_rules == 0 {
            return Err(ConfigError::ValidationError(
                "rule limits must be > 0".into(),
            ));
        }
        if self.lock.attempts == 0 {
            return Err(ConfigError::ValidationError(
                "lock.attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.limits.max_assignment_rules, 100);
        assert!(config.state_file.ends_with(".buildrules/rules.json"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "state_file = \"/var/lib/rules.json\"\noutput = \"json\"\n\n[limits]\nmax_redirect_rules = 3\n",
        )
        .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.state_file, PathBuf::from("/var/lib/rules.json"));
        assert_eq!(config.output, OutputMode::Json);
        assert_eq!(config.limits.max_redirect_rules, 3);
        assert_eq!(config.limits.max_assignment_rules, 100);
        assert_eq!(config.lock, LockSettings::default());
    }

    #[test]
    fn zero_limits_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[limits]\nmax_assignment_rules = 0\n").unwrap();

        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "output = [").unwrap();

        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn environment_overrides_the_file() {
        let env: HashMap<&str, &str> = [
            (STATE_FILE_ENV, "/tmp/other.json"),
            (OUTPUT_ENV, "json"),
        ]
        .into();
        let mut config = ClientConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.state_file, PathBuf::from("/tmp/other.json"));
        assert_eq!(config.output, OutputMode::Json);
    }

    #[test]
    fn unknown_output_in_environment_is_rejected() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env(|key| (key == OUTPUT_ENV).then(|| "yaml".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(OUTPUT_ENV));
    }
}

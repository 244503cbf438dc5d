//! Configuration loader and validator for the batch generator.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::WeekStart;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub generator: Generator,
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Pause between generator calls.
    pub throttle_ms: u64,
    #[serde(default)]
    pub week_start: WeekStart,
}

/// Remote idea generator endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Generator {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    pub timeout_secs: u64,
}

/// Base generation parameters applied to every job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    pub length: String,
    pub tone: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.resolved_data_dir())
    }

    /// `app.data_dir` with a leading `~/` expanded to `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        let dir = self.app.data_dir.trim();
        match (dir.strip_prefix("~/"), std::env::var("HOME")) {
            (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
            _ => dir.to_string(),
        }
    }

    /// `DATABASE_URL` if set, otherwise the calendar database inside the data dir.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/calendar.db", self.resolved_data_dir()))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    // throttle_ms == 0 is allowed: no pause between calls.

    if cfg.generator.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("generator.base_url must be non-empty"));
    }
    if Url::parse(cfg.generator.base_url.trim()).is_err() {
        return Err(ConfigError::Invalid("generator.base_url must be a valid URL"));
    }
    if cfg.generator.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("generator.api_key must be non-empty"));
    }
    if cfg.generator.timeout_secs == 0 {
        return Err(ConfigError::Invalid("generator.timeout_secs must be > 0"));
    }

    if cfg.defaults.length.trim().is_empty() {
        return Err(ConfigError::Invalid("defaults.length must be non-empty"));
    }
    if cfg.defaults.tone.trim().is_empty() {
        return Err(ConfigError::Invalid("defaults.tone must be non-empty"));
    }

    Ok(())
}

/// Sample configuration file.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  throttle_ms: 1500
  week_start: "monday"

generator:
  base_url: "https://ideas.example.com/"
  api_key: "YOUR_GENERATOR_API_KEY"
  model: "default"
  timeout_secs: 60

defaults:
  length: "medium"
  tone: "conversational"
"#
}

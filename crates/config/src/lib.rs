//! Configuration loading, validation, and management for PromptScaffold.
//!
//! Loads configuration from `~/.promptscaffold/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use promptscaffold_core::RetryPolicy;

/// The root configuration structure.
///
/// Maps directly to `~/.promptscaffold/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Enrichment API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Enrichment model
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the generative-language API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("enrichment", &self.enrichment)
            .field("analyzer", &self.analyzer)
            .field("output", &self.output)
            .field("storage", &self.storage)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Whether to call the enrichment API at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts per enrichment call (>= 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.7
}

impl EnrichmentConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Input beyond this many characters is ignored
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_max_input_chars() -> usize {
    2000
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Template ids rendered by `generate`
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,

    #[serde(default = "default_target_model")]
    pub target_model: String,
}

fn default_templates() -> Vec<String> {
    vec!["midjourney".into(), "stable-diffusion".into(), "dall-e".into()]
}
fn default_target_model() -> String {
    "midjourney".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            target_model: default_target_model(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local data directory (defaults to `~/.promptscaffold/data`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Whether `sync` may talk to the remote store
    #[serde(default)]
    pub remote_enabled: bool,

    /// OAuth access token for the remote store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("data_dir", &self.data_dir)
            .field("remote_enabled", &self.remote_enabled)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            remote_enabled: false,
            access_token: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.promptscaffold/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PROMPTSCAFFOLD_API_KEY` (highest priority), then `GEMINI_API_KEY`
    /// - `PROMPTSCAFFOLD_MODEL`
    /// - `PROMPTSCAFFOLD_DRIVE_TOKEN`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
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

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("PROMPTSCAFFOLD_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.api_key = Some(key);
        }

        if let Some(model) = lookup("PROMPTSCAFFOLD_MODEL") {
            self.model = model;
        }

        if let Some(token) = lookup("PROMPTSCAFFOLD_DRIVE_TOKEN") {
            self.storage.access_token = Some(token);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".promptscaffold")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Local data directory, configured or default.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("data"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enrichment.max_attempts < 1 {
            return Err(ConfigError::ValidationError(
                "enrichment.max_attempts must be at least 1".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.enrichment.temperature) {
            return Err(ConfigError::ValidationError(
                "enrichment.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.analyzer.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "analyzer.max_input_chars must be > 0".into(),
            ));
        }

        if self.output.templates.is_empty() {
            return Err(ConfigError::ValidationError(
                "output.templates must list at least one template".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_url: default_api_url(),
            enrichment: EnrichmentConfig::default(),
            analyzer: AnalyzerConfig::default(),
            output: OutputConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Get the user's home directory.
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

/// Configuration errors.
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
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.enrichment.max_attempts, 3);
        assert_eq!(config.enrichment.retry_delay_ms, 1000);
        assert_eq!(config.analyzer.max_input_chars, 2000);
        assert!(!config.storage.remote_enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.output.templates, config.output.templates);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
model = "gemini-1.5-pro"

[enrichment]
max_attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(parsed.model, "gemini-1.5-pro");
        assert_eq!(parsed.enrichment.max_attempts, 5);
        assert_eq!(parsed.enrichment.timeout_secs, 60);
        assert_eq!(parsed.output.target_model, "midjourney");
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.enrichment.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.enrichment.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analyzer.max_input_chars = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.output.templates.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, default_model());
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analyzer]\nmax_input_chars = 0\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        std::fs::write(&path, "model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "gemini-key"),
            ("PROMPTSCAFFOLD_API_KEY", "app-key"),
            ("PROMPTSCAFFOLD_MODEL", "gemini-exp"),
            ("PROMPTSCAFFOLD_DRIVE_TOKEN", "ya29.token"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("app-key"));
        assert_eq!(config.model, "gemini-exp");
        assert_eq!(config.storage.access_token.as_deref(), Some("ya29.token"));

        let mut config = AppConfig::default();
        config.apply_env(|k| (k == "GEMINI_API_KEY").then(|| "fallback".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("fallback"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("super-secret".into());
        config.storage.access_token = Some("token-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn retry_policy_from_config() {
        let config = EnrichmentConfig {
            max_attempts: 4,
            retry_delay_ms: 250,
            ..EnrichmentConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay(), Duration::from_millis(250));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.0-flash"));
        assert!(toml_str.contains("max_input_chars"));
    }
}

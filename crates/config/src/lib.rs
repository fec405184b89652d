//! Configuration loading, validation, and management for Codeweave.
//!
//! Loads configuration from `~/.codeweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.codeweave/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Turn loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Context budget settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Model-call retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Tool executor settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Knowledge store and ranking
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
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
            .field("provider", &self.provider)
            .field("orchestrator", &self.orchestrator)
            .field("context", &self.context)
            .field("retry", &self.retry)
            .field("tools", &self.tools)
            .field("knowledge", &self.knowledge)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    8192
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard cap on model turns per request
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Number of recent history entries replayed to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_true")]
    pub streaming: bool,

    #[serde(default = "default_true")]
    pub tools_enabled: bool,
}

fn default_max_turns() -> usize {
    5
}
fn default_history_window() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            history_window: default_history_window(),
            streaming: true,
            tools_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Aggregate file size (chars) above which full context is not sent
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    /// Threshold multiplier for high-capacity models
    #[serde(default = "default_high_capacity_multiplier")]
    pub high_capacity_multiplier: usize,

    /// Max files shown in full alongside a compressed summary
    #[serde(default = "default_relevant_file_limit")]
    pub relevant_file_limit: usize,
}

fn default_compression_threshold() -> usize {
    30_000
}
fn default_high_capacity_multiplier() -> usize {
    4
}
fn default_relevant_file_limit() -> usize {
    5
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            compression_threshold: default_compression_threshold(),
            high_capacity_multiplier: default_high_capacity_multiplier(),
            relevant_file_limit: default_relevant_file_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_attempts() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum matches returned by `search_files`
    #[serde(default = "default_search_result_cap")]
    pub search_result_cap: usize,

    /// Additional protected name fragments, on top of the built-in deny-list
    #[serde(default)]
    pub extra_protected_patterns: Vec<String>,

    /// Attempt one corrected re-invocation of a failed tool call
    #[serde(default = "default_true")]
    pub auto_fix: bool,
}

fn default_search_result_cap() -> usize {
    20
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_result_cap: default_search_result_cap(),
            extra_protected_patterns: vec![],
            auto_fix: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "memory", "file", or "none"
    #[serde(default = "default_knowledge_backend")]
    pub backend: String,

    /// JSONL file for the "file" backend; defaults to `~/.codeweave/knowledge.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Entries surfaced per request
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_knowledge_backend() -> String {
    "file".into()
}
fn default_top_k() -> usize {
    8
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_knowledge_backend(),
            path: None,
            top_k: default_top_k(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.codeweave/config.toml).
    ///
    /// Environment overrides:
    /// - `CODEWEAVE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `CODEWEAVE_MODEL`
    /// - `CODEWEAVE_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("CODEWEAVE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("CODEWEAVE_MODEL") {
            config.provider.model = model;
        }

        if let Ok(url) = std::env::var("CODEWEAVE_API_URL") {
            config.provider.api_url = url;
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codeweave")
    }

    /// Resolved path of the JSONL knowledge file.
    pub fn knowledge_path(&self) -> PathBuf {
        self.knowledge
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("knowledge.jsonl"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("provider.model must not be empty".into()));
        }

        if !(1..=20).contains(&self.orchestrator.max_turns) {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_turns must be between 1 and 20".into(),
            ));
        }

        if self.context.compression_threshold == 0 || self.context.high_capacity_multiplier == 0 {
            return Err(ConfigError::ValidationError(
                "context thresholds must be > 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError("retry.max_attempts must be >= 1".into()));
        }

        if self.tools.search_result_cap == 0 {
            return Err(ConfigError::ValidationError("tools.search_result_cap must be > 0".into()));
        }

        if !matches!(self.knowledge.backend.as_str(), "memory" | "file" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.backend must be one of memory, file, none (got '{}')",
                self.knowledge.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Render the effective config as TOML, with the API key stripped.
    pub fn redacted_toml(&self) -> String {
        let mut copy = self.clone();
        copy.provider.api_key = None;
        toml::to_string_pretty(&copy).unwrap_or_default()
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

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.max_turns, 5);
        assert_eq!(config.context.compression_threshold, 30_000);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.tools.search_result_cap, 20);
        assert_eq!(config.knowledge.top_k, 8);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.orchestrator.history_window, 4);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
max_turns = 3

[tools]
extra_protected_patterns = ["deploy.key"]
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.orchestrator.max_turns, 3);
        assert!(config.orchestrator.tools_enabled);
        assert_eq!(config.tools.extra_protected_patterns, vec!["deploy.key".to_string()]);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_turns_rejected() {
        let mut config = AppConfig::default();
        config.orchestrator.max_turns = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.knowledge.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unparseable_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[orchestrator\nmax_turns = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.model, "gpt-4o");
    }

    #[test]
    fn debug_and_toml_hide_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        assert!(!format!("{config:?}").contains("sk-secret"));
        assert!(!config.redacted_toml().contains("sk-secret"));
    }
}

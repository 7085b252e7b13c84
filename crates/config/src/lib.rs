//! Configuration loading, validation, and management for TaskHelm.
//!
//! Loads configuration from `taskhelm.toml` in the working directory (path
//! override via `TASKHELM_CONFIG`) with environment variable overrides for
//! secrets. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `taskhelm.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat/embedding provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Plan engine policy flags and paths
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Knowledge corpus and index settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// SMTP transport for the send_email tool
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Assistant persona settings
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (usually supplied via TASKHELM_API_KEY instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Chat completion model
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Embedding model for the retrieval index
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Max tokens per chat response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_max_tokens() -> u32 {
    1000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Consult the cookbook partition before synthesizing a fresh plan
    #[serde(default = "default_true")]
    pub consult_cookbook: bool,

    /// Execute a plan immediately after creation instead of waiting for
    /// operator confirmation
    #[serde(default)]
    pub auto_execute: bool,

    /// Enable flow-chart link generation
    #[serde(default = "default_true")]
    pub enable_chart: bool,

    /// Echo the raw template alongside the creation confirmation
    #[serde(default)]
    pub verbose_create: bool,

    /// Directory for persisted plan files
    #[serde(default = "default_plans_dir")]
    pub plans_dir: PathBuf,
}

fn default_true() -> bool {
    true
}
fn default_plans_dir() -> PathBuf {
    PathBuf::from("plans")
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            consult_cookbook: true,
            auto_execute: false,
            enable_chart: true,
            verbose_create: false,
            plans_dir: default_plans_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Source document for the documentation partition
    #[serde(default = "default_docs_file")]
    pub docs_file: PathBuf,

    /// Source document for the cookbook (process guidance) partition
    #[serde(default = "default_cookbook_file")]
    pub cookbook_file: PathBuf,

    /// Where the embedded chunk index lives
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Force re-ingestion even when the index already exists
    #[serde(default)]
    pub reimport: bool,

    /// Number of chunks folded into each answer
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_docs_file() -> PathBuf {
    PathBuf::from("corpus/documentation.txt")
}
fn default_cookbook_file() -> PathBuf {
    PathBuf::from("corpus/cookbook.txt")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("index")
}
fn default_top_k() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            docs_file: default_docs_file(),
            cookbook_file: default_cookbook_file(),
            index_dir: default_index_dir(),
            reimport: false,
            top_k: default_top_k(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    /// Usually supplied via TASKHELM_SMTP_PASSWORD instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Display name used in the From header
    #[serde(default)]
    pub sender: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    465
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: None,
            sender: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Name shown in the console prompt
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Language the assistant answers in
    #[serde(default = "default_language")]
    pub language: String,

    /// Ask the operator for name and language before the first turn
    #[serde(default)]
    pub ask_profile_on_start: bool,

    /// Render the tool catalog table at startup
    #[serde(default)]
    pub print_catalog_on_start: bool,
}

fn default_assistant_name() -> String {
    "TaskHelm".into()
}
fn default_language() -> String {
    "English".into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            language: default_language(),
            ask_profile_on_start: false,
            print_catalog_on_start: false,
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("sender", &self.sender)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("planner", &self.planner)
            .field("retrieval", &self.retrieval)
            .field("smtp", &self.smtp)
            .field("assistant", &self.assistant)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from disk with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("TASKHELM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("taskhelm.toml"));
        let mut config = Self::load_from(&path)?;

        // Environment variable overrides (highest priority)
        if let Ok(key) = std::env::var("TASKHELM_API_KEY") {
            config.provider.api_key = Some(key);
        }
        if let Ok(password) = std::env::var("TASKHELM_SMTP_PASSWORD") {
            config.smtp.password = Some(password);
        }
        if let Ok(model) = std::env::var("TASKHELM_MODEL") {
            config.provider.chat_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific path; missing file means defaults.
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

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be >= 1".into()));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Invalid("smtp.port must be non-zero".into()));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.provider
            .api_key
            .as_ref()
            .is_some_and(|k| !k.is_empty())
    }
}

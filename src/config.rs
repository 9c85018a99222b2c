//! Configuration for cardscry
//!
//! Every option has a default, so an empty TOML file (or no file at all)
//! yields a usable configuration. Credentials are resolved lazily: an inline
//! `api_key` wins, otherwise the named environment variable is read.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default config file name in the working directory
pub const CONFIG_FILE_NAME: &str = "cardscry.toml";

/// Placeholder in the prompt header replaced by `prompt.card_count`
pub const CARD_COUNT_PLACEHOLDER: &str = "{in_prompt_number}";

/// Logging verbosity, ordered from most to least verbose
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(Error::Config(format!("unknown log level '{}'", other))),
        }
    }
}

/// What to do when the rerank service fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankFailurePolicy {
    /// Fail the invocation with `RerankUnavailable`
    #[default]
    Abort,
    /// Keep the similarity ordering and continue
    Similarity,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub store: StoreSection,
    pub retrieval: RetrievalSection,
    pub prompt: PromptSection,
    pub network: NetworkSection,
    pub embedding: EmbeddingSection,
    pub rerank: RerankSection,
    pub llm: LlmSection,
    pub anki: AnkiSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path to the embedding store (`~` and `$VARS` are expanded)
    pub path: String,
    /// Table holding the cards
    pub table: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: "cards.db".to_string(),
            table: "cards".to_string(),
        }
    }
}

impl StoreSection {
    /// Store path with shell expansion applied
    pub fn resolved_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.path)
            .map_err(|e| Error::Config(format!("cannot expand store path: {}", e)))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// Candidates kept by the similarity scan
    pub top_k: usize,
    /// Documents per rerank request
    pub rerank_batch_size: usize,
    /// Keep only this many cards after reranking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_top_n: Option<usize>,
    pub on_rerank_failure: RerankFailurePolicy,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: 50,
            rerank_batch_size: 100,
            rerank_top_n: None,
            on_rerank_failure: RerankFailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSection {
    /// Header template placed above the query and card pool
    pub header: String,
    /// Number of cards the model is asked to pick
    pub card_count: usize,
}

impl Default for PromptSection {
    fn default() -> Self {
        Self {
            header: "You are a medical study assistant. From the flashcard pool below, \
                     pick the {in_prompt_number} cards that best help the student study the query. \
                     Cite every card you pick exactly as [nid:<id>] and explain in a sentence why it helps."
                .to_string(),
            card_count: 5,
        }
    }
}

impl PromptSection {
    /// Header with the card-count placeholder substituted
    pub fn rendered_header(&self) -> String {
        self.header
            .replace(CARD_COUNT_PLACEHOLDER, &self.card_count.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Per-call timeout for every remote service
    pub timeout_secs: u64,
    /// Extra attempts after a retryable failure (0 = fail fast)
    pub max_retries: u32,
    /// Base delay between attempts, doubled on each retry
    pub retry_backoff_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

impl NetworkSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_env: String,
    /// Optional instruction prepended to the query before encoding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.studio.nebius.com/v1".to_string(),
            model: "Qwen/Qwen3-Embedding-8B".to_string(),
            api_key: None,
            api_key_env: "NEBIUS_API_KEY".to_string(),
            instruction: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSection {
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_env: String,
}

impl Default for RerankSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.cohere.ai/v2/rerank".to_string(),
            model: "rerank-v3.5".to_string(),
            api_key: None,
            api_key_env: "COHERE_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnkiSection {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for AnkiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:8765".to_string(),
        }
    }
}

/// Resolve a credential: inline value first, then the environment variable
pub fn resolve_api_key(service: &str, inline: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = inline.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(Error::Config(format!(
            "{} credentials missing: set `api_key` or the {} environment variable",
            service, env_var
        ))),
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse TOML: {}", e)))
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load configuration using the standard lookup order
    ///
    /// An explicit path must exist. Without one, `./cardscry.toml` and then the
    /// user config directory are tried before falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Self::load_from(path);
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "loading config");
                return Self::load_from(&candidate);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Candidate config locations, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("cardscry").join("config.toml"));
        }
        paths
    }

    /// Render as TOML (used by `cardscry init`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to render TOML: {}", e)))
    }

    /// Write the default configuration, refusing to clobber unless `force`
    pub fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let content = format!("# cardscry configuration\n{}", Self::default().to_toml()?);
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("failed to write {}: {}", path.display(), e)))
    }
}

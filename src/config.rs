//! TOML configuration.
//!
//! Every knob the service has lives in one file (default
//! `./config/rag.toml`). Secrets are never read from the file: provider
//! sections name the environment variable holding their API key.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub launches: LaunchesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Build a zero-document index instead of failing when the corpus is empty.
    #[serde(default)]
    pub allow_empty: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_top_k() -> usize {
    2
}
fn default_preview_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    /// Directory holding `index.json`. Unset means rebuild on every start.
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,
    /// Build the index before binding the listener instead of on first query.
    #[serde(default)]
    pub eager: bool,
}

/// Which embedding backend to talk to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Any OpenAI-compatible `/embeddings` endpoint (OpenAI, xAI).
    OpenAi,
    Ollama,
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingKind,
    pub model: String,
    pub dims: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which answer model backend to talk to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmKind {
    /// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, xAI).
    OpenAi,
    Ollama,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: LlmKind,
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Token budget for the assembled prompt (question plus retrieved context).
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "XAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_context_window() -> usize {
    128_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LaunchesConfig {
    #[serde(default = "default_launches_url")]
    pub base_url: String,
    #[serde(default = "default_launches_timeout")]
    pub timeout_secs: u64,
}

impl Default for LaunchesConfig {
    fn default() -> Self {
        Self {
            base_url: default_launches_url(),
            timeout_secs: default_launches_timeout(),
        }
    }
}

fn default_launches_url() -> String {
    "https://api.spacexdata.com/v5".to_string()
}
fn default_launches_timeout() -> u64 {
    10
}

impl EmbeddingConfig {
    /// Base URL with trailing slashes removed, falling back to the provider default.
    pub fn base_url(&self) -> String {
        let url = match (&self.url, self.provider) {
            (Some(u), _) => u.as_str(),
            (None, EmbeddingKind::OpenAi) => "https://api.openai.com/v1",
            (None, EmbeddingKind::Ollama) => "http://localhost:11434",
            (None, EmbeddingKind::Local) => "",
        };
        url.trim_end_matches('/').to_string()
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> String {
        let url = match (&self.url, self.provider) {
            (Some(u), _) => u.as_str(),
            (None, LlmKind::OpenAi) => "https://api.openai.com/v1",
            (None, LlmKind::Ollama) => "http://localhost:11434",
        };
        url.trim_end_matches('/').to_string()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content).with_context(|| "Failed to parse config file")?;
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;

    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    if config.llm.context_window == 0 {
        bail!("llm.context_window must be > 0");
    }

    for (name, url) in [
        ("embedding.url", config.embedding.url.as_deref()),
        ("llm.url", config.llm.url.as_deref()),
        ("launches.base_url", Some(config.launches.base_url.as_str())),
    ] {
        if let Some(url) = url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("{} must start with http:// or https://, got '{}'", name, url);
            }
        }
    }

    Ok(config)
}

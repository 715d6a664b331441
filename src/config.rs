use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fragmenting: FragmentingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Root directory for cached repository checkouts. One subdirectory
    /// per repository id; grows monotonically, never evicted.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cached_repos")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FragmentingConfig {
    /// Fragment window size in characters.
    #[serde(default = "default_fragment_size")]
    pub size: usize,
    /// Overlap between consecutive fragments, in characters. Must be
    /// strictly less than `size`.
    #[serde(default = "default_fragment_overlap")]
    pub overlap: usize,
    /// File extensions (without dot) eligible for indexing.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names skipped anywhere in the tree.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

impl Default for FragmentingConfig {
    fn default() -> Self {
        Self {
            size: default_fragment_size(),
            overlap: default_fragment_overlap(),
            extensions: default_extensions(),
            skip_dirs: default_skip_dirs(),
        }
    }
}

fn default_fragment_size() -> usize {
    500
}
fn default_fragment_overlap() -> usize {
    50
}
fn default_extensions() -> Vec<String> {
    [
        "py", "rs", "js", "ts", "jsx", "tsx", "java", "go", "cpp", "c", "rb", "php", "html", "css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        "__pycache__",
        "node_modules",
        ".venv",
        "venv",
        "target",
        "dist",
        "build",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of nearest fragments retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding provider: `openai` or `disabled`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Texts longer than this are truncated (character count) before
    /// being sent to the backend.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_max_input_chars() -> usize {
    8000
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Chat backend: `ollama`, `openai`, or `disabled`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL for the Ollama backend.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// The chat call is the only unbounded external dependency, so it
    /// always runs under this timeout.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_ollama_url(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "disabled".to_string()
}
fn default_llm_model() -> String {
    "llama3.2".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Maximum number of repository contexts kept in the session cache.
    /// Unset means unbounded: entries live for the process lifetime.
    #[serde(default)]
    pub max_cached_repos: Option<usize>,
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate a config file. A missing file is not an error: the
/// built-in defaults mirror `config/repolens.example.toml`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return validate(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;

    validate(config)
}

fn validate(config: Config) -> Result<Config> {
    if config.fragmenting.size == 0 {
        return Err(Error::Config("fragmenting.size must be > 0".into()));
    }
    if config.fragmenting.overlap >= config.fragmenting.size {
        return Err(Error::Config(format!(
            "fragmenting.overlap ({}) must be < fragmenting.size ({})",
            config.fragmenting.overlap, config.fragmenting.size
        )));
    }
    if config.retrieval.top_k == 0 {
        return Err(Error::Config("retrieval.top_k must be >= 1".into()));
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            return Err(Error::Config(format!(
                "embedding.model must be set when provider is '{}'",
                config.embedding.provider
            )));
        }
        if config.embedding.dims.unwrap_or(0) == 0 {
            return Err(Error::Config(format!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            )));
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown embedding provider: '{}' (expected disabled or openai)",
                other
            )))
        }
    }

    match config.llm.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => {
            return Err(Error::Config(format!(
                "unknown llm provider: '{}' (expected disabled, ollama, or openai)",
                other
            )))
        }
    }

    Ok(config)
}

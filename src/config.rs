//! TOML configuration.
//!
//! Every section is optional; a missing file yields the defaults below so
//! `rh ingest --repo .` works out of the box.
//!
//! ```toml
//! [data]
//! root = "./data"
//!
//! [chunking]
//! chunk_size = 800
//! chunk_overlap = 200
//!
//! [store]
//! collection = "project"
//! batch_size = 100
//!
//! [embedding]
//! provider = "openai"          # openai | ollama | local | hash | disabled
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [llm]
//! provider = "anthropic"       # anthropic | openai | disabled
//! model = "claude-3-5-haiku-latest"
//!
//! [agent]
//! k = 6
//! max_iterations = 8
//!
//! [server]
//! bind = "0.0.0.0:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use repo_harness_core::agent::{DEFAULT_AGENT_K, DEFAULT_MAX_ITERATIONS, DEFAULT_SYSTEM_PROMPT};
use repo_harness_core::chunk::{ChunkParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use repo_harness_core::collection::DEFAULT_BATCH_SIZE;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub stdio: StdioConfig,
    #[serde(default)]
    pub repo: RepoConfig,
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Parent directory of all collections.
    #[serde(default = "default_data_root")]
    pub root: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn default_collection() -> String {
    "project".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "ollama" => "nomic-embed-text".to_string(),
            "local" => "all-minilm-l6-v2".to_string(),
            "hash" => "hash".to_string(),
            _ => "text-embedding-3-small".to_string(),
        })
    }

    pub fn dims_or_default(&self) -> usize {
        self.dims.unwrap_or(match self.provider.as_str() {
            "ollama" => 768,
            "local" => 384,
            "hash" => 256,
            _ => 1536,
        })
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "anthropic".to_string()
}
fn default_llm_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_agent_k")]
    pub k: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub return_direct: bool,
    /// Retry empty docs searches without a filter.
    #[serde(default)]
    pub docs_fallback: bool,
    /// Deadline for one `/ask` request.
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_AGENT_K,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            return_direct: false,
            docs_fallback: false,
            timeout_secs: default_agent_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_agent_k() -> usize {
    DEFAULT_AGENT_K
}
fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}
fn default_agent_timeout_secs() -> u64 {
    120
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StdioConfig {
    #[serde(default = "default_stdio_k")]
    pub k: usize,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            k: default_stdio_k(),
        }
    }
}

fn default_stdio_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepoConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Files larger than this are skipped.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub branch: Option<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            branch: None,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_max_file_bytes() -> u64 {
    1_000_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_true")]
    pub restrict_domain: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            restrict_domain: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_pages() -> usize {
    500
}
fn default_true() -> bool {
    true
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
    "0.0.0.0:8000".to_string()
}

/// Read and validate the config file, falling back to defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    config.chunking.params().validate()?;

    if config.store.batch_size == 0 {
        bail!("store.batch_size must be > 0");
    }
    crate::collections::validate_collection_name(&config.store.collection)?;

    if config.agent.k == 0 {
        bail!("agent.k must be >= 1");
    }
    if config.agent.max_iterations == 0 {
        bail!("agent.max_iterations must be >= 1");
    }
    if config.stdio.k == 0 {
        bail!("stdio.k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, local, hash, or disabled.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    match config.llm.provider.as_str() {
        "anthropic" | "openai" | "disabled" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be anthropic, openai, or disabled.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/rh.toml")).unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.store.batch_size, 100);
        assert_eq!(config.store.collection, "project");
        assert_eq!(config.agent.k, 6);
        assert_eq!(config.stdio.k, 5);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[embedding]\nprovider = \"hash\"\ndims = 64\n\n[agent]\nk = 3").unwrap();
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.embedding.provider, "hash");
        assert_eq!(config.embedding.dims_or_default(), 64);
        assert_eq!(config.agent.k, 3);
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.llm.provider, "anthropic");
    }

    #[test]
    fn overlap_not_smaller_than_size_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[chunking]\nchunk_size = 100\nchunk_overlap = 100").unwrap();
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[llm]\nprovider = \"parrot\"").unwrap();
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn bad_collection_name_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[store]\ncollection = \"../escape\"").unwrap();
        assert!(load_config(f.path()).is_err());
    }
}

//! Configuration parsing and validation.
//!
//! The CLI is configured via a TOML file (default: `./gqlgen.toml`). The
//! config defines the SQLite database path, chunking parameters, generator
//! tuning, and the embedding/LLM provider settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub generator: GeneratorConfigSection,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Logical namespace documents are stored and searched under.
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "schema".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
}

fn default_max_content_length() -> usize {
    4_000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_content_length: default_max_content_length() }
    }
}

/// Mirrors [`graphql_gen_core::generator::GeneratorConfig`], as TOML input.
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfigSection {
    #[serde(default = "default_min_similarity_score")]
    pub min_similarity_score: f64,
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_max_type_depth")]
    pub max_type_depth: usize,
    #[serde(default = "default_max_validation_retries")]
    pub max_validation_retries: u32,
}

fn default_min_similarity_score() -> f64 {
    0.4
}
fn default_max_documents() -> usize {
    50
}
fn default_max_type_depth() -> usize {
    5
}
fn default_max_validation_retries() -> u32 {
    5
}

impl Default for GeneratorConfigSection {
    fn default() -> Self {
        Self {
            min_similarity_score: default_min_similarity_score(),
            max_documents: default_max_documents(),
            max_type_depth: default_max_type_depth(),
            max_validation_retries: default_max_validation_retries(),
        }
    }
}

impl From<&GeneratorConfigSection> for graphql_gen_core::generator::GeneratorConfig {
    fn from(section: &GeneratorConfigSection) -> Self {
        graphql_gen_core::generator::GeneratorConfig {
            min_similarity_score: section.min_similarity_score,
            max_documents: section.max_documents,
            max_type_depth: section.max_type_depth,
            max_validation_retries: section.max_validation_retries,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the embeddings endpoint, for OpenAI-compatible servers
    /// other than the public OpenAI API.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            max_tokens: None,
            base_url: None,
        }
    }
}

fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

pub const KNOWN_EMBEDDING_PROVIDERS: &[&str] = &["openai"];
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai"];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_content_length == 0 {
        anyhow::bail!("chunking.max_content_length must be > 0");
    }

    if !(0.0..=1.0).contains(&config.generator.min_similarity_score) {
        anyhow::bail!("generator.min_similarity_score must be in [0.0, 1.0]");
    }
    if config.generator.max_documents == 0 {
        anyhow::bail!("generator.max_documents must be > 0");
    }

    if !KNOWN_EMBEDDING_PROVIDERS.contains(&config.embedding.provider.as_str()) {
        anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be one of {:?}.",
            config.embedding.provider,
            KNOWN_EMBEDDING_PROVIDERS
        );
    }
    if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified");
    }

    if !KNOWN_LLM_PROVIDERS.contains(&config.llm.provider.as_str()) {
        anyhow::bail!(
            "Unknown LLM provider: '{}'. Must be one of {:?}.",
            config.llm.provider,
            KNOWN_LLM_PROVIDERS
        );
    }
    if config.llm.model.is_none() {
        anyhow::bail!("llm.model must be specified");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &std::path::Path, content: &str) -> PathBuf {
        let path = dir.join("gqlgen.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_minimal_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [db]
            path = "./gqlgen.sqlite"

            [embedding]
            model = "text-embedding-3-small"
            dims = 1536

            [llm]
            model = "gpt-4o-mini"
            "#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.db.table, "schema");
        assert_eq!(config.generator.min_similarity_score, 0.4);
    }

    #[test]
    fn rejects_zero_max_content_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [db]
            path = "./gqlgen.sqlite"

            [chunking]
            max_content_length = 0

            [embedding]
            model = "m"
            dims = 8

            [llm]
            model = "m"
            "#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_out_of_range_similarity_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [db]
            path = "./gqlgen.sqlite"

            [generator]
            min_similarity_score = 1.5

            [embedding]
            model = "m"
            dims = 8

            [llm]
            model = "m"
            "#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_unknown_embedding_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
            [db]
            path = "./gqlgen.sqlite"

            [embedding]
            provider = "made-up"
            model = "m"
            dims = 8

            [llm]
            model = "m"
            "#,
        );
        assert!(load_config(&path).is_err());
    }
}

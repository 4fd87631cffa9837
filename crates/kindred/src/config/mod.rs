use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KindredError, Result};
use crate::personality::PersonalityVariant;

/// Main configuration structure for Kindred
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Companion identity and default persona
    #[serde(default)]
    pub companion: CompanionConfig,
    /// Session and retrieval budgets for the orchestrator
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Salience scoring parameters
    #[serde(default)]
    pub salience: SalienceConfig,
    /// Long-term storage backend
    #[serde(default)]
    pub storage: StorageConfig,
    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Response generation provider
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists. Falls back to built-in defaults.
    ///
    /// Default search order:
    /// 1. `~/.kindred/config.toml`
    /// 2. `$XDG_CONFIG_HOME/kindred/config.toml`
    /// 3. `./config.toml`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".kindred").join("config.toml")),
            dirs::config_dir().map(|c| c.join("kindred").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for candidate in default_paths.iter().flatten() {
            if candidate.exists() {
                tracing::info!("Loading config from: {}", candidate.display());
                return Self::from_file(candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KindredError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| KindredError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the orchestrator misbehave.
    pub fn validate(&self) -> Result<()> {
        let memory = &self.memory;
        if memory.session_capacity == 0 {
            return Err(KindredError::Config(
                "memory.session_capacity must be at least 1".to_string(),
            ));
        }
        if memory.max_context_items == 0 {
            return Err(KindredError::Config(
                "memory.max_context_items must be at least 1".to_string(),
            ));
        }
        if memory.store_timeout_ms == 0 {
            return Err(KindredError::Config(
                "memory.store_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&memory.emotion_threshold) {
            return Err(KindredError::Config(format!(
                "memory.emotion_threshold must be within 0.0..=1.0, got {}",
                memory.emotion_threshold
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(KindredError::Config(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(KindredError::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        Ok(())
    }
}

/// Companion identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CompanionConfig {
    /// Display name used in the system prompt
    #[serde(default = "default_companion_name")]
    pub name: String,
    /// Owner identifier memories are filed under
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Optional display name for the user
    #[serde(default)]
    pub user_name: Option<String>,
    /// Persona the companion starts with
    #[serde(default)]
    pub personality: PersonalityVariant,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            name: default_companion_name(),
            user_id: default_user_id(),
            user_name: None,
            personality: PersonalityVariant::default(),
        }
    }
}

fn default_companion_name() -> String {
    "Kindred".to_string()
}

fn default_user_id() -> String {
    "default_user".to_string()
}

/// Session and retrieval budgets
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Maximum turns kept in the session buffer before FIFO eviction
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,
    /// Number of recent turns always included in a retrieval
    #[serde(default = "default_session_window")]
    pub session_window: usize,
    /// Maximum persistent matches requested per retrieval
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Total item budget of a merged context
    #[serde(default = "default_max_context_items")]
    pub max_context_items: usize,
    /// Time budget for a single persistent search or write, in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Minimum sentiment intensity that produces an Emotion record
    #[serde(default = "default_emotion_threshold")]
    pub emotion_threshold: f32,
    /// Stored preferences listed in every prompt, newest first
    #[serde(default = "default_profile_limit")]
    pub profile_limit: usize,
}

impl MemoryConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            session_capacity: default_session_capacity(),
            session_window: default_session_window(),
            search_limit: default_search_limit(),
            max_context_items: default_max_context_items(),
            store_timeout_ms: default_store_timeout_ms(),
            emotion_threshold: default_emotion_threshold(),
            profile_limit: default_profile_limit(),
        }
    }
}

fn default_session_capacity() -> usize {
    100
}

fn default_session_window() -> usize {
    5
}

fn default_search_limit() -> usize {
    5
}

fn default_max_context_items() -> usize {
    12
}

fn default_store_timeout_ms() -> u64 {
    3000
}

fn default_profile_limit() -> usize {
    10
}

fn default_emotion_threshold() -> f32 {
    0.6
}

/// Salience scoring parameters
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct SalienceConfig {
    /// Exponential decay per day of age
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    /// Multiplier for the logarithm of the retrieval hit count
    #[serde(default = "default_hit_multiplier")]
    pub hit_multiplier: f32,
}

impl Default for SalienceConfig {
    fn default() -> Self {
        Self {
            decay_rate: default_decay_rate(),
            hit_multiplier: default_hit_multiplier(),
        }
    }
}

fn default_decay_rate() -> f32 {
    0.05
}

fn default_hit_multiplier() -> f32 {
    0.1
}

/// Which long-term index implementation to use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// LanceDB table on disk
    #[default]
    Lance,
    /// In-process index, lost on exit
    Memory,
}

/// Long-term storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Base directory for all storage data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".kindred"))
        .unwrap_or_else(|| PathBuf::from(".kindred"))
}

/// Embedding model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name; only the multilingual e5 family is bundled
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimension size
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
        }
    }
}

fn default_embedding_model() -> String {
    "multilingual-e5-small".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

/// Chat-completion provider
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    OpenRouter,
    #[default]
    Ollama,
}

impl Provider {
    /// Base URL of the provider's OpenAI-compatible API
    pub fn default_api_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Environment variable holding the API key, if the provider needs one
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Ollama => None,
        }
    }
}

/// Response generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: Provider,
    /// API endpoint URL; provider default when unset
    #[serde(default)]
    pub api_url: Option<String>,
    /// Environment variable name for the API key; provider default when unset
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Model identifier
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Attempts made on rate limiting or transport errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl GenerationConfig {
    pub fn resolved_api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| self.provider.default_api_url().to_string())
    }

    pub fn resolved_api_key_env(&self) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| self.provider.default_api_key_env().map(str::to_string))
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_url: None,
            api_key_env: None,
            model: default_generation_model(),
            timeout_secs: default_generation_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_generation_model() -> String {
    "gemma3:1b".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_max_retries() -> u32 {
    3
}

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunking::{ChunkingSettings, ChunkingStrategy};
use crate::error::{Error, Result};
use crate::types::{
    RetrievalRequest, DEFAULT_ALPHA, DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_MODE, DEFAULT_TOP_K,
};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    /// Defaults overlaid with a single TOML file; no environment lookup.
    pub fn from_file(path: &Path) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{key}': {e}")))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| Error::Configuration(format!("Failed to load settings: {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalDefaults,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data.dir)
    }

    pub fn chunking_strategy(&self) -> Result<ChunkingStrategy> {
        ChunkingStrategy::from_settings(&self.chunking)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    /// Directory holding `<stem>_chunks.json`, `<stem>_embedding.npy`, `<stem>_meta.json`.
    pub dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { dir: "data".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDefaults {
    pub top_k: i64,
    pub mode: String,
    pub alpha: f32,
    pub candidate_multiplier: i64,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            mode: DEFAULT_MODE.to_string(),
            alpha: DEFAULT_ALPHA,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }
}

impl RetrievalDefaults {
    pub fn request(&self, query: impl Into<String>) -> RetrievalRequest {
        RetrievalRequest::new(query)
            .with_top_k(self.top_k)
            .with_mode(self.mode.clone())
            .with_alpha(self.alpha)
            .with_candidate_multiplier(self.candidate_multiplier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Empty means "search the usual locations".
    pub model_dir: String,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: String::new(), batch_size: 32 }
    }
}

impl EmbeddingSettings {
    pub fn model_dir(&self) -> Option<PathBuf> {
        (!self.model_dir.trim().is_empty()).then(|| expand_path(&self.model_dir))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub api_base: String,
    pub model: String,
    /// Environment variable holding the API credential.
    pub api_key_env: String,
    pub max_output_tokens: u32,
    pub summary_max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_output_tokens: 500,
            summary_max_output_tokens: 350,
            timeout_secs: 60,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

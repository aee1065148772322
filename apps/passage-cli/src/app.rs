use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use passage_core::config::{Config, Settings};
use passage_core::traits::Embedder;
use passage_core::types::RetrievalRequest;
use passage_embed::get_default_embedder;
use passage_hybrid::{Assistant, OpenAiGenerator, RetrievalEngine};
use passage_vector::IngestOptions;

/// Per-invocation overrides of the configured retrieval defaults.
#[derive(Debug, Default, Clone, Args)]
pub struct RequestArgs {
    /// Number of results
    #[arg(short = 'k', long, allow_negative_numbers = true)]
    pub top_k: Option<i64>,

    /// semantic, lexical or hybrid
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Semantic weight in hybrid mode, 0.0 to 1.0
    #[arg(long, allow_negative_numbers = true)]
    pub alpha: Option<f32>,

    /// Drop results scoring below this
    #[arg(long, allow_negative_numbers = true)]
    pub min_score: Option<f32>,

    /// Per-signal candidate pool in hybrid mode, as a multiple of top-k
    #[arg(long, allow_negative_numbers = true)]
    pub candidate_multiplier: Option<i64>,
}

pub struct AppContext {
    pub settings: Settings,
    pub data_dir: PathBuf,
}

impl AppContext {
    /// `config.toml` + environment, or only `config_path` when given.
    pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::from_file(path),
            None => Config::load()?,
        };
        let settings = config.settings()?;
        let data_dir = data_dir.unwrap_or_else(|| settings.data_dir());
        Ok(Self { settings, data_dir })
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let embedder = get_default_embedder(self.settings.embedding.model_dir())?;
        Ok(Arc::from(embedder))
    }

    pub fn ingest_options(&self) -> Result<IngestOptions> {
        Ok(IngestOptions::new(&self.data_dir)
            .with_strategy(self.settings.chunking_strategy()?)
            .with_batch_size(self.settings.embedding.batch_size))
    }

    pub fn engine(&self) -> Result<Arc<RetrievalEngine>> {
        Ok(Arc::new(RetrievalEngine::with_global_cache(self.embedder()?)))
    }

    pub fn assistant(&self) -> Result<Assistant> {
        let generation = &self.settings.generation;
        let generator = Arc::new(OpenAiGenerator::from_settings(generation)?);
        Ok(Assistant::new(self.engine()?, generator, &self.data_dir)
            .with_token_limits(generation.max_output_tokens, generation.summary_max_output_tokens))
    }

    pub fn request(&self, query: &str, args: &RequestArgs) -> RetrievalRequest {
        let mut request = self.settings.retrieval.request(query).with_min_score(args.min_score);
        if let Some(top_k) = args.top_k {
            request = request.with_top_k(top_k);
        }
        if let Some(mode) = &args.mode {
            request = request.with_mode(mode.clone());
        }
        if let Some(alpha) = args.alpha {
            request = request.with_alpha(alpha);
        }
        if let Some(multiplier) = args.candidate_multiplier {
            request = request.with_candidate_multiplier(multiplier);
        }
        request
    }
}

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use passage_core::traits::Embedder;
use passage_core::{Error, Result};

pub mod device;
pub mod fake;
pub mod pool;
pub mod tokenize;

pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;

/// Sequence cap for sentence-transformer checkpoints.
pub const DEFAULT_MAX_LEN: usize = 256;
/// Output width of all-MiniLM-L6-v2, also used by the fake embedder.
pub const DEFAULT_DIM: usize = 384;
const DEFAULT_MODEL_DIRS: [&str; 2] = ["models/all-MiniLM-L6-v2", "../models/all-MiniLM-L6-v2"];

fn upstream(e: anyhow::Error) -> Error {
    Error::Upstream(format!("embedding: {e:#}"))
}

/// BERT-family sentence encoder: masked mean pooling followed by L2 normalization.
pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    model_id: String,
}

impl EmbeddingModel {
    /// Loads `tokenizer.json`, `config.json` and the weights from `model_dir`.
    /// `model.safetensors` is preferred, `pytorch_model.bin` is the fallback.
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))?;

        let config_path = model_dir.join("config.json");
        let config_text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&config_text)
            .with_context(|| format!("parsing {}", config_path.display()))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)?;

        let max_len = DEFAULT_MAX_LEN.min(config.max_position_embeddings);
        let model_id = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| model_dir.display().to_string());
        info!(model = %model_id, dim = config.hidden_size, max_len, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim: config.hidden_size, max_len, model_id })
    }

    fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(candle_core::DType::F32)?.to_vec2()?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }

    fn model_id(&self) -> String { self.model_id.clone() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.encode(texts).map_err(upstream)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> anyhow::Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return Ok(weights.into_iter().collect());
    }
    Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Finds the model directory: the configured one first, then `APP_MODEL_DIR`,
/// `MODEL_DIR`, and the conventional `models/` locations.
pub fn resolve_model_dir(configured: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(dir) = configured {
        if dir.exists() {
            return Some(dir);
        }
        warn!(dir = %dir.display(), "configured model dir does not exist");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(dir);
            if p.exists() {
                debug!(var, dir = %p.display(), "model dir from environment");
                return Some(p);
            }
        }
    }
    DEFAULT_MODEL_DIRS.iter().map(PathBuf::from).find(|p| p.exists())
}

/// The embedder the application runs with. `APP_USE_FAKE_EMBEDDINGS=1` selects
/// the hashing embedder and skips model loading entirely.
pub fn get_default_embedder(model_dir: Option<PathBuf>) -> Result<Box<dyn Embedder>> {
    if env_flag("APP_USE_FAKE_EMBEDDINGS") {
        info!(dim = DEFAULT_DIM, "using fake embedder");
        return Ok(Box::new(FakeEmbedder::new(DEFAULT_DIM)));
    }
    let dir = resolve_model_dir(model_dir)
        .ok_or_else(|| Error::Configuration("could not locate an embedding model directory; set embedding.model_dir or APP_MODEL_DIR".into()))?;
    Ok(Box::new(EmbeddingModel::load(&dir).map_err(upstream)?))
}

//! Domain types shared by the chunker, the scorers and the orchestrator.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::chunking::ChunkingStrategy;
use crate::error::{Error, Result};

pub type ChunkId = usize;

pub const DEFAULT_TOP_K: i64 = 5;
pub const DEFAULT_MODE: &str = "hybrid";
pub const DEFAULT_ALPHA: f32 = 0.7;
pub const DEFAULT_CANDIDATE_MULTIPLIER: i64 = 5;

/// A span of a source document that is independently retrievable.
///
/// - `chunk_id`: position of the chunk in its document's chunk list; also
///   the row of its vector in the embedding matrix
/// - `char_start`/`char_end`: half-open char offsets into the source text
/// - `filename`/`source_path`: the uploaded document this chunk came from
/// - `created_at`: ingestion time, shared by every chunk of one ingest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub filename: String,
    pub source_path: String,
    pub created_at: NaiveDateTime,
    pub char_start: usize,
    pub char_end: usize,
    pub content: String,
}

/// Chunker output before document metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
}

/// Retrieval mode, resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Semantic,
    Lexical,
    /// `alpha` weighs the semantic score; `candidate_multiplier` bounds the
    /// per-signal candidate pool to `top_k * candidate_multiplier`.
    Hybrid { alpha: f32, candidate_multiplier: usize },
}

impl Mode {
    pub fn needs_embeddings(self) -> bool {
        !matches!(self, Mode::Lexical)
    }

    pub fn needs_lexical(self) -> bool {
        !matches!(self, Mode::Semantic)
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Semantic => "semantic",
            Mode::Lexical => "lexical",
            Mode::Hybrid { .. } => "hybrid",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Hybrid { alpha, candidate_multiplier } => {
                write!(f, "hybrid(alpha={alpha}, candidates=x{candidate_multiplier})")
            }
            other => f.write_str(other.name()),
        }
    }
}

fn default_top_k() -> i64 {
    DEFAULT_TOP_K
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}

fn default_candidate_multiplier() -> i64 {
    DEFAULT_CANDIDATE_MULTIPLIER
}

/// A retrieval request as callers send it.
///
/// Numeric fields are signed and `mode` is free text so that out-of-range
/// input reaches [`RetrievalRequest::validate`] and is reported as a
/// validation error instead of a decoding failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default)]
    pub min_score: Option<f32>,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: i64,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            min_score: None,
            mode: default_mode(),
            alpha: DEFAULT_ALPHA,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_candidate_multiplier(mut self, candidate_multiplier: i64) -> Self {
        self.candidate_multiplier = candidate_multiplier;
        self
    }

    /// Check every field and resolve the mode string into a [`Mode`].
    pub fn validate(&self) -> Result<RetrievalQuery> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(Error::Validation("query cannot be empty".into()));
        }
        let top_k = usize::try_from(self.top_k)
            .ok()
            .filter(|k| *k > 0)
            .ok_or_else(|| Error::Validation(format!("top_k must be > 0 (got {})", self.top_k)))?;
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::Validation(format!(
                "alpha must be within [0, 1] (got {})",
                self.alpha
            )));
        }
        let candidate_multiplier = usize::try_from(self.candidate_multiplier)
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "candidate_multiplier must be > 0 (got {})",
                    self.candidate_multiplier
                ))
            })?;
        if let Some(min_score) = self.min_score.filter(|s| !s.is_finite()) {
            return Err(Error::Validation(format!("min_score must be a finite number (got {min_score})")));
        }
        let mode = match self.mode.trim().to_ascii_lowercase().as_str() {
            "semantic" => Mode::Semantic,
            "lexical" => Mode::Lexical,
            "hybrid" => Mode::Hybrid { alpha: self.alpha, candidate_multiplier },
            other => {
                return Err(Error::Validation(format!(
                    "unknown mode '{other}' (expected semantic, lexical or hybrid)"
                )))
            }
        };
        Ok(RetrievalQuery { query: query.to_string(), top_k, min_score: self.min_score, mode })
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub query: String,
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub char_start: usize,
    pub char_end: usize,
    pub source_path: String,
    pub created_at: NaiveDateTime,
}

/// One ranked passage. `score` is the normalized score of the request's
/// mode and always lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub filename: String,
    pub content: String,
    pub metadata: ResultMetadata,
}

impl RetrievalResult {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            score,
            filename: chunk.filename.clone(),
            content: chunk.content.clone(),
            metadata: ResultMetadata {
                char_start: chunk.char_start,
                char_end: chunk.char_end,
                source_path: chunk.source_path.clone(),
                created_at: chunk.created_at,
            },
        }
    }
}

/// Per-document summary written next to the chunk and embedding artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub filename: String,
    pub stem: String,
    pub created_at: NaiveDateTime,
    pub total_characters: usize,
    pub total_chunks: usize,
    pub embedding_dim: usize,
    pub chunk_file: String,
    pub embedding_file: String,
    /// blake3 hex digest of the extracted text.
    pub content_hash: String,
    /// Strategy the chunk list was produced with.
    #[serde(default)]
    pub chunking: Option<ChunkingStrategy>,
    /// `Embedder::model_id` of the embedder that wrote the matrix.
    #[serde(default)]
    pub embedding_model: String,
}

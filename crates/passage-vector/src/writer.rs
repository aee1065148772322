//! Ingestion: chunk a document's text, embed every chunk, and write the
//! chunk list, embedding matrix and meta record into the data directory.
//!
//! Artifacts are replaced atomically and the meta record is written last,
//! so a document only shows up in listings once all three files exist.
use chrono::{NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use passage_core::artifacts::{content_hash, read_chunks, read_meta, write_chunks, write_meta, ArtifactPaths};
use passage_core::chunking::ChunkingStrategy;
use passage_core::traits::{Embedder, TextExtractor};
use passage_core::types::{Chunk, DocumentMeta};
use passage_core::{Error, Result};

use crate::matrix::EmbeddingMatrix;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct IngestOptions {
	pub data_dir: PathBuf,
	pub strategy: ChunkingStrategy,
	pub batch_size: usize,
	pub show_progress: bool,
	/// Re-ingest even when the stored content hash matches.
	pub force: bool,
}

impl IngestOptions {
	pub fn new(data_dir: impl Into<PathBuf>) -> Self {
		Self { data_dir: data_dir.into(), strategy: ChunkingStrategy::default(), batch_size: 32, show_progress: false, force: false }
	}

	pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
		self.strategy = strategy;
		self
	}

	pub fn with_batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size;
		self
	}

	pub fn with_progress(mut self, show_progress: bool) -> Self {
		self.show_progress = show_progress;
		self
	}

	pub fn with_force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
	pub filename: String,
	pub total_characters: usize,
	pub total_chunks: usize,
	pub embedding_dim: usize,
	pub created_at: NaiveDateTime,
	pub first_chunk_preview: String,
	/// True when the stored artifacts already matched the text.
	pub skipped: bool,
}

fn preview(chunks: &[Chunk]) -> String {
	chunks.first().map(|c| c.content.chars().take(PREVIEW_CHARS).collect()).unwrap_or_default()
}

fn progress_bar(len: usize, show: bool) -> ProgressBar {
	if !show {
		return ProgressBar::hidden();
	}
	let pb = ProgressBar::new(len as u64);
	let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
		.unwrap_or_else(|_| ProgressStyle::default_bar())
		.progress_chars("#>-");
	pb.set_style(style);
	pb
}

/// Artifacts for `filename` that already hold this exact text, chunked and
/// embedded the way this run would, if any.
fn unchanged_report(paths: &ArtifactPaths, hash: &str, strategy: ChunkingStrategy, embedder: &dyn Embedder) -> Option<IngestReport> {
	let meta = read_meta(&paths.meta).ok()?;
	if meta.content_hash != hash || !paths.embeddings.exists() {
		return None;
	}
	if meta.chunking != Some(strategy) || meta.embedding_dim != embedder.dim() || meta.embedding_model != embedder.model_id() {
		debug!(filename = %meta.filename, "chunking or embedder changed since last ingest");
		return None;
	}
	let chunks = read_chunks(&paths.chunks).ok()?;
	if chunks.len() != meta.total_chunks {
		return None;
	}
	Some(IngestReport {
		first_chunk_preview: preview(&chunks),
		filename: meta.filename,
		total_characters: meta.total_characters,
		total_chunks: meta.total_chunks,
		embedding_dim: meta.embedding_dim,
		created_at: meta.created_at,
		skipped: true,
	})
}

fn embed_all(embedder: &dyn Embedder, chunks: &[Chunk], batch_size: usize, pb: &ProgressBar) -> Result<Vec<Vec<f32>>> {
	let dim = embedder.dim();
	let mut vectors = Vec::with_capacity(chunks.len());
	for batch in chunks.chunks(batch_size.max(1)) {
		let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
		let embedded = embedder.embed_batch(&texts)?;
		if embedded.len() != texts.len() {
			return Err(Error::Upstream(format!("embedder returned {} vectors for {} texts", embedded.len(), texts.len())));
		}
		if let Some(bad) = embedded.iter().find(|v| v.len() != dim) {
			return Err(Error::Upstream(format!("embedder returned a {}-dim vector, expected {dim}", bad.len())));
		}
		vectors.extend(embedded);
		pb.inc(batch.len() as u64);
	}
	Ok(vectors)
}

/// Chunk, embed and persist `text` as the document `filename`.
pub fn ingest_text(embedder: &dyn Embedder, text: &str, filename: &str, source_path: &str, options: &IngestOptions) -> Result<IngestReport> {
	let paths = ArtifactPaths::for_document(&options.data_dir, filename)?;
	let hash = content_hash(text);
	if !options.force {
		if let Some(report) = unchanged_report(&paths, &hash, options.strategy, embedder) {
			info!(filename, "document unchanged, skipping");
			return Ok(report);
		}
	}

	let created_at = Utc::now().naive_utc();
	let chunks: Vec<Chunk> = options
		.strategy
		.chunk(text)?
		.into_iter()
		.enumerate()
		.map(|(chunk_id, span)| Chunk {
			chunk_id,
			filename: filename.to_string(),
			source_path: source_path.to_string(),
			created_at,
			char_start: span.char_start,
			char_end: span.char_end,
			content: span.text,
		})
		.collect();
	debug!(filename, chunks = chunks.len(), strategy = ?options.strategy, "chunked");

	let pb = progress_bar(chunks.len(), options.show_progress);
	pb.set_message(filename.to_string());
	let vectors = embed_all(embedder, &chunks, options.batch_size, &pb)?;
	let matrix = EmbeddingMatrix::from_rows(&vectors, embedder.dim())?;
	pb.finish_and_clear();

	write_chunks(&paths.chunks, &chunks)?;
	matrix.write_npy(&paths.embeddings)?;
	let total_characters = text.chars().count();
	let meta = DocumentMeta {
		filename: filename.to_string(),
		stem: paths.stem.clone(),
		created_at,
		total_characters,
		total_chunks: chunks.len(),
		embedding_dim: matrix.dim(),
		chunk_file: file_name(&paths.chunks),
		embedding_file: file_name(&paths.embeddings),
		content_hash: hash,
		chunking: Some(options.strategy),
		embedding_model: embedder.model_id(),
	};
	write_meta(&paths.meta, &meta)?;

	info!(filename, total_chunks = chunks.len(), total_characters, embedding_dim = matrix.dim(), "document ingested");
	Ok(IngestReport {
		filename: filename.to_string(),
		total_characters,
		total_chunks: chunks.len(),
		embedding_dim: matrix.dim(),
		created_at,
		first_chunk_preview: preview(&chunks),
		skipped: false,
	})
}

/// Extract `path` and ingest it under its own file name.
pub fn ingest_file(embedder: &dyn Embedder, extractor: &dyn TextExtractor, path: &Path, options: &IngestOptions) -> Result<IngestReport> {
	let filename = path
		.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.ok_or_else(|| Error::Validation(format!("{} has no file name", path.display())))?;
	let text = extractor.extract(path)?;
	ingest_text(embedder, &text, &filename, &path.to_string_lossy(), options)
}

fn file_name(path: &Path) -> String {
	path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, info};

use passage_core::artifacts::ArtifactPaths;
use passage_core::traits::Embedder;
use passage_core::types::{Chunk, RetrievalRequest, RetrievalResult};
use passage_core::{Error, Result};
use passage_text::LexicalIndex;
use passage_vector::{cosine_scores, ArtifactCache};

use crate::fusion::{normalize_lexical, normalize_semantic, select, Signals};

type LexicalEntry = (Arc<Vec<Chunk>>, Arc<LexicalIndex>);

/// Answers retrieval requests against a document's chunk list and embedding matrix.
///
/// Safe to share across threads; all mutable state lives in the artifact
/// cache and in the lexical indexes derived from its chunk payloads.
pub struct RetrievalEngine {
    cache: Arc<ArtifactCache>,
    embedder: Arc<dyn Embedder>,
    lexical: DashMap<PathBuf, LexicalEntry>,
}

impl RetrievalEngine {
    pub fn new(cache: Arc<ArtifactCache>, embedder: Arc<dyn Embedder>) -> Self {
        Self { cache, embedder, lexical: DashMap::new() }
    }

    /// Engine over the process-wide artifact cache.
    pub fn with_global_cache(embedder: Arc<dyn Embedder>) -> Self {
        Self::new(ArtifactCache::global(), embedder)
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> { &self.cache }

    /// Chunk list of an ingested document, through the cache.
    pub fn document_chunks(&self, data_dir: &Path, filename: &str) -> Result<Arc<Vec<Chunk>>> {
        let paths = ArtifactPaths::for_document(data_dir, filename)?;
        self.cache.load_chunks(&paths.chunks)
    }

    pub fn retrieve_document(&self, data_dir: &Path, filename: &str, request: &RetrievalRequest) -> Result<Vec<RetrievalResult>> {
        let paths = ArtifactPaths::for_document(data_dir, filename)?;
        self.retrieve(&paths.chunks, &paths.embeddings, request)
    }

    /// Validate, score every chunk with the signals the mode needs, select,
    /// then drop results below `min_score`.
    ///
    /// The embedding artifact is not touched in lexical mode.
    pub fn retrieve(&self, chunks_path: &Path, embeddings_path: &Path, request: &RetrievalRequest) -> Result<Vec<RetrievalResult>> {
        let start = Instant::now();
        let query = request.validate()?;
        let chunks = self.cache.load_chunks(chunks_path)?;
        let mut signals = Signals::default();

        if query.mode.needs_embeddings() {
            let matrix = self.cache.load_embeddings(embeddings_path)?;
            if matrix.rows() != chunks.len() {
                return Err(Error::Validation(format!(
                    "{} chunks but {} embedding rows in {}",
                    chunks.len(),
                    matrix.rows(),
                    embeddings_path.display()
                )));
            }
            let query_vector = self.embedder.embed_one(&query.query)?;
            let raw = cosine_scores(&matrix, &query_vector)?;
            signals.semantic = Some(normalize_semantic(&raw));
        }

        if query.mode.needs_lexical() {
            let index = self.lexical_index(chunks_path, &chunks)?;
            let raw = index.score_all(&query.query)?;
            signals.lexical = Some(normalize_lexical(&raw));
        }

        let picked = select(query.mode, query.top_k, &signals);
        let results: Vec<RetrievalResult> = picked
            .into_iter()
            .filter(|&(_, score)| query.min_score.map_or(true, |min| score >= min))
            .filter_map(|(i, score)| chunks.get(i).map(|chunk| RetrievalResult::from_chunk(chunk, score)))
            .collect();

        info!(
            mode = %query.mode,
            top_k = query.top_k,
            chunks = chunks.len(),
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieval done"
        );
        Ok(results)
    }

    /// Index built from exactly this chunk payload, building one if the
    /// cached payload changed since the last build.
    fn lexical_index(&self, chunks_path: &Path, chunks: &Arc<Vec<Chunk>>) -> Result<Arc<LexicalIndex>> {
        if let Some(entry) = self.lexical.get(chunks_path) {
            let (built_from, index) = entry.value();
            if Arc::ptr_eq(built_from, chunks) {
                return Ok(Arc::clone(index));
            }
        }
        let index = Arc::new(LexicalIndex::build(chunks)?);
        debug!(path = %chunks_path.display(), chunks = chunks.len(), "lexical index rebuilt");
        self.lexical.insert(chunks_path.to_path_buf(), (Arc::clone(chunks), Arc::clone(&index)));
        Ok(index)
    }
}

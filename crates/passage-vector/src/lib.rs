//! passage-vector
//!
//! Embedding matrices on disk, the shared artifact cache that serves them
//! (together with chunk lists) to retrieval, cosine scoring, and the
//! ingestion path that produces all three artifacts of a document.
pub mod cache;
pub mod matrix;
pub mod search;
pub mod writer;

pub use cache::{ArtifactCache, CacheStatus};
pub use matrix::EmbeddingMatrix;
pub use search::cosine_scores;
pub use writer::{ingest_file, ingest_text, IngestOptions, IngestReport};

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use passage_core::artifacts::{list_documents, read_meta, write_chunks, ArtifactPaths};
use passage_core::chunking::ChunkingStrategy;
use passage_core::traits::Embedder;
use passage_core::ErrorKind;
use passage_embed::FakeEmbedder;
use passage_vector::{cosine_scores, ingest_text, ArtifactCache, EmbeddingMatrix, IngestOptions};

const TEXT: &str = "Phishing emails imitate trusted senders. Attackers ask for credentials! \
Multi-factor authentication blunts stolen passwords. Report suspicious messages quickly?";

fn set_mtime(path: &Path, secs: u64) {
    let f = File::options().write(true).open(path).unwrap();
    f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
}

fn options(dir: &Path) -> IngestOptions {
    IngestOptions::new(dir).with_strategy(ChunkingStrategy::Sentence { chunk_size: 60, overlap_sentences: 0 }).with_batch_size(2)
}

#[test]
fn ingest_writes_all_artifacts_and_cache_serves_them() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = FakeEmbedder::new(16);
    let report = ingest_text(&embedder, TEXT, "phishing.pdf", "/uploads/phishing.pdf", &options(dir.path())).expect("ingest");
    assert!(!report.skipped);
    assert_eq!(report.total_characters, TEXT.chars().count());
    assert_eq!(report.embedding_dim, 16);
    assert_eq!(report.first_chunk_preview, "Phishing emails imitate trusted senders.");

    let paths = ArtifactPaths::for_document(dir.path(), "phishing.pdf").unwrap();
    let cache = ArtifactCache::new();
    let chunks = cache.load_chunks(&paths.chunks).expect("chunks");
    let matrix = cache.load_embeddings(&paths.embeddings).expect("embeddings");
    assert_eq!(chunks.len(), report.total_chunks);
    assert_eq!(matrix.rows(), chunks.len());
    assert_eq!(matrix.dim(), 16);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.chunk_id, i);
        assert_eq!(c.filename, "phishing.pdf");
        assert_eq!(c.created_at, report.created_at);
        let span: String = TEXT.chars().skip(c.char_start).take(c.char_end - c.char_start).collect();
        assert_eq!(span, c.content);
    }
    let first = embedder.embed_one(&chunks[0].content).unwrap();
    let row: Vec<f32> = matrix.view().row(0).to_vec();
    assert_eq!(row, first);

    let docs = list_documents(dir.path()).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].stem, "phishing");
    assert_eq!(docs[0].chunk_file, "phishing_chunks.json");
}

#[test]
fn unchanged_text_is_skipped_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = FakeEmbedder::new(8);
    let first = ingest_text(&embedder, TEXT, "a.txt", "a.txt", &options(dir.path())).unwrap();
    let again = ingest_text(&embedder, TEXT, "a.txt", "a.txt", &options(dir.path())).unwrap();
    assert!(again.skipped);
    assert_eq!(again.created_at, first.created_at);
    assert_eq!(again.first_chunk_preview, first.first_chunk_preview);

    let forced = ingest_text(&embedder, TEXT, "a.txt", "a.txt", &options(dir.path()).with_force(true)).unwrap();
    assert!(!forced.skipped);

    let changed = ingest_text(&embedder, "Different text.", "a.txt", "a.txt", &options(dir.path())).unwrap();
    assert!(!changed.skipped);
    assert_eq!(changed.total_chunks, 1);
}

/// Same width as `FakeEmbedder::new(8)` but a different model.
struct RenamedEmbedder(FakeEmbedder);

impl Embedder for RenamedEmbedder {
    fn dim(&self) -> usize { self.0.dim() }
    fn model_id(&self) -> String { "renamed".to_string() }
    fn embed_batch(&self, texts: &[String]) -> passage_core::Result<Vec<Vec<f32>>> {
        self.0.embed_batch(texts)
    }
}

#[test]
fn changed_chunking_or_embedder_reingests_unchanged_text() {
    let dir = tempfile::tempdir().unwrap();
    let wide = IngestOptions::new(dir.path()).with_strategy(ChunkingStrategy::Sentence { chunk_size: 500, overlap_sentences: 0 });
    let first = ingest_text(&FakeEmbedder::new(8), TEXT, "a.txt", "a.txt", &wide).unwrap();
    assert_eq!((first.total_chunks, first.embedding_dim), (1, 8));

    let paths = ArtifactPaths::for_document(dir.path(), "a.txt").unwrap();
    let meta = read_meta(&paths.meta).unwrap();
    assert_eq!(meta.chunking, Some(wide.strategy));
    assert_eq!(meta.embedding_model, FakeEmbedder::new(8).model_id());

    let embedder = FakeEmbedder::new(16);
    let narrow = IngestOptions::new(dir.path()).with_strategy(ChunkingStrategy::Sentence { chunk_size: 20, overlap_sentences: 0 });
    let second = ingest_text(&embedder, TEXT, "a.txt", "a.txt", &narrow).unwrap();
    assert!(!second.skipped);
    assert_eq!(second.embedding_dim, 16);
    assert!(second.total_chunks > 1);

    let matrix = ArtifactCache::new().load_embeddings(&paths.embeddings).unwrap();
    let query = embedder.embed_one("stolen passwords").unwrap();
    assert_eq!(cosine_scores(&matrix, &query).unwrap().len(), second.total_chunks);

    let strategy_only = ingest_text(&embedder, TEXT, "a.txt", "a.txt", &wide).unwrap();
    assert!(!strategy_only.skipped);
    assert_eq!(strategy_only.total_chunks, 1);

    let base = ingest_text(&FakeEmbedder::new(8), TEXT, "a.txt", "a.txt", &wide).unwrap();
    assert!(!base.skipped);
    let renamed = ingest_text(&RenamedEmbedder(FakeEmbedder::new(8)), TEXT, "a.txt", "a.txt", &wide).unwrap();
    assert!(!renamed.skipped, "same width, different model");
    let again = ingest_text(&RenamedEmbedder(FakeEmbedder::new(8)), TEXT, "a.txt", "a.txt", &wide).unwrap();
    assert!(again.skipped);
}

#[test]
fn empty_text_yields_an_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let report = ingest_text(&FakeEmbedder::new(4), "", "empty.txt", "empty.txt", &IngestOptions::new(dir.path())).unwrap();
    assert_eq!(report.total_chunks, 0);
    assert_eq!(report.first_chunk_preview, "");
    let paths = ArtifactPaths::for_document(dir.path(), "empty.txt").unwrap();
    let matrix = ArtifactCache::new().load_embeddings(&paths.embeddings).unwrap();
    assert_eq!((matrix.rows(), matrix.dim()), (0, 4));
}

#[test]
fn cache_hit_returns_the_same_payload_without_reading() {
    let dir = tempfile::tempdir().unwrap();
    ingest_text(&FakeEmbedder::new(8), TEXT, "doc.txt", "doc.txt", &options(dir.path())).unwrap();
    let paths = ArtifactPaths::for_document(dir.path(), "doc.txt").unwrap();
    let cache = ArtifactCache::new();

    let a = cache.load_chunks(&paths.chunks).unwrap();
    let reads = cache.status().disk_reads;
    let b = cache.load_chunks(&paths.chunks).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.status().disk_reads, reads);

    let m1 = cache.load_embeddings(&paths.embeddings).unwrap();
    let m2 = cache.load_embeddings(&paths.embeddings).unwrap();
    assert!(Arc::ptr_eq(&m1, &m2));

    let status = cache.status();
    assert_eq!(status.chunk_artifacts, 1);
    assert_eq!(status.embedding_artifacts, 1);
    assert_eq!(status.disk_reads, 2);
}

#[test]
fn changed_mtime_reloads() {
    let dir = tempfile::tempdir().unwrap();
    ingest_text(&FakeEmbedder::new(8), TEXT, "doc.txt", "doc.txt", &options(dir.path())).unwrap();
    let paths = ArtifactPaths::for_document(dir.path(), "doc.txt").unwrap();
    set_mtime(&paths.chunks, 1_000_000);
    let cache = ArtifactCache::new();
    let before = cache.load_chunks(&paths.chunks).unwrap();

    let mut edited = (*before).clone();
    edited.truncate(1);
    write_chunks(&paths.chunks, &edited).unwrap();
    set_mtime(&paths.chunks, 2_000_000);

    let after = cache.load_chunks(&paths.chunks).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.len(), 1);
    assert_eq!(cache.status().disk_reads, 2);
    assert_eq!(cache.status().chunk_artifacts, 1);
}

#[test]
fn failed_parse_keeps_the_previous_entry() {
    let dir = tempfile::tempdir().unwrap();
    ingest_text(&FakeEmbedder::new(8), TEXT, "doc.txt", "doc.txt", &options(dir.path())).unwrap();
    let paths = ArtifactPaths::for_document(dir.path(), "doc.txt").unwrap();
    set_mtime(&paths.chunks, 1_000_000);
    let cache = ArtifactCache::new();
    let good = cache.load_chunks(&paths.chunks).unwrap();

    fs::write(&paths.chunks, b"[{not json").unwrap();
    set_mtime(&paths.chunks, 3_000_000);
    let err = cache.load_chunks(&paths.chunks).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);

    // Same timestamp as the cached entry: served from memory.
    set_mtime(&paths.chunks, 1_000_000);
    let served = cache.load_chunks(&paths.chunks).unwrap();
    assert!(Arc::ptr_eq(&good, &served));
}

#[test]
fn missing_artifacts_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ArtifactCache::new();
    let chunks = cache.load_chunks(&dir.path().join("nope_chunks.json")).unwrap_err();
    assert_eq!(chunks.kind(), ErrorKind::NotFound);
    let emb = cache.load_embeddings(&dir.path().join("nope_embedding.npy")).unwrap_err();
    assert_eq!(emb.kind(), ErrorKind::NotFound);
    assert_eq!(cache.status().chunk_artifacts, 0);
    assert_eq!(cache.status().embedding_artifacts, 0);
}

#[test]
fn concurrent_loads_parse_once() {
    let dir = tempfile::tempdir().unwrap();
    ingest_text(&FakeEmbedder::new(8), TEXT, "doc.txt", "doc.txt", &options(dir.path())).unwrap();
    let paths = ArtifactPaths::for_document(dir.path(), "doc.txt").unwrap();
    let cache = Arc::new(ArtifactCache::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let path = paths.chunks.clone();
            std::thread::spawn(move || cache.load_chunks(&path).unwrap())
        })
        .collect();
    let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(cache.status().disk_reads, 1);
}

#[test]
fn cosine_scores_are_dot_products() {
    let matrix = EmbeddingMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]], 2).unwrap();
    assert_eq!(cosine_scores(&matrix, &[1.0, 0.0]).unwrap(), vec![1.0, 0.0, -1.0]);
    let err = cosine_scores(&matrix, &[1.0, 0.0, 0.0]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn dim(&self) -> usize { 4 }
    fn embed_batch(&self, texts: &[String]) -> passage_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[test]
fn wrong_width_from_embedder_is_upstream_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let err = ingest_text(&ShortEmbedder, TEXT, "doc.txt", "doc.txt", &options(dir.path())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(list_documents(dir.path()).unwrap().is_empty());
    let paths = ArtifactPaths::for_document(dir.path(), "doc.txt").unwrap();
    assert!(!paths.chunks.exists());
}

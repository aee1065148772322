use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use passage_core::artifacts::{
    self, content_hash, delete_document, list_documents, read_chunks, write_chunks, ArtifactPaths,
};
use passage_core::chunking::{
    chunk_fixed, chunk_sentences, split_sentences, ChunkingSettings, ChunkingStrategy, StrategyKind,
};
use passage_core::config::Config;
use passage_core::types::{Chunk, DocumentMeta, Mode, RetrievalRequest};
use passage_core::ErrorKind;

fn created_at() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_micro_opt(12, 30, 0, 250).unwrap()
}

fn chunk(chunk_id: usize, start: usize, end: usize, content: &str) -> Chunk {
    Chunk {
        chunk_id,
        filename: "notes.pdf".to_string(),
        source_path: "/uploads/notes.pdf".to_string(),
        created_at: created_at(),
        char_start: start,
        char_end: end,
        content: content.to_string(),
    }
}

#[test]
fn fixed_chunks_cover_text_with_constant_step() {
    let text: String = (0..1234).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let spans = chunk_fixed(&text, 100, 30).expect("chunk");

    assert_eq!(spans[0].char_start, 0);
    assert_eq!(spans.last().unwrap().char_end, 1234, "last window reaches the end");
    for pair in spans.windows(2) {
        assert_eq!(pair[1].char_start - pair[0].char_start, 70);
        assert!(pair[0].char_end >= pair[1].char_start, "no gap between windows");
    }
    for s in &spans {
        assert!(s.char_start < s.char_end);
        assert!(s.char_end - s.char_start <= 100);
        assert_eq!(s.text, text[s.char_start..s.char_end]);
    }
}

#[test]
fn fixed_chunks_count_chars_not_bytes() {
    let spans = chunk_fixed("héllo wörld", 4, 0).expect("chunk");
    let texts: Vec<_> = spans.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["héll", "o wö", "rld"]);
    assert_eq!(spans[2].char_end, 11);
}

#[test]
fn fixed_chunks_reject_overlap_not_smaller_than_size() {
    for overlap in [10, 11] {
        let err = chunk_fixed("some text", 10, overlap).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
    assert_eq!(chunk_fixed("text", 0, 0).unwrap_err().kind(), ErrorKind::Configuration);
    assert!(chunk_fixed("", 10, 2).unwrap().is_empty());
}

#[test]
fn sentence_chunks_are_whole_joined_sentences() {
    let text = "Alpha beta gamma. Delta epsilon! Zeta eta theta? Iota kappa. Lambda mu nu xi omicron. Pi.";
    let sentences = split_sentences(text);
    let chunks = chunk_sentences(text, 40, 1).expect("chunk");
    assert!(!chunks.is_empty());

    for c in &chunks {
        let first = sentences.iter().position(|s| s.char_start == c.char_start).expect("starts on a sentence");
        let last = sentences.iter().position(|s| s.char_end == c.char_end).expect("ends on a sentence");
        let joined = sentences[first..=last].iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(c.text, joined);
        assert!(c.text.chars().count() <= 40 || first == last);
    }
    assert_eq!(chunks.last().unwrap().char_end, sentences.last().unwrap().char_end);
}

#[test]
fn sentence_chunking_terminates_with_large_overlap() {
    let text = "One. Two. Three. Four. Five. Six. Seven.";
    let chunks = chunk_sentences(text, 12, 50).expect("chunk");
    assert!(chunks.len() <= split_sentences(text).len());
    for pair in chunks.windows(2) {
        assert!(pair[1].char_start > pair[0].char_start, "each chunk advances");
    }
}

#[test]
fn oversized_sentence_is_kept_whole() {
    let text = "This sentence is definitely longer than ten chars. Short.";
    let chunks = chunk_sentences(text, 10, 1).expect("chunk");
    let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["This sentence is definitely longer than ten chars.", "Short."]);
}

#[test]
fn strategy_from_settings_validates_signed_values() {
    let mut settings = ChunkingSettings { strategy: StrategyKind::Sentence, chunk_size: 200, overlap: 0, overlap_sentences: -1 };
    assert_eq!(ChunkingStrategy::from_settings(&settings).unwrap_err().kind(), ErrorKind::Configuration);

    settings.overlap_sentences = 2;
    assert_eq!(
        ChunkingStrategy::from_settings(&settings).unwrap(),
        ChunkingStrategy::Sentence { chunk_size: 200, overlap_sentences: 2 }
    );

    settings.chunk_size = 0;
    assert!(ChunkingStrategy::from_settings(&settings).is_err());

    let fixed = ChunkingSettings { strategy: StrategyKind::Fixed, chunk_size: 50, overlap: 50, overlap_sentences: 0 };
    assert_eq!(ChunkingStrategy::from_settings(&fixed).unwrap_err().kind(), ErrorKind::Configuration);
}

#[test]
fn request_defaults_and_mode_resolution() {
    let req: RetrievalRequest = serde_json::from_str(r#"{"query": "what is xss"}"#).unwrap();
    assert_eq!(req.top_k, 5);
    assert_eq!(req.mode, "hybrid");
    assert!((req.alpha - 0.7).abs() < 1e-6);
    assert_eq!(req.candidate_multiplier, 5);
    assert_eq!(req.min_score, None);

    let q = req.validate().expect("valid");
    assert_eq!(q.mode, Mode::Hybrid { alpha: 0.7, candidate_multiplier: 5 });
    assert_eq!(q.top_k, 5);

    let lexical = RetrievalRequest::new("  padded query ").with_mode("Lexical").validate().unwrap();
    assert_eq!(lexical.mode, Mode::Lexical);
    assert_eq!(lexical.query, "padded query");
}

#[test]
fn invalid_requests_are_validation_errors() {
    let bad = [
        RetrievalRequest::new("   "),
        RetrievalRequest::new("q").with_top_k(0),
        RetrievalRequest::new("q").with_top_k(-3),
        RetrievalRequest::new("q").with_mode("fuzzy"),
        RetrievalRequest::new("q").with_alpha(1.5),
        RetrievalRequest::new("q").with_alpha(-0.1),
        RetrievalRequest::new("q").with_alpha(f32::NAN),
        RetrievalRequest::new("q").with_candidate_multiplier(0),
        RetrievalRequest::new("q").with_min_score(Some(f32::NAN)),
        RetrievalRequest::new("q").with_min_score(Some(f32::INFINITY)),
    ];
    for req in bad {
        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{req:?} -> {err}");
    }
    assert!(RetrievalRequest::new("q").with_min_score(Some(-0.5)).validate().is_ok());
}

#[test]
fn config_file_overrides_only_given_keys() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(&path, "[retrieval]\ntop_k = 9\n\n[chunking]\nstrategy = \"sentence\"\n").unwrap();

    let settings = Config::from_file(&path).settings().expect("settings");
    assert_eq!(settings.retrieval.top_k, 9);
    assert_eq!(settings.retrieval.mode, "hybrid");
    assert_eq!(
        settings.chunking_strategy().unwrap(),
        ChunkingStrategy::Sentence { chunk_size: 500, overlap_sentences: 1 }
    );
    let top_k: i64 = Config::from_file(&path).get("retrieval.top_k").unwrap();
    assert_eq!(top_k, 9);
}

#[test]
fn artifact_paths_use_the_file_stem() {
    let paths = ArtifactPaths::for_document(std::path::Path::new("/data"), "owasp guide.pdf").unwrap();
    assert_eq!(paths.stem, "owasp guide");
    assert!(paths.chunks.ends_with("owasp guide_chunks.json"));
    assert!(paths.embeddings.ends_with("owasp guide_embedding.npy"));
    assert!(paths.meta.ends_with("owasp guide_meta.json"));
    assert!(ArtifactPaths::for_document(std::path::Path::new("/data"), "").is_err());
}

#[test]
fn chunk_artifact_round_trips_and_rejects_misordered_ids() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("notes_chunks.json");
    let chunks = vec![chunk(0, 0, 5, "hello"), chunk(1, 3, 9, "lo wor")];
    write_chunks(&path, &chunks).unwrap();
    assert_eq!(read_chunks(&path).unwrap(), chunks);

    let shuffled = vec![chunk(1, 0, 5, "hello")];
    write_chunks(&path, &shuffled).unwrap();
    assert_eq!(read_chunks(&path).unwrap_err().kind(), ErrorKind::Consistency);

    fs::write(&path, "{\"not\": \"a list\"}").unwrap();
    assert_eq!(read_chunks(&path).unwrap_err().kind(), ErrorKind::Consistency);

    assert_eq!(read_chunks(&tmp.path().join("missing.json")).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn list_and_delete_documents() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    for name in ["b.pdf", "a.pdf"] {
        let paths = ArtifactPaths::for_document(dir, name).unwrap();
        write_chunks(&paths.chunks, &[chunk(0, 0, 5, "hello")]).unwrap();
        let meta = DocumentMeta {
            filename: name.to_string(),
            stem: paths.stem.clone(),
            created_at: created_at(),
            total_characters: 5,
            total_chunks: 1,
            embedding_dim: 3,
            chunk_file: "x".to_string(),
            embedding_file: "y".to_string(),
            content_hash: content_hash("hello"),
            chunking: Some(ChunkingStrategy::default()),
            embedding_model: "fake".to_string(),
        };
        artifacts::write_meta(&paths.meta, &meta).unwrap();
    }

    let names: Vec<_> = list_documents(dir).unwrap().into_iter().map(|m| m.filename).collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);

    let deleted = delete_document(dir, "a.pdf").unwrap();
    assert_eq!(deleted.len(), 2, "chunks and meta existed, embeddings did not");
    assert_eq!(list_documents(dir).unwrap().len(), 1);
    assert_eq!(delete_document(dir, "a.pdf").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(list_documents(&dir.join("nope")).unwrap().is_empty());
}

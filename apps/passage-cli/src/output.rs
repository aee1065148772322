use std::fmt::Write;

use passage_core::types::{DocumentMeta, RetrievalResult};
use passage_vector::IngestReport;

const SNIPPET_CHARS: usize = 240;

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SNIPPET_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}...")
}

pub fn format_results(query: &str, results: &[RetrievalResult]) -> String {
    let mut out = String::new();
    if results.is_empty() {
        let _ = writeln!(out, "No results for \"{query}\"");
        return out;
    }
    let _ = writeln!(out, "{} result(s) for \"{query}\"\n", results.len());
    for (rank, r) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [chunk {} | {:.3}] {} chars {}..{}",
            rank + 1,
            r.chunk_id,
            r.score,
            r.filename,
            r.metadata.char_start,
            r.metadata.char_end
        );
        let _ = writeln!(out, "   {}\n", snippet(&r.content));
    }
    out
}

pub fn format_report(report: &IngestReport) -> String {
    let status = if report.skipped { "unchanged" } else { "ingested" };
    format!(
        "{status}: {} ({} chars, {} chunks, dim {})\n  {}",
        report.filename,
        report.total_characters,
        report.total_chunks,
        report.embedding_dim,
        snippet(&report.first_chunk_preview)
    )
}

pub fn format_documents(docs: &[DocumentMeta]) -> String {
    if docs.is_empty() {
        return "No documents ingested".to_string();
    }
    docs.iter()
        .map(|d| format!("{}\t{} chunks\t{} chars\t{}", d.filename, d.total_chunks, d.total_characters, d.created_at))
        .collect::<Vec<_>>()
        .join("\n")
}

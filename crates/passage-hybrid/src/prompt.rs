use passage_core::types::RetrievalResult;

/// Context blocks of the form `[Chunk {id} | Score {score}]` followed by the
/// chunk text, separated by blank lines.
pub fn format_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| format!("[Chunk {} | Score {:.3}]\n{}", r.chunk_id, r.score, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn answer_prompt(question: &str, results: &[RetrievalResult]) -> String {
    format!(
        "You are a careful assistant answering questions about a document.\n\
         Answer the question using ONLY the provided context.\n\
         If the answer is not present, say you do not know.\n\n\
         Context:\n{}\n\n\
         Question:\n{}\n",
        format_context(results),
        question.trim()
    )
}

pub fn summary_prompt(filename: &str, results: &[RetrievalResult]) -> String {
    format!(
        "You are a helpful assistant.\n\
         Summarize the document using ONLY the provided context.\n\
         If the context is not enough, say \"I do not know.\"\n\n\
         Document: {filename}\n\n\
         Context:\n{}\n\n\
         Output format:\n\
         - 6-10 bullet points of key ideas\n\
         - Then 1 short paragraph overview\n",
        format_context(results)
    )
}

pub fn questions_prompt(filename: &str, results: &[RetrievalResult], count: usize) -> String {
    format!(
        "You are a helpful assistant.\n\
         Write {count} questions a reader could answer from the context below.\n\
         Use ONLY the provided context. Output one question per line and nothing else.\n\n\
         Document: {filename}\n\n\
         Context:\n{}\n",
        format_context(results)
    )
}

/// One question per non-empty line, with bullets and `1.` / `1)` numbering removed.
pub fn parse_questions(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .take(limit)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

//! Retrieval-grounded generation: answers, summaries and sample questions
//! for one ingested document.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use passage_core::config::GenerationSettings;
use passage_core::traits::Generator;
use passage_core::types::{RetrievalRequest, RetrievalResult};
use passage_core::Result;

use crate::engine::RetrievalEngine;
use crate::prompt;

/// Query used to pull overview material into a summary.
pub const OVERVIEW_QUERY: &str = "main topic overview key ideas summary conclusions";
pub const DEFAULT_INTRO_CHUNKS: usize = 3;
pub const DEFAULT_QUESTION_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<RetrievalResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub filename: String,
    pub summary: String,
    pub context: Vec<RetrievalResult>,
}

pub struct Assistant {
    engine: Arc<RetrievalEngine>,
    generator: Arc<dyn Generator>,
    data_dir: PathBuf,
    answer_tokens: u32,
    summary_tokens: u32,
}

impl Assistant {
    pub fn new(engine: Arc<RetrievalEngine>, generator: Arc<dyn Generator>, data_dir: impl Into<PathBuf>) -> Self {
        let defaults = GenerationSettings::default();
        Self {
            engine,
            generator,
            data_dir: data_dir.into(),
            answer_tokens: defaults.max_output_tokens,
            summary_tokens: defaults.summary_max_output_tokens,
        }
    }

    pub fn with_token_limits(mut self, answer_tokens: u32, summary_tokens: u32) -> Self {
        self.answer_tokens = answer_tokens;
        self.summary_tokens = summary_tokens;
        self
    }

    /// Retrieve for `request.query` and answer from those chunks only.
    pub fn answer(&self, filename: &str, request: &RetrievalRequest) -> Result<Answer> {
        let citations = self.engine.retrieve_document(&self.data_dir, filename, request)?;
        let prompt = prompt::answer_prompt(&request.query, &citations);
        let answer = self.generator.generate(&prompt, self.answer_tokens)?;
        info!(filename, citations = citations.len(), "answered");
        Ok(Answer { answer, citations })
    }

    /// Summarize from the first `intro_chunks` chunks plus whatever `request`
    /// retrieves for the overview query. `request.query` is replaced.
    pub fn summarize(&self, filename: &str, intro_chunks: usize, request: &RetrievalRequest) -> Result<Summary> {
        let chunks = self.engine.document_chunks(&self.data_dir, filename)?;
        let overview = RetrievalRequest { query: OVERVIEW_QUERY.to_string(), ..request.clone() };
        let retrieved = self.engine.retrieve_document(&self.data_dir, filename, &overview)?;

        let mut by_id: BTreeMap<usize, RetrievalResult> = chunks
            .iter()
            .take(intro_chunks)
            .map(|c| (c.chunk_id, RetrievalResult::from_chunk(c, 0.0)))
            .collect();
        for result in retrieved {
            by_id.insert(result.chunk_id, result);
        }
        let context: Vec<RetrievalResult> = by_id.into_values().collect();

        let prompt = prompt::summary_prompt(filename, &context);
        let summary = self.generator.generate(&prompt, self.summary_tokens)?;
        info!(filename, context_chunks = context.len(), "summarized");
        Ok(Summary { filename: filename.to_string(), summary, context })
    }

    /// Up to `count` questions the first [`DEFAULT_INTRO_CHUNKS`] chunks of
    /// the document can answer.
    pub fn sample_questions(&self, filename: &str, count: usize) -> Result<Vec<String>> {
        let chunks = self.engine.document_chunks(&self.data_dir, filename)?;
        let context: Vec<RetrievalResult> = chunks
            .iter()
            .take(DEFAULT_INTRO_CHUNKS)
            .map(|c| RetrievalResult::from_chunk(c, 0.0))
            .collect();
        let prompt = prompt::questions_prompt(filename, &context, count);
        let text = self.generator.generate(&prompt, self.answer_tokens)?;
        Ok(prompt::parse_questions(&text, count))
    }
}

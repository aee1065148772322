//! Narrow interfaces to the collaborators the engine consumes but does not own.
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Produces unit-length embedding vectors; deterministic for a given model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    /// Recorded with ingested artifacts. Vectors are only comparable
    /// between embedders reporting the same id.
    fn model_id(&self) -> String {
        format!("unnamed-{}", self.dim())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| Error::Upstream("embedder returned no vector".into()))
    }
}

/// Produces text for an already-assembled prompt.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;
}

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads text files, replacing invalid UTF-8 instead of failing.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

//! Splits raw document text into span-tracked chunks.
//!
//! Two strategies are provided:
//! - fixed-width windows of `chunk_size` chars stepping by `chunk_size - overlap`
//! - sentence-aware packing that never breaks a sentence and overlaps by
//!   whole sentences
//!
//! All offsets are char (Unicode scalar value) offsets, not byte offsets.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::TextSpan;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_OVERLAP: usize = 100;
pub const DEFAULT_OVERLAP_SENTENCES: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Fixed,
    Sentence,
}

/// Chunking parameters as they appear in configuration files.
///
/// Sizes are signed so that a negative value is reported as a
/// configuration error rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub strategy: StrategyKind,
    pub chunk_size: i64,
    pub overlap: i64,
    pub overlap_sentences: i64,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Fixed,
            chunk_size: DEFAULT_CHUNK_SIZE as i64,
            overlap: DEFAULT_OVERLAP as i64,
            overlap_sentences: DEFAULT_OVERLAP_SENTENCES as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Fixed { chunk_size: usize, overlap: usize },
    Sentence { chunk_size: usize, overlap_sentences: usize },
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::Fixed { chunk_size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_OVERLAP }
    }
}

impl ChunkingStrategy {
    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        let chunk_size = positive("chunk_size", settings.chunk_size)?;
        let strategy = match settings.strategy {
            StrategyKind::Fixed => Self::Fixed {
                chunk_size,
                overlap: non_negative("overlap", settings.overlap)?,
            },
            StrategyKind::Sentence => Self::Sentence {
                chunk_size,
                overlap_sentences: non_negative("overlap_sentences", settings.overlap_sentences)?,
            },
        };
        strategy.check()?;
        Ok(strategy)
    }

    fn check(self) -> Result<()> {
        match self {
            Self::Fixed { chunk_size, overlap } => {
                if chunk_size == 0 {
                    return Err(Error::Configuration("chunk_size must be > 0".into()));
                }
                if overlap >= chunk_size {
                    return Err(Error::Configuration(format!(
                        "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
                    )));
                }
            }
            Self::Sentence { chunk_size, .. } => {
                if chunk_size == 0 {
                    return Err(Error::Configuration("chunk_size must be > 0".into()));
                }
            }
        }
        Ok(())
    }

    pub fn chunk(self, text: &str) -> Result<Vec<TextSpan>> {
        match self {
            Self::Fixed { chunk_size, overlap } => chunk_fixed(text, chunk_size, overlap),
            Self::Sentence { chunk_size, overlap_sentences } => {
                chunk_sentences(text, chunk_size, overlap_sentences)
            }
        }
    }
}

fn positive(name: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| Error::Configuration(format!("{name} must be > 0 (got {value})")))
}

fn non_negative(name: &str, value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::Configuration(format!("{name} must be >= 0 (got {value})")))
}

/// Fixed-width windows. The last window may be shorter than `chunk_size`.
pub fn chunk_fixed(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<TextSpan>> {
    ChunkingStrategy::Fixed { chunk_size, overlap }.check()?;
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut spans = Vec::with_capacity(chars.len() / step + 1);
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        spans.push(TextSpan {
            char_start: start,
            char_end: end,
            text: chars[start..end].iter().collect(),
        });
        start += step;
    }
    Ok(spans)
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split `text` into sentences.
///
/// A sentence ends after a run of `.`, `!` or `?` that is followed by
/// whitespace or the end of the text; trailing text without terminal
/// punctuation is a sentence too. Spans are trimmed of surrounding
/// whitespace and blank sentences are dropped.
pub fn split_sentences(text: &str) -> Vec<TextSpan> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut sentences = Vec::new();
    let mut start = 0;
    while start < n {
        // A sentence holds at least one char, so punctuation at `start`
        // belongs to its body rather than ending it.
        let mut end = n;
        let mut j = start + 1;
        while j < n {
            if is_terminal(chars[j]) {
                let mut run_end = j;
                while run_end < n && is_terminal(chars[run_end]) {
                    run_end += 1;
                }
                if run_end == n || chars[run_end].is_whitespace() {
                    end = run_end;
                    break;
                }
                j = run_end;
            } else {
                j += 1;
            }
        }
        if let Some(span) = trimmed_span(&chars, start, end) {
            sentences.push(span);
        }
        start = end;
    }
    sentences
}

fn trimmed_span(chars: &[char], start: usize, end: usize) -> Option<TextSpan> {
    let body = &chars[start..end];
    let lead = body.iter().take_while(|c| c.is_whitespace()).count();
    if lead == body.len() {
        return None;
    }
    let trail = body.iter().rev().take_while(|c| c.is_whitespace()).count();
    let (char_start, char_end) = (start + lead, end - trail);
    Some(TextSpan { char_start, char_end, text: chars[char_start..char_end].iter().collect() })
}

/// Pack whole sentences into chunks of at most `chunk_size` chars.
///
/// Sentences inside a chunk are joined with a single space. A sentence
/// longer than `chunk_size` becomes a chunk on its own. Each new chunk
/// starts `overlap_sentences` sentences before the end of the previous one
/// but always at least one sentence later than the previous start.
pub fn chunk_sentences(
    text: &str,
    chunk_size: usize,
    overlap_sentences: usize,
) -> Result<Vec<TextSpan>> {
    ChunkingStrategy::Sentence { chunk_size, overlap_sentences }.check()?;
    let sentences = split_sentences(text);
    let n = sentences.len();
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < n {
        let mut j = i;
        let mut joined_len = 0usize;
        while j < n {
            let len = sentences[j].text.chars().count();
            let candidate = if j == i { len } else { joined_len + 1 + len };
            if j > i && candidate > chunk_size {
                break;
            }
            joined_len = candidate;
            j += 1;
        }
        let text = sentences[i..j].iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        chunks.push(TextSpan {
            char_start: sentences[i].char_start,
            char_end: sentences[j - 1].char_end,
            text,
        });
        if j >= n {
            break;
        }
        i = j.saturating_sub(overlap_sentences).max(i + 1);
    }
    Ok(chunks)
}

//! passage-text
//!
//! Lexical (BM25) scoring of a chunk list on an in-memory Tantivy index. See
//! `index` for construction and `search` for full-corpus scoring.
pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::LexicalIndex;
pub use tantivy_utils::tokenize;

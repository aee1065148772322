//! passage-hybrid
//!
//! Retrieval over one ingested document: semantic and lexical scoring,
//! score fusion, and the answer / summary / question flows built on top.
pub mod answer;
pub mod engine;
pub mod fusion;
pub mod generator;
pub mod prompt;

pub use answer::{Answer, Assistant, Summary};
pub use engine::RetrievalEngine;
pub use generator::OpenAiGenerator;

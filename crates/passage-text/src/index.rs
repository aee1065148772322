use tantivy::schema::Field;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::debug;

use passage_core::types::Chunk;
use passage_core::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, tokenize, CONTENT_FIELD, ROW_FIELD};

// Tantivy's per-thread arena minimum is 15MB.
const WRITER_HEAP_BYTES: usize = 20_000_000;

/// In-memory BM25 index over one document's chunk list.
pub struct LexicalIndex {
	pub(crate) reader: IndexReader,
	pub(crate) row_field: Field,
	pub(crate) content_field: Field,
	pub(crate) len: usize,
}

pub(crate) fn lexical_err(e: impl std::fmt::Display) -> Error {
	Error::Consistency(format!("lexical index: {e}"))
}

impl LexicalIndex {
	pub fn build(chunks: &[Chunk]) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let row_field = schema.get_field(ROW_FIELD).map_err(lexical_err)?;
		let content_field = schema.get_field(CONTENT_FIELD).map_err(lexical_err)?;

		// A single indexing thread keeps everything in one segment, in row order.
		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES).map_err(lexical_err)?;
		for (row, chunk) in chunks.iter().enumerate() {
			let normalized = tokenize(&chunk.content).join(" ");
			index_writer
				.add_document(doc!(row_field => row as u64, content_field => normalized))
				.map_err(lexical_err)?;
		}
		index_writer.commit().map_err(lexical_err)?;

		let reader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.map_err(lexical_err)?;
		debug!(chunks = chunks.len(), "lexical index built");
		Ok(Self { reader, row_field, content_field, len: chunks.len() })
	}

	pub fn len(&self) -> usize { self.len }

	pub fn is_empty(&self) -> bool { self.len == 0 }
}

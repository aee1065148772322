use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "whitespace_lower";
pub const ROW_FIELD: &str = "row";
pub const CONTENT_FIELD: &str = "content";

/// One document per chunk: its row in the chunk list plus the searchable text.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _row_field = schema_builder.add_u64_field(ROW_FIELD, STORED);
	let content_indexing = TextFieldIndexing::default()
		.set_tokenizer(TOKENIZER_NAME)
		.set_index_option(IndexRecordOption::WithFreqs);
	let content_options = TextOptions::default().set_indexing_options(content_indexing);
	let _content_field = schema_builder.add_text_field(CONTENT_FIELD, content_options);
	schema_builder.build()
}

/// Whitespace split + lower-casing, no stemming and no stop words.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}

/// Tokenize the way the index does.
///
/// Content is normalized through this function before indexing, so index
/// terms and query terms come from the same Unicode-aware split even though
/// tantivy's own whitespace tokenizer only splits on ASCII whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
	text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};

use passage_core::Result;

use crate::index::{lexical_err, LexicalIndex};
use crate::tantivy_utils::tokenize;

impl LexicalIndex {
	/// BM25 score of `query` against every chunk, indexed by row.
	///
	/// Chunks sharing no term with the query score 0. Repeated query terms
	/// count once per occurrence.
	pub fn score_all(&self, query: &str) -> Result<Vec<f32>> {
		let mut scores = vec![0.0f32; self.len];
		let terms = tokenize(query);
		if terms.is_empty() || self.len == 0 {
			return Ok(scores);
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.content_field, t);
				let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.len)).map_err(lexical_err)?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(lexical_err)?;
			let row = doc
				.get_first(self.row_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| lexical_err("document without row"))?;
			if let Some(slot) = usize::try_from(row).ok().and_then(|r| scores.get_mut(r)) {
				*slot = score;
			}
		}
		Ok(scores)
	}
}

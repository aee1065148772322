use ndarray::ArrayView1;

use passage_core::{Error, Result};

use crate::matrix::EmbeddingMatrix;

/// Dot product of every row with `query`, indexed by row.
///
/// Rows and query are expected to be unit length, which makes this the
/// cosine similarity in `[-1, 1]`. Nothing is re-normalized here.
pub fn cosine_scores(matrix: &EmbeddingMatrix, query: &[f32]) -> Result<Vec<f32>> {
	if matrix.dim() != query.len() {
		return Err(Error::Validation(format!(
			"query vector has dimension {}, embeddings have {}",
			query.len(),
			matrix.dim()
		)));
	}
	Ok(matrix.view().dot(&ArrayView1::from(query)).to_vec())
}

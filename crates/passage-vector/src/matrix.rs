use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};

use passage_core::artifacts::write_atomic;
use passage_core::{Error, Result};

/// Row-major `f32` matrix, one row per chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix(Array2<f32>);

impl EmbeddingMatrix {
    /// Stack equally sized vectors. `dim` fixes the width when `rows` is empty.
    pub fn from_rows(rows: &[Vec<f32>], dim: usize) -> Result<Self> {
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(Error::Validation(format!("embedding row {i} has length {}, expected {dim}", row.len())));
            }
            flat.extend_from_slice(row);
        }
        Array2::from_shape_vec((rows.len(), dim), flat)
            .map(Self)
            .map_err(|e| Error::Validation(format!("embedding matrix: {e}")))
    }

    pub fn rows(&self) -> usize { self.0.nrows() }

    pub fn dim(&self) -> usize { self.0.ncols() }

    pub fn view(&self) -> ArrayView2<'_, f32> { self.0.view() }

    /// Read a 2-D `f32` `.npy` file.
    pub fn read_npy(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Array2::<f32>::read_npy(BufReader::new(file))
            .map(Self)
            .map_err(|e| Error::Consistency(format!("embedding artifact {}: {e}", path.display())))
    }

    pub fn write_npy(&self, path: &Path) -> Result<()> {
        write_atomic(path, |w| {
            self.0
                .write_npy(w)
                .map_err(|e| Error::io(path, std::io::Error::other(e)))
        })
    }
}

impl From<Array2<f32>> for EmbeddingMatrix {
    fn from(a: Array2<f32>) -> Self { Self(a) }
}

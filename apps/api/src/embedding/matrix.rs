use ndarray::{Array2, ArrayView1, ArrayView2};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};

use crate::errors::AppError;

/// Row-per-record embedding matrix, persisted as a 2-D `.npy` array.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data: Array2<f32>,
}

impl EmbeddingMatrix {
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Stacks row vectors; every row must have exactly `dimension` values.
    pub fn from_rows(rows: Vec<Vec<f32>>, dimension: usize) -> Result<Self, AppError> {
        let n = rows.len();
        let mut flat = Vec::with_capacity(n * dimension);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                return Err(AppError::Artifact(format!(
                    "row {idx} has {} values, expected {dimension}",
                    row.len()
                )));
            }
            flat.extend(row);
        }
        let data = Array2::from_shape_vec((n, dimension), flat)
            .map_err(|e| AppError::Artifact(format!("cannot shape embedding matrix: {e}")))?;
        Ok(Self { data })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.data.ncols()
    }

    pub fn row(&self, idx: usize) -> ArrayView1<'_, f32> {
        self.data.row(idx)
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Fails unless the matrix has one row per record of `what`.
    pub fn expect_rows(&self, expected: usize, what: &str) -> Result<(), AppError> {
        if self.nrows() != expected {
            return Err(AppError::Artifact(format!(
                "{what} embedding matrix has {} rows but there are {expected} {what} records",
                self.nrows()
            )));
        }
        Ok(())
    }

    pub fn to_npy(&self) -> Result<Vec<u8>, AppError> {
        let mut buf = Vec::new();
        self.data
            .write_npy(&mut buf)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("writing .npy failed: {e}")))?;
        Ok(buf)
    }

    /// Reads a 2-D `<f4` array; `<f8` arrays are accepted and narrowed.
    pub fn from_npy(bytes: &[u8], source: &str) -> Result<Self, AppError> {
        match Array2::<f32>::read_npy(bytes) {
            Ok(data) => Ok(Self { data }),
            Err(f32_err) => match Array2::<f64>::read_npy(bytes) {
                Ok(wide) => Ok(Self {
                    data: wide.mapv(|v| v as f32),
                }),
                Err(_) => Err(AppError::Artifact(format!(
                    "{source}: not a 2-D float .npy array: {f32_err}"
                ))),
            },
        }
    }
}

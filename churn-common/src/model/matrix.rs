//! Dense row-major feature matrix

use super::ModelError;

/// Row-major matrix of feature values; every row has `columns` entries
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    pub fn with_capacity(rows: usize, columns: usize) -> Self {
        Self {
            columns,
            data: Vec::with_capacity(rows * columns),
        }
    }

    /// Build from a flat row-major buffer
    pub fn from_flat(columns: usize, data: Vec<f64>) -> Result<Self, ModelError> {
        if columns == 0 || data.len() % columns != 0 {
            return Err(ModelError::DimensionMismatch {
                expected: columns,
                actual: data.len(),
            });
        }
        Ok(Self { columns, data })
    }

    pub fn push_row(&mut self, row: &[f64]) -> Result<(), ModelError> {
        if row.len() != self.columns {
            return Err(ModelError::DimensionMismatch {
                expected: self.columns,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.data.len() / self.columns
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.columns)?;
        self.data.get(start..start + self.columns)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.columns.max(1))
    }
}

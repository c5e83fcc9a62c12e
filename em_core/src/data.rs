use std::fmt;

use ndarray::{Array2, ArrayView1, ArrayView2};

/// Errors produced while loading or accessing observations.
#[derive(Debug)]
pub enum DataError {
    /// The requested observation index is out of bounds.
    OutOfBounds { index: usize, len: usize },

    /// The dataset violates a domain constraint (empty, ragged, non-finite).
    InvalidData(&'static str),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::OutOfBounds { index, len } => {
                write!(f, "observation index {index} is out of bounds (len {len})")
            }
            DataError::InvalidData(msg) => write!(f, "invalid dataset: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

/// An immutable rectangular batch of N observation vectors of dimension D.
///
/// A `DataSet` only provides access to observations. Sharding, shuffling
/// and interpretation are the partitioner's and the models' concerns.
#[derive(Debug, Clone)]
pub struct DataSet {
    data: Array2<f64>,
}

impl DataSet {
    /// Wraps an N×D array of observations.
    ///
    /// # Errors
    /// Returns `DataError::InvalidData` if the array is empty or contains
    /// non-finite entries.
    pub fn from_array(data: Array2<f64>) -> Result<Self, DataError> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(DataError::InvalidData("dataset must be non-empty"));
        }

        if data.iter().any(|v| !v.is_finite()) {
            return Err(DataError::InvalidData("dataset contains non-finite values"));
        }

        Ok(Self { data })
    }

    /// Builds a dataset from row vectors, rejecting ragged input.
    ///
    /// # Errors
    /// Returns `DataError::InvalidData` if rows are empty, ragged or
    /// contain non-finite values.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, DataError> {
        let n = rows.len();
        let d = rows.first().map(Vec::len).unwrap_or(0);

        if n == 0 || d == 0 {
            return Err(DataError::InvalidData("dataset must be non-empty"));
        }

        if rows.iter().any(|r| r.len() != d) {
            return Err(DataError::InvalidData("rows have inconsistent dimensions"));
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((n, d), flat)
            .map_err(|_| DataError::InvalidData("rows have inconsistent dimensions"))?;

        Self::from_array(data)
    }

    /// Number of observations N.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observation dimensionality D.
    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    /// Fetches one observation by index.
    ///
    /// # Errors
    /// Returns `DataError::OutOfBounds` if `index` is invalid.
    pub fn point(&self, index: usize) -> Result<ArrayView1<'_, f64>, DataError> {
        if index >= self.len() {
            return Err(DataError::OutOfBounds {
                index,
                len: self.len(),
            });
        }

        Ok(self.data.row(index))
    }

    /// Full N×D view of the data.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(DataSet::from_rows(&rows).is_err());
    }

    #[test]
    fn rejects_non_finite() {
        let rows = vec![vec![1.0, f64::NAN]];
        assert!(DataSet::from_rows(&rows).is_err());
    }

    #[test]
    fn point_access() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let ds = DataSet::from_rows(&rows).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.dim(), 2);
        assert_eq!(ds.point(1).unwrap()[0], 3.0);
        assert!(ds.point(2).is_err());
    }
}

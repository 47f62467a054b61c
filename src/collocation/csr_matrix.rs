use nalgebra::DMatrix;

use crate::error::SplineError;
use crate::misc::FloatingPoint;

/// Sparse matrix in compressed sparse row layout with zero-based indices
///
/// The entries of row `i` are `col_indices[row_offsets[i]..row_offsets[i + 1]]`
/// and the matching `values`, sorted by column. Storage and products are
/// provided by [`nalgebra_sparse::CsrMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix<T> {
    inner: nalgebra_sparse::CsrMatrix<T>,
}

impl<T: FloatingPoint> CsrMatrix<T> {
    /// Create a matrix from its raw parts; the entries of a row may come in
    /// any column order
    /// # Failures
    /// - if `row_offsets` does not have `nrows + 1` non-decreasing entries ending at `nnz`
    /// - if `col_indices` and `values` differ in length
    /// - if a column index is not below `ncols`
    /// - if a row holds the same column twice
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
    ) -> anyhow::Result<Self> {
        if row_offsets.len() != nrows + 1 {
            anyhow::bail!(SplineError::mismatch(format!(
                "Expected {} row offsets, got {}",
                nrows + 1,
                row_offsets.len()
            )));
        }
        if col_indices.len() != values.len() {
            anyhow::bail!(SplineError::mismatch(format!(
                "Got {} column indices for {} values",
                col_indices.len(),
                values.len()
            )));
        }
        if row_offsets[0] != 0
            || row_offsets[nrows] != values.len()
            || row_offsets.windows(2).any(|w| w[1] < w[0])
        {
            anyhow::bail!(SplineError::invalid(
                "Row offsets must start at zero, be non-decreasing and end at the number of entries"
            ));
        }
        if let Some(c) = col_indices.iter().find(|c| **c >= ncols) {
            anyhow::bail!(SplineError::mismatch(format!(
                "Column index {} out of range for {} columns",
                c, ncols
            )));
        }
        let inner = nalgebra_sparse::CsrMatrix::try_from_unsorted_csr_data(
            nrows,
            ncols,
            row_offsets,
            col_indices,
            values,
        )
        .map_err(|e| SplineError::invalid(format!("Malformed sparse matrix: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.inner.nrows(), self.inner.ncols())
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    pub fn row_offsets(&self) -> &[usize] {
        self.inner.row_offsets()
    }

    pub fn col_indices(&self) -> &[usize] {
        self.inner.col_indices()
    }

    pub fn values(&self) -> &[T] {
        self.inner.values()
    }

    /// Column indices and values of row `i`
    /// # Panics
    /// if `i >= nrows`
    pub fn row(&self, i: usize) -> (&[usize], &[T]) {
        let (offsets, cols, values) = self.inner.csr_data();
        let range = offsets[i]..offsets[i + 1];
        (&cols[range.clone()], &values[range])
    }

    /// The underlying `nalgebra_sparse` matrix
    pub fn as_sparse(&self) -> &nalgebra_sparse::CsrMatrix<T> {
        &self.inner
    }

    pub fn into_sparse(self) -> nalgebra_sparse::CsrMatrix<T> {
        self.inner
    }

    /// Row offsets, column indices and values
    pub fn into_parts(self) -> (Vec<usize>, Vec<usize>, Vec<T>) {
        self.inner.disassemble()
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        DMatrix::from(&self.inner)
    }

    /// Product with a dense matrix of `ncols` rows
    pub fn mul_dense(&self, rhs: &DMatrix<T>) -> anyhow::Result<DMatrix<T>> {
        if rhs.nrows() != self.ncols() {
            anyhow::bail!(SplineError::mismatch(format!(
                "Cannot multiply a {}x{} matrix with a {}x{} matrix",
                self.nrows(),
                self.ncols(),
                rhs.nrows(),
                rhs.ncols()
            )));
        }
        Ok(&self.inner * rhs)
    }
}

#[cfg(feature = "serde")]
impl<T> serde::Serialize for CsrMatrix<T>
where
    T: FloatingPoint + serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CsrMatrix", 5)?;
        state.serialize_field("nrows", &self.nrows())?;
        state.serialize_field("ncols", &self.ncols())?;
        state.serialize_field("row_offsets", self.row_offsets())?;
        state.serialize_field("col_indices", self.col_indices())?;
        state.serialize_field("values", self.values())?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for CsrMatrix<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Raw<T> {
            nrows: usize,
            ncols: usize,
            row_offsets: Vec<usize>,
            col_indices: Vec<usize>,
            values: Vec<T>,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        CsrMatrix::try_new(
            raw.nrows,
            raw.ncols,
            raw.row_offsets,
            raw.col_indices,
            raw.values,
        )
        .map_err(serde::de::Error::custom)
    }
}

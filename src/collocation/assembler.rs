use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::basis::{global_columns, TensorBasisEvaluation};
use crate::error::SplineError;
use crate::misc::{strides, FloatingPoint};
use crate::spline::BSpline;

use super::CsrMatrix;

/// Assemble the CSR collocation matrix from basis evaluations
///
/// `knot_indices[k][m]` is the knot span of point `m` in direction `k` and
/// row `m` of `values` holds the `prod(p_k + 1)` non-vanishing basis values
/// at point `m`, direction 0 varying fastest. Entry `(m, l)` lands in column
/// `sum_k (span_k - p_k + j_k) * stride_k`. When there are fewer points than
/// rows, the trailing rows are empty.
///
/// # Failures
/// - if the per-direction inputs disagree in length
/// - if there are more points than rows in `shape`
/// - if a column falls outside `shape`
pub fn assemble_collocation_matrix<T: FloatingPoint>(
    knot_indices: &[Vec<usize>],
    degrees: &[usize],
    ncoeffs: &[usize],
    values: &DMatrix<T>,
    shape: (usize, usize),
) -> anyhow::Result<CsrMatrix<T>> {
    let dim = degrees.len();
    if knot_indices.len() != dim || ncoeffs.len() != dim {
        anyhow::bail!(SplineError::mismatch(format!(
            "Got {} knot index arrays and {} coefficient counts for {} degrees",
            knot_indices.len(),
            ncoeffs.len(),
            dim
        )));
    }

    let npts = values.nrows();
    let nlocal: usize = degrees.iter().map(|p| p + 1).product();
    if values.ncols() != nlocal {
        anyhow::bail!(SplineError::mismatch(format!(
            "Expected {} basis values per point, got {}",
            nlocal,
            values.ncols()
        )));
    }
    if let Some(k) = knot_indices.iter().position(|s| s.len() != npts) {
        anyhow::bail!(SplineError::mismatch(format!(
            "Direction {} has {} knot indices for {} points",
            k,
            knot_indices[k].len(),
            npts
        )));
    }
    let (nrows, ncols) = shape;
    if npts > nrows {
        anyhow::bail!(SplineError::mismatch(format!(
            "{} points do not fit into {} rows",
            npts, nrows
        )));
    }
    for (k, spans) in knot_indices.iter().enumerate() {
        if let Some(s) = spans.iter().find(|s| **s < degrees[k] || **s >= ncoeffs[k]) {
            anyhow::bail!(SplineError::mismatch(format!(
                "Knot index {} in direction {} is outside [{}, {})",
                s, k, degrees[k], ncoeffs[k]
            )));
        }
    }

    let strides = strides(ncoeffs);
    let col_indices: Vec<usize> = (0..npts)
        .into_par_iter()
        .flat_map_iter(|m| {
            let spans: Vec<usize> = knot_indices.iter().map(|s| s[m]).collect();
            global_columns(&spans, degrees, &strides)
        })
        .collect();
    if let Some(c) = col_indices.iter().find(|c| **c >= ncols) {
        anyhow::bail!(SplineError::mismatch(format!(
            "Column index {} out of range for {} columns",
            c, ncols
        )));
    }

    // row-major copy of the local values
    let values: Vec<T> = values.transpose().as_slice().to_vec();
    let nnz = npts * nlocal;
    let row_offsets: Vec<usize> = (0..=nrows).map(|i| (i * nlocal).min(nnz)).collect();

    log::debug!(
        "assembled {}x{} collocation matrix with {} entries",
        nrows,
        ncols,
        nnz
    );
    CsrMatrix::try_new(nrows, ncols, row_offsets, col_indices, values)
}

impl<T: FloatingPoint> TensorBasisEvaluation<T> {
    /// Assemble the collocation matrix of these evaluations for a spline
    /// with `ncoeffs` coefficients per direction
    pub fn to_csr(&self, ncoeffs: &[usize], shape: (usize, usize)) -> anyhow::Result<CsrMatrix<T>> {
        assemble_collocation_matrix(self.spans(), self.degrees(), ncoeffs, self.values(), shape)
    }
}

impl<T: FloatingPoint> BSpline<T> {
    /// Collocation matrix of the basis at `points`, `npts x ncumcoeffs`
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::*;
    /// let spline = BSpline::<f64>::try_uniform(&[1, 1], &[4, 4], 1, Init::Zeros).unwrap();
    /// let points = spline.greville(true);
    /// let matrix = spline.collocation_matrix(&points).unwrap();
    /// assert_eq!(matrix.shape(), (4, 16));
    /// assert_eq!(matrix.nnz(), 16);
    /// ```
    pub fn collocation_matrix(&self, points: &DMatrix<T>) -> anyhow::Result<CsrMatrix<T>> {
        self.collocation_matrix_derivative(points, &vec![0; self.par_dim()])
    }

    /// Collocation matrix of a mixed partial derivative of the basis
    pub fn collocation_matrix_derivative(
        &self,
        points: &DMatrix<T>,
        derivatives: &[usize],
    ) -> anyhow::Result<CsrMatrix<T>> {
        let basis = self.eval_basis(points, derivatives)?;
        basis.to_csr(&self.ncoeffs(), (points.nrows(), self.ncumcoeffs()))
    }
}

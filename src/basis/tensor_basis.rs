use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::SplineError;
use crate::knot::KnotVector;
use crate::misc::{strides, FloatingPoint};

use super::BasisEvaluation;

/// Minimum number of points handled by one rayon task
const PARALLEL_CHUNK: usize = 256;

/// Tensor-product basis functions evaluated at a batch of points.
///
/// `values` is `npts x prod(p_k + 1)`. The local column index of the function
/// with per-direction offsets `(j_0, j_1, ...)` is
/// `j_0 + (p_0 + 1) * j_1 + (p_0 + 1) * (p_1 + 1) * j_2 + ...`.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorBasisEvaluation<T: FloatingPoint> {
    spans: Vec<Vec<usize>>,
    degrees: Vec<usize>,
    values: DMatrix<T>,
}

impl<T: FloatingPoint> TensorBasisEvaluation<T> {
    /// Knot-span indices, one vector per parametric direction
    pub fn spans(&self) -> &[Vec<usize>] {
        &self.spans
    }

    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    pub fn values(&self) -> &DMatrix<T> {
        &self.values
    }

    pub fn npts(&self) -> usize {
        self.values.nrows()
    }

    /// Number of non-vanishing functions per point
    pub fn nlocal(&self) -> usize {
        self.values.ncols()
    }

    /// Knot-span indices of point `m` across all directions
    pub fn spans_at(&self, m: usize) -> Vec<usize> {
        self.spans.iter().map(|s| s[m]).collect()
    }

    /// Map the local functions of every point to flat coefficient indices
    /// of a spline with `ncoeffs` coefficients per direction.
    pub fn column_indices(&self, ncoeffs: &[usize]) -> Vec<Vec<usize>> {
        let strides = strides(ncoeffs);
        (0..self.npts())
            .map(|m| global_columns(&self.spans_at(m), &self.degrees, &strides))
            .collect()
    }
}

/// Flat coefficient indices of the non-vanishing functions on the cell
/// identified by `spans`, in local column order.
pub(crate) fn global_columns(spans: &[usize], degrees: &[usize], strides: &[usize]) -> Vec<usize> {
    let mut columns = vec![0usize];
    for k in 0..spans.len() {
        let first = spans[k] - degrees[k];
        let len = columns.len();
        let mut next = Vec::with_capacity(len * (degrees[k] + 1));
        for j in 0..=degrees[k] {
            next.extend(columns[..len].iter().map(|c| c + (first + j) * strides[k]));
        }
        columns = next;
    }
    columns
}

/// Evaluate the tensor-product basis at `points` (`npts x d`) for the
/// derivative multi-index `derivatives` (length `d`).
///
/// A zero-dimensional basis consists of a single constant function.
///
/// # Failures
/// - if the point matrix or the derivative multi-index does not have one
///   entry per knot vector
pub fn evaluate_tensor_basis<T: FloatingPoint>(
    knots: &[KnotVector<T>],
    points: &DMatrix<T>,
    derivatives: &[usize],
) -> anyhow::Result<TensorBasisEvaluation<T>> {
    let dim = knots.len();
    if points.ncols() != dim {
        anyhow::bail!(SplineError::mismatch(format!(
            "Points have {} coordinates but the basis has {} parametric directions",
            points.ncols(),
            dim
        )));
    }
    if derivatives.len() != dim {
        anyhow::bail!(SplineError::mismatch(format!(
            "Derivative multi-index has length {}, expected {}",
            derivatives.len(),
            dim
        )));
    }

    let npts = points.nrows();
    let degrees: Vec<usize> = knots.iter().map(|k| k.degree()).collect();
    let nlocal: usize = degrees.iter().map(|p| p + 1).product();
    log::trace!(
        "evaluating {} tensor basis functions at {} points (derivative {:?})",
        nlocal,
        npts,
        derivatives
    );

    let directional: Vec<BasisEvaluation<T>> = knots
        .iter()
        .enumerate()
        .map(|(k, knot)| {
            let column: Vec<T> = points.column(k).iter().copied().collect();
            knot.evaluate_basis(&column, derivatives[k])
        })
        .collect();

    let mut data = vec![T::zero(); npts * nlocal];
    data.par_chunks_mut(nlocal.max(1))
        .with_min_len(PARALLEL_CHUNK)
        .enumerate()
        .for_each(|(m, row)| {
            kronecker_row(&directional, m, row);
        });

    let values = DMatrix::from_row_slice(npts, nlocal, &data);
    let (spans, _): (Vec<_>, Vec<_>) = directional.into_iter().map(|e| e.into_parts()).unzip();

    Ok(TensorBasisEvaluation {
        spans,
        degrees,
        values,
    })
}

/// Kronecker product of the per-direction values at point `m`,
/// with direction 0 varying fastest
fn kronecker_row<T: FloatingPoint>(directional: &[BasisEvaluation<T>], m: usize, row: &mut [T]) {
    row[0] = T::one();
    let mut len = 1;
    for eval in directional {
        let local = eval.values().row(m);
        let n = local.len();
        // widen from the back so the current block is still intact while it is read
        for j in (0..n).rev() {
            for l in 0..len {
                row[j * len + l] = row[l] * local[j];
            }
        }
        len *= n;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use super::*;

    #[test]
    fn kronecker_ordering() {
        let k0 = KnotVector::<f64>::try_uniform(1, 3).unwrap();
        let k1 = KnotVector::<f64>::try_uniform(2, 4).unwrap();
        let points = DMatrix::from_row_slice(2, 2, &[0.3, 0.6, 0.75, 0.1]);
        let eval = evaluate_tensor_basis(&[k0.clone(), k1.clone()], &points, &[0, 0]).unwrap();
        assert_eq!(eval.nlocal(), 6);

        for m in 0..2 {
            let e0 = k0.evaluate_basis(&[points[(m, 0)]], 0);
            let e1 = k1.evaluate_basis(&[points[(m, 1)]], 0);
            for j1 in 0..3 {
                for j0 in 0..2 {
                    assert_relative_eq!(
                        eval.values()[(m, j0 + 2 * j1)],
                        e0.values()[(0, j0)] * e1.values()[(0, j1)],
                        epsilon = 1e-14
                    );
                }
            }
            let sum: f64 = eval.values().row(m).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn column_indices_follow_flat_ordering() {
        let k0 = KnotVector::<f64>::try_uniform(1, 3).unwrap();
        let k1 = KnotVector::<f64>::try_uniform(1, 3).unwrap();
        let points = DMatrix::from_row_slice(1, 2, &[0.75, 0.25]);
        let eval = evaluate_tensor_basis(&[k0, k1], &points, &[0, 0]).unwrap();
        assert_eq!(eval.spans_at(0), vec![2, 1]);
        assert_eq!(eval.column_indices(&[3, 3]), vec![vec![1, 2, 4, 5]]);
    }

    #[test]
    fn zero_dimensional_basis() {
        let points = DMatrix::<f64>::zeros(3, 0);
        let eval = evaluate_tensor_basis(&[], &points, &[]).unwrap();
        assert_eq!(eval.npts(), 3);
        assert_eq!(eval.nlocal(), 1);
        assert!(eval.values().iter().all(|v| *v == 1.0));
        assert_eq!(eval.column_indices(&[]), vec![vec![0]; 3]);
    }

    #[test]
    fn shape_mismatch() {
        let k0 = KnotVector::<f64>::try_uniform(1, 3).unwrap();
        let points = DMatrix::<f64>::zeros(3, 2);
        assert!(evaluate_tensor_basis(&[k0.clone()], &points, &[0]).is_err());
        let points = DMatrix::<f64>::zeros(3, 1);
        assert!(evaluate_tensor_basis(&[k0], &points, &[0, 0]).is_err());
    }

    #[test]
    fn large_batches_are_consistent() {
        let k0 = KnotVector::<f64>::try_uniform(3, 9).unwrap();
        let k1 = KnotVector::<f64>::try_uniform(2, 5).unwrap();
        let npts = 2000;
        let points = DMatrix::from_fn(npts, 2, |i, j| ((i * (j + 3)) % 997) as f64 / 996.);
        let eval = evaluate_tensor_basis(&[k0, k1], &points, &[0, 0]).unwrap();
        for m in 0..npts {
            let sum: f64 = eval.values().row(m).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }
}

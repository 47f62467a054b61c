use nalgebra::DMatrix;

use crate::knot::KnotVector;
use crate::misc::{from_usize, FloatingPoint};

/// Non-vanishing basis functions of one direction at a batch of points.
///
/// Row `m` of `values` holds `N_{s-p}, ..., N_s` (or one of their derivatives)
/// at point `m`, where `s = spans[m]`.
#[derive(Clone, Debug, PartialEq)]
pub struct BasisEvaluation<T: FloatingPoint> {
    spans: Vec<usize>,
    values: DMatrix<T>,
}

impl<T: FloatingPoint> BasisEvaluation<T> {
    pub fn spans(&self) -> &[usize] {
        &self.spans
    }

    /// `npts x (degree + 1)` matrix of basis values
    pub fn values(&self) -> &DMatrix<T> {
        &self.values
    }

    pub fn npts(&self) -> usize {
        self.spans.len()
    }

    pub fn into_parts(self) -> (Vec<usize>, DMatrix<T>) {
        (self.spans, self.values)
    }
}

/// `a / b`, with a vanishing denominator contributing nothing
fn ratio<T: FloatingPoint>(a: T, b: T) -> T {
    if b == T::zero() {
        T::zero()
    } else {
        a / b
    }
}

impl<T: FloatingPoint> KnotVector<T> {
    /// Evaluate the `derivative`-th derivative of the non-vanishing basis
    /// functions at every point of the batch.
    ///
    /// The Cox-de Boor triangle is built level by level for the whole batch.
    /// The last `derivative` levels apply the derivative recurrence instead of
    /// the value recurrence. Points outside the domain are clamped onto it.
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(2, 5).unwrap();
    /// let eval = knots.evaluate_basis(&[0.1, 0.5, 0.9], 0);
    /// for m in 0..3 {
    ///     let sum: f64 = eval.values().row(m).iter().sum();
    ///     assert!((sum - 1.0).abs() < 1e-12);
    /// }
    /// ```
    pub fn evaluate_basis(&self, points: &[T], derivative: usize) -> BasisEvaluation<T> {
        let p = self.degree();
        let npts = points.len();
        let clamped: Vec<T> = points.iter().map(|u| self.clamp(*u)).collect();
        let spans: Vec<usize> = clamped.iter().map(|u| self.find_span(*u)).collect();

        let mut values = DMatrix::<T>::zeros(npts, p + 1);
        if derivative > p {
            return BasisEvaluation { spans, values };
        }

        values.column_mut(0).fill(T::one());

        for q in 1..=p {
            let differentiate = q + derivative > p;
            let fq = from_usize::<T>(q);
            for m in 0..npts {
                let u = clamped[m];
                let s = spans[m];
                // descending so that level q-1 entries are read before being overwritten
                for r in (0..=q).rev() {
                    let i = s + r - q;
                    let lower = if r > 0 {
                        values[(m, r - 1)]
                    } else {
                        T::zero()
                    };
                    let upper = if r < q { values[(m, r)] } else { T::zero() };
                    let d0 = self[i + q] - self[i];
                    let d1 = self[i + q + 1] - self[i + 1];
                    values[(m, r)] = if differentiate {
                        fq * (ratio(lower, d0) - ratio(upper, d1))
                    } else {
                        ratio((u - self[i]) * lower, d0) + ratio((self[i + q + 1] - u) * upper, d1)
                    };
                }
            }
        }

        BasisEvaluation { spans, values }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::KnotVector;

    fn non_uniform() -> KnotVector<f64> {
        KnotVector::try_new(3, vec![0., 0., 0., 0., 0.15, 0.4, 0.4, 0.8, 1., 1., 1., 1.]).unwrap()
    }

    #[test]
    fn partition_of_unity() {
        let knots = non_uniform();
        let points: Vec<f64> = (0..=50).map(|i| i as f64 / 50.).collect();
        let eval = knots.evaluate_basis(&points, 0);
        for m in 0..points.len() {
            let sum: f64 = eval.values().row(m).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
            assert!(eval.values().row(m).iter().all(|v| *v >= -1e-14));
        }
    }

    #[test]
    fn agrees_with_scalar_evaluation() {
        let knots = non_uniform();
        let points = [0.0, 0.07, 0.15, 0.33, 0.4, 0.61, 0.95, 1.0];
        let eval = knots.evaluate_basis(&points, 0);
        for (m, u) in points.iter().enumerate() {
            let span = knots.find_span(*u);
            assert_eq!(eval.spans()[m], span);
            let scalar = knots.basis_functions(span, *u);
            for (j, v) in scalar.iter().enumerate() {
                assert_relative_eq!(eval.values()[(m, j)], *v, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let knots = non_uniform();
        let h = 1e-6;
        for u in [0.05, 0.27, 0.55, 0.9] {
            let d = knots.evaluate_basis(&[u], 1);
            let plus = knots.evaluate_basis(&[u + h], 0);
            let minus = knots.evaluate_basis(&[u - h], 0);
            assert_eq!(plus.spans()[0], minus.spans()[0]);
            for j in 0..=3 {
                let fd = (plus.values()[(0, j)] - minus.values()[(0, j)]) / (2. * h);
                assert_relative_eq!(d.values()[(0, j)], fd, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn derivatives_sum_to_zero() {
        let knots = non_uniform();
        let eval = knots.evaluate_basis(&[0.2, 0.5, 0.85], 2);
        for m in 0..3 {
            let sum: f64 = eval.values().row(m).iter().sum();
            assert_relative_eq!(sum, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn derivative_above_degree_vanishes() {
        let knots = KnotVector::<f64>::try_uniform(2, 4).unwrap();
        let eval = knots.evaluate_basis(&[0.3, 0.8], 3);
        assert!(eval.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn linear_derivative() {
        let knots = KnotVector::<f64>::try_uniform(1, 2).unwrap();
        let eval = knots.evaluate_basis(&[0.25], 1);
        assert_relative_eq!(eval.values()[(0, 0)], -1.0);
        assert_relative_eq!(eval.values()[(0, 1)], 1.0);
    }

    #[test]
    fn points_outside_the_domain_are_clamped() {
        let knots = non_uniform();
        let outside = knots.evaluate_basis(&[-0.5, 1.5], 0);
        let inside = knots.evaluate_basis(&[0.0, 1.0], 0);
        assert_eq!(outside, inside);
        assert_relative_eq!(inside.values()[(0, 0)], 1.0);
        assert_relative_eq!(inside.values()[(1, 3)], 1.0);
    }

    #[test]
    fn degree_zero_is_indicator() {
        let knots = KnotVector::<f64>::try_uniform(0, 4).unwrap();
        let eval = knots.evaluate_basis(&[0.1, 0.3, 0.99], 0);
        assert_eq!(eval.spans(), &[0, 1, 3]);
        assert!(eval.values().iter().all(|v| *v == 1.0));
    }
}

use nalgebra::{DMatrix, DVector};

use crate::boundary::Side;
use crate::error::SplineError;
use crate::knot::KnotVector;
use crate::misc::{multi_indices_up_to, strides, Binomial, FloatingPoint, Transformable};

use super::{BSpline, TensorSpline};

/// NURBS represented as a B-spline in homogeneous coordinates
///
/// The wrapped spline has `geo_dim + 1` columns: the first `geo_dim` hold the
/// weighted coordinates `w * x`, the last one the weight `w`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(bound(serialize = "T: serde::Serialize")))]
pub struct Nurbs<T: FloatingPoint> {
    homogeneous: BSpline<T>,
}

impl<T: FloatingPoint> Nurbs<T> {
    /// Create a NURBS from Euclidean control points and their weights
    /// # Failures
    /// - if the number of control points or weights differs from `prod(n_k)`
    /// - if a weight is not positive
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::*;
    /// use nalgebra::{DMatrix, DVector};
    /// // quarter circle
    /// let knots = vec![KnotVector::try_uniform(2, 3).unwrap()];
    /// let control_points = DMatrix::from_row_slice(3, 2, &[1., 0., 1., 1., 0., 1.]);
    /// let weights = DVector::from_vec(vec![1., 0.5f64.sqrt(), 1.]);
    /// let nurbs = Nurbs::try_new(knots, control_points, weights).unwrap();
    /// let p = nurbs.eval(&DMatrix::from_element(1, 1, 0.3)).unwrap();
    /// assert!((p.row(0).norm() - 1.0).abs() < 1e-12);
    /// ```
    pub fn try_new(
        knots: Vec<KnotVector<T>>,
        control_points: DMatrix<T>,
        weights: DVector<T>,
    ) -> anyhow::Result<Self> {
        if weights.len() != control_points.nrows() {
            anyhow::bail!(SplineError::mismatch(format!(
                "Got {} weights for {} control points",
                weights.len(),
                control_points.nrows()
            )));
        }
        let g = control_points.ncols();
        let homogeneous = DMatrix::from_fn(control_points.nrows(), g + 1, |i, c| {
            if c < g {
                control_points[(i, c)] * weights[i]
            } else {
                weights[i]
            }
        });
        Self::try_from_homogeneous(BSpline::try_new(knots, homogeneous)?)
    }

    /// Wrap a B-spline whose last coordinate is the weight
    /// # Failures
    /// - if there is no weight column besides the coordinates
    /// - if a weight is not positive
    pub fn try_from_homogeneous(homogeneous: BSpline<T>) -> anyhow::Result<Self> {
        let g = homogeneous.geo_dim();
        if g < 2 {
            anyhow::bail!(SplineError::invalid(
                "Homogeneous control points need at least one coordinate and a weight"
            ));
        }
        if homogeneous
            .control_points()
            .column(g - 1)
            .iter()
            .any(|w| !(*w > T::zero()))
        {
            anyhow::bail!(SplineError::invalid("Weights must be positive"));
        }
        Ok(Self { homogeneous })
    }

    /// Lift a B-spline to a NURBS with unit weights
    pub fn from_bspline(spline: &BSpline<T>) -> Self {
        let control_points = spline
            .control_points()
            .clone()
            .resize_horizontally(spline.geo_dim() + 1, T::one());
        Self {
            homogeneous: BSpline::from_parts(spline.knots().to_vec(), control_points),
        }
    }

    pub fn homogeneous(&self) -> &BSpline<T> {
        &self.homogeneous
    }

    pub fn par_dim(&self) -> usize {
        self.homogeneous.par_dim()
    }

    pub fn geo_dim(&self) -> usize {
        self.homogeneous.geo_dim() - 1
    }

    pub fn knots(&self) -> &[KnotVector<T>] {
        self.homogeneous.knots()
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.homogeneous.degrees()
    }

    pub fn ncoeffs(&self) -> Vec<usize> {
        self.homogeneous.ncoeffs()
    }

    pub fn ncumcoeffs(&self) -> usize {
        self.homogeneous.ncumcoeffs()
    }

    pub fn weights(&self) -> DVector<T> {
        self.homogeneous
            .control_points()
            .column(self.geo_dim())
            .into_owned()
    }

    /// Euclidean control points, `prod(n_k) x geo_dim`
    pub fn control_points(&self) -> DMatrix<T> {
        dehomogenize(self.homogeneous.control_points())
    }

    /// Evaluate at `points` (`npts x par_dim`), giving Euclidean `npts x geo_dim`
    pub fn eval(&self, points: &DMatrix<T>) -> anyhow::Result<DMatrix<T>> {
        Ok(dehomogenize(&self.homogeneous.eval(points)?))
    }

    /// Evaluate the mixed partial derivative `derivatives` of the rational map
    ///
    /// Derivatives of the weighted coordinates `A` and of the weight `w` are
    /// combined by the quotient rule
    /// `R^(a) = (A^(a) - sum_{0 < b <= a} C(a, b) w^(b) R^(a - b)) / w`.
    pub fn eval_derivative(
        &self,
        points: &DMatrix<T>,
        derivatives: &[usize],
    ) -> anyhow::Result<DMatrix<T>> {
        if derivatives.len() != self.par_dim() {
            anyhow::bail!(SplineError::mismatch(format!(
                "Derivative multi-index has length {}, expected {}",
                derivatives.len(),
                self.par_dim()
            )));
        }
        if derivatives.iter().all(|d| *d == 0) {
            return self.eval(points);
        }

        let g = self.geo_dim();
        let npts = points.nrows();
        let lower_set = multi_indices_up_to(derivatives);
        let sizes: Vec<usize> = derivatives.iter().map(|d| d + 1).collect();
        let strides = strides(&sizes);
        let flat = |beta: &[usize]| flat_index(beta, &strides);

        let homogeneous = lower_set
            .iter()
            .map(|beta| self.homogeneous.eval_derivative(points, beta))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let mut lookup = vec![0; lower_set.len()];
        for (i, beta) in lower_set.iter().enumerate() {
            lookup[flat(&beta[..])] = i;
        }
        let weight = &homogeneous[lookup[0]];

        let mut binom = Binomial::<T>::new();
        let mut rational: Vec<DMatrix<T>> = vec![DMatrix::zeros(npts, g); lower_set.len()];
        // lexicographic order visits every lower multi-index first
        for alpha in lower_set.iter() {
            let a = flat(&alpha[..]);
            let mut numerator = homogeneous[lookup[a]].columns(0, g).into_owned();
            let lower = multi_indices_up_to(alpha);
            for beta in lower.iter().filter(|b| b.iter().any(|v| *v > 0)) {
                let diff: Vec<usize> = alpha.iter().zip(beta.iter()).map(|(x, y)| x - y).collect();
                let coefficient = binom.multi(alpha, beta);
                let w_beta = &homogeneous[lookup[flat(&beta[..])]];
                let r_diff = &rational[flat(&diff[..])];
                for m in 0..npts {
                    let factor = coefficient * w_beta[(m, g)];
                    for c in 0..g {
                        numerator[(m, c)] -= factor * r_diff[(m, c)];
                    }
                }
            }
            for m in 0..npts {
                let w = weight[(m, g)];
                for c in 0..g {
                    numerator[(m, c)] /= w;
                }
            }
            rational[a] = numerator;
        }

        Ok(rational.swap_remove(flat(derivatives)))
    }

    /// Set every control point to `map(xi)` (see [`BSpline::transform`]),
    /// keeping the weights
    pub fn transform<F>(&mut self, mut map: F) -> anyhow::Result<()>
    where
        F: FnMut(&[T]) -> Vec<T>,
    {
        let g = self.geo_dim();
        let weights = self.weights();
        let mut euclidean = BSpline::try_new(self.knots().to_vec(), self.control_points())?;
        euclidean.transform(&mut map)?;
        let homogeneous = DMatrix::from_fn(weights.len(), g + 1, |i, c| {
            if c < g {
                euclidean.control_points()[(i, c)] * weights[i]
            } else {
                weights[i]
            }
        });
        self.homogeneous.set_control_points(homogeneous)
    }

    pub fn try_insert_knots(&mut self, direction: usize, knots: &[T]) -> anyhow::Result<()> {
        self.homogeneous.try_insert_knots(direction, knots)
    }

    pub fn try_refine(&mut self, times: usize, direction: Option<usize>) -> anyhow::Result<()> {
        self.homogeneous.try_refine(times, direction)
    }

    pub fn try_elevate_degree(
        &mut self,
        amount: usize,
        direction: Option<usize>,
    ) -> anyhow::Result<()> {
        self.homogeneous.try_elevate_degree(amount, direction)
    }

    pub fn greville(&self, interior: bool) -> DMatrix<T> {
        self.homogeneous.greville(interior)
    }

    pub fn face(&self, side: Side) -> anyhow::Result<Self> {
        Ok(Self {
            homogeneous: self.homogeneous.face(side)?,
        })
    }

    pub(crate) fn extract_face(&self, direction: usize, upper: bool) -> Self {
        Self {
            homogeneous: self.homogeneous.extract_face(direction, upper),
        }
    }
}

/// Position of `beta` in a grid with the given strides
fn flat_index(beta: &[usize], strides: &[usize]) -> usize {
    beta.iter().zip(strides.iter()).map(|(b, s)| b * s).sum()
}

/// Divide the leading columns by the last (weight) column
fn dehomogenize<T: FloatingPoint>(homogeneous: &DMatrix<T>) -> DMatrix<T> {
    let g = homogeneous.ncols() - 1;
    DMatrix::from_fn(homogeneous.nrows(), g, |i, c| {
        homogeneous[(i, c)] / homogeneous[(i, g)]
    })
}

impl<T: FloatingPoint> From<BSpline<T>> for Nurbs<T> {
    fn from(spline: BSpline<T>) -> Self {
        Self::from_bspline(&spline)
    }
}

impl<T: FloatingPoint> TensorSpline for Nurbs<T> {
    type Scalar = T;

    fn par_dim(&self) -> usize {
        Self::par_dim(self)
    }

    fn geo_dim(&self) -> usize {
        Self::geo_dim(self)
    }

    fn ncoeffs(&self) -> Vec<usize> {
        Self::ncoeffs(self)
    }

    fn greville(&self, interior: bool) -> DMatrix<T> {
        Self::greville(self, interior)
    }

    fn eval(&self, points: &DMatrix<T>) -> anyhow::Result<DMatrix<T>> {
        Self::eval(self, points)
    }

    fn try_refine(&mut self, times: usize, direction: Option<usize>) -> anyhow::Result<()> {
        Self::try_refine(self, times, direction)
    }

    fn face(&self, side: Side) -> anyhow::Result<Self> {
        Self::face(self, side)
    }
}

/// Apply a homogeneous `(geo_dim + 1) x (geo_dim + 1)` matrix in projective space
impl<'a, T: FloatingPoint> Transformable<&'a DMatrix<T>> for Nurbs<T> {
    fn try_transform(&mut self, transform: &'a DMatrix<T>) -> anyhow::Result<()> {
        let g = self.geo_dim();
        if transform.shape() != (g + 1, g + 1) {
            anyhow::bail!(SplineError::mismatch(format!(
                "Expected a {}x{} homogeneous transform, got {:?}",
                g + 1,
                g + 1,
                transform.shape()
            )));
        }
        let transformed = self.homogeneous.control_points() * transform.transpose();
        let homogeneous = BSpline::try_new(self.knots().to_vec(), transformed)?;
        *self = Self::try_from_homogeneous(homogeneous)?;
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for Nurbs<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(bound(deserialize = "T: FloatingPoint + serde::Deserialize<'de>"))]
        struct Homogeneous<T: FloatingPoint> {
            homogeneous: BSpline<T>,
        }

        let raw = Homogeneous::<T>::deserialize(deserializer)?;
        Nurbs::try_from_homogeneous(raw.homogeneous).map_err(serde::de::Error::custom)
    }
}

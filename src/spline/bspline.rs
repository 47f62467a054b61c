use nalgebra::DMatrix;

use crate::basis::{evaluate_tensor_basis, TensorBasisEvaluation};
use crate::boundary::Side;
use crate::error::SplineError;
use crate::knot::KnotVector;
use crate::misc::{unravel, FloatingPoint, Transformable};

use super::fiber::{elevate_slices, merge_direction, refine_slices, split_direction};
use super::{Init, TensorSpline, MAX_PARAMETRIC_DIM};

/// Tensor-product B-spline of arbitrary parametric and geometric dimension
///
/// Control points are stored as a `prod(n_k) x geo_dim` matrix whose row
/// index is `i_0 + n_0 * i_1 + n_0 * n_1 * i_2 + ...`.
#[derive(Clone, Debug, PartialEq)]
pub struct BSpline<T: FloatingPoint> {
    knots: Vec<KnotVector<T>>,
    control_points: DMatrix<T>,
}

impl<T: FloatingPoint> BSpline<T> {
    /// Create a spline with open uniform knot vectors on `[0, 1]^d`
    /// # Failures
    /// - if `degrees` and `ncoeffs` differ in length
    /// - if `ncoeffs[k] < degrees[k] + 1` for some direction
    /// - if there are more than four parametric directions
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::*;
    /// let spline = BSpline::<f64>::try_uniform(&[2], &[6], 1, Init::Linear).unwrap();
    /// assert_eq!(spline.knots()[0].len(), 9);
    /// assert_eq!(spline.ncoeffs(), vec![6]);
    /// ```
    pub fn try_uniform(
        degrees: &[usize],
        ncoeffs: &[usize],
        geo_dim: usize,
        init: Init,
    ) -> anyhow::Result<Self> {
        if degrees.len() != ncoeffs.len() {
            anyhow::bail!(SplineError::mismatch(format!(
                "{} degrees given for {} directions",
                degrees.len(),
                ncoeffs.len()
            )));
        }
        let knots = degrees
            .iter()
            .zip(ncoeffs.iter())
            .map(|(p, n)| KnotVector::try_uniform(*p, *n))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Self::try_from_knots(knots, geo_dim, init)
    }

    /// Create a spline on the given knot vectors with initialized control points
    pub fn try_from_knots(
        knots: Vec<KnotVector<T>>,
        geo_dim: usize,
        init: Init,
    ) -> anyhow::Result<Self> {
        check_par_dim(knots.len())?;
        let control_points = init.control_points(&knots, geo_dim);
        Self::try_new(knots, control_points)
    }

    /// Create a spline from knot vectors and a control point matrix,
    /// taking ownership of both
    /// # Failures
    /// - if the number of rows differs from `prod(n_k)`
    /// - if the geometric dimension is zero
    pub fn try_new(knots: Vec<KnotVector<T>>, control_points: DMatrix<T>) -> anyhow::Result<Self> {
        check_par_dim(knots.len())?;
        let expected: usize = knots.iter().map(|k| k.ncoeffs()).product();
        if control_points.nrows() != expected {
            anyhow::bail!(SplineError::mismatch(format!(
                "Expected {} control points, got {}",
                expected,
                control_points.nrows()
            )));
        }
        if control_points.ncols() == 0 {
            anyhow::bail!(SplineError::invalid("Geometric dimension must be positive"));
        }
        Ok(Self {
            knots,
            control_points,
        })
    }

    /// Create a spline from a coordinate-major flat coefficient array,
    /// as produced by [`BSpline::to_flat`]
    pub fn try_from_flat(
        knots: Vec<KnotVector<T>>,
        geo_dim: usize,
        data: &[T],
    ) -> anyhow::Result<Self> {
        let rows: usize = knots.iter().map(|k| k.ncoeffs()).product();
        if data.len() != rows * geo_dim {
            anyhow::bail!(SplineError::mismatch(format!(
                "Expected {} coefficients ({} x {}), got {}",
                rows * geo_dim,
                rows,
                geo_dim,
                data.len()
            )));
        }
        Self::try_new(knots, DMatrix::from_column_slice(rows, geo_dim, data))
    }

    /// Coefficients in coordinate-major order
    pub fn to_flat(&self) -> Vec<T> {
        self.control_points.as_slice().to_vec()
    }

    pub fn par_dim(&self) -> usize {
        self.knots.len()
    }

    pub fn geo_dim(&self) -> usize {
        self.control_points.ncols()
    }

    pub fn knots(&self) -> &[KnotVector<T>] {
        &self.knots
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.knots.iter().map(|k| k.degree()).collect()
    }

    pub fn ncoeffs(&self) -> Vec<usize> {
        self.knots.iter().map(|k| k.ncoeffs()).collect()
    }

    pub fn ncumcoeffs(&self) -> usize {
        self.control_points.nrows()
    }

    /// Parametric domain of every direction
    pub fn domain(&self) -> Vec<(T, T)> {
        self.knots.iter().map(|k| k.domain()).collect()
    }

    pub fn control_points(&self) -> &DMatrix<T> {
        &self.control_points
    }

    /// Replace the control points, keeping the knot vectors
    pub fn set_control_points(&mut self, control_points: DMatrix<T>) -> anyhow::Result<()> {
        if control_points.shape() != self.control_points.shape() {
            anyhow::bail!(SplineError::mismatch(format!(
                "Expected control points of shape {:?}, got {:?}",
                self.control_points.shape(),
                control_points.shape()
            )));
        }
        self.control_points = control_points;
        Ok(())
    }

    /// Assemble a spline whose shape is already known to be consistent
    pub(crate) fn from_parts(knots: Vec<KnotVector<T>>, control_points: DMatrix<T>) -> Self {
        Self {
            knots,
            control_points,
        }
    }

    pub fn into_parts(self) -> (Vec<KnotVector<T>>, DMatrix<T>) {
        (self.knots, self.control_points)
    }

    /// Evaluate the basis functions (or a mixed partial derivative of them)
    /// at `points` (`npts x par_dim`)
    pub fn eval_basis(
        &self,
        points: &DMatrix<T>,
        derivatives: &[usize],
    ) -> anyhow::Result<TensorBasisEvaluation<T>> {
        evaluate_tensor_basis(&self.knots, points, derivatives)
    }

    /// Evaluate the spline at `points` (`npts x par_dim`), giving `npts x geo_dim`
    ///
    /// Points outside the parametric domain are clamped onto it.
    pub fn eval(&self, points: &DMatrix<T>) -> anyhow::Result<DMatrix<T>> {
        self.eval_derivative(points, &vec![0; self.par_dim()])
    }

    /// Evaluate the mixed partial derivative `derivatives` (one order per
    /// direction) at `points`
    pub fn eval_derivative(
        &self,
        points: &DMatrix<T>,
        derivatives: &[usize],
    ) -> anyhow::Result<DMatrix<T>> {
        let basis = self.eval_basis(points, derivatives)?;
        Ok(self.combine(&basis))
    }

    /// Contract basis values with the control points
    pub(crate) fn combine(&self, basis: &TensorBasisEvaluation<T>) -> DMatrix<T> {
        let columns = basis.column_indices(&self.ncoeffs());
        let g = self.geo_dim();
        let mut out = DMatrix::zeros(basis.npts(), g);
        for (m, cols) in columns.iter().enumerate() {
            for (l, col) in cols.iter().enumerate() {
                let v = basis.values()[(m, l)];
                for c in 0..g {
                    out[(m, c)] += v * self.control_points[(*col, c)];
                }
            }
        }
        out
    }

    /// Set every control point to `map(xi)`, where `xi_k = i_k / (n_k - 1)`
    /// (zero for a direction with a single coefficient). Knots are untouched.
    ///
    /// # Failures
    /// - if `map` does not return `geo_dim` values
    pub fn transform<F>(&mut self, mut map: F) -> anyhow::Result<()>
    where
        F: FnMut(&[T]) -> Vec<T>,
    {
        let ncoeffs = self.ncoeffs();
        let g = self.geo_dim();
        for row in 0..self.ncumcoeffs() {
            let xi: Vec<T> = unravel(row, &ncoeffs)
                .iter()
                .zip(ncoeffs.iter())
                .map(|(i, n)| {
                    if *n > 1 {
                        nalgebra::convert::<f64, T>(*i as f64 / (*n - 1) as f64)
                    } else {
                        T::zero()
                    }
                })
                .collect();
            let value = map(&xi);
            if value.len() != g {
                anyhow::bail!(SplineError::mismatch(format!(
                    "Map returned {} coordinates, expected {}",
                    value.len(),
                    g
                )));
            }
            for (c, v) in value.into_iter().enumerate() {
                self.control_points[(row, c)] = v;
            }
        }
        Ok(())
    }

    fn check_direction(&self, direction: usize) -> anyhow::Result<()> {
        if direction >= self.par_dim() {
            anyhow::bail!(SplineError::invalid(format!(
                "Direction {} does not exist in a {}-dimensional spline",
                direction,
                self.par_dim()
            )));
        }
        Ok(())
    }

    fn directions(&self, direction: Option<usize>) -> anyhow::Result<Vec<usize>> {
        match direction {
            Some(k) => {
                self.check_direction(k)?;
                Ok(vec![k])
            }
            None => Ok((0..self.par_dim()).collect()),
        }
    }

    /// Insert `knots` into the knot vector of `direction` without changing the spline
    /// # Failures
    /// - if `direction` is out of range
    /// - if a knot is outside the open domain or would exceed multiplicity `p + 1`
    pub fn try_insert_knots(&mut self, direction: usize, knots: &[T]) -> anyhow::Result<()> {
        self.check_direction(direction)?;
        if knots.is_empty() {
            return Ok(());
        }

        let ncoeffs = self.ncoeffs();
        let slices = split_direction(&self.control_points, &ncoeffs, direction);
        let (refined, slices) = refine_slices(&self.knots[direction], &slices, knots)?;
        self.control_points = merge_direction(&slices, &ncoeffs, direction, self.geo_dim());
        self.knots[direction] = refined;
        Ok(())
    }

    /// Insert the midpoint of every knot span `times` times, in `direction`
    /// or in all directions when `None`
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::*;
    /// let mut spline = BSpline::<f64>::try_uniform(&[2, 3, 4], &[5, 4, 7], 3, Init::Linear).unwrap();
    /// spline.try_refine(1, None).unwrap();
    /// assert_eq!(spline.ncoeffs(), vec![8, 5, 10]);
    /// ```
    pub fn try_refine(&mut self, times: usize, direction: Option<usize>) -> anyhow::Result<()> {
        let directions = self.directions(direction)?;
        for _ in 0..times {
            for &k in directions.iter() {
                let midpoints = self.knots[k].midpoints();
                self.try_insert_knots(k, &midpoints)?;
            }
        }
        log::debug!(
            "refined {} times along {:?}, coefficients {:?}",
            times,
            directions,
            self.ncoeffs()
        );
        Ok(())
    }

    /// Raise the degree by `amount` in `direction`, or in all directions when `None`,
    /// without changing the spline
    pub fn try_elevate_degree(
        &mut self,
        amount: usize,
        direction: Option<usize>,
    ) -> anyhow::Result<()> {
        let directions = self.directions(direction)?;
        if amount == 0 {
            return Ok(());
        }
        for k in directions.iter().copied() {
            let ncoeffs = self.ncoeffs();
            let slices = split_direction(&self.control_points, &ncoeffs, k);
            let (elevated, slices) = elevate_slices(&self.knots[k], &slices, amount)?;
            self.control_points = merge_direction(&slices, &ncoeffs, k, self.geo_dim());
            self.knots[k] = elevated;
        }
        log::debug!(
            "elevated degree by {} along {:?}, degrees {:?}",
            amount,
            directions,
            self.degrees()
        );
        Ok(())
    }

    /// Tensor-product Greville points (`npts x par_dim`, direction 0 fastest)
    ///
    /// With `interior`, the first and last abscissa of every direction are dropped.
    pub fn greville(&self, interior: bool) -> DMatrix<T> {
        let abscissae: Vec<Vec<T>> = self.knots.iter().map(|k| k.greville(interior)).collect();
        let sizes: Vec<usize> = abscissae.iter().map(|a| a.len()).collect();
        let npts: usize = sizes.iter().product();
        DMatrix::from_fn(npts, self.par_dim(), |m, k| {
            let index = unravel(m, &sizes);
            abscissae[k][index[k]]
        })
    }

    /// Extract the face on `side`, a spline of one dimension less
    /// # Failures
    /// - if `side` does not exist for this parametric dimension
    pub fn face(&self, side: Side) -> anyhow::Result<Self> {
        let direction = side.direction();
        if direction >= self.par_dim() {
            anyhow::bail!(SplineError::invalid(format!(
                "Side {:?} does not exist in a {}-dimensional spline",
                side,
                self.par_dim()
            )));
        }
        Ok(self.extract_face(direction, side.is_upper()))
    }

    /// Control points at index `0` (or `n_k - 1` when `upper`) of `direction`
    /// together with the remaining knot vectors
    pub(crate) fn extract_face(&self, direction: usize, upper: bool) -> Self {
        let ncoeffs = self.ncoeffs();
        let index = if upper { ncoeffs[direction] - 1 } else { 0 };
        let slices = split_direction(&self.control_points, &ncoeffs, direction);
        let rows: usize = ncoeffs
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != direction)
            .map(|(_, n)| *n)
            .product();
        let control_points = DMatrix::from_row_slice(rows, self.geo_dim(), slices[index].as_slice());
        let knots = self
            .knots
            .iter()
            .enumerate()
            .filter(|(k, _)| *k != direction)
            .map(|(_, knot)| knot.clone())
            .collect();
        Self {
            knots,
            control_points,
        }
    }

    /// Cast the spline to another floating point type
    pub fn cast<F: FloatingPoint + simba::scalar::SupersetOf<T>>(&self) -> BSpline<F> {
        BSpline {
            knots: self.knots.iter().map(|k| k.cast::<F>()).collect(),
            control_points: self.control_points.map(|v| nalgebra::convert(v)),
        }
    }
}

fn check_par_dim(par_dim: usize) -> anyhow::Result<()> {
    if par_dim > MAX_PARAMETRIC_DIM {
        anyhow::bail!(SplineError::unsupported(format!(
            "Parametric dimension {} exceeds the supported maximum of {}",
            par_dim, MAX_PARAMETRIC_DIM
        )));
    }
    Ok(())
}

impl<T: FloatingPoint> TensorSpline for BSpline<T> {
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

/// Apply a homogeneous `(geo_dim + 1) x (geo_dim + 1)` matrix to the control points
impl<'a, T: FloatingPoint> Transformable<&'a DMatrix<T>> for BSpline<T> {
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
        let linear = transform.view((0, 0), (g, g));
        let mut transformed = &self.control_points * linear.transpose();
        for i in 0..transformed.nrows() {
            for c in 0..g {
                transformed[(i, c)] += transform[(c, g)];
            }
        }
        self.control_points = transformed;
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl<T> serde::Serialize for BSpline<T>
where
    T: FloatingPoint + serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BSpline", 3)?;
        state.serialize_field("knots", &self.knots)?;
        state.serialize_field("geo_dim", &self.geo_dim())?;
        state.serialize_field("coefs", &self.to_flat())?;
        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for BSpline<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(bound(deserialize = "T: FloatingPoint + serde::Deserialize<'de>"))]
        struct Flat<T> {
            knots: Vec<KnotVector<T>>,
            geo_dim: usize,
            coefs: Vec<T>,
        }

        let flat = Flat::<T>::deserialize(deserializer)?;
        BSpline::try_from_flat(flat.knots, flat.geo_dim, &flat.coefs)
            .map_err(serde::de::Error::custom)
    }
}

use nalgebra::DMatrix;

use crate::boundary::{Boundary, Side};
use crate::misc::FloatingPoint;
use crate::spline::{BSpline, Nurbs, TensorSpline};

/// Where to place collocation points
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollocationPointsOptions {
    /// Drop the first and last Greville abscissa of every direction
    pub interior: bool,
    /// Number of uniform refinements applied to a copy of the spline
    /// before taking its Greville abscissae
    pub refinements: usize,
}

impl CollocationPointsOptions {
    /// Greville points of the refined spline, boundary included
    pub fn greville(refinements: usize) -> Self {
        Self {
            interior: false,
            refinements,
        }
    }

    /// Greville points of the refined spline, boundary excluded
    pub fn greville_interior(refinements: usize) -> Self {
        Self {
            interior: true,
            refinements,
        }
    }
}

/// Collocation points of a domain and of each of its faces
#[derive(Clone, Debug, PartialEq)]
pub struct CollocationPoints<T: FloatingPoint> {
    /// Domain points, `npts x par_dim`
    pub interior: DMatrix<T>,
    /// Face points in side order, each `npts x (par_dim - 1)` in face coordinates
    pub boundary: Vec<(Side, DMatrix<T>)>,
}

impl<T: FloatingPoint> CollocationPoints<T> {
    /// Points of the face on `side`
    pub fn side(&self, side: Side) -> Option<&DMatrix<T>> {
        self.boundary
            .iter()
            .find(|(s, _)| *s == side)
            .map(|(_, points)| points)
    }

    /// Number of domain and face points together
    pub fn len(&self) -> usize {
        self.interior.nrows() + self.boundary.iter().map(|(_, p)| p.nrows()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate collocation points for `spline` and its faces
///
/// The points are the Greville abscissae of a copy of `spline` that has been
/// uniformly refined `options.refinements` times; `spline` itself is unchanged.
///
/// # Example
/// ```
/// use igaspline::prelude::*;
/// let spline = BSpline::<f64>::try_uniform(&[2, 2], &[4, 5], 1, Init::Zeros).unwrap();
/// let points = collocation_points(&spline, &CollocationPointsOptions::default()).unwrap();
/// assert_eq!(points.interior.shape(), (20, 2));
/// assert_eq!(points.side(Side::West).unwrap().shape(), (5, 1));
/// ```
pub fn collocation_points<S: TensorSpline>(
    spline: &S,
    options: &CollocationPointsOptions,
) -> anyhow::Result<CollocationPoints<S::Scalar>> {
    let mut refined = spline.clone();
    if options.refinements > 0 {
        refined.try_refine(options.refinements, None)?;
    }

    let boundary = Boundary::try_from_spline(&refined)?
        .iter()
        .map(|(side, face)| (side, face.greville(options.interior)))
        .collect();

    Ok(CollocationPoints {
        interior: refined.greville(options.interior),
        boundary,
    })
}

impl<T: FloatingPoint> BSpline<T> {
    /// See [`collocation_points`]
    pub fn collocation_points(
        &self,
        options: &CollocationPointsOptions,
    ) -> anyhow::Result<CollocationPoints<T>> {
        collocation_points(self, options)
    }
}

impl<T: FloatingPoint> Nurbs<T> {
    /// See [`collocation_points`]
    pub fn collocation_points(
        &self,
        options: &CollocationPointsOptions,
    ) -> anyhow::Result<CollocationPoints<T>> {
        collocation_points(self, options)
    }
}

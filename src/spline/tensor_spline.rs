use nalgebra::DMatrix;

use crate::boundary::Side;
use crate::misc::FloatingPoint;

/// Operations shared by every tensor-product spline kind,
/// used by containers that hold splines of either kind.
pub trait TensorSpline: Clone + Sized {
    type Scalar: FloatingPoint;

    /// Number of parametric directions
    fn par_dim(&self) -> usize;

    /// Number of coordinates of an evaluated point
    fn geo_dim(&self) -> usize;

    /// Number of coefficients per direction
    fn ncoeffs(&self) -> Vec<usize>;

    /// Total number of coefficients
    fn ncumcoeffs(&self) -> usize {
        self.ncoeffs().iter().product()
    }

    /// Tensor-product Greville points, `npts x par_dim`
    fn greville(&self, interior: bool) -> DMatrix<Self::Scalar>;

    /// Evaluate at `points` (`npts x par_dim`)
    fn eval(&self, points: &DMatrix<Self::Scalar>) -> anyhow::Result<DMatrix<Self::Scalar>>;

    /// Apply `times` uniform midpoint refinements to `direction`,
    /// or to every direction when `None`
    fn try_refine(&mut self, times: usize, direction: Option<usize>) -> anyhow::Result<()>;

    /// Extract the face on `side`
    fn face(&self, side: Side) -> anyhow::Result<Self>;
}

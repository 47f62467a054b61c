pub mod bspline;
pub(crate) mod fiber;
pub mod init;
pub mod nurbs;
pub mod tensor_spline;

pub use bspline::*;
pub use init::*;
pub use nurbs::*;
pub use tensor_spline::*;

/// Largest supported number of parametric directions
pub const MAX_PARAMETRIC_DIM: usize = 4;

pub mod assembler;
pub mod collocation_points;
pub mod csr_matrix;
pub mod interpolation;

pub use assembler::*;
pub use collocation_points::*;
pub use csr_matrix::*;
pub use interpolation::*;

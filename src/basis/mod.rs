pub mod basis_evaluation;
pub mod tensor_basis;

pub use basis_evaluation::*;
pub use tensor_basis::*;

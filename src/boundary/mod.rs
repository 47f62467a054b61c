pub mod boundary;
pub mod side;

pub use boundary::*;
pub use side::*;

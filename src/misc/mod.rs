pub mod binomial;
pub mod floating_point;
pub mod multi_index;
pub mod transformable;

pub use binomial::*;
pub use floating_point::*;
pub use multi_index::*;
pub use transformable::*;

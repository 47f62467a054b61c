#![allow(clippy::needless_range_loop)]

mod basis;
mod boundary;
mod collocation;
mod error;
mod knot;
mod misc;
mod spline;

pub mod prelude {
    pub use crate::basis::*;
    pub use crate::boundary::*;
    pub use crate::collocation::*;
    pub use crate::error::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::spline::*;
}

pub mod knot_vector;
pub use knot_vector::*;

/// A distinct knot value together with how often it is repeated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnotMultiplicity<T> {
    knot: T,
    multiplicity: usize,
}

impl<T: Copy> KnotMultiplicity<T> {
    pub fn new(knot: T, multiplicity: usize) -> Self {
        Self { knot, multiplicity }
    }

    pub fn knot(&self) -> T {
        self.knot
    }

    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    pub(crate) fn increment_multiplicity(&mut self) {
        self.multiplicity += 1;
    }
}

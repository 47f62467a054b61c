use std::fmt;

use crate::error::SplineError;

/// Faces of a tensor-product domain
///
/// Side `s` fixes parametric direction `(s - 1) / 2` at its lower end for odd
/// values and at its upper end for even ones. A `d`-dimensional domain has
/// the first `2 * d` sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Side {
    West = 1,
    East = 2,
    South = 3,
    North = 4,
    Front = 5,
    Back = 6,
    Stime = 7,
    Etime = 8,
}

impl Side {
    const ALL: [Side; 8] = [
        Side::West,
        Side::East,
        Side::South,
        Side::North,
        Side::Front,
        Side::Back,
        Side::Stime,
        Side::Etime,
    ];

    /// The parametric direction held fixed on this side
    pub fn direction(&self) -> usize {
        (*self as usize - 1) / 2
    }

    /// Whether the side lies at the upper end of its direction
    pub fn is_upper(&self) -> bool {
        (*self as u8) % 2 == 0
    }

    /// The side at the opposite end of the same direction
    pub fn opposite(&self) -> Side {
        Self::ALL[2 * self.direction() + usize::from(!self.is_upper())]
    }

    /// The side at the lower or upper end of `direction`, if the direction
    /// has sides
    pub fn from_direction(direction: usize, upper: bool) -> Option<Side> {
        direction
            .checked_mul(2)
            .and_then(|i| Self::ALL.get(i + usize::from(upper)))
            .copied()
    }

    /// Sides of a `par_dim`-dimensional domain, in order
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::Side;
    /// assert_eq!(Side::all(2), vec![Side::West, Side::East, Side::South, Side::North]);
    /// assert!(Side::all(0).is_empty());
    /// ```
    pub fn all(par_dim: usize) -> Vec<Side> {
        Self::ALL.iter().take(2 * par_dim).copied().collect()
    }
}

impl TryFrom<u8> for Side {
    type Error = SplineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1..=8 => Ok(Self::ALL[value as usize - 1]),
            _ => Err(SplineError::invalid(format!(
                "{} is not a side, expected a value in 1..=8",
                value
            ))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::West => "west",
            Side::East => "east",
            Side::South => "south",
            Side::North => "north",
            Side::Front => "front",
            Side::Back => "back",
            Side::Stime => "stime",
            Side::Etime => "etime",
        };
        write!(f, "{}", name)
    }
}

use nalgebra::{convert, DMatrix};
use rand::Rng;

use crate::knot::KnotVector;
use crate::misc::{unravel, FloatingPoint};

/// Initial values of the control points of a freshly built spline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Init {
    /// All coefficients zero
    #[default]
    Zeros,
    /// All coefficients one
    Ones,
    /// Coordinate `c` grows linearly from 0 to 1 along direction `c`;
    /// coordinates beyond the parametric dimension are one
    Linear,
    /// Uniformly distributed in `[0, 1)`
    Random,
    /// Coordinate `c` is the Greville abscissa of direction `c`, which
    /// reproduces the identity map; coordinates beyond the parametric
    /// dimension are one
    Greville,
}

impl Init {
    /// Build the `prod(n_k) x geo_dim` control point matrix for `knots`
    pub(crate) fn control_points<T: FloatingPoint>(
        &self,
        knots: &[KnotVector<T>],
        geo_dim: usize,
    ) -> DMatrix<T> {
        let ncoeffs: Vec<usize> = knots.iter().map(|k| k.ncoeffs()).collect();
        let rows: usize = ncoeffs.iter().product();

        match self {
            Init::Zeros => DMatrix::zeros(rows, geo_dim),
            Init::Ones => DMatrix::from_element(rows, geo_dim, T::one()),
            Init::Random => {
                let mut rng = rand::rng();
                DMatrix::from_fn(rows, geo_dim, |_, _| convert(rng.random::<f64>()))
            }
            Init::Linear => {
                let abscissae: Vec<Vec<T>> = ncoeffs.iter().map(|n| linspace(*n)).collect();
                along_directions(&abscissae, &ncoeffs, geo_dim)
            }
            Init::Greville => {
                let abscissae: Vec<Vec<T>> = knots.iter().map(|k| k.greville(false)).collect();
                along_directions(&abscissae, &ncoeffs, geo_dim)
            }
        }
    }
}

/// `n` equidistant values on `[0, 1]`, a single zero when `n == 1`
pub(crate) fn linspace<T: FloatingPoint>(n: usize) -> Vec<T> {
    if n <= 1 {
        return vec![T::zero(); n];
    }
    let last: T = convert((n - 1) as f64);
    (0..n).map(|i| convert::<f64, T>(i as f64) / last).collect()
}

fn along_directions<T: FloatingPoint>(
    abscissae: &[Vec<T>],
    ncoeffs: &[usize],
    geo_dim: usize,
) -> DMatrix<T> {
    let rows: usize = ncoeffs.iter().product();
    DMatrix::from_fn(rows, geo_dim, |row, c| {
        if c < ncoeffs.len() {
            let index = unravel(row, ncoeffs);
            abscissae[c][index[c]]
        } else {
            T::one()
        }
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn linear_init() {
        let knots = vec![
            KnotVector::<f64>::try_uniform(1, 3).unwrap(),
            KnotVector::<f64>::try_uniform(2, 3).unwrap(),
        ];
        let cp = Init::Linear.control_points(&knots, 3);
        assert_eq!(cp.shape(), (9, 3));
        // row 5 is (i0, i1) = (2, 1)
        assert_relative_eq!(cp[(5, 0)], 1.0);
        assert_relative_eq!(cp[(5, 1)], 0.5);
        assert_relative_eq!(cp[(5, 2)], 1.0);
    }

    #[test]
    fn random_init_is_in_unit_interval() {
        let knots = vec![KnotVector::<f64>::try_uniform(2, 6).unwrap()];
        let cp = Init::Random.control_points(&knots, 2);
        assert!(cp.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn greville_init_uses_abscissae() {
        let knots = vec![KnotVector::<f64>::try_uniform(2, 4).unwrap()];
        let cp = Init::Greville.control_points(&knots, 1);
        assert_eq!(cp.as_slice(), &[0., 0.25, 0.75, 1.]);
    }
}

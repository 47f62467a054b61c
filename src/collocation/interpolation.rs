use nalgebra::DMatrix;

use crate::error::SplineError;
use crate::misc::FloatingPoint;
use crate::spline::BSpline;

/// Fit the control points of `space` so that the spline interpolates `map`
/// at its Greville points
///
/// `map` receives a parametric point and returns `geo_dim` coordinates. The
/// square collocation system is solved with a dense LU decomposition; the
/// knot vectors of `space` are kept.
///
/// # Failures
/// - if `map` does not return `geo_dim` values
/// - if the collocation matrix is singular
///
/// # Example
/// ```
/// use igaspline::prelude::*;
/// use nalgebra::DMatrix;
/// let space = BSpline::<f64>::try_uniform(&[3], &[8], 1, Init::Zeros).unwrap();
/// let fitted = interpolate(&space, |xi| vec![xi[0] * xi[0]]).unwrap();
/// let value = fitted.eval(&DMatrix::from_element(1, 1, 0.3)).unwrap();
/// assert!((value[(0, 0)] - 0.09).abs() < 1e-12);
/// ```
pub fn interpolate<T, F>(space: &BSpline<T>, mut map: F) -> anyhow::Result<BSpline<T>>
where
    T: FloatingPoint,
    F: FnMut(&[T]) -> Vec<T>,
{
    let points = space.greville(false);
    let g = space.geo_dim();
    let npts = points.nrows();

    let mut rhs = DMatrix::<T>::zeros(npts, g);
    for m in 0..npts {
        let xi: Vec<T> = points.row(m).iter().copied().collect();
        let value = map(&xi);
        if value.len() != g {
            anyhow::bail!(SplineError::mismatch(format!(
                "Map returned {} coordinates, expected {}",
                value.len(),
                g
            )));
        }
        for (c, v) in value.into_iter().enumerate() {
            rhs[(m, c)] = v;
        }
    }

    let matrix = space.collocation_matrix(&points)?.to_dense();
    log::debug!("solving {}x{} interpolation system", npts, npts);

    // solve Ax = b with LU decomposition
    let lu = matrix.lu();
    let solution = lu
        .solve(&rhs)
        .ok_or_else(|| SplineError::unsupported("Collocation matrix is singular"))?;

    let mut fitted = space.clone();
    fitted.set_control_points(solution)?;
    Ok(fitted)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use crate::spline::{BSpline, Init};

    use super::interpolate;

    #[test]
    fn reproduces_polynomials_of_the_spline_degree() {
        let space = BSpline::<f64>::try_uniform(&[2, 2], &[5, 4], 2, Init::Zeros).unwrap();
        let fitted = interpolate(&space, |xi| {
            vec![xi[0] * xi[0] - xi[1], 2.0 * xi[0] * xi[1] + 1.0]
        })
        .unwrap();
        let points = DMatrix::from_fn(30, 2, |i, k| ((i * (k + 1) * 7) % 30) as f64 / 29.);
        let values = fitted.eval(&points).unwrap();
        for m in 0..30 {
            let (u, v) = (points[(m, 0)], points[(m, 1)]);
            assert_relative_eq!(values[(m, 0)], u * u - v, epsilon = 1e-10);
            assert_relative_eq!(values[(m, 1)], 2.0 * u * v + 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn identity_matches_greville_initialization() {
        let space = BSpline::<f64>::try_uniform(&[3], &[7], 1, Init::Zeros).unwrap();
        let fitted = interpolate(&space, |xi| vec![xi[0]]).unwrap();
        let identity = BSpline::<f64>::try_uniform(&[3], &[7], 1, Init::Greville).unwrap();
        assert_relative_eq!(
            fitted.control_points(),
            identity.control_points(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn wrong_output_length() {
        let space = BSpline::<f64>::try_uniform(&[1], &[3], 2, Init::Zeros).unwrap();
        assert!(interpolate(&space, |xi| vec![xi[0]]).is_err());
    }
}

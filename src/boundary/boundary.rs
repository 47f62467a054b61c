use nalgebra::DMatrix;

use crate::misc::FloatingPoint;
use crate::spline::{BSpline, Nurbs, TensorSpline};

use super::Side;

/// The faces of a tensor-product spline, one per side in side order
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary<S> {
    faces: Vec<(Side, S)>,
}

impl<S: TensorSpline> Boundary<S> {
    /// Collect the faces of every side of `spline`
    pub fn try_from_spline(spline: &S) -> anyhow::Result<Self> {
        let faces = Side::all(spline.par_dim())
            .into_iter()
            .map(|side| spline.face(side).map(|face| (side, face)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { faces })
    }

    /// The face on `side`, if the domain has that side
    pub fn side(&self, side: Side) -> Option<&S> {
        self.faces.iter().find(|(s, _)| *s == side).map(|(_, f)| f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, &S)> {
        self.faces.iter().map(|(s, f)| (*s, f))
    }

    /// Number of faces
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Total number of coefficients over all faces
    pub fn ncumcoeffs(&self) -> usize {
        self.faces.iter().map(|(_, f)| f.ncumcoeffs()).sum()
    }

    /// Greville points of every face, in side order
    pub fn greville(&self, interior: bool) -> Vec<DMatrix<S::Scalar>> {
        self.faces.iter().map(|(_, f)| f.greville(interior)).collect()
    }

    /// Refine every face `times` times in its own `direction`, or in all of them
    pub fn try_refine(&mut self, times: usize, direction: Option<usize>) -> anyhow::Result<()> {
        for (_, face) in self.faces.iter_mut() {
            face.try_refine(times, direction)?;
        }
        Ok(())
    }

    pub fn into_faces(self) -> Vec<(Side, S)> {
        self.faces
    }
}

impl<T: FloatingPoint> BSpline<T> {
    /// Decompose the spline into its `2 * par_dim` boundary faces
    ///
    /// Each face is the hyperslice of control points at index `0` or `n_k - 1`
    /// of its direction, carrying the remaining knot vectors unchanged.
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::*;
    /// let spline = BSpline::<f64>::try_uniform(&[1, 2], &[3, 4], 2, Init::Greville).unwrap();
    /// let boundary = spline.boundary();
    /// assert_eq!(boundary.len(), 4);
    /// assert_eq!(boundary.side(Side::West).unwrap().ncoeffs(), vec![4]);
    /// assert_eq!(boundary.side(Side::North).unwrap().ncoeffs(), vec![3]);
    /// ```
    pub fn boundary(&self) -> Boundary<Self> {
        let faces = Side::all(self.par_dim())
            .into_iter()
            .map(|side| (side, self.extract_face(side.direction(), side.is_upper())))
            .collect();
        Boundary { faces }
    }
}

impl<T: FloatingPoint> Nurbs<T> {
    /// Decompose the NURBS into its `2 * par_dim` boundary faces
    pub fn boundary(&self) -> Boundary<Self> {
        let faces = Side::all(self.par_dim())
            .into_iter()
            .map(|side| (side, self.extract_face(side.direction(), side.is_upper())))
            .collect();
        Boundary { faces }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    use crate::spline::{BSpline, Init, Nurbs};

    use super::*;

    #[test]
    fn west_face_is_first_hyperslice() {
        let spline = BSpline::<f64>::try_uniform(&[2, 1, 2], &[4, 3, 5], 3, Init::Random).unwrap();
        let west = spline.face(Side::West).unwrap();
        assert_eq!(west.ncoeffs(), vec![3, 5]);
        for i2 in 0..5 {
            for i1 in 0..3 {
                let face_row = i1 + 3 * i2;
                let row = 4 * i1 + 12 * i2;
                assert_eq!(
                    west.control_points().row(face_row),
                    spline.control_points().row(row)
                );
            }
        }

        let back = spline.face(Side::Back).unwrap();
        assert_eq!(back.ncoeffs(), vec![4, 3]);
        for r in 0..12 {
            assert_eq!(
                back.control_points().row(r),
                spline.control_points().row(r + 12 * 4)
            );
        }
    }

    #[test]
    fn faces_trace_the_spline() {
        let spline = BSpline::<f64>::try_uniform(&[2, 3], &[4, 5], 2, Init::Random).unwrap();
        let boundary = spline.boundary();
        let ts: Vec<f64> = (0..=10).map(|i| i as f64 / 10.).collect();
        for (side, face) in boundary.iter() {
            let t = DMatrix::from_column_slice(ts.len(), 1, &ts);
            let on_face = face.eval(&t).unwrap();
            let fixed = if side.is_upper() { 1.0 } else { 0.0 };
            let points = DMatrix::from_fn(ts.len(), 2, |m, k| {
                if k == side.direction() {
                    fixed
                } else {
                    ts[m]
                }
            });
            let on_spline = spline.eval(&points).unwrap();
            assert_relative_eq!(on_face, on_spline, epsilon = 1e-12);
        }
    }

    #[test]
    fn curve_boundary_is_zero_dimensional() {
        let spline = BSpline::<f64>::try_uniform(&[2], &[6], 1, Init::Linear).unwrap();
        let boundary = spline.boundary();
        assert_eq!(boundary.len(), 2);
        let east = boundary.side(Side::East).unwrap();
        assert_eq!(east.par_dim(), 0);
        assert_eq!(east.ncumcoeffs(), 1);
        let value = east.eval(&DMatrix::zeros(1, 0)).unwrap();
        assert_relative_eq!(value[(0, 0)], 1.0);
        assert!(boundary.side(Side::South).is_none());
        assert_eq!(boundary.greville(false)[0].shape(), (1, 0));
    }

    #[test]
    fn refine_every_face() {
        let spline = BSpline::<f64>::try_uniform(&[1, 1], &[3, 4], 2, Init::Greville).unwrap();
        let mut boundary = spline.boundary();
        assert_eq!(boundary.ncumcoeffs(), 4 + 4 + 3 + 3);
        boundary.try_refine(1, None).unwrap();
        assert_eq!(boundary.side(Side::West).unwrap().ncoeffs(), vec![7]);
        assert_eq!(boundary.side(Side::South).unwrap().ncoeffs(), vec![5]);
        assert_eq!(boundary.ncumcoeffs(), 7 + 7 + 5 + 5);
    }

    #[test]
    fn generic_construction_matches() {
        let spline = BSpline::<f64>::try_uniform(&[2, 2], &[3, 3], 3, Init::Random).unwrap();
        let generic = Boundary::try_from_spline(&spline).unwrap();
        assert_eq!(generic, spline.boundary());

        let nurbs = Nurbs::from_bspline(&spline);
        let faces = nurbs.boundary();
        assert_eq!(faces.len(), 4);
        assert_eq!(faces.side(Side::East).unwrap().geo_dim(), 3);
    }
}

//! Curve algorithms lifted to tensor-product splines.
//!
//! All control points sharing the index `i` in one parametric direction are
//! packed into a single vector (a "slice"), so the univariate knot insertion
//! and degree elevation routines act on every fiber of that direction at once.

use nalgebra::{DMatrix, DVector};

use crate::error::SplineError;
use crate::knot::KnotVector;
use crate::misc::{Binomial, FloatingPoint};

/// Sizes of the directions before and after `direction`
fn layout(ncoeffs: &[usize], direction: usize) -> (usize, usize) {
    let inner: usize = ncoeffs[..direction].iter().product();
    let outer: usize = ncoeffs[(direction + 1)..].iter().product();
    (inner, outer)
}

/// Pack the control points into one vector per index of `direction`
///
/// Entry `c + g * (i_inner + inner * i_outer)` of slice `i` is coordinate `c`
/// of the control point with flat index `i_inner + inner * (i + n * i_outer)`.
pub(crate) fn split_direction<T: FloatingPoint>(
    control_points: &DMatrix<T>,
    ncoeffs: &[usize],
    direction: usize,
) -> Vec<DVector<T>> {
    let (inner, outer) = layout(ncoeffs, direction);
    let n = ncoeffs[direction];
    let g = control_points.ncols();
    (0..n)
        .map(|i| {
            DVector::from_fn(inner * outer * g, |e, _| {
                let c = e % g;
                let rest = e / g;
                let (ii, io) = (rest % inner, rest / inner);
                control_points[(ii + inner * (i + n * io), c)]
            })
        })
        .collect()
}

/// Inverse of [`split_direction`]; `ncoeffs` holds the sizes of the other
/// directions while the size of `direction` is taken from `slices`
pub(crate) fn merge_direction<T: FloatingPoint>(
    slices: &[DVector<T>],
    ncoeffs: &[usize],
    direction: usize,
    geo_dim: usize,
) -> DMatrix<T> {
    let (inner, outer) = layout(ncoeffs, direction);
    let n = slices.len();
    DMatrix::from_fn(inner * n * outer, geo_dim, |row, c| {
        let ii = row % inner;
        let rest = row / inner;
        let (i, io) = (rest % n, rest / n);
        slices[i][c + geo_dim * (ii + inner * io)]
    })
}

/// `a * alpha + b * (1 - alpha)`
fn blend<T: FloatingPoint>(a: &DVector<T>, b: &DVector<T>, alpha: T) -> DVector<T> {
    a * alpha + b * (T::one() - alpha)
}

/// Insert the knots `insert` into `knots` (NURBS Book A5.4)
///
/// # Failures
/// - if a knot lies outside the open domain or would exceed multiplicity `p + 1`
pub(crate) fn refine_slices<T: FloatingPoint>(
    knots: &KnotVector<T>,
    slices: &[DVector<T>],
    insert: &[T],
) -> anyhow::Result<(KnotVector<T>, Vec<DVector<T>>)> {
    let mut insert = insert.to_vec();
    insert.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let refined = knots.try_inserted(&insert)?;
    if insert.is_empty() {
        return Ok((refined, slices.to_vec()));
    }

    let degree = knots.degree();
    let n = slices.len() - 1;
    let m = n + degree + 1;
    let r = insert.len() - 1;
    let a = knots.find_span(insert[0]);
    let b = knots.find_span(insert[r]) + 1;

    let zero = DVector::zeros(slices[0].len());
    let mut slices_post = vec![zero; n + r + 2];
    let mut knots_post = vec![T::zero(); m + r + 2];

    slices_post[..=(a - degree)].clone_from_slice(&slices[..=(a - degree)]);
    for i in (b - 1)..=n {
        slices_post[i + r + 1] = slices[i].clone();
    }
    for i in 0..=a {
        knots_post[i] = knots[i];
    }
    for i in (b + degree)..=m {
        knots_post[i + r + 1] = knots[i];
    }

    let mut i = b + degree - 1;
    let mut k = b + degree + r;
    for j in (0..=r).rev() {
        while insert[j] <= knots[i] && i > a {
            slices_post[k - degree - 1] = slices[i - degree - 1].clone();
            knots_post[k] = knots[i];
            k -= 1;
            i -= 1;
        }
        slices_post[k - degree - 1] = slices_post[k - degree].clone();
        for l in 1..=degree {
            let ind = k - degree + l;
            let alpha = knots_post[k + l] - insert[j];
            if alpha == T::zero() {
                slices_post[ind - 1] = slices_post[ind].clone();
            } else {
                let denom = knots_post[k + l] - knots[i - degree + l];
                let alpha = if denom != T::zero() {
                    alpha / denom
                } else {
                    T::zero()
                };
                slices_post[ind - 1] = blend(&slices_post[ind - 1], &slices_post[ind], alpha);
            }
        }
        knots_post[k] = insert[j];
        k -= 1;
    }

    debug_assert_eq!(knots_post, refined.to_vec());
    Ok((refined, slices_post))
}

/// Raise the degree of `knots` by `t`
///
/// The curve is cut at every interior knot of multiplicity `p + 1`, each
/// continuous piece is elevated on its own and the pieces are joined again
/// with their breakpoints at multiplicity `p + t + 1`.
pub(crate) fn elevate_slices<T: FloatingPoint>(
    knots: &KnotVector<T>,
    slices: &[DVector<T>],
    t: usize,
) -> anyhow::Result<(KnotVector<T>, Vec<DVector<T>>)> {
    if t == 0 {
        return Ok((knots.clone(), slices.to_vec()));
    }

    let p = knots.degree();
    let ph = p + t;
    let multiplicity = knots.multiplicity();
    let last = multiplicity.len() - 1;
    let mut breaks = vec![];
    let mut index = 0;
    for (i, m) in multiplicity.iter().enumerate() {
        if i > 0 && i < last && m.multiplicity() > p {
            breaks.push(index);
        }
        index += m.multiplicity();
    }
    breaks.push(slices.len());

    let mut uh: Vec<T> = vec![];
    let mut qw = vec![];
    let mut start = 0;
    for end in breaks {
        let piece_knots = if end == slices.len() {
            knots.as_slice()[start..].to_vec()
        } else {
            knots.as_slice()[start..(end + p + 1)].to_vec()
        };
        let (elevated, elevated_slices) = if p == 0 {
            // a constant on a single span
            let (ua, ub) = (piece_knots[0], piece_knots[1]);
            let mut piece = vec![ua; ph + 1];
            piece.extend(vec![ub; ph + 1]);
            (piece, vec![slices[start].clone(); ph + 1])
        } else {
            let piece = KnotVector::try_new(p, piece_knots)?;
            let (elevated, elevated_slices) =
                elevate_continuous(&piece, &slices[start..end], t)?;
            (elevated.to_vec(), elevated_slices)
        };
        let skip = if uh.is_empty() { 0 } else { ph + 1 };
        uh.extend_from_slice(&elevated[skip..]);
        qw.extend(elevated_slices);
        start = end;
    }

    let elevated = KnotVector::try_new(ph, uh)?;
    Ok((elevated, qw))
}

/// Raise the degree of a curve without interior knots of multiplicity
/// `p + 1` (NURBS Book A5.9)
fn elevate_continuous<T: FloatingPoint>(
    knots: &KnotVector<T>,
    slices: &[DVector<T>],
    t: usize,
) -> anyhow::Result<(KnotVector<T>, Vec<DVector<T>>)> {
    let p = knots.degree();
    let ph = p + t;
    let ph2 = ph / 2;
    let n = slices.len() - 1;
    let m = n + p + 1;
    let spans = knots.multiplicity().len() - 1;
    let ncoeffs_post = slices.len() + t * spans;
    let zero = DVector::<T>::zeros(slices[0].len());

    // Bezier degree elevation coefficients
    let mut binom = Binomial::<T>::new();
    let mut bezalfs = vec![vec![T::zero(); p + 1]; ph + 1];
    bezalfs[0][0] = T::one();
    bezalfs[ph][p] = T::one();
    for i in 1..=ph2 {
        let inv = T::one() / binom.get(ph, i);
        for j in i.saturating_sub(t)..=p.min(i) {
            bezalfs[i][j] = inv * binom.get(p, j) * binom.get(t, i - j);
        }
    }
    for i in (ph2 + 1)..ph {
        for j in i.saturating_sub(t)..=p.min(i) {
            bezalfs[i][j] = bezalfs[ph - i][p - j];
        }
    }

    let mut qw = vec![zero.clone(); ncoeffs_post];
    let mut uh = vec![T::zero(); ncoeffs_post + ph + 1];
    let mut bpts = slices[..=p].to_vec();
    let mut next_bpts = vec![zero.clone(); p.max(1)];
    let mut ebpts = vec![zero.clone(); ph + 1];
    let mut alfs = vec![T::zero(); p.max(1)];

    let mut kind = ph + 1;
    let mut r: isize = -1;
    let mut a = p;
    let mut b = p + 1;
    let mut cind = 1;
    let mut ua = knots[0];
    qw[0] = slices[0].clone();
    uh[..=ph].fill(ua);

    while b < m {
        let i = b;
        while b < m && knots[b] == knots[b + 1] {
            b += 1;
        }
        let mul = b - i + 1;
        let ub = knots[b];
        let oldr = r;
        r = p as isize - mul as isize;
        let lbz = if oldr > 0 { ((oldr + 2) / 2) as usize } else { 1 };
        let rbz = if r > 0 { ph - ((r + 1) / 2) as usize } else { ph };

        // insert ub r times to isolate the Bezier segment
        if r > 0 {
            let numer = ub - ua;
            for k in ((mul + 1)..=p).rev() {
                alfs[k - mul - 1] = numer / (knots[a + k] - ua);
            }
            for j in 1..=(r as usize) {
                let save = r as usize - j;
                let s = mul + j;
                for k in (s..=p).rev() {
                    bpts[k] = blend(&bpts[k], &bpts[k - 1], alfs[k - s]);
                }
                next_bpts[save] = bpts[p].clone();
            }
        }

        for i in lbz..=ph {
            let mut e = zero.clone();
            for j in i.saturating_sub(t)..=p.min(i) {
                e += &bpts[j] * bezalfs[i][j];
            }
            ebpts[i] = e;
        }

        // remove ua oldr times
        if oldr > 1 {
            let mut first = kind as isize - 2;
            let mut last = kind as isize;
            let den = ub - ua;
            let bet = (ub - uh[kind - 1]) / den;
            for tr in 1..oldr {
                let mut i = first;
                let mut j = last;
                let mut kj = j - kind as isize + 1;
                while j - i > tr {
                    if i < cind as isize {
                        let iu = i as usize;
                        let alf = (ub - uh[iu]) / (ua - uh[iu]);
                        qw[iu] = blend(&qw[iu], &qw[iu - 1], alf);
                    }
                    if j >= lbz as isize {
                        let ku = kj as usize;
                        let weight = if j - tr <= kind as isize - ph as isize + oldr {
                            (ub - uh[(j - tr) as usize]) / den
                        } else {
                            bet
                        };
                        ebpts[ku] = blend(&ebpts[ku], &ebpts[ku + 1], weight);
                    }
                    i += 1;
                    j -= 1;
                    kj -= 1;
                }
                first -= 1;
                last += 1;
            }
        }

        if a != p {
            for _ in 0..(ph as isize - oldr) {
                uh[kind] = ua;
                kind += 1;
            }
        }

        for j in lbz..=rbz {
            qw[cind] = ebpts[j].clone();
            cind += 1;
        }

        if b < m {
            let ru = r.max(0) as usize;
            bpts[..ru].clone_from_slice(&next_bpts[..ru]);
            for j in ru..=p {
                bpts[j] = slices[b - p + j].clone();
            }
            a = b;
            b += 1;
            ua = ub;
        } else {
            for i in 0..=ph {
                uh[kind + i] = ub;
            }
        }
    }

    if cind != ncoeffs_post {
        anyhow::bail!(SplineError::unsupported(format!(
            "Degree elevation produced {} coefficients, expected {}",
            cind, ncoeffs_post
        )));
    }

    let elevated = KnotVector::try_new(ph, uh)?;
    Ok((elevated, qw))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};

    use super::*;

    fn eval_curve(knots: &KnotVector<f64>, slices: &[DVector<f64>], u: f64) -> DVector<f64> {
        let eval = knots.evaluate_basis(&[u], 0);
        let span = eval.spans()[0];
        let p = knots.degree();
        (0..=p).fold(DVector::zeros(slices[0].len()), |acc, j| {
            acc + &slices[span - p + j] * eval.values()[(0, j)]
        })
    }

    fn curve() -> (KnotVector<f64>, Vec<DVector<f64>>) {
        let knots =
            KnotVector::try_new(3, vec![0., 0., 0., 0., 0.3, 0.5, 0.5, 0.8, 1., 1., 1., 1.]).unwrap();
        let slices = (0..knots.ncoeffs())
            .map(|i| {
                let x = i as f64;
                DVector::from_vec(vec![x, (x * 0.7).sin(), x * x * 0.1])
            })
            .collect();
        (knots, slices)
    }

    #[test]
    fn split_and_merge_are_inverse() {
        let ncoeffs = [3, 4, 2];
        let cp = DMatrix::from_fn(24, 2, |i, j| (i * 2 + j) as f64);
        for direction in 0..3 {
            let slices = split_direction(&cp, &ncoeffs, direction);
            assert_eq!(slices.len(), ncoeffs[direction]);
            assert_eq!(merge_direction(&slices, &ncoeffs, direction, 2), cp);
        }
    }

    #[test]
    fn knot_insertion_preserves_curve() {
        let (knots, slices) = curve();
        let (refined, refined_slices) = refine_slices(&knots, &slices, &[0.1, 0.5, 0.65, 0.65]).unwrap();
        assert_eq!(refined.ncoeffs(), knots.ncoeffs() + 4);
        assert_eq!(refined_slices.len(), refined.ncoeffs());
        for i in 0..=40 {
            let u = i as f64 / 40.;
            let before = eval_curve(&knots, &slices, u);
            let after = eval_curve(&refined, &refined_slices, u);
            assert_relative_eq!(before, after, epsilon = 1e-10);
        }
    }

    #[test]
    fn degree_elevation_preserves_curve() {
        let (knots, slices) = curve();
        for t in 1..=3 {
            let (elevated, elevated_slices) = elevate_slices(&knots, &slices, t).unwrap();
            assert_eq!(elevated.degree(), 3 + t);
            // four distinct spans
            assert_eq!(elevated.ncoeffs(), knots.ncoeffs() + 4 * t);
            for i in 0..=40 {
                let u = i as f64 / 40.;
                let before = eval_curve(&knots, &slices, u);
                let after = eval_curve(&elevated, &elevated_slices, u);
                assert_relative_eq!(before, after, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn linear_elevation() {
        let knots = KnotVector::<f64>::try_uniform(1, 3).unwrap();
        let slices: Vec<_> = [0., 1., 0.]
            .iter()
            .map(|v| DVector::from_vec(vec![*v]))
            .collect();
        let (elevated, elevated_slices) = elevate_slices(&knots, &slices, 1).unwrap();
        assert_eq!(elevated.to_vec(), vec![0., 0., 0., 0.5, 0.5, 1., 1., 1.]);
        let values: Vec<f64> = elevated_slices.iter().map(|s| s[0]).collect();
        assert_eq!(values.len(), 5);
        assert_relative_eq!(values[1], 0.5);
        assert_relative_eq!(values[2], 1.0);
        assert_relative_eq!(values[3], 0.5);
    }

    #[test]
    fn degree_zero_elevation() {
        let knots = KnotVector::<f64>::try_new(0, vec![0., 0.25, 0.6, 1.]).unwrap();
        let slices: Vec<_> = [2., -1., 3.]
            .iter()
            .map(|v| DVector::from_vec(vec![*v, 1. - v]))
            .collect();
        for t in 1..=2 {
            let (elevated, elevated_slices) = elevate_slices(&knots, &slices, t).unwrap();
            assert_eq!(elevated.degree(), t);
            assert_eq!(elevated.ncoeffs(), 3 * (t + 1));
            assert_eq!(elevated_slices.len(), elevated.ncoeffs());
            for i in 0..=40 {
                let u = i as f64 / 40.;
                let before = eval_curve(&knots, &slices, u);
                let after = eval_curve(&elevated, &elevated_slices, u);
                assert_relative_eq!(before, after, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn elevation_across_discontinuity() {
        let knots =
            KnotVector::try_new(2, vec![0., 0., 0., 0.3, 0.5, 0.5, 0.5, 1., 1., 1.]).unwrap();
        let slices: Vec<_> = (0..knots.ncoeffs())
            .map(|i| {
                let x = i as f64;
                DVector::from_vec(vec![x, (x * 1.3).cos()])
            })
            .collect();
        let (elevated, elevated_slices) = elevate_slices(&knots, &slices, 1).unwrap();
        assert_eq!(elevated.degree(), 3);
        // three distinct spans
        assert_eq!(elevated.ncoeffs(), knots.ncoeffs() + 3);
        assert_eq!(
            elevated.to_vec(),
            vec![0., 0., 0., 0., 0.3, 0.3, 0.5, 0.5, 0.5, 0.5, 1., 1., 1., 1.]
        );
        for i in 0..=40 {
            let u = i as f64 / 40.;
            let before = eval_curve(&knots, &slices, u);
            let after = eval_curve(&elevated, &elevated_slices, u);
            assert_relative_eq!(before, after, epsilon = 1e-10);
        }
    }
}

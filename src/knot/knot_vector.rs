use std::ops::Index;

use nalgebra::convert;
use simba::scalar::SupersetOf;

use crate::error::SplineError;
use crate::misc::{from_usize, FloatingPoint};

use super::KnotMultiplicity;

/// Open knot vector of a single parametric direction.
///
/// The vector stores its degree `p`, so the number of coefficients
/// `n = #knots - p - 1` is always implied. Both end knots are repeated
/// exactly `p + 1` times.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KnotVector<T> {
    knots: Vec<T>,
    degree: usize,
}

impl<T: FloatingPoint> KnotVector<T> {
    /// Create an open uniform knot vector on `[0, 1]`
    /// # Failures
    /// - if `ncoeffs < degree + 1`
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(2, 4).unwrap();
    /// assert_eq!(knots.to_vec(), vec![0., 0., 0., 0.5, 1., 1., 1.]);
    /// ```
    pub fn try_uniform(degree: usize, ncoeffs: usize) -> anyhow::Result<Self> {
        if ncoeffs < degree + 1 {
            anyhow::bail!(SplineError::invalid(format!(
                "{} coefficients cannot form an open knot vector of degree {}, at least {} are required",
                ncoeffs,
                degree,
                degree + 1
            )));
        }

        let spans = ncoeffs - degree;
        let mut knots = Vec::with_capacity(ncoeffs + degree + 1);
        knots.extend(std::iter::repeat_n(T::zero(), degree + 1));
        for j in 1..spans {
            knots.push(from_usize::<T>(j) / from_usize::<T>(spans));
        }
        knots.extend(std::iter::repeat_n(T::one(), degree + 1));

        Ok(Self { knots, degree })
    }

    /// Create a knot vector from an explicit knot sequence
    /// # Failures
    /// - if a knot is not finite or the sequence decreases
    /// - if there are fewer than `2 * (degree + 1)` knots
    /// - if the end knots are not repeated exactly `degree + 1` times
    /// - if an interior knot is repeated more than `degree + 1` times
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots = KnotVector::try_new(2, vec![0., 0., 0., 0.25, 1., 1., 1.]).unwrap();
    /// assert_eq!(knots.ncoeffs(), 4);
    /// assert!(KnotVector::try_new(2, vec![0., 0., 0.5, 1., 1., 1.]).is_err());
    /// ```
    pub fn try_new(degree: usize, knots: Vec<T>) -> anyhow::Result<Self> {
        let order = degree + 1;
        if knots.len() < 2 * order {
            anyhow::bail!(SplineError::invalid(format!(
                "Too few knots for degree {}: got {}, need at least {}",
                degree,
                knots.len(),
                2 * order
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) {
            anyhow::bail!(SplineError::invalid("Knot values must be finite"));
        }
        if knots.windows(2).any(|w| w[1] < w[0]) {
            anyhow::bail!(SplineError::invalid("Knot values must be non-decreasing"));
        }

        let vector = Self { knots, degree };
        let mult = vector.multiplicity();
        let (head, tail) = (mult[0], mult[mult.len() - 1]);
        if mult.len() < 2 {
            anyhow::bail!(SplineError::invalid("Knot vector spans an empty domain"));
        }
        if head.multiplicity() != order || tail.multiplicity() != order {
            anyhow::bail!(SplineError::invalid(format!(
                "End knots must be repeated {} times, got {} and {}",
                order,
                head.multiplicity(),
                tail.multiplicity()
            )));
        }
        if let Some(m) = mult.iter().find(|m| m.multiplicity() > order) {
            anyhow::bail!(SplineError::invalid(format!(
                "Interior knot {} is repeated {} times, at most {} is allowed",
                m.knot(),
                m.multiplicity(),
                order
            )));
        }

        Ok(vector)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of knots
    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// Number of basis functions (coefficients) spanned by the knots
    pub fn ncoeffs(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.knots.clone()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.knots
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.knots.iter()
    }

    pub fn first(&self) -> T {
        self.knots[0]
    }

    pub fn last(&self) -> T {
        self.knots[self.knots.len() - 1]
    }

    /// Get the parametric domain `[t_p, t_n]`
    pub fn domain(&self) -> (T, T) {
        (self.knots[self.degree], self.knots[self.ncoeffs()])
    }

    /// Clamp a parameter into the domain
    pub fn clamp(&self, u: T) -> T {
        let (min, max) = self.domain();
        u.clamp(min, max)
    }

    /// Get the multiplicity of each distinct knot
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots = KnotVector::try_new(2, vec![0., 0., 0., 1., 2., 3., 3., 3.]).unwrap();
    /// let knot_multiplicity = knots.multiplicity();
    /// assert_eq!(knot_multiplicity[0].multiplicity(), 3);
    /// assert_eq!(knot_multiplicity[1].multiplicity(), 1);
    /// assert_eq!(knot_multiplicity[3].multiplicity(), 3);
    /// ```
    pub fn multiplicity(&self) -> Vec<KnotMultiplicity<T>> {
        let mut mult = vec![];

        let mut current = KnotMultiplicity::new(self.knots[0], 0);
        self.knots.iter().for_each(|knot| {
            if *knot != current.knot() {
                mult.push(current);
                current = KnotMultiplicity::new(*knot, 0);
            }
            current.increment_multiplicity();
        });
        mult.push(current);

        mult
    }

    /// Check if the knot vector is clamped,
    /// i.e. the first and last knots have a multiplicity greater than the degree
    pub fn is_clamped(&self) -> bool {
        let multiplicity = self.multiplicity();
        match (multiplicity.first(), multiplicity.last()) {
            (Some(start), Some(end)) => {
                start.multiplicity() > self.degree && end.multiplicity() > self.degree
            }
            _ => false,
        }
    }

    /// Find the knot span index `i` with `t_i <= u < t_{i+1}` by binary search
    ///
    /// Points at or beyond the upper end of the domain belong to the last
    /// span, points below the domain to the first one.
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots = KnotVector::try_new(2, vec![0., 0., 0., 1., 2., 3., 3., 3.]).unwrap();
    /// assert_eq!(knots.find_span(2.5), 4);
    /// assert_eq!(knots.find_span(3.0), 4);
    /// assert_eq!(knots.find_span(-1.0), 2);
    /// ```
    pub fn find_span(&self, u: T) -> usize {
        let n = self.ncoeffs() - 1;
        let p = self.degree;

        if u >= self.knots[n + 1] {
            return n;
        }
        if u <= self.knots[p] {
            return p;
        }

        let mut low = p;
        let mut high = n + 1;
        let mut mid = (low + high) / 2;
        while u < self.knots[mid] || u >= self.knots[mid + 1] {
            if u < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            let next = (low + high) / 2;
            if next == mid {
                break;
            }
            mid = next;
        }

        mid
    }

    /// Compute the `degree + 1` non-vanishing basis functions at a single parameter
    pub fn basis_functions(&self, knot_span_index: usize, u: T) -> Vec<T> {
        let degree = self.degree;
        let mut basis_functions = vec![T::zero(); degree + 1];
        let mut left = vec![T::zero(); degree + 1];
        let mut right = vec![T::zero(); degree + 1];

        basis_functions[0] = T::one();

        for j in 1..=degree {
            left[j] = u - self[knot_span_index + 1 - j];
            right[j] = self[knot_span_index + j] - u;
            let mut saved = T::zero();

            for r in 0..j {
                let temp = basis_functions[r] / (right[r + 1] + left[j - r]);
                basis_functions[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            basis_functions[j] = saved;
        }

        basis_functions
    }

    /// Midpoints of every nonzero-length knot span
    pub fn midpoints(&self) -> Vec<T> {
        let half: T = convert(0.5);
        self.multiplicity()
            .windows(2)
            .map(|w| (w[0].knot() + w[1].knot()) * half)
            .collect()
    }

    /// Insert the midpoint of every nonzero-length span,
    /// keeping the degree and the end multiplicities
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(1, 3).unwrap();
    /// let refined = knots.refined();
    /// assert_eq!(refined.to_vec(), vec![0., 0., 0.25, 0.5, 0.75, 1., 1.]);
    /// ```
    pub fn refined(&self) -> Self {
        let mut knots = [self.knots.clone(), self.midpoints()].concat();
        knots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            knots,
            degree: self.degree,
        }
    }

    /// Build a new vector with the given knots inserted
    /// # Failures
    /// - if a knot lies outside the open interior of the domain
    /// - if an interior multiplicity would exceed `degree + 1`
    pub fn try_inserted(&self, knots_to_insert: &[T]) -> anyhow::Result<Self> {
        let (start, end) = self.domain();
        if let Some(k) = knots_to_insert.iter().find(|k| !(**k > start && **k < end)) {
            anyhow::bail!(SplineError::invalid(format!(
                "Knot {} is not inside the open domain ({}, {})",
                k, start, end
            )));
        }

        let mut knots = [self.knots.clone(), knots_to_insert.to_vec()].concat();
        knots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Self::try_new(self.degree, knots)
    }

    /// Greville abscissae, the averages of `degree` consecutive knots
    ///
    /// With `interior`, the first and last abscissae (the domain end points)
    /// are dropped. For degree zero the span midpoints are used.
    ///
    /// # Example
    /// ```
    /// use igaspline::prelude::KnotVector;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(2, 4).unwrap();
    /// assert_eq!(knots.greville(false), vec![0., 0.25, 0.75, 1.]);
    /// assert_eq!(knots.greville(true), vec![0.25, 0.75]);
    /// ```
    pub fn greville(&self, interior: bool) -> Vec<T> {
        let p = self.degree;
        let n = self.ncoeffs();
        let abscissae = (0..n).map(|i| {
            if p == 0 {
                (self.knots[i] + self.knots[i + 1]) * convert::<f64, T>(0.5)
            } else {
                let sum = self.knots[(i + 1)..=(i + p)]
                    .iter()
                    .fold(T::zero(), |acc, k| acc + *k);
                sum / from_usize::<T>(p)
            }
        });

        if interior {
            abscissae.skip(1).take(n.saturating_sub(2)).collect()
        } else {
            abscissae.collect()
        }
    }

    /// Cast the knot vector to another floating point type
    /// # Example
    /// ```
    /// use igaspline::prelude::*;
    /// let knots: KnotVector<f64> = KnotVector::try_uniform(1, 3).unwrap();
    /// let knots2 = knots.cast::<f32>();
    /// assert_eq!(knots2.last(), 1.0_f32);
    /// ```
    pub fn cast<F: FloatingPoint + SupersetOf<T>>(&self) -> KnotVector<F> {
        KnotVector {
            knots: self.knots.iter().map(|v| convert(*v)).collect(),
            degree: self.degree,
        }
    }
}

impl<T> Index<usize> for KnotVector<T> {
    type Output = T;
    fn index(&self, index: usize) -> &Self::Output {
        &self.knots[index]
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for KnotVector<T>
where
    T: FloatingPoint + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Raw<T> {
            knots: Vec<T>,
            degree: usize,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        KnotVector::try_new(raw.degree, raw.knots).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SplineError;

    use super::KnotVector;

    #[test]
    fn open_uniform_counts() {
        for degree in 0..=6 {
            for ncoeffs in (degree + 1)..(degree + 8) {
                let knots = KnotVector::<f64>::try_uniform(degree, ncoeffs).unwrap();
                assert_eq!(knots.len(), ncoeffs + degree + 1);
                assert_eq!(knots.ncoeffs(), ncoeffs);
                let mult = knots.multiplicity();
                assert_eq!(mult.first().unwrap().multiplicity(), degree + 1);
                assert_eq!(mult.last().unwrap().multiplicity(), degree + 1);
                assert!(knots.is_clamped());
            }
        }
    }

    #[test]
    fn too_few_coefficients() {
        for degree in 1..=6 {
            let err = KnotVector::<f64>::try_uniform(degree, degree).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SplineError>(),
                Some(SplineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn malformed_sequences() {
        assert!(KnotVector::try_new(1, vec![0., 0., 0.5, 0.4, 1., 1.]).is_err());
        assert!(KnotVector::try_new(1, vec![0., 0., f64::NAN, 1., 1.]).is_err());
        assert!(KnotVector::try_new(2, vec![0., 0., 0., 0.5, 0.5, 0.5, 0.5, 1., 1., 1.]).is_err());
        assert!(KnotVector::try_new(1, vec![1., 1., 1., 1.]).is_err());
        assert!(KnotVector::try_new(2, vec![0., 0., 0., 0.5, 0.5, 0.5, 1., 1., 1.]).is_ok());
    }

    #[test]
    fn span_lookup() {
        let knots = KnotVector::try_new(2, vec![0., 0., 0., 0.2, 0.2, 0.7, 1., 1., 1.]).unwrap();
        assert_eq!(knots.find_span(0.0), 2);
        assert_eq!(knots.find_span(0.1), 2);
        assert_eq!(knots.find_span(0.2), 4);
        assert_eq!(knots.find_span(0.69), 4);
        assert_eq!(knots.find_span(0.7), 5);
        assert_eq!(knots.find_span(1.0), 5);
        assert_eq!(knots.find_span(7.0), 5);
        assert_eq!(knots.find_span(-7.0), 2);
    }

    #[test]
    fn span_lookup_matches_linear_scan() {
        let knots = KnotVector::try_new(3, vec![0., 0., 0., 0., 0.1, 0.3, 0.3, 0.55, 0.9, 1., 1., 1., 1.])
            .unwrap();
        let n = knots.ncoeffs();
        for i in 0..=200 {
            let u = i as f64 / 200.;
            let mut linear = knots.degree();
            while linear + 1 < n && u >= knots[linear + 1] {
                linear += 1;
            }
            assert_eq!(knots.find_span(u), linear, "u = {}", u);
        }
    }

    #[test]
    fn refinement_inserts_midpoints() {
        let knots = KnotVector::try_new(2, vec![0., 0., 0., 0.5, 0.5, 1., 1., 1.]).unwrap();
        let refined = knots.refined();
        assert_eq!(
            refined.to_vec(),
            vec![0., 0., 0., 0.25, 0.5, 0.5, 0.75, 1., 1., 1.]
        );
        assert_eq!(refined.degree(), 2);
        assert_eq!(refined.ncoeffs(), 7);
    }

    #[test]
    fn insertion_rejects_boundary_knots() {
        let knots = KnotVector::<f64>::try_uniform(2, 4).unwrap();
        assert!(knots.try_inserted(&[0.0]).is_err());
        assert!(knots.try_inserted(&[0.5, 0.5]).is_ok());
        assert!(knots.try_inserted(&[0.5, 0.5, 0.5]).is_err());
    }

    #[test]
    fn greville_degree_zero() {
        let knots = KnotVector::<f64>::try_uniform(0, 4).unwrap();
        assert_eq!(knots.greville(false), vec![0.125, 0.375, 0.625, 0.875]);
    }
}

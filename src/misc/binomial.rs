use std::collections::HashMap;

use nalgebra::RealField;

/// A memoized binomial coefficient calculator.
/// Coefficients are built from Pascal's rule and cached by `(n, k)`.
#[derive(Debug, Clone, Default)]
pub struct Binomial<T> {
    memo: HashMap<(usize, usize), T>,
}

impl<T: RealField + Copy> Binomial<T> {
    pub fn new() -> Self {
        Self {
            memo: HashMap::new(),
        }
    }

    /// Returns the binomial coefficient of `n` and `k` with memoization.
    pub fn get(&mut self, n: usize, k: usize) -> T {
        if k > n {
            return T::zero();
        }
        if k == 0 || k == n {
            return T::one();
        }

        let k = k.min(n - k);
        if let Some(&v) = self.memo.get(&(n, k)) {
            return v;
        }

        let r = self.get(n - 1, k) + self.get(n - 1, k - 1);
        self.memo.insert((n, k), r);
        r
    }

    /// Product of the per-component coefficients `C(alpha_i, beta_i)`.
    pub fn multi(&mut self, alpha: &[usize], beta: &[usize]) -> T {
        alpha
            .iter()
            .zip(beta.iter())
            .fold(T::one(), |acc, (&a, &b)| acc * self.get(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::Binomial;

    #[test]
    fn pascal_row() {
        let mut binomial = Binomial::<f64>::new();
        let row: Vec<f64> = (0..=6).map(|k| binomial.get(5, k)).collect();
        assert_eq!(row, vec![1., 5., 10., 10., 5., 1., 0.]);
    }

    #[test]
    fn multi_index() {
        let mut binomial = Binomial::<f64>::new();
        assert_eq!(binomial.multi(&[2, 3], &[1, 1]), 6.);
        assert_eq!(binomial.multi(&[], &[]), 1.);
        assert_eq!(binomial.multi(&[4, 1], &[2, 2]), 0.);
    }
}

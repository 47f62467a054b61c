use itertools::Itertools;

/// Enumerate every multi-index `beta` with `0 <= beta <= alpha` componentwise.
///
/// The first component varies slowest, so any `beta <= gamma` appears
/// before `gamma`.
pub fn multi_indices_up_to(alpha: &[usize]) -> Vec<Vec<usize>> {
    if alpha.is_empty() {
        return vec![vec![]];
    }
    alpha
        .iter()
        .map(|&a| 0..=a)
        .multi_cartesian_product()
        .collect()
}

/// Strides of a tensor grid whose first direction varies fastest.
pub fn strides(sizes: &[usize]) -> Vec<usize> {
    let mut acc = 1;
    sizes
        .iter()
        .map(|n| {
            let s = acc;
            acc *= n;
            s
        })
        .collect()
}

/// Split a flat index into its multi-index for the given tensor sizes.
pub fn unravel(mut index: usize, sizes: &[usize]) -> Vec<usize> {
    sizes
        .iter()
        .map(|&n| {
            let i = index % n;
            index /= n;
            i
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_set_ordering() {
        let set = multi_indices_up_to(&[1, 2]);
        assert_eq!(set.len(), 6);
        assert_eq!(set[0], vec![0, 0]);
        assert_eq!(set[5], vec![1, 2]);
        assert_eq!(multi_indices_up_to(&[]), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn strides_and_unravel() {
        assert_eq!(strides(&[5, 4, 7]), vec![1, 5, 20]);
        let sizes = [5, 4, 7];
        let idx = 3 + 5 * 2 + 20 * 6;
        assert_eq!(unravel(idx, &sizes), vec![3, 2, 6]);
    }
}

//! Fixed path permutations between mesh layers.

use crate::complex::ComplexPair;
use crate::error::{MeshError, MeshResult};
use crate::layer::Transformer;

/// Re-indexes the last axis of a signal by a fixed permutation of `0..N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermutationLayer {
    permuted_indices: Vec<usize>,
    inv_permuted_indices: Vec<usize>,
}

impl PermutationLayer {
    /// Create a permutation layer, rejecting anything that is not a bijection on `0..N`.
    pub fn new(permuted_indices: Vec<usize>) -> MeshResult<Self> {
        let units = permuted_indices.len();
        let mut inv_permuted_indices = vec![usize::MAX; units];

        for (idx, &perm_idx) in permuted_indices.iter().enumerate() {
            if perm_idx >= units {
                return Err(MeshError::InvalidPermutation(format!(
                    "index {} out of range for {} units",
                    perm_idx, units
                )));
            }
            if inv_permuted_indices[perm_idx] != usize::MAX {
                return Err(MeshError::InvalidPermutation(format!(
                    "index {} appears more than once",
                    perm_idx
                )));
            }
            inv_permuted_indices[perm_idx] = idx;
        }

        Ok(Self {
            permuted_indices,
            inv_permuted_indices,
        })
    }

    /// Permutation that leaves every path in place.
    pub fn identity(units: usize) -> Self {
        Self {
            permuted_indices: (0..units).collect(),
            inv_permuted_indices: (0..units).collect(),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.permuted_indices
    }

    pub fn inverse_indices(&self) -> &[usize] {
        &self.inv_permuted_indices
    }

    /// `out[..., i] = x[..., perm[i]]`.
    pub fn apply(&self, x: &ComplexPair) -> MeshResult<ComplexPair> {
        self.check(x)?;
        Ok(x.select_last(&self.permuted_indices))
    }

    /// Undo [`apply`](Self::apply).
    pub fn apply_inverse(&self, x: &ComplexPair) -> MeshResult<ComplexPair> {
        self.check(x)?;
        Ok(x.select_last(&self.inv_permuted_indices))
    }

    fn check(&self, x: &ComplexPair) -> MeshResult<()> {
        match x.shape().last() {
            Some(&n) if n == self.permuted_indices.len() => Ok(()),
            _ => Err(MeshError::shape(
                "permutation",
                x.shape(),
                &[self.permuted_indices.len()],
            )),
        }
    }
}

impl Transformer for PermutationLayer {
    fn units(&self) -> usize {
        self.permuted_indices.len()
    }

    fn transform(&self, inputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.apply(inputs)
    }

    fn inverse_transform(&self, outputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.apply_inverse(outputs)
    }
}

/// Pairs path `2k` with `2k + 1`; with an odd number of units the last path maps to itself.
///
/// The result is an involution: indexing by it twice is the identity.
pub fn pairwise_off_diag_permutation(units: usize) -> Vec<usize> {
    (0..units)
        .map(|idx| {
            if units % 2 == 1 && idx == units - 1 {
                idx
            } else {
                idx ^ 1
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::{from_pair, to_pair};
    use ndarray::{Array2, ArrayD, IxDyn};
    use num_complex::Complex64;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_inverse_undoes_permutation() {
        let mut rng = StdRng::seed_from_u64(42);

        for units in [1, 2, 5, 8, 13] {
            let mut perm: Vec<usize> = (0..units).collect();
            perm.shuffle(&mut rng);
            let layer = PermutationLayer::new(perm).unwrap();

            let x = Array2::from_shape_fn((3, units), |_| {
                Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
            });
            let x = to_pair(&x);
            let y = layer.apply(&x).unwrap();

            assert_eq!(layer.apply_inverse(&y).unwrap(), x);
        }
    }

    #[test]
    fn test_apply_reindexes_last_axis() {
        let layer = PermutationLayer::new(vec![2, 0, 1]).unwrap();
        let x = to_pair(&ndarray::array![
            Complex64::new(10.0, 0.0),
            Complex64::new(11.0, 1.0),
            Complex64::new(12.0, 2.0)
        ]);
        let y = from_pair(&layer.apply(&x).unwrap());

        assert_eq!(y[[0]], Complex64::new(12.0, 2.0));
        assert_eq!(y[[1]], Complex64::new(10.0, 0.0));
        assert_eq!(y[[2]], Complex64::new(11.0, 1.0));
        assert_eq!(layer.inverse_indices(), &[1, 2, 0]);
    }

    #[test]
    fn test_rejects_non_bijection() {
        assert!(matches!(
            PermutationLayer::new(vec![0, 0, 1]),
            Err(MeshError::InvalidPermutation(_))
        ));
        assert!(matches!(
            PermutationLayer::new(vec![0, 3, 1]),
            Err(MeshError::InvalidPermutation(_))
        ));
    }

    #[test]
    fn test_wrong_width_is_shape_error() {
        let layer = PermutationLayer::identity(4);
        let x = ComplexPair::from_parts(
            ArrayD::<f64>::zeros(IxDyn(&[3])),
            ArrayD::<f64>::zeros(IxDyn(&[3])),
        )
        .unwrap();

        assert!(matches!(layer.apply(&x), Err(MeshError::Shape { .. })));
    }

    #[test]
    fn test_pairwise_permutation_is_involution() {
        assert_eq!(pairwise_off_diag_permutation(4), vec![1, 0, 3, 2]);
        assert_eq!(pairwise_off_diag_permutation(5), vec![1, 0, 3, 2, 4]);

        for units in 1..10 {
            let perm = pairwise_off_diag_permutation(units);
            for idx in 0..units {
                assert_eq!(perm[perm[idx]], idx);
            }
        }
    }

    #[test]
    fn test_permutation_matrix() {
        let layer = PermutationLayer::new(vec![1, 2, 0]).unwrap();
        let u = layer.matrix().unwrap();

        // y[i] = x[perm[i]]
        assert_eq!(u[[0, 1]], Complex64::new(1.0, 0.0));
        assert_eq!(u[[1, 2]], Complex64::new(1.0, 0.0));
        assert_eq!(u[[2, 0]], Complex64::new(1.0, 0.0));
        assert_eq!(u[[0, 0]], Complex64::new(0.0, 0.0));
    }
}

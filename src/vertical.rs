//! One vertical layer of the mesh: a column of cells plus its wiring.

use crate::complex::{add, conj, mul, ComplexPair};
use crate::error::{MeshError, MeshResult};
use crate::layer::Transformer;
use crate::permutation::PermutationLayer;

/// Per-layer affine map on `N` paths.
///
/// With `p` the pairwise permutation (`2k <-> 2k + 1`), the layer computes
/// `y = x * diag + (x * off_diag)[p]`, which is the 2x2 cell matrix
/// `[[diag[2k], off_diag[2k+1]], [off_diag[2k], diag[2k+1]]]` on each pair.
/// Permutations are borrowed so all layers of a mesh can share them.
#[derive(Clone, Debug)]
pub struct MeshVerticalLayer<'a> {
    pairwise_perm_idx: &'a [usize],
    diag: ComplexPair,
    off_diag: ComplexPair,
    right_perm: Option<&'a PermutationLayer>,
    left_perm: Option<&'a PermutationLayer>,
}

impl<'a> MeshVerticalLayer<'a> {
    /// `diag` and `off_diag` are complex vectors shaped `[N]`.
    pub fn new(
        pairwise_perm_idx: &'a [usize],
        diag: ComplexPair,
        off_diag: ComplexPair,
        right_perm: Option<&'a PermutationLayer>,
        left_perm: Option<&'a PermutationLayer>,
    ) -> MeshResult<Self> {
        let units = pairwise_perm_idx.len();
        for coeff in [&diag, &off_diag] {
            if coeff.shape() != [units] {
                return Err(MeshError::shape("vertical_layer", coeff.shape(), &[units]));
            }
        }
        for perm in right_perm.iter().chain(left_perm.iter()) {
            if perm.units() != units {
                return Err(MeshError::Dimension {
                    expected: units,
                    actual: perm.units(),
                });
            }
        }
        Ok(Self {
            pairwise_perm_idx,
            diag,
            off_diag,
            right_perm,
            left_perm,
        })
    }

    pub fn diag(&self) -> &ComplexPair {
        &self.diag
    }

    pub fn off_diag(&self) -> &ComplexPair {
        &self.off_diag
    }

    fn check_input(&self, x: &ComplexPair) -> MeshResult<()> {
        let actual = x.shape().last().copied().unwrap_or(0);
        if actual != self.pairwise_perm_idx.len() {
            return Err(MeshError::Dimension {
                expected: self.pairwise_perm_idx.len(),
                actual,
            });
        }
        Ok(())
    }

    fn couple(
        &self,
        x: &ComplexPair,
        diag: &ComplexPair,
        off_diag: &ComplexPair,
    ) -> MeshResult<ComplexPair> {
        let diag_out = mul(x, diag)?;
        let off_diag_out = mul(x, off_diag)?;
        add(&diag_out, &off_diag_out.select_last(self.pairwise_perm_idx))
    }
}

impl Transformer for MeshVerticalLayer<'_> {
    fn units(&self) -> usize {
        self.pairwise_perm_idx.len()
    }

    fn transform(&self, inputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.check_input(inputs)?;
        let outputs = match self.left_perm {
            Some(perm) => perm.apply(inputs)?,
            None => inputs.clone(),
        };
        let outputs = self.couple(&outputs, &self.diag, &self.off_diag)?;
        match self.right_perm {
            Some(perm) => perm.apply(&outputs),
            None => Ok(outputs),
        }
    }

    fn inverse_transform(&self, outputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.check_input(outputs)?;
        let inputs = match self.right_perm {
            Some(perm) => perm.apply_inverse(outputs)?,
            None => outputs.clone(),
        };
        let diag = conj(&self.diag);
        let off_diag = conj(&self.off_diag.select_last(self.pairwise_perm_idx));
        let inputs = self.couple(&inputs, &diag, &off_diag)?;
        match self.left_perm {
            Some(perm) => perm.apply_inverse(&inputs),
            None => Ok(inputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::{from_pair, to_pair};
    use crate::permutation::pairwise_off_diag_permutation;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2};
    use num_complex::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_transform_is_pairwise_2x2() {
        let pairwise = pairwise_off_diag_permutation(4);
        let diag = to_pair(&array![c(1.0, 0.0), c(2.0, 0.0), c(0.0, 1.0), c(3.0, -1.0)]);
        let off_diag = to_pair(&array![c(0.5, 0.0), c(0.0, 0.5), c(1.0, 1.0), c(-1.0, 0.0)]);
        let layer = MeshVerticalLayer::new(&pairwise, diag, off_diag, None, None).unwrap();

        let u = layer.matrix().unwrap();
        let expected = array![
            [c(1.0, 0.0), c(0.0, 0.5), c(0.0, 0.0), c(0.0, 0.0)],
            [c(0.5, 0.0), c(2.0, 0.0), c(0.0, 0.0), c(0.0, 0.0)],
            [c(0.0, 0.0), c(0.0, 0.0), c(0.0, 1.0), c(-1.0, 0.0)],
            [c(0.0, 0.0), c(0.0, 0.0), c(1.0, 1.0), c(3.0, -1.0)]
        ];
        assert_eq!(u, expected);
    }

    #[test]
    fn test_inverse_is_adjoint_for_any_coefficients() {
        let pairwise = pairwise_off_diag_permutation(5);
        let left = PermutationLayer::new(vec![4, 0, 3, 1, 2]).unwrap();
        let right = PermutationLayer::new(vec![1, 3, 0, 4, 2]).unwrap();
        let diag = to_pair(&Array1::from_shape_fn(5, |i| c(0.3 * i as f64, 1.0 - 0.2 * i as f64)));
        let mut off = Array1::from_shape_fn(5, |i| c(-0.1 * i as f64, 0.4));
        off[4] = c(0.0, 0.0);
        let layer =
            MeshVerticalLayer::new(&pairwise, diag, to_pair(&off), Some(&right), Some(&left))
                .unwrap();

        let u = layer.matrix().unwrap();
        let u_h = u.t().mapv(|x| x.conj());
        let inv = layer.inverse_matrix().unwrap();

        for (a, b) in inv.iter().zip(u_h.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-14);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_batch_dimensions_pass_through() {
        let pairwise = pairwise_off_diag_permutation(2);
        let diag = to_pair(&array![c(0.0, 1.0), c(1.0, 0.0)]);
        let off_diag = to_pair(&array![c(0.0, 0.0), c(0.0, 0.0)]);
        let layer = MeshVerticalLayer::new(&pairwise, diag, off_diag, None, None).unwrap();

        let x = Array2::from_shape_fn((3, 2), |(b, k)| c(b as f64, k as f64));
        let y = from_pair(&layer.transform(&to_pair(&x)).unwrap());

        assert_eq!(y.shape(), &[3, 2]);
        for b in 0..3 {
            assert_eq!(y[[b, 0]], c(b as f64, 0.0) * c(0.0, 1.0));
            assert_eq!(y[[b, 1]], c(b as f64, 1.0));
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let pairwise = pairwise_off_diag_permutation(4);
        let zeros = ComplexPair::zeros(&[4]);
        let layer =
            MeshVerticalLayer::new(&pairwise, zeros.clone(), zeros, None, None).unwrap();

        let result = layer.transform(&ComplexPair::zeros(&[2, 3]));
        assert!(matches!(
            result,
            Err(MeshError::Dimension {
                expected: 4,
                actual: 3
            })
        ));
        assert!(MeshVerticalLayer::new(
            &pairwise,
            ComplexPair::zeros(&[3]),
            ComplexPair::zeros(&[4]),
            None,
            None
        )
        .is_err());
    }
}

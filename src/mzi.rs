//! Mach-Zehnder Interferometer (MZI) cells and their coupling errors.
//!
//! Each cell is two beam splitters around an internal phase shifter, followed
//! by an external phase shifter on its top path. Splitter imperfections are
//! folded into four per-cell coefficients `enn, enp, epn, epp`.

use ndarray::{Array1, Array2, ArrayBase, Data, Dimension};
use num_complex::Complex64;

use crate::error::{MeshError, MeshResult};

/// Ideal MZI cell in the single-mode basis, used as a closed-form reference.
///
/// Default convention:
/// T(θ, φ) = [[e^(iφ)(e^(iθ) - 1)/2, i e^(iφ)(1 + e^(iθ))/2],
///            [i(1 + e^(iθ))/2,        -(e^(iθ) - 1)/2]]
///
/// Hadamard convention:
/// T(θ, φ) = [[e^(iφ)(e^(iθ) + 1)/2, e^(iφ)(e^(iθ) - 1)/2],
///            [(e^(iθ) - 1)/2,        (e^(iθ) + 1)/2]]
#[derive(Clone, Debug)]
pub struct MachZehnderInterferometer {
    pub theta: f64,
    pub phi: f64,
    pub hadamard: bool,
    matrix: Array2<Complex64>,
}

impl MachZehnderInterferometer {
    pub fn new(theta: f64, phi: f64, hadamard: bool) -> Self {
        let matrix = Self::compute_matrix(theta, phi, hadamard);
        Self {
            theta,
            phi,
            hadamard,
            matrix,
        }
    }

    #[inline]
    fn compute_matrix(theta: f64, phi: f64, hadamard: bool) -> Array2<Complex64> {
        let i = Complex64::i();
        let one = Complex64::new(1.0, 0.0);
        let exp_theta = Complex64::from_polar(1.0, theta);
        let exp_phi = Complex64::from_polar(1.0, phi);

        if hadamard {
            ndarray::arr2(&[
                [exp_phi * (exp_theta + one) / 2.0, exp_phi * (exp_theta - one) / 2.0],
                [(exp_theta - one) / 2.0, (exp_theta + one) / 2.0],
            ])
        } else {
            ndarray::arr2(&[
                [exp_phi * (exp_theta - one) / 2.0, i * exp_phi * (one + exp_theta) / 2.0],
                [i * (one + exp_theta) / 2.0, -(exp_theta - one) / 2.0],
            ])
        }
    }

    pub fn set_phases(&mut self, theta: f64, phi: f64) {
        self.theta = theta;
        self.phi = phi;
        self.matrix = Self::compute_matrix(theta, phi, self.hadamard);
    }

    #[inline]
    pub fn forward(&self, inputs: &Array1<Complex64>) -> Array1<Complex64> {
        self.matrix.dot(inputs)
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.matrix
    }
}

impl Default for MachZehnderInterferometer {
    fn default() -> Self {
        Self::new(0.0, 0.0, false)
    }
}

/// Per-cell coupling coefficients, each shaped `[num_layers, units / 2]`.
#[derive(Clone, Debug, PartialEq)]
pub struct MziErrors {
    pub enn: Array2<f64>,
    pub enp: Array2<f64>,
    pub epn: Array2<f64>,
    pub epp: Array2<f64>,
}

impl MziErrors {
    /// Error-free splitters: every coefficient is one.
    pub fn ideal(num_layers: usize, cells: usize) -> Self {
        let ones = Array2::ones((num_layers, cells));
        Self {
            enn: ones.clone(),
            enp: ones.clone(),
            epn: ones.clone(),
            epp: ones,
        }
    }

    /// Coefficients from left/right splitter errors `e_l`, `e_r` in `[-1, 1]`.
    ///
    /// Any such pair still yields a lossless (unitary) cell.
    pub fn from_splitter_errors(e_l: &Array2<f64>, e_r: &Array2<f64>) -> MeshResult<Self> {
        if e_l.shape() != e_r.shape() {
            return Err(MeshError::shape("splitter_errors", e_l.shape(), e_r.shape()));
        }
        if let Some(bad) = e_l.iter().chain(e_r.iter()).find(|e| e.abs() > 1.0) {
            return Err(MeshError::Config(format!(
                "splitter error {} outside [-1, 1]",
                bad
            )));
        }

        let minus_l = e_l.mapv(|e| (1.0 - e).sqrt());
        let plus_l = e_l.mapv(|e| (1.0 + e).sqrt());
        let minus_r = e_r.mapv(|e| (1.0 - e).sqrt());
        let plus_r = e_r.mapv(|e| (1.0 + e).sqrt());

        Ok(Self {
            enn: &minus_l * &minus_r,
            enp: &minus_l * &plus_r,
            epn: &plus_l * &minus_r,
            epp: &plus_l * &plus_r,
        })
    }

    /// Broadcast arbitrary coefficient arrays (scalars, rows, full tensors)
    /// to `[num_layers, cells]`.
    pub fn broadcast<S, D>(
        enn: &ArrayBase<S, D>,
        enp: &ArrayBase<S, D>,
        epn: &ArrayBase<S, D>,
        epp: &ArrayBase<S, D>,
        num_layers: usize,
        cells: usize,
    ) -> MeshResult<Self>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let expand = |e: &ArrayBase<S, D>| {
            e.broadcast((num_layers, cells))
                .map(|v| v.to_owned())
                .ok_or_else(|| MeshError::shape("mzi_errors", e.shape(), &[num_layers, cells]))
        };
        Ok(Self {
            enn: expand(enn)?,
            enp: expand(enp)?,
            epn: expand(epn)?,
            epp: expand(epp)?,
        })
    }

    pub fn shape(&self) -> &[usize] {
        self.enn.shape()
    }

    pub(crate) fn check_shape(&self, num_layers: usize, cells: usize) -> MeshResult<()> {
        for e in [&self.enn, &self.enp, &self.epn, &self.epp] {
            if e.shape() != [num_layers, cells] {
                return Err(MeshError::shape("mzi_errors", e.shape(), &[num_layers, cells]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr0, array};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Uniform};
    use std::f64::consts::PI;

    fn assert_unitary(u: &Array2<Complex64>) {
        let u_h = u.t().mapv(|x| x.conj());
        let product = u.dot(&u_h);

        for i in 0..u.nrows() {
            for j in 0..u.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(product[[i, j]].re, expected, epsilon = 1e-12);
                assert_abs_diff_eq!(product[[i, j]].im, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_mzi_bar_and_cross_states() {
        // θ = π routes straight through (bar), θ = 0 swaps paths (cross).
        let bar = MachZehnderInterferometer::new(PI, 0.0, false);
        let out = bar.forward(&array![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]);
        assert_abs_diff_eq!(out[0].norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1].norm(), 0.0, epsilon = 1e-12);

        let cross = MachZehnderInterferometer::default();
        let out = cross.forward(&array![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)]);
        assert_abs_diff_eq!(out[0].norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1].norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mzi_is_unitary_in_both_conventions() {
        let mut rng = StdRng::seed_from_u64(3);
        let phase = Uniform::new(0.0, 2.0 * PI);

        for hadamard in [false, true] {
            let mut mzi = MachZehnderInterferometer::new(0.0, 0.0, hadamard);
            for _ in 0..10 {
                mzi.set_phases(phase.sample(&mut rng), phase.sample(&mut rng));
                assert_unitary(mzi.matrix());
            }
        }
    }

    #[test]
    fn test_splitter_errors_zero_is_ideal() {
        let zeros = Array2::zeros((2, 3));
        let errors = MziErrors::from_splitter_errors(&zeros, &zeros).unwrap();
        assert_eq!(errors, MziErrors::ideal(2, 3));
    }

    #[test]
    fn test_splitter_error_products() {
        let errors =
            MziErrors::from_splitter_errors(&array![[0.5]], &array![[-0.5]]).unwrap();

        assert_abs_diff_eq!(errors.enn[[0, 0]], (0.5f64 * 1.5).sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(errors.enp[[0, 0]], (0.5f64 * 0.5).sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(errors.epn[[0, 0]], (1.5f64 * 1.5).sqrt(), epsilon = 1e-15);
        assert_abs_diff_eq!(errors.epp[[0, 0]], (1.5f64 * 0.5).sqrt(), epsilon = 1e-15);

        assert!(matches!(
            MziErrors::from_splitter_errors(&array![[1.5]], &array![[0.0]]),
            Err(MeshError::Config(_))
        ));
    }

    #[test]
    fn test_broadcast_scalar_and_row() {
        let scalar = arr0(0.25).into_dyn();
        let errors =
            MziErrors::broadcast(&scalar, &scalar, &scalar, &scalar, 3, 2).unwrap();
        assert_eq!(errors.shape(), &[3, 2]);
        assert!(errors.enp.iter().all(|&e| e == 0.25));

        let row = array![1.0, 0.5];
        let errors = MziErrors::broadcast(&row, &row, &row, &row, 4, 2).unwrap();
        assert_eq!(errors.epp.row(3), row);

        let bad = array![1.0, 0.5, 0.2];
        assert!(MziErrors::broadcast(&bad, &bad, &bad, &bad, 4, 2).is_err());
    }
}

//! Phase arrangement: raw per-cell parameters to per-path phase screens.
//!
//! Raw parameters are stored per cell as `[num_layers, units / 2]`. A cell
//! `j` in a layer couples paths `2j` and `2j + 1`, so arranging puts the
//! cell's value on path `2j` of an `[units, num_layers]` array. With an odd
//! number of units the last path is idle and always stays zero.

use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::complex::{roll, ComplexPair};
use crate::error::{MeshError, MeshResult};

/// How a cell's internal phase is spread over its two paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Basis {
    /// Differential mode: `+θ/2` on the top path, `-θ/2` on the bottom path.
    Bloch,
    /// Whole phase on the top path.
    #[default]
    SingleMode,
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Basis::Bloch => write!(f, "bloch"),
            Basis::SingleMode => write!(f, "sm"),
        }
    }
}

impl FromStr for Basis {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bloch" => Ok(Basis::Bloch),
            "sm" | "single_mode" | "singlemode" => Ok(Basis::SingleMode),
            other => Err(MeshError::UnsupportedBasis(other.to_string())),
        }
    }
}

impl TryFrom<String> for Basis {
    type Error = MeshError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Basis> for String {
    fn from(basis: Basis) -> Self {
        basis.to_string()
    }
}

/// One raw parameter set shaped `[num_layers, units / 2]`, arranged over paths on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshParam {
    param: Array2<f64>,
    units: usize,
}

impl MeshParam {
    pub fn new(param: Array2<f64>, units: usize) -> MeshResult<Self> {
        if param.ncols() != units / 2 {
            return Err(MeshError::shape(
                "mesh_param",
                param.shape(),
                &[param.nrows(), units / 2],
            ));
        }
        Ok(Self { param, units })
    }

    pub fn param(&self) -> &Array2<f64> {
        &self.param
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn num_layers(&self) -> usize {
        self.param.nrows()
    }

    /// `[units, num_layers]` stripe with each cell's value on its top path.
    pub fn single_mode_arrangement(&self) -> Array2<f64> {
        let mut stripe = Array2::zeros((self.units, self.num_layers()));
        // Rows 0, 2, 4, ...; for odd units this stops before the idle last row.
        for (cell, column) in self.param.axis_iter(Axis(1)).enumerate() {
            stripe.row_mut(2 * cell).assign(&column);
        }
        stripe
    }

    /// Cell value on both of its paths.
    pub fn common_mode_arrangement(&self) -> Array2<f64> {
        let phases = self.single_mode_arrangement();
        &phases + &roll(&phases, 1, 0)
    }

    /// Half the cell value on the top path, minus half on the bottom path.
    pub fn differential_mode_arrangement(&self) -> Array2<f64> {
        let phases = self.single_mode_arrangement();
        &phases / 2.0 - &roll(&phases, 1, 0) / 2.0
    }

    fn zip_with(
        &self,
        op: &'static str,
        rhs: &MeshParam,
        f: impl Fn(f64, f64) -> f64,
    ) -> MeshResult<MeshParam> {
        if self.units != rhs.units || self.param.shape() != rhs.param.shape() {
            return Err(MeshError::shape(op, self.param.shape(), rhs.param.shape()));
        }
        let mut param = self.param.clone();
        param.zip_mut_with(&rhs.param, |a, &b| *a = f(*a, b));
        Ok(MeshParam {
            param,
            units: self.units,
        })
    }
}

// Elementwise arithmetic between parameter sets of the same mesh, failing
// with a shape error when the sets differ in shape or unit count.
macro_rules! impl_param_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&MeshParam> for &MeshParam {
            type Output = MeshResult<MeshParam>;

            fn $method(self, rhs: &MeshParam) -> Self::Output {
                self.zip_with(stringify!($method), rhs, |a, b| a $op b)
            }
        }

        impl $trait for MeshParam {
            type Output = MeshResult<MeshParam>;

            fn $method(self, rhs: MeshParam) -> Self::Output {
                (&self).$method(&rhs)
            }
        }
    };
}

impl_param_op!(Add, add, +);
impl_param_op!(Sub, sub, -);
impl_param_op!(Mul, mul, *);

/// Masked phases for one evaluation of the mesh, with their phase-shift layers.
#[derive(Clone, Debug)]
pub struct MeshPhases {
    theta: MeshParam,
    phi: MeshParam,
    gamma: Array1<f64>,
    mask: Array2<f64>,
    basis: Basis,
    input_phase_shift_layer: ComplexPair,
}

impl MeshPhases {
    /// Apply the activity mask and validate shapes.
    ///
    /// Inactive cells take the fixed phase `(1 - hadamard) * π` in place of
    /// their raw value.
    pub fn new(
        theta: &Array2<f64>,
        phi: &Array2<f64>,
        mask: &Array2<f64>,
        gamma: &Array1<f64>,
        units: usize,
        basis: Basis,
        hadamard: bool,
    ) -> MeshResult<Self> {
        if theta.shape() != phi.shape() {
            return Err(MeshError::ParameterShapeMismatch {
                theta: theta.shape().to_vec(),
                phi: phi.shape().to_vec(),
            });
        }
        if mask.shape() != theta.shape() {
            return Err(MeshError::shape("mask", mask.shape(), theta.shape()));
        }
        if gamma.len() != units {
            return Err(MeshError::shape("gamma", gamma.shape(), &[units]));
        }

        let fixed = if hadamard { 0.0 } else { PI };
        let masked = |raw: &Array2<f64>| raw * mask + &mask.mapv(|m| (1.0 - m) * fixed);

        Ok(Self {
            theta: MeshParam::new(masked(theta), units)?,
            phi: MeshParam::new(masked(phi), units)?,
            gamma: gamma.clone(),
            mask: mask.clone(),
            basis,
            input_phase_shift_layer: ComplexPair::from_phase(gamma),
        })
    }

    pub fn theta(&self) -> &MeshParam {
        &self.theta
    }

    pub fn phi(&self) -> &MeshParam {
        &self.phi
    }

    pub fn gamma(&self) -> &Array1<f64> {
        &self.gamma
    }

    pub fn mask(&self) -> &Array2<f64> {
        &self.mask
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    pub fn internal_phase_shifts(&self) -> Array2<f64> {
        match self.basis {
            Basis::Bloch => self.theta.differential_mode_arrangement(),
            Basis::SingleMode => self.theta.single_mode_arrangement(),
        }
    }

    pub fn external_phase_shifts(&self) -> Array2<f64> {
        match self.basis {
            Basis::Bloch | Basis::SingleMode => self.phi.single_mode_arrangement(),
        }
    }

    /// `[2, units, num_layers]`
    pub fn internal_phase_shift_layers(&self) -> ComplexPair {
        ComplexPair::from_phase(&self.internal_phase_shifts())
    }

    /// `[2, units, num_layers]`
    pub fn external_phase_shift_layers(&self) -> ComplexPair {
        ComplexPair::from_phase(&self.external_phase_shifts())
    }

    /// `[2, units]`
    pub fn input_phase_shift_layer(&self) -> &ComplexPair {
        &self.input_phase_shift_layer
    }
}

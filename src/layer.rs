//! The transform/inverse capability shared by every mesh stage.

use ndarray::{Array2, Ix2};
use num_complex::Complex64;

use crate::complex::{from_pair, to_pair, ComplexPair};
use crate::error::{MeshError, MeshResult};

/// A linear stage acting on the last axis of a complex signal.
///
/// `inverse_transform` is the adjoint of `transform` under the stage's
/// coupling model; it is the true inverse whenever the stage is unitary.
pub trait Transformer {
    fn units(&self) -> usize;

    fn transform(&self, inputs: &ComplexPair) -> MeshResult<ComplexPair>;

    fn inverse_transform(&self, outputs: &ComplexPair) -> MeshResult<ComplexPair>;

    fn adjoint_transform(&self, outputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.inverse_transform(outputs)
    }

    /// Transfer matrix `U` with `y = U x` for a column signal `x`.
    fn matrix(&self) -> MeshResult<Array2<Complex64>> {
        transfer_matrix(self.units(), |x| self.transform(x))
    }

    /// Transfer matrix of [`inverse_transform`](Self::inverse_transform).
    fn inverse_matrix(&self) -> MeshResult<Array2<Complex64>> {
        transfer_matrix(self.units(), |x| self.inverse_transform(x))
    }
}

fn transfer_matrix<F>(units: usize, f: F) -> MeshResult<Array2<Complex64>>
where
    F: FnOnce(&ComplexPair) -> MeshResult<ComplexPair>,
{
    // Each identity row is one batch entry, so row b of the output is U e_b.
    let eye = Array2::<Complex64>::eye(units);
    let out = f(&to_pair(&eye))?;
    let rows = from_pair(&out)
        .into_dimensionality::<Ix2>()
        .map_err(|_| MeshError::shape("matrix", out.shape(), &[units, units]))?;
    Ok(rows.t().to_owned())
}

/// Ordered sequence of stages: folds `transform` forward and
/// `inverse_transform` in reverse.
pub struct CompoundLayer<'a> {
    units: usize,
    transformers: Vec<Box<dyn Transformer + 'a>>,
}

impl<'a> CompoundLayer<'a> {
    pub fn new(units: usize, transformers: Vec<Box<dyn Transformer + 'a>>) -> MeshResult<Self> {
        if let Some(bad) = transformers.iter().find(|t| t.units() != units) {
            return Err(MeshError::Dimension {
                expected: units,
                actual: bad.units(),
            });
        }
        Ok(Self {
            units,
            transformers,
        })
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl Transformer for CompoundLayer<'_> {
    fn units(&self) -> usize {
        self.units
    }

    fn transform(&self, inputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.transformers
            .iter()
            .try_fold(inputs.clone(), |outputs, t| t.transform(&outputs))
    }

    fn inverse_transform(&self, outputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.transformers
            .iter()
            .rev()
            .try_fold(outputs.clone(), |inputs, t| t.inverse_transform(&inputs))
    }
}

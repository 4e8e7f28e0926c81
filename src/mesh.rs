//! Mesh construction and the full mesh transform.
//!
//! [`Mesh`] turns a [`MeshModel`] plus the current phases into one
//! [`MeshVerticalLayer`] per layer. [`MeshLayer`] owns the trainable raw
//! parameters and rebuilds those layers on every call, so external updates
//! to `theta`, `phi` or `gamma` always take effect on the next transform.

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use tracing::{debug, trace};

use crate::complex::{add, conj, mul, real_mul, scalar_mul, sub, ComplexPair, Signal};
use crate::error::{MeshError, MeshResult};
use crate::layer::{CompoundLayer, Transformer};
use crate::model::MeshModel;
use crate::permutation::{pairwise_off_diag_permutation, PermutationLayer};
use crate::phases::{MeshParam, MeshPhases};
use crate::vertical::MeshVerticalLayer;

/// Fixed structure of a mesh: wiring and per-path coupling errors.
#[derive(Clone, Debug)]
pub struct Mesh {
    model: MeshModel,
    pairwise_perm_idx: Vec<usize>,
    perm_layers: Vec<PermutationLayer>,
    // Coupling errors spread onto each cell's top path, `[units, num_layers]`.
    enn: Array2<f64>,
    enp: Array2<f64>,
    epn: Array2<f64>,
    epp: Array2<f64>,
}

impl Mesh {
    pub fn new(model: MeshModel) -> MeshResult<Self> {
        let units = model.units();
        let num_layers = model.num_layers();
        if model.perm_idx().len() != num_layers + 1 {
            return Err(MeshError::Config(format!(
                "{} layers need {} permutations, got {}",
                num_layers,
                num_layers + 1,
                model.perm_idx().len()
            )));
        }
        let perm_layers = model
            .perm_idx()
            .iter()
            .map(|perm| PermutationLayer::new(perm.clone()))
            .collect::<MeshResult<Vec<_>>>()?;
        if let Some(perm) = perm_layers.iter().find(|perm| perm.units() != units) {
            return Err(MeshError::Dimension {
                expected: units,
                actual: perm.units(),
            });
        }

        let cells = model.cells();
        if model.mask().shape() != [num_layers, cells] {
            return Err(MeshError::shape("mask", model.mask().shape(), &[num_layers, cells]));
        }
        let errors = model.mzi_errors();
        errors.check_shape(num_layers, cells)?;
        let arrange = |e: &Array2<f64>| -> MeshResult<Array2<f64>> {
            Ok(MeshParam::new(e.clone(), units)?.single_mode_arrangement())
        };
        let (enn, enp, epn, epp) = (
            arrange(&errors.enn)?,
            arrange(&errors.enp)?,
            arrange(&errors.epn)?,
            arrange(&errors.epp)?,
        );

        debug!(
            units,
            num_layers,
            basis = %model.basis(),
            hadamard = model.hadamard(),
            "Built mesh"
        );

        Ok(Self {
            pairwise_perm_idx: pairwise_off_diag_permutation(units),
            perm_layers,
            enn,
            enp,
            epn,
            epp,
            model,
        })
    }

    pub fn model(&self) -> &MeshModel {
        &self.model
    }

    pub fn units(&self) -> usize {
        self.model.units()
    }

    pub fn num_layers(&self) -> usize {
        self.model.num_layers()
    }

    pub fn pairwise_perm_idx(&self) -> &[usize] {
        &self.pairwise_perm_idx
    }

    pub fn perm_layers(&self) -> &[PermutationLayer] {
        &self.perm_layers
    }

    /// Diagonal and off-diagonal coefficients of every layer, each `[2, units, num_layers]`.
    ///
    /// Each cell couples path `2k` (top) with `2k + 1` (bottom). Rolling the
    /// internal phase layers by one path lines the bottom path's phase up with
    /// the top path, so all four scattering terms of every cell come out of a
    /// handful of whole-array products. The bottom-path terms (`s22`, `s12`)
    /// are then rolled back down onto the bottom path.
    pub fn coupling_layers(&self, phases: &MeshPhases) -> MeshResult<(ComplexPair, ComplexPair)> {
        let units = self.units();
        let internal_psl = phases.internal_phase_shift_layers();
        let external_psl = phases.external_phase_shift_layers();
        let internal_next = internal_psl.roll(-1, 0);
        let (enn, enp, epn, epp) = (&self.enn, &self.enp, &self.epn, &self.epp);

        // `e ⊙ ips` and `e ⊙ roll(ips, -1)` for each coefficient tensor.
        let here = |e: &Array2<f64>| real_mul(e, &internal_psl);
        let next = |e: &Array2<f64>| real_mul(e, &internal_next);

        let (s11, s22, s12, s21) = if self.model.hadamard() {
            let s11 = add(&here(epp)?, &next(enn)?)?;
            let s22 = add(&here(enn)?, &next(epp)?)?.roll(1, 0);
            let s12 = sub(&here(enp)?, &next(epn)?)?.roll(1, 0);
            let s21 = sub(&here(epn)?, &next(enp)?)?;
            (s11, s22, s12, s21)
        } else {
            let i = Complex64::i();
            let s11 = sub(&here(epp)?, &next(enn)?)?;
            let s22 = sub(&next(epp)?, &here(enn)?)?.roll(1, 0);
            let s12 = scalar_mul(i, &add(&here(enp)?, &next(epn)?)?.roll(1, 0));
            let s21 = scalar_mul(i, &add(&here(epn)?, &next(enp)?)?);
            (s11, s22, s12, s21)
        };

        let mut diag_layers = mul(&external_psl, &add(&s11, &s22)?)?.scale(0.5);
        let off_diag_layers = mul(&external_psl.roll(1, 0), &add(&s21, &s12)?)?.scale(0.5);

        if units % 2 == 1 {
            // The idle last path passes straight through.
            diag_layers.fill_index(0, units - 1, Complex64::new(1.0, 0.0));
        }

        Ok((diag_layers, off_diag_layers))
    }

    /// One vertical layer per mesh layer. The first layer also applies the
    /// input wiring; later layers rely on the previous layer's output wiring.
    pub fn mesh_layers(&self, phases: &MeshPhases) -> MeshResult<Vec<MeshVerticalLayer<'_>>> {
        let (diag_layers, off_diag_layers) = self.coupling_layers(phases)?;
        let expected = [self.units(), self.num_layers()];
        if diag_layers.shape() != expected {
            return Err(MeshError::shape("mesh_layers", diag_layers.shape(), &expected));
        }

        (0..self.num_layers())
            .map(|layer| {
                trace!(layer, "Building vertical layer");
                let left_perm = if layer == 0 {
                    Some(&self.perm_layers[0])
                } else {
                    None
                };
                MeshVerticalLayer::new(
                    &self.pairwise_perm_idx,
                    diag_layers.index_axis(1, layer),
                    off_diag_layers.index_axis(1, layer),
                    Some(&self.perm_layers[layer + 1]),
                    left_perm,
                )
            })
            .collect()
    }
}

/// Mesh network layer with its raw phase parameters.
///
/// `theta` and `phi` are `[num_layers, units / 2]`, `gamma` is `[units]`.
/// They are public so an optimizer can update them between calls.
#[derive(Clone, Debug)]
pub struct MeshLayer {
    mesh: Mesh,
    pub theta: Array2<f64>,
    pub phi: Array2<f64>,
    pub gamma: Array1<f64>,
}

impl MeshLayer {
    /// Build from a model, starting from the model's initial parameters.
    pub fn new(model: MeshModel) -> MeshResult<Self> {
        let (theta, phi, gamma) = model.init();
        Ok(Self {
            mesh: Mesh::new(model)?,
            theta,
            phi,
            gamma,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn num_layers(&self) -> usize {
        self.mesh.num_layers()
    }

    /// Masked phases for the current parameters.
    pub fn mesh_phases(&self) -> MeshResult<MeshPhases> {
        let model = self.mesh.model();
        MeshPhases::new(
            &self.theta,
            &self.phi,
            model.mask(),
            &self.gamma,
            model.units(),
            model.basis(),
            model.hadamard(),
        )
    }

    /// Snapshot of the parameters with inactive cells zeroed before masking.
    pub fn phases(&self) -> MeshResult<MeshPhases> {
        let model = self.mesh.model();
        let mask = model.mask();
        if self.theta.shape() != mask.shape() || self.phi.shape() != mask.shape() {
            return Err(MeshError::ParameterShapeMismatch {
                theta: self.theta.shape().to_vec(),
                phi: self.phi.shape().to_vec(),
            });
        }
        MeshPhases::new(
            &(&self.theta * mask),
            &(&self.phi * mask),
            mask,
            &self.gamma,
            model.units(),
            model.basis(),
            model.hadamard(),
        )
    }

    /// Forward transform of a native complex array or an explicit pair.
    pub fn transform_signal<S: Signal>(&self, inputs: &S) -> MeshResult<S> {
        S::from_pair(self.transform(&inputs.to_pair())?)
    }

    /// Inverse transform of a native complex array or an explicit pair.
    pub fn inverse_transform_signal<S: Signal>(&self, outputs: &S) -> MeshResult<S> {
        S::from_pair(self.inverse_transform(&outputs.to_pair())?)
    }

    fn check_input(&self, x: &ComplexPair) -> MeshResult<()> {
        let actual = x.shape().last().copied().unwrap_or(0);
        if actual != self.units() {
            return Err(MeshError::Dimension {
                expected: self.units(),
                actual,
            });
        }
        Ok(())
    }

    fn vertical_stack<'a>(&'a self, phases: &MeshPhases) -> MeshResult<CompoundLayer<'a>> {
        let layers = self
            .mesh
            .mesh_layers(phases)?
            .into_iter()
            .map(|layer| Box::new(layer) as Box<dyn Transformer + 'a>)
            .collect();
        CompoundLayer::new(self.units(), layers)
    }
}

impl Transformer for MeshLayer {
    fn units(&self) -> usize {
        self.mesh.units()
    }

    fn transform(&self, inputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.check_input(inputs)?;
        let phases = self.mesh_phases()?;
        let stack = self.vertical_stack(&phases)?;
        debug!(layers = stack.len(), batch = ?inputs.shape(), "Mesh transform");

        let outputs = mul(inputs, phases.input_phase_shift_layer())?;
        stack.transform(&outputs)
    }

    fn inverse_transform(&self, outputs: &ComplexPair) -> MeshResult<ComplexPair> {
        self.check_input(outputs)?;
        let phases = self.mesh_phases()?;
        let stack = self.vertical_stack(&phases)?;
        debug!(layers = stack.len(), batch = ?outputs.shape(), "Mesh inverse transform");

        let inputs = stack.inverse_transform(outputs)?;
        mul(&inputs, &conj(phases.input_phase_shift_layer()))
    }
}

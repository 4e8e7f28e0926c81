//! The mesh model contract: everything the core consumes from the topology layer.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::mzi::MziErrors;
use crate::permutation::PermutationLayer;
use crate::phases::Basis;

/// Immutable description of a mesh: size, activity mask, wiring, coupling
/// errors, basis convention and initial parameters.
///
/// The mask is stored per cell as `[num_layers, units / 2]`, the same
/// orientation as the raw `theta`/`phi` parameters.
#[derive(Clone, Debug)]
pub struct MeshModel {
    units: usize,
    num_layers: usize,
    mask: Array2<f64>,
    perm_idx: Vec<Vec<usize>>,
    errors: MziErrors,
    basis: Basis,
    hadamard: bool,
    theta_init: Array2<f64>,
    phi_init: Array2<f64>,
    gamma_init: Array1<f64>,
}

impl MeshModel {
    /// Fully active mesh with identity wiring, ideal cells and zero phases.
    pub fn new(units: usize, num_layers: usize) -> MeshResult<Self> {
        if units == 0 {
            return Err(MeshError::Config("a mesh needs at least one unit".into()));
        }
        let cells = units / 2;
        Ok(Self {
            units,
            num_layers,
            mask: Array2::ones((num_layers, cells)),
            perm_idx: vec![(0..units).collect(); num_layers + 1],
            errors: MziErrors::ideal(num_layers, cells),
            basis: Basis::default(),
            hadamard: false,
            theta_init: Array2::zeros((num_layers, cells)),
            phi_init: Array2::zeros((num_layers, cells)),
            gamma_init: Array1::zeros(units),
        })
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn cells(&self) -> usize {
        self.units / 2
    }

    /// Set the activity mask, given per cell `[num_layers, units / 2]` or
    /// per path `[units, num_layers]`. A per-path mask is read at each
    /// cell's top path.
    pub fn with_mask(mut self, mask: Array2<f64>) -> MeshResult<Self> {
        if let Some(bad) = mask.iter().find(|&&m| m != 0.0 && m != 1.0) {
            return Err(MeshError::Config(format!("mask entry {} is not 0 or 1", bad)));
        }

        let cells = self.cells();
        self.mask = if mask.shape() == [self.num_layers, cells] {
            mask
        } else if mask.shape() == [self.units, self.num_layers] {
            Array2::from_shape_fn((self.num_layers, cells), |(layer, cell)| {
                mask[[2 * cell, layer]]
            })
        } else {
            return Err(MeshError::shape(
                "mask",
                mask.shape(),
                &[self.num_layers, cells],
            ));
        };
        Ok(self)
    }

    /// Set the `num_layers + 1` wiring permutations.
    pub fn with_perm_idx(mut self, perm_idx: Vec<Vec<usize>>) -> MeshResult<Self> {
        if perm_idx.len() != self.num_layers + 1 {
            return Err(MeshError::Config(format!(
                "expected {} permutations, got {}",
                self.num_layers + 1,
                perm_idx.len()
            )));
        }
        for perm in &perm_idx {
            if perm.len() != self.units {
                return Err(MeshError::InvalidPermutation(format!(
                    "permutation of length {} for {} units",
                    perm.len(),
                    self.units
                )));
            }
            PermutationLayer::new(perm.clone())?;
        }
        self.perm_idx = perm_idx;
        Ok(self)
    }

    pub fn with_errors(mut self, errors: MziErrors) -> MeshResult<Self> {
        errors.check_shape(self.num_layers, self.cells())?;
        self.errors = errors;
        Ok(self)
    }

    pub fn with_basis(mut self, basis: Basis) -> Self {
        self.basis = basis;
        self
    }

    pub fn with_hadamard(mut self, hadamard: bool) -> Self {
        self.hadamard = hadamard;
        self
    }

    /// Set the initial raw parameters returned by [`init`](Self::init).
    pub fn with_init(
        mut self,
        theta: Array2<f64>,
        phi: Array2<f64>,
        gamma: Array1<f64>,
    ) -> MeshResult<Self> {
        let expected = [self.num_layers, self.cells()];
        if theta.shape() != phi.shape() {
            return Err(MeshError::ParameterShapeMismatch {
                theta: theta.shape().to_vec(),
                phi: phi.shape().to_vec(),
            });
        }
        if theta.shape() != expected {
            return Err(MeshError::shape("theta", theta.shape(), &expected));
        }
        if gamma.len() != self.units {
            return Err(MeshError::shape("gamma", gamma.shape(), &[self.units]));
        }
        self.theta_init = theta;
        self.phi_init = phi;
        self.gamma_init = gamma;
        Ok(self)
    }

    pub fn mask(&self) -> &Array2<f64> {
        &self.mask
    }

    pub fn perm_idx(&self) -> &[Vec<usize>] {
        &self.perm_idx
    }

    pub fn mzi_errors(&self) -> &MziErrors {
        &self.errors
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    pub fn hadamard(&self) -> bool {
        self.hadamard
    }

    /// Initial `(theta, phi, gamma)`.
    pub fn init(&self) -> (Array2<f64>, Array2<f64>, Array1<f64>) {
        (
            self.theta_init.clone(),
            self.phi_init.clone(),
            self.gamma_init.clone(),
        )
    }
}

/// Serializable description of a [`MeshModel`]. Omitted fields take the
/// defaults of [`MeshModel::new`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeshModelConfig {
    pub units: usize,
    pub num_layers: usize,
    #[serde(default)]
    pub mask: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub perm_idx: Option<Vec<Vec<usize>>>,
    /// Left/right splitter errors, each `[num_layers][units / 2]`.
    #[serde(default)]
    pub splitter_errors: Option<(Vec<Vec<f64>>, Vec<Vec<f64>>)>,
    #[serde(default)]
    pub basis: Basis,
    #[serde(default)]
    pub hadamard: bool,
    #[serde(default)]
    pub theta: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub phi: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub gamma: Option<Vec<f64>>,
}

impl MeshModelConfig {
    pub fn from_json(json: &str) -> MeshResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> MeshResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> MeshResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> MeshResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Validate and build the model.
    pub fn build(&self) -> MeshResult<MeshModel> {
        let rows = self.num_layers;
        let cells = self.units / 2;
        let mut model = MeshModel::new(self.units, self.num_layers)?
            .with_basis(self.basis)
            .with_hadamard(self.hadamard);

        if let Some(mask) = &self.mask {
            model = model.with_mask(to_array2("mask", mask)?)?;
        }
        if let Some(perm_idx) = &self.perm_idx {
            model = model.with_perm_idx(perm_idx.clone())?;
        }
        if let Some((e_l, e_r)) = &self.splitter_errors {
            let errors = MziErrors::from_splitter_errors(
                &to_array2("splitter_errors", e_l)?,
                &to_array2("splitter_errors", e_r)?,
            )?;
            model = model.with_errors(errors)?;
        }
        if self.theta.is_some() || self.phi.is_some() || self.gamma.is_some() {
            let param = |values: &Option<Vec<Vec<f64>>>, name| match values {
                Some(v) => to_array2(name, v),
                None => Ok(Array2::zeros((rows, cells))),
            };
            let gamma = match &self.gamma {
                Some(g) => Array1::from_vec(g.clone()),
                None => Array1::zeros(self.units),
            };
            model = model.with_init(param(&self.theta, "theta")?, param(&self.phi, "phi")?, gamma)?;
        }
        Ok(model)
    }
}

fn to_array2(name: &'static str, rows: &[Vec<f64>]) -> MeshResult<Array2<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(row) = rows.iter().find(|r| r.len() != ncols) {
        return Err(MeshError::shape(name, &[row.len()], &[ncols]));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), ncols), flat)
        .map_err(|_| MeshError::shape(name, &[rows.len()], &[ncols]))
}

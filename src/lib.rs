//! PhotonMesh: layered MZI mesh simulation
//!
//! Builds the per-layer coupling of a cascaded Mach-Zehnder mesh from raw
//! phase parameters, activity masks and splitter error coefficients, and
//! applies the resulting transform (and its exact adjoint) to batches of
//! complex signals.

pub mod complex;
pub mod error;
pub mod layer;
pub mod mesh;
pub mod model;
pub mod mzi;
pub mod permutation;
pub mod phases;
pub mod vertical;

pub use complex::{ComplexPair, Signal};
pub use error::{MeshError, MeshResult};
pub use layer::{CompoundLayer, Transformer};
pub use mesh::{Mesh, MeshLayer};
pub use model::{MeshModel, MeshModelConfig};
pub use mzi::{MachZehnderInterferometer, MziErrors};
pub use permutation::{pairwise_off_diag_permutation, PermutationLayer};
pub use phases::{Basis, MeshParam, MeshPhases};
pub use vertical::MeshVerticalLayer;

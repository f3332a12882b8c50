//! Spline core: knot vectors, basis evaluation, blossoms and refinement
//! matrices.

pub mod alpha;
pub mod basis;
pub mod blossom;
pub mod deboor;
pub mod knot;
pub mod space;

pub use alpha::AlphaMatrix;
pub use basis::{basis_eval, bezier_basis, BasisDerivs, BasisEvaluator, BasisFuncEval, BlendVector};
pub use blossom::{BlossomContext, OwnedBlend, PolarDir, SymbBlend};
pub use space::SplineSpace;

//! CAGD core: errors, tolerances, and shared traits.

pub mod error;
pub mod tolerance;
pub mod traits;

pub use error::{CagdError, Result};
pub use tolerance::{apx_eq, Tolerance, BASIS_EPS, KNOT_EPS};
pub use traits::Validate;

//! Surface trait and the tensor product surface containers.

mod bezier;
mod bspline;

use cagd_core::Result;
use glam::DVec3;

use crate::points::to_dvec3;

pub use bezier::BezierSurface;
pub use bspline::BsplineSurface;

/// Trait for tensor product parametric surfaces.
pub trait Surface: Send + Sync {
    /// Euclidean point at parameters `(u, v)`.
    fn evaluate(&self, u: f64, v: f64) -> Result<Vec<f64>>;

    /// Return the u-parameter domain `(u_min, u_max)`.
    fn domain_u(&self) -> (f64, f64);

    /// Return the v-parameter domain `(v_min, v_max)`.
    fn domain_v(&self) -> (f64, f64);

    fn point3_at(&self, u: f64, v: f64) -> Result<DVec3> {
        Ok(to_dvec3(&self.evaluate(u, v)?))
    }
}

//! Curve trait and the Bezier / B-spline curve containers.

mod bezier;
mod bspline;

use cagd_core::Result;
use glam::DVec3;

use crate::points::to_dvec3;

pub use bezier::BezierCurve;
pub use bspline::BsplineCurve;

/// Parametric polynomial curves.
pub trait Curve: Send + Sync {
    /// Euclidean point at parameter `t`.
    fn evaluate(&self, t: f64) -> Result<Vec<f64>>;

    /// Return the parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    fn order(&self) -> usize;

    /// Whether the curve is closed (start == end).
    fn is_closed(&self) -> bool {
        false
    }

    /// First three coordinates at `t`.
    fn point3_at(&self, t: f64) -> Result<DVec3> {
        Ok(to_dvec3(&self.evaluate(t)?))
    }
}

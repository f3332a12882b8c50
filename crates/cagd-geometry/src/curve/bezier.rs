//! Bezier curves.

use cagd_core::{CagdError, Result};
use serde::{Deserialize, Serialize};

use super::{BsplineCurve, Curve};
use crate::nurbs::blossom::{crv_blossom_eval, BlossomContext};
use crate::nurbs::deboor;
use crate::points::{project, ControlPoints};

/// A single polynomial segment on `[0, 1]`; its order is the number of
/// control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    points: ControlPoints,
}

impl BezierCurve {
    pub fn new(points: ControlPoints) -> Result<Self> {
        if points.is_empty() {
            return Err(CagdError::InvalidOrder("a Bezier curve needs a control point".into()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &ControlPoints {
        &self.points
    }

    /// Raw blossom at `vals` (fewer than `order` values in `[0, 1]`).
    pub fn blossom_eval(&self, ctx: &mut BlossomContext, vals: &[f64]) -> Result<Vec<f64>> {
        crv_blossom_eval(ctx, &self.points, self.order(), None, vals)
    }

    /// Same curve as a B-spline with an open knot vector on `[0, 1]`.
    pub fn to_bspline(&self) -> Result<BsplineCurve> {
        BsplineCurve::from_bezier(self)
    }

    pub fn degree_raise(&self, new_order: usize) -> Result<Self> {
        crate::raise::bezier_curve_degree_raise_n(self, new_order)
    }
}

impl Curve for BezierCurve {
    fn evaluate(&self, t: f64) -> Result<Vec<f64>> {
        let raw = deboor::bezier_point(&self.points, t)?;
        Ok(project(self.points.ptype(), &raw))
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn order(&self) -> usize {
        self.points.len()
    }
}

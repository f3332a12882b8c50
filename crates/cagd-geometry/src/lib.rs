//! CAGD geometry: knot vectors, B-spline basis, blossoms, degree raising,
//! and the curve and surface containers they operate on.

pub mod curve;
mod mesh;
pub mod nurbs;
pub mod points;
pub mod raise;
pub mod surface;

pub use curve::{BezierCurve, BsplineCurve, Curve};
pub use nurbs::{AlphaMatrix, BasisEvaluator, BlossomContext, SplineSpace};
pub use points::{ControlPoints, Direction, MeshShape, PointType};
pub use raise::{
    bezier_curve_degree_raise_n, bezier_surface_degree_raise_n, curve_degree_raise_n,
    surface_degree_raise_n,
};
pub use surface::{BezierSurface, BsplineSurface, Surface};

//! B-spline curves, rational or not, open, floating or periodic.

use cagd_core::{CagdError, Result, Validate};
use serde::{Deserialize, Serialize};

use super::{BezierCurve, Curve};
use crate::mesh::DirectedMesh;
use crate::nurbs::basis::BasisEvaluator;
use crate::nurbs::blossom::{crv_blossom_eval, BlossomContext};
use crate::nurbs::deboor;
use crate::nurbs::knot;
use crate::nurbs::space::SplineSpace;
use crate::points::{project, ControlPoints, Direction, MeshShape};

/// A B-spline curve: a spline space and one control point per basis
/// function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BsplineCurve {
    space: SplineSpace,
    points: ControlPoints,
}

impl BsplineCurve {
    pub fn new(order: usize, knots: Vec<f64>, points: ControlPoints) -> Result<Self> {
        let space = SplineSpace::new(order, points.len(), false, knots)?;
        Self::from_space(space, points)
    }

    /// A periodic curve; `knots` holds `len + 2 * order - 1` values.
    pub fn new_periodic(order: usize, knots: Vec<f64>, points: ControlPoints) -> Result<Self> {
        let space = SplineSpace::new(order, points.len(), true, knots)?;
        Self::from_space(space, points)
    }

    /// Open uniform knots on `[0, 1]`.
    pub fn uniform_open(order: usize, points: ControlPoints) -> Result<Self> {
        let space = SplineSpace::uniform_open(points.len(), order)?;
        Self::from_space(space, points)
    }

    pub fn from_space(space: SplineSpace, points: ControlPoints) -> Result<Self> {
        if space.length != points.len() {
            return Err(CagdError::LengthMismatch {
                expected: space.length,
                found: points.len(),
            });
        }
        Ok(Self { space, points })
    }

    pub fn from_bezier(bezier: &BezierCurve) -> Result<Self> {
        let space = SplineSpace::bezier(bezier.order())?;
        Self::from_space(space, bezier.points().clone())
    }

    fn mesh(&self) -> DirectedMesh {
        DirectedMesh {
            space: self.space.clone(),
            points: self.points.clone(),
            shape: MeshShape::curve(self.space.length),
            dir: Direction::U,
        }
    }

    pub(crate) fn from_mesh(mesh: DirectedMesh) -> Self {
        Self {
            space: mesh.space,
            points: mesh.points,
        }
    }

    pub(crate) fn into_mesh(self) -> DirectedMesh {
        let shape = MeshShape::curve(self.space.length);
        DirectedMesh {
            space: self.space,
            points: self.points,
            shape,
            dir: Direction::U,
        }
    }

    pub fn space(&self) -> &SplineSpace {
        &self.space
    }

    pub fn points(&self) -> &ControlPoints {
        &self.points
    }

    pub fn length(&self) -> usize {
        self.space.length
    }

    pub fn knots(&self) -> &[f64] {
        &self.space.knots
    }

    pub fn is_periodic(&self) -> bool {
        self.space.periodic
    }

    /// Euclidean point at `t`, reusing the caller's evaluator.
    pub fn evaluate_with(&self, ev: &mut BasisEvaluator, t: f64) -> Result<Vec<f64>> {
        let raw = deboor::curve_point(ev, &self.space, &self.points, t)?;
        Ok(project(self.points.ptype(), &raw))
    }

    /// Euclidean first derivative at `t`.
    pub fn derivative_at(&self, t: f64) -> Result<Vec<f64>> {
        let d = deboor::curve_derivs(&self.space, &self.points, t, 1)?;
        Ok(deboor::euclidean_derivative(
            self.points.is_rational(),
            &d[0],
            &d[1],
        ))
    }

    /// Euclidean point at `t` computed as the diagonal blossom
    /// `b(t, .., t)`.
    pub fn evaluate_by_blossom(&self, ctx: &mut BlossomContext, t: f64) -> Result<Vec<f64>> {
        let float = self.to_float();
        let order = float.space.order;
        let vals = vec![t; order - 1];
        let raw = float
            .points
            .channels()
            .iter()
            .map(|c| ctx.eval(c, 1, order, Some(&float.space.knots), &vals))
            .collect::<Result<Vec<_>>>()?;
        Ok(project(self.points.ptype(), &raw))
    }

    /// Raw blossom at `vals`, computed symbolically.
    pub fn blossom_eval(&self, ctx: &mut BlossomContext, vals: &[f64]) -> Result<Vec<f64>> {
        let float = self.to_float();
        crv_blossom_eval(
            ctx,
            &float.points,
            float.space.order,
            Some(&float.space.knots),
            vals,
        )
    }

    /// The same curve without periodicity.
    pub fn to_float(&self) -> Self {
        if !self.space.periodic {
            return self.clone();
        }
        Self::from_mesh(self.mesh().to_float())
    }

    /// The same curve with open end conditions over the same domain.
    pub fn to_open_end(&self) -> Result<Self> {
        Ok(Self::from_mesh(self.mesh().to_open_end()?))
    }

    /// Insert one knot by Boehm's algorithm.
    pub fn knot_insert(&self, t: f64) -> Result<Self> {
        self.refine(&[t])
    }

    /// Insert every knot of `ts`.
    pub fn refine(&self, ts: &[f64]) -> Result<Self> {
        Ok(Self::from_mesh(self.mesh().knot_insert(ts)?))
    }

    /// Split at the interior parameter `t`.
    pub fn subdivide_at(&self, t: f64) -> Result<(Self, Self)> {
        let (left, right) = self.mesh().to_open_end()?.subdivide(t)?;
        Ok((Self::from_mesh(left), Self::from_mesh(right)))
    }

    /// Join with a curve starting where this one ends, keeping every
    /// control point.
    pub fn merge_at_c0(&self, other: &Self) -> Result<Self> {
        let a = self.mesh().to_open_end()?;
        let b = other.mesh().to_open_end()?;
        Ok(Self::from_mesh(DirectedMesh::merge_c0(&a, &b)?))
    }

    /// The curve as one Bezier segment; fails if it has interior knots.
    pub fn to_bezier(&self) -> Result<BezierCurve> {
        let open = self.to_open_end()?;
        if !open.space.is_bezier() {
            return Err(CagdError::Unsupported(
                "curve has interior knots, split it into segments first".into(),
            ));
        }
        BezierCurve::new(open.points)
    }

    /// One Bezier segment per non-empty knot interval.
    pub fn to_bezier_segments(&self) -> Result<Vec<BezierCurve>> {
        let open = self.to_open_end()?;
        let (order, len) = (open.space.order, open.space.length);
        let mut cuts: Vec<f64> = open.space.knots[order..len].to_vec();
        cuts.dedup_by(|a, b| cagd_core::apx_eq(*a, *b));

        let mut segments = Vec::with_capacity(cuts.len() + 1);
        let mut rest = open;
        for t in cuts {
            let (left, right) = rest.subdivide_at(t)?;
            segments.push(left.to_bezier()?);
            rest = right;
        }
        segments.push(rest.to_bezier()?);
        Ok(segments)
    }

    /// Raise the order to `new_order` without changing the shape.
    pub fn degree_raise(&self, new_order: usize) -> Result<Self> {
        crate::raise::curve_degree_raise_n(self, new_order)
    }
}

impl Curve for BsplineCurve {
    fn evaluate(&self, t: f64) -> Result<Vec<f64>> {
        self.evaluate_with(&mut BasisEvaluator::new(), t)
    }

    fn domain(&self) -> (f64, f64) {
        self.space.domain()
    }

    fn order(&self) -> usize {
        self.space.order
    }

    fn is_closed(&self) -> bool {
        self.space.periodic
    }
}

impl Validate for BsplineCurve {
    fn validate(&self) -> Result<()> {
        knot::check_length(
            &self.space.knots,
            self.space.length,
            self.space.order,
            self.space.periodic,
        )?;
        if self.points.len() != self.space.length {
            return Err(CagdError::LengthMismatch {
                expected: self.space.length,
                found: self.points.len(),
            });
        }
        if self.points.is_rational() && self.points.channel(0).iter().any(|&w| w <= 0.0) {
            return Err(CagdError::Geometry("weights must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glam::DVec3;

    fn wave() -> BsplineCurve {
        BsplineCurve::uniform_open(
            4,
            ControlPoints::from_points3(&[
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(1.0, 2.0, 0.0),
                DVec3::new(2.0, -1.0, 1.0),
                DVec3::new(3.0, 1.0, 0.0),
                DVec3::new(4.0, 0.0, -1.0),
                DVec3::new(5.0, 2.0, 0.0),
            ]),
        )
        .unwrap()
    }

    fn assert_same_shape(a: &impl Curve, b: &impl Curve) {
        let (t0, t1) = a.domain();
        for i in 0..=50 {
            let t = t0 + (t1 - t0) * i as f64 / 50.0;
            let (p, q) = (a.point3_at(t).unwrap(), b.point3_at(t).unwrap());
            assert!((p - q).length() < 1e-10, "mismatch at t = {t}: {p} vs {q}");
        }
    }

    #[test]
    fn test_endpoints_interpolate() {
        let curve = wave();
        assert_eq!(curve.domain(), (0.0, 1.0));
        assert!((curve.point3_at(0.0).unwrap() - DVec3::ZERO).length() < 1e-12);
        assert!((curve.point3_at(1.0).unwrap() - DVec3::new(5.0, 2.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_blossom_matches_evaluation() {
        let curve = wave();
        let mut ctx = BlossomContext::new();
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            let p = curve.evaluate(t).unwrap();
            let q = curve.evaluate_by_blossom(&mut ctx, t).unwrap();
            let r = curve.blossom_eval(&mut ctx, &[t, t, t]).unwrap();
            for k in 0..3 {
                assert_abs_diff_eq!(p[k], q[k], epsilon = 1e-12);
                assert_abs_diff_eq!(p[k], r[k], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let curve = wave();
        let h = 1e-6;
        let d = curve.derivative_at(0.4).unwrap();
        let a = curve.evaluate(0.4 - h).unwrap();
        let b = curve.evaluate(0.4 + h).unwrap();
        for k in 0..3 {
            assert_abs_diff_eq!(d[k], (b[k] - a[k]) / (2.0 * h), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_knot_insert_keeps_shape() {
        let curve = wave();
        let refined = curve.refine(&[0.1, 0.5, 0.5, 0.77]).unwrap();
        assert_eq!(refined.length(), curve.length() + 4);
        assert_same_shape(&curve, &refined);
    }

    #[test]
    fn test_subdivide_then_merge() {
        let curve = wave();
        let (left, right) = curve.subdivide_at(0.6).unwrap();
        assert_eq!(left.domain(), (0.0, 0.6));
        assert_eq!(right.domain(), (0.6, 1.0));
        for t in [0.0, 0.3, 0.6] {
            let p = left.point3_at(t).unwrap();
            assert!((p - curve.point3_at(t).unwrap()).length() < 1e-10);
        }
        let merged = left.merge_at_c0(&right).unwrap();
        assert_same_shape(&curve, &merged);
    }

    #[test]
    fn test_periodic_to_float() {
        let curve = BsplineCurve::new_periodic(
            3,
            knot::uniform_periodic(4, 3).unwrap(),
            ControlPoints::from_points3(&[DVec3::X, DVec3::Y, DVec3::NEG_X, DVec3::NEG_Y]),
        )
        .unwrap();
        assert!(curve.is_closed());
        let start = curve.point3_at(0.0).unwrap();
        let end = curve.point3_at(1.0).unwrap();
        assert!((start - end).length() < 1e-12);

        let float = curve.to_float();
        assert_eq!(float.length(), 6);
        assert_same_shape(&curve, &float);
        let open = curve.to_open_end().unwrap();
        assert!(open.space().is_open_end());
        assert_same_shape(&curve, &open);
    }

    #[test]
    fn test_bezier_round_trip() {
        let bezier = BezierCurve::new(ControlPoints::from_points3(&[
            DVec3::ZERO,
            DVec3::Y,
            DVec3::X,
        ]))
        .unwrap();
        let bspline = BsplineCurve::from_bezier(&bezier).unwrap();
        assert_same_shape(&bezier, &bspline);
        assert_eq!(bspline.to_bezier().unwrap(), bezier);
        assert!(wave().to_bezier().is_err());
    }

    #[test]
    fn test_bezier_segments() {
        let curve = wave();
        let segments = curve.to_bezier_segments().unwrap();
        assert_eq!(segments.len(), 3);
        let p = segments[1].point3_at(0.5).unwrap();
        assert!((p - curve.point3_at(0.5).unwrap()).length() < 1e-10);
    }

    #[test]
    fn test_validate() {
        let curve = wave();
        curve.validate().unwrap();
        assert!(BsplineCurve::new(3, vec![0.0, 1.0], curve.points().clone()).is_err());
    }
}

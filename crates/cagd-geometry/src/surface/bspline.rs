//! Tensor product B-spline surfaces.

use cagd_core::{CagdError, Result, Validate};
use serde::{Deserialize, Serialize};

use super::{BezierSurface, Surface};
use crate::curve::BsplineCurve;
use crate::mesh::DirectedMesh;
use crate::nurbs::basis::BasisEvaluator;
use crate::nurbs::blossom::{srf_blossom_eval, srf_blossom_eval_u, BlossomContext, PolarDir};
use crate::nurbs::deboor;
use crate::nurbs::space::SplineSpace;
use crate::points::{project, ControlPoints, Direction, MeshShape};

/// A B-spline surface. Control point `(i, j)` is stored at `i + j * u_len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BsplineSurface {
    u_space: SplineSpace,
    v_space: SplineSpace,
    points: ControlPoints,
}

impl BsplineSurface {
    pub fn new(u_space: SplineSpace, v_space: SplineSpace, points: ControlPoints) -> Result<Self> {
        let expected = u_space.length * v_space.length;
        if points.len() != expected {
            return Err(CagdError::LengthMismatch {
                expected,
                found: points.len(),
            });
        }
        Ok(Self {
            u_space,
            v_space,
            points,
        })
    }

    /// Open uniform knots on `[0, 1]` in both directions.
    pub fn uniform_open(
        u_order: usize,
        v_order: usize,
        u_len: usize,
        v_len: usize,
        points: ControlPoints,
    ) -> Result<Self> {
        Self::new(
            SplineSpace::uniform_open(u_len, u_order)?,
            SplineSpace::uniform_open(v_len, v_order)?,
            points,
        )
    }

    pub fn from_bezier(bezier: &BezierSurface) -> Result<Self> {
        Self::new(
            SplineSpace::bezier(bezier.u_order())?,
            SplineSpace::bezier(bezier.v_order())?,
            bezier.points().clone(),
        )
    }

    pub fn u_space(&self) -> &SplineSpace {
        &self.u_space
    }

    pub fn v_space(&self) -> &SplineSpace {
        &self.v_space
    }

    pub fn space(&self, dir: Direction) -> &SplineSpace {
        match dir {
            Direction::U => &self.u_space,
            Direction::V => &self.v_space,
        }
    }

    pub fn points(&self) -> &ControlPoints {
        &self.points
    }

    pub fn shape(&self) -> MeshShape {
        MeshShape::new(self.u_space.length, self.v_space.length)
    }

    pub(crate) fn mesh(&self, dir: Direction) -> DirectedMesh {
        DirectedMesh {
            space: self.space(dir).clone(),
            points: self.points.clone(),
            shape: self.shape(),
            dir,
        }
    }

    /// Replace the space of `mesh.dir` and the control mesh.
    pub(crate) fn with_mesh(&self, mesh: DirectedMesh) -> Self {
        let (u_space, v_space) = match mesh.dir {
            Direction::U => (mesh.space, self.v_space.clone()),
            Direction::V => (self.u_space.clone(), mesh.space),
        };
        Self {
            u_space,
            v_space,
            points: mesh.points,
        }
    }

    pub fn evaluate_with(&self, ev: &mut BasisEvaluator, u: f64, v: f64) -> Result<Vec<f64>> {
        let raw = deboor::surface_point(ev, &self.u_space, &self.v_space, &self.points, u, v)?;
        Ok(project(self.points.ptype(), &raw))
    }

    /// Drop periodicity in `dir`.
    pub fn to_float(&self, dir: Direction) -> Self {
        if !self.space(dir).periodic {
            return self.clone();
        }
        self.with_mesh(self.mesh(dir).to_float())
    }

    /// Drop periodicity in both directions.
    pub fn to_float_both(&self) -> Self {
        self.to_float(Direction::U).to_float(Direction::V)
    }

    pub fn to_open_end(&self, dir: Direction) -> Result<Self> {
        Ok(self.with_mesh(self.mesh(dir).to_open_end()?))
    }

    pub fn knot_insert(&self, dir: Direction, t: f64) -> Result<Self> {
        self.refine(dir, &[t])
    }

    pub fn refine(&self, dir: Direction, ts: &[f64]) -> Result<Self> {
        Ok(self.with_mesh(self.mesh(dir).knot_insert(ts)?))
    }

    /// Split along `dir` at the interior parameter `t`.
    pub fn subdivide_at(&self, dir: Direction, t: f64) -> Result<(Self, Self)> {
        let (left, right) = self.mesh(dir).to_open_end()?.subdivide(t)?;
        Ok((self.with_mesh(left), self.with_mesh(right)))
    }

    /// Join with `other` along `dir`, where this surface ends and `other`
    /// begins.
    pub fn merge_at_c0(&self, dir: Direction, other: &Self) -> Result<Self> {
        let a = self.mesh(dir).to_open_end()?;
        let b = other.mesh(dir).to_open_end()?;
        Ok(self.with_mesh(DirectedMesh::merge_c0(&a, &b)?))
    }

    pub fn to_bezier(&self) -> Result<BezierSurface> {
        let open = self.to_open_end(Direction::U)?.to_open_end(Direction::V)?;
        if !open.u_space.is_bezier() || !open.v_space.is_bezier() {
            return Err(CagdError::Unsupported(
                "surface has interior knots, split it into patches first".into(),
            ));
        }
        BezierSurface::new(open.u_space.order, open.v_space.order, open.points)
    }

    /// Raw blossom at `u_vals` and `v_vals`.
    pub fn blossom_eval(
        &self,
        ctx: &mut BlossomContext,
        u_vals: &[f64],
        v_vals: &[f64],
    ) -> Result<Vec<f64>> {
        let float = self.to_float_both();
        srf_blossom_eval(
            ctx,
            &float.points,
            float.u_space.length,
            PolarDir {
                order: float.u_space.order,
                knots: Some(&float.u_space.knots),
                vals: u_vals,
            },
            PolarDir {
                order: float.v_space.order,
                knots: Some(&float.v_space.knots),
                vals: v_vals,
            },
        )
    }

    /// Blossom in U only: the resulting control polygon defines a curve in
    /// V over the surface's V space.
    pub fn blossom_eval_u(&self, ctx: &mut BlossomContext, u_vals: &[f64]) -> Result<BsplineCurve> {
        let float = self.to_float(Direction::U);
        let points = srf_blossom_eval_u(
            ctx,
            &float.points,
            float.u_space.length,
            float.v_space.length,
            PolarDir {
                order: float.u_space.order,
                knots: Some(&float.u_space.knots),
                vals: u_vals,
            },
        )?;
        BsplineCurve::from_space(float.v_space.clone(), points)
    }

    pub fn degree_raise(&self, new_u_order: usize, new_v_order: usize) -> Result<Self> {
        crate::raise::surface_degree_raise_n(self, new_u_order, new_v_order)
    }
}

impl Surface for BsplineSurface {
    fn evaluate(&self, u: f64, v: f64) -> Result<Vec<f64>> {
        self.evaluate_with(&mut BasisEvaluator::new(), u, v)
    }

    fn domain_u(&self) -> (f64, f64) {
        self.u_space.domain()
    }

    fn domain_v(&self) -> (f64, f64) {
        self.v_space.domain()
    }
}

impl Validate for BsplineSurface {
    fn validate(&self) -> Result<()> {
        for space in [&self.u_space, &self.v_space] {
            crate::nurbs::knot::check_length(&space.knots, space.length, space.order, space.periodic)?;
        }
        if self.points.len() != self.shape().total() {
            return Err(CagdError::LengthMismatch {
                expected: self.shape().total(),
                found: self.points.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use glam::DVec3;

    /// 5 x 4 mesh, cubic in U and quadratic in V, height varying.
    fn hill() -> BsplineSurface {
        let mut pts = Vec::new();
        for j in 0..4 {
            for i in 0..5 {
                let z = ((i * j) % 3) as f64 - 0.5 * j as f64;
                pts.push(DVec3::new(i as f64, j as f64, z));
            }
        }
        BsplineSurface::uniform_open(4, 3, 5, 4, ControlPoints::from_points3(&pts)).unwrap()
    }

    fn assert_same_surface(a: &impl Surface, b: &impl Surface) {
        for i in 0..=10 {
            for j in 0..=10 {
                let (u, v) = (i as f64 / 10.0, j as f64 / 10.0);
                let (p, q) = (a.point3_at(u, v).unwrap(), b.point3_at(u, v).unwrap());
                assert!((p - q).length() < 1e-10, "mismatch at ({u}, {v})");
            }
        }
    }

    #[test]
    fn test_corners_interpolate() {
        let srf = hill();
        let p = srf.point3_at(1.0, 1.0).unwrap();
        assert!((p - DVec3::new(4.0, 3.0, srf.points().channel(2)[19])).length() < 1e-12);
        let q = srf.point3_at(0.0, 0.0).unwrap();
        assert!(q.length() < 1e-12);
    }

    #[test]
    fn test_refine_in_each_direction() {
        let srf = hill();
        let u = srf.refine(Direction::U, &[0.3, 0.6]).unwrap();
        assert_eq!(u.shape(), MeshShape::new(7, 4));
        assert_same_surface(&srf, &u);
        let v = srf.knot_insert(Direction::V, 0.25).unwrap();
        assert_eq!(v.shape(), MeshShape::new(5, 5));
        assert_same_surface(&srf, &v);
    }

    #[test]
    fn test_subdivide_and_merge_v() {
        let srf = hill();
        let (low, high) = srf.subdivide_at(Direction::V, 0.5).unwrap();
        assert_eq!(low.domain_v(), (0.0, 0.5));
        let p = low.point3_at(0.3, 0.25).unwrap();
        assert!((p - srf.point3_at(0.3, 0.25).unwrap()).length() < 1e-10);
        let merged = low.merge_at_c0(Direction::V, &high).unwrap();
        assert_same_surface(&srf, &merged);
    }

    #[test]
    fn test_blossom_diagonal() {
        let srf = hill();
        let mut ctx = BlossomContext::new();
        let raw = srf.blossom_eval(&mut ctx, &[0.4; 3], &[0.7; 2]).unwrap();
        let p = srf.evaluate(0.4, 0.7).unwrap();
        for k in 0..3 {
            assert!((raw[k] - p[k]).abs() < 1e-12);
        }

        let iso = srf.blossom_eval_u(&mut ctx, &[0.4; 3]).unwrap();
        let q = iso.evaluate(0.7).unwrap();
        for k in 0..3 {
            assert!((q[k] - p[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bezier_patch_round_trip() {
        let srf = BsplineSurface::uniform_open(
            2,
            2,
            2,
            2,
            ControlPoints::from_points3(&[DVec3::ZERO, DVec3::X, DVec3::Y, DVec3::ONE]),
        )
        .unwrap();
        let patch = srf.to_bezier().unwrap();
        assert_eq!(BsplineSurface::from_bezier(&patch).unwrap(), srf);
        assert!(hill().to_bezier().is_err());
    }
}

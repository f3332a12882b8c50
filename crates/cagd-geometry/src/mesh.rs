//! One direction of a control mesh together with its spline space.
//!
//! Curves and surfaces share the conversions here: a curve is a mesh one row
//! high, and a surface is processed along U or V with the other direction
//! carried through untouched.

use cagd_core::{apx_eq, CagdError, Result};

use crate::nurbs::alpha::AlphaMatrix;
use crate::nurbs::knot;
use crate::nurbs::space::SplineSpace;
use crate::points::{ControlPoints, Direction, MeshShape};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DirectedMesh {
    pub space: SplineSpace,
    pub points: ControlPoints,
    pub shape: MeshShape,
    pub dir: Direction,
}

impl DirectedMesh {
    /// Periodic to floating: repeat the first `order - 1` rows at the end.
    /// The knot vector is already long enough.
    pub fn to_float(&self) -> Self {
        if !self.space.periodic {
            return self.clone();
        }
        let (points, shape) = self
            .points
            .wrap_along(self.shape, self.dir, self.space.order - 1);
        Self {
            space: SplineSpace {
                order: self.space.order,
                length: self.space.length + self.space.order - 1,
                periodic: false,
                knots: self.space.knots.clone(),
            },
            points,
            shape,
            dir: self.dir,
        }
    }

    /// Floating to open end: insert the domain ends to full multiplicity and
    /// drop what lies outside the domain.
    pub fn to_open_end(&self) -> Result<Self> {
        let float = self.to_float();
        if float.space.is_open_end() {
            return Ok(float);
        }
        let SplineSpace {
            order,
            length,
            ref knots,
            ..
        } = float.space;
        let (t_min, t_max) = knot::domain(knots, length, order, false);

        let missing = |t: f64| order.saturating_sub(knot::find_mult(knots, t));
        let mut inserts = vec![t_min; missing(t_min)];
        inserts.extend(std::iter::repeat(t_max).take(missing(t_max)));
        let alpha = AlphaMatrix::knot_insert_n(knots, order, length, &inserts)?;
        let refined = float.refined(&alpha)?;

        let kv = &refined.space.knots;
        let lead = knot::last_index_l(kv, t_min).map_or(0, |i| i + 1);
        let trail = kv.len() - knot::first_index_g(kv, t_max);
        let new_len = refined.space.length - lead - trail;

        let (points, shape) =
            refined
                .points
                .slice_along(refined.shape, refined.dir, lead..lead + new_len);
        Ok(Self {
            space: SplineSpace::new(order, new_len, false, kv[lead..kv.len() - trail].to_vec())?,
            points,
            shape,
            dir: self.dir,
        })
    }

    /// Apply a refinement operator along the mesh direction.
    pub fn refined(&self, alpha: &AlphaMatrix) -> Result<Self> {
        let (points, shape) = alpha.apply_mesh(&self.points, self.shape, self.dir)?;
        Ok(Self {
            space: SplineSpace::new(
                alpha.new_order(),
                alpha.new_length(),
                false,
                alpha.new_kv().to_vec(),
            )?,
            points,
            shape,
            dir: self.dir,
        })
    }

    /// Insert knots `ts` by Boehm's algorithm.
    pub fn knot_insert(&self, ts: &[f64]) -> Result<Self> {
        if self.space.periodic {
            return self.to_float().knot_insert(ts);
        }
        let alpha =
            AlphaMatrix::knot_insert_n(&self.space.knots, self.space.order, self.space.length, ts)?;
        self.refined(&alpha)
    }

    /// Split at the interior parameter `t` of an open-end mesh.
    pub fn subdivide(&self, t: f64) -> Result<(Self, Self)> {
        let (t_min, t_max) = self.space.domain();
        if self.space.periodic
            || !self.space.is_open_end()
            || t <= t_min
            || t >= t_max
            || apx_eq(t, t_min)
            || apx_eq(t, t_max)
        {
            return Err(CagdError::ParamOutOfDomain {
                t,
                min: t_min,
                max: t_max,
            });
        }

        let order = self.space.order;
        let mult = knot::find_mult(&self.space.knots, t);
        let inserts = vec![t; order.saturating_sub(mult)];
        let full = self.knot_insert(&inserts)?;

        let kv = &full.space.knots;
        let p = knot::last_index_l(kv, t).map_or(0, |i| i + 1);
        let len = full.space.length;
        if p == 0 || p >= len {
            return Err(CagdError::Geometry(format!("cannot subdivide at {t}")));
        }

        let (left_pts, left_shape) = full.points.slice_along(full.shape, self.dir, 0..p);
        let (right_pts, right_shape) = full.points.slice_along(full.shape, self.dir, p..len);
        let left = Self {
            space: SplineSpace::new(order, p, false, kv[..p + order].to_vec())?,
            points: left_pts,
            shape: left_shape,
            dir: self.dir,
        };
        let right = Self {
            space: SplineSpace::new(order, len - p, false, kv[p..].to_vec())?,
            points: right_pts,
            shape: right_shape,
            dir: self.dir,
        };
        Ok((left, right))
    }

    /// Join two open-end meshes of equal order where `a` ends and `b`
    /// begins, keeping every control point and a full multiplicity knot at
    /// the seam.
    pub fn merge_c0(a: &Self, b: &Self) -> Result<Self> {
        let order = a.space.order;
        if b.space.order != order || a.dir != b.dir {
            return Err(CagdError::InvalidOrder(format!(
                "cannot merge order {order} with order {}",
                b.space.order
            )));
        }
        if !a.space.is_open_end() || !b.space.is_open_end() {
            return Err(CagdError::InvalidKnotVector("merging expects open end conditions".into()));
        }
        let (_, t) = a.space.domain();
        let (b_min, _) = b.space.domain();
        if !apx_eq(t, b_min) {
            return Err(CagdError::Geometry(format!(
                "curves do not share a parameter: {t} and {b_min}"
            )));
        }

        let mut knots = Vec::with_capacity(a.space.length + b.space.length + order);
        knots.extend_from_slice(&a.space.knots[..a.space.length]);
        knots.extend(std::iter::repeat(t).take(order));
        knots.extend_from_slice(&b.space.knots[order..]);

        let (points, shape) = a.points.concat_along(a.shape, &b.points, b.shape, a.dir)?;
        Ok(Self {
            space: SplineSpace::new(order, a.space.length + b.space.length, false, knots)?,
            points,
            shape,
            dir: a.dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_mesh(space: SplineSpace) -> DirectedMesh {
        let len = space.length;
        let xs = (0..len).map(|i| i as f64).collect();
        DirectedMesh {
            space,
            points: ControlPoints::from_coords(vec![xs]).unwrap(),
            shape: MeshShape::curve(len),
            dir: Direction::U,
        }
    }

    #[test]
    fn test_to_float_wraps_points() {
        let mesh = line_mesh(SplineSpace::uniform_periodic(4, 3).unwrap());
        let float = mesh.to_float();
        assert_eq!(float.space.length, 6);
        assert!(!float.space.periodic);
        assert_eq!(float.points.channel(0), &[0.0, 1.0, 2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn test_to_open_end_keeps_domain() {
        let kv = knot::uniform_float(5, 3).unwrap();
        let mesh = line_mesh(SplineSpace::new(3, 5, false, kv).unwrap());
        let open = mesh.to_open_end().unwrap();
        assert!(open.space.is_open_end());
        assert_eq!(open.space.length, 5);
        assert_eq!(open.space.domain(), mesh.space.domain());
    }

    #[test]
    fn test_subdivide_and_merge() {
        let mesh = line_mesh(SplineSpace::uniform_open(5, 3).unwrap());
        let (left, right) = mesh.subdivide(0.4).unwrap();
        assert_eq!(left.space.domain(), (0.0, 0.4));
        assert_eq!(right.space.domain(), (0.4, 1.0));
        assert_eq!(left.space.length + right.space.length, 5 + 3);

        let merged = DirectedMesh::merge_c0(&left, &right).unwrap();
        assert_eq!(merged.space.length, 8);
        assert_eq!(knot::find_mult(&merged.space.knots, 0.4), 3);
        assert!(DirectedMesh::merge_c0(&right, &left).is_err());
    }

    #[test]
    fn test_subdivide_rejects_ends() {
        let mesh = line_mesh(SplineSpace::uniform_open(4, 3).unwrap());
        assert!(mesh.subdivide(0.0).is_err());
        assert!(mesh.subdivide(1.0).is_err());
    }
}

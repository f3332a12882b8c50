//! Control point storage shared by curves and surfaces.
//!
//! Coefficients are kept per channel (`channels[c][i]`). Rational points keep
//! the weights in channel 0 and weighted coordinates in the others.

use std::ops::Range;

use cagd_core::{CagdError, Result};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Layout of a control point: Euclidean dimension and whether a weight
/// channel leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointType {
    pub rational: bool,
    pub dim: usize,
}

impl PointType {
    /// Euclidean points of dimension `dim`.
    pub const fn e(dim: usize) -> Self {
        Self {
            rational: false,
            dim,
        }
    }

    /// Rational (projective) points of dimension `dim`.
    pub const fn p(dim: usize) -> Self {
        Self {
            rational: true,
            dim,
        }
    }

    pub const fn num_channels(&self) -> usize {
        self.dim + self.rational as usize
    }
}

/// Parametric direction of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    U,
    V,
}

/// Dimensions of a control mesh stored U fastest. A curve is a mesh with
/// `v_len == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshShape {
    pub u_len: usize,
    pub v_len: usize,
}

impl MeshShape {
    pub const fn new(u_len: usize, v_len: usize) -> Self {
        Self { u_len, v_len }
    }

    pub const fn curve(len: usize) -> Self {
        Self { u_len: len, v_len: 1 }
    }

    pub const fn total(&self) -> usize {
        self.u_len * self.v_len
    }

    /// Number of points along `dir`.
    pub const fn along(&self, dir: Direction) -> usize {
        match dir {
            Direction::U => self.u_len,
            Direction::V => self.v_len,
        }
    }

    /// Number of rows across `dir`.
    pub const fn across(&self, dir: Direction) -> usize {
        match dir {
            Direction::U => self.v_len,
            Direction::V => self.u_len,
        }
    }

    pub const fn with_along(&self, dir: Direction, n: usize) -> Self {
        match dir {
            Direction::U => Self::new(n, self.v_len),
            Direction::V => Self::new(self.u_len, n),
        }
    }

    /// Flat index of the point `a` along `dir` in row `b` across it.
    #[inline]
    pub const fn index(&self, dir: Direction, a: usize, b: usize) -> usize {
        match dir {
            Direction::U => a + b * self.u_len,
            Direction::V => b + a * self.u_len,
        }
    }

    /// Offset of row `b` and the stride between consecutive points along
    /// `dir`.
    #[inline]
    pub const fn row(&self, dir: Direction, b: usize) -> (usize, usize) {
        match dir {
            Direction::U => (b * self.u_len, 1),
            Direction::V => (b, self.u_len),
        }
    }
}

/// Control points of a curve or surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoints {
    ptype: PointType,
    channels: Vec<Vec<f64>>,
}

impl ControlPoints {
    pub fn new(ptype: PointType, channels: Vec<Vec<f64>>) -> Result<Self> {
        if ptype.dim == 0 {
            return Err(CagdError::Geometry("point dimension must be positive".into()));
        }
        if channels.len() != ptype.num_channels() {
            return Err(CagdError::LengthMismatch {
                expected: ptype.num_channels(),
                found: channels.len(),
            });
        }
        let len = channels[0].len();
        if let Some(bad) = channels.iter().find(|c| c.len() != len) {
            return Err(CagdError::LengthMismatch {
                expected: len,
                found: bad.len(),
            });
        }
        Ok(Self { ptype, channels })
    }

    /// Euclidean points from coordinate channels.
    pub fn from_coords(coords: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(PointType::e(coords.len()), coords)
    }

    pub fn from_points3(points: &[DVec3]) -> Self {
        Self {
            ptype: PointType::e(3),
            channels: vec![
                points.iter().map(|p| p.x).collect(),
                points.iter().map(|p| p.y).collect(),
                points.iter().map(|p| p.z).collect(),
            ],
        }
    }

    /// Rational points from Euclidean positions and weights; coordinates are
    /// stored premultiplied by their weight.
    pub fn rational_from_points3(points: &[DVec3], weights: &[f64]) -> Result<Self> {
        if points.len() != weights.len() {
            return Err(CagdError::LengthMismatch {
                expected: points.len(),
                found: weights.len(),
            });
        }
        if weights.iter().any(|&w| w <= 0.0) {
            return Err(CagdError::Geometry("weights must be positive".into()));
        }
        let weighted = |axis: usize| -> Vec<f64> {
            points.iter().zip(weights).map(|(p, &w)| p[axis] * w).collect()
        };
        Ok(Self {
            ptype: PointType::p(3),
            channels: vec![weights.to_vec(), weighted(0), weighted(1), weighted(2)],
        })
    }

    pub fn ptype(&self) -> PointType {
        self.ptype
    }

    pub fn is_rational(&self) -> bool {
        self.ptype.rational
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    pub fn channel(&self, c: usize) -> &[f64] {
        &self.channels[c]
    }

    /// Raw coefficients of point `i`, weight first when rational.
    pub fn point(&self, i: usize) -> Vec<f64> {
        self.channels.iter().map(|c| c[i]).collect()
    }

    /// Euclidean position of point `i`.
    pub fn euclidean(&self, i: usize) -> Vec<f64> {
        project(self.ptype, &self.point(i))
    }

    /// New points made of `n` rows along `dir`, row `a` copied from source
    /// row `source(a)`.
    pub(crate) fn gather(
        &self,
        shape: MeshShape,
        dir: Direction,
        n: usize,
        source: impl Fn(usize) -> usize,
    ) -> (Self, MeshShape) {
        let out_shape = shape.with_along(dir, n);
        let channels = self
            .channels
            .iter()
            .map(|src| {
                let mut out = vec![0.0; out_shape.total()];
                for b in 0..shape.across(dir) {
                    for a in 0..n {
                        out[out_shape.index(dir, a, b)] = src[shape.index(dir, source(a), b)];
                    }
                }
                out
            })
            .collect();
        (
            Self {
                ptype: self.ptype,
                channels,
            },
            out_shape,
        )
    }

    /// Rows `range` along `dir`.
    pub fn slice_along(
        &self,
        shape: MeshShape,
        dir: Direction,
        range: Range<usize>,
    ) -> (Self, MeshShape) {
        let start = range.start;
        self.gather(shape, dir, range.len(), |a| start + a)
    }

    /// Append the first `extra` rows along `dir` after the last one.
    pub fn wrap_along(&self, shape: MeshShape, dir: Direction, extra: usize) -> (Self, MeshShape) {
        let n = shape.along(dir);
        self.gather(shape, dir, n + extra, |a| a % n)
    }

    /// Join two meshes along `dir`; their extents across `dir` must agree.
    pub fn concat_along(
        &self,
        shape: MeshShape,
        other: &Self,
        other_shape: MeshShape,
        dir: Direction,
    ) -> Result<(Self, MeshShape)> {
        if self.ptype != other.ptype {
            return Err(CagdError::Geometry("cannot join different point types".into()));
        }
        if shape.across(dir) != other_shape.across(dir) {
            return Err(CagdError::LengthMismatch {
                expected: shape.across(dir),
                found: other_shape.across(dir),
            });
        }
        let n1 = shape.along(dir);
        let out_shape = shape.with_along(dir, n1 + other_shape.along(dir));
        let channels = self
            .channels
            .iter()
            .zip(&other.channels)
            .map(|(c1, c2)| {
                let mut out = vec![0.0; out_shape.total()];
                for b in 0..shape.across(dir) {
                    for a in 0..out_shape.along(dir) {
                        out[out_shape.index(dir, a, b)] = if a < n1 {
                            c1[shape.index(dir, a, b)]
                        } else {
                            c2[other_shape.index(dir, a - n1, b)]
                        };
                    }
                }
                out
            })
            .collect();
        Ok((
            Self {
                ptype: self.ptype,
                channels,
            },
            out_shape,
        ))
    }

    pub(crate) fn from_parts(ptype: PointType, channels: Vec<Vec<f64>>) -> Self {
        Self { ptype, channels }
    }
}

/// Euclidean coordinates of raw point coefficients.
pub fn project(ptype: PointType, raw: &[f64]) -> Vec<f64> {
    if ptype.rational {
        let w = raw[0];
        raw[1..].iter().map(|x| x / w).collect()
    } else {
        raw.to_vec()
    }
}

/// First three coordinates as a `DVec3`, zero padded.
pub fn to_dvec3(coords: &[f64]) -> DVec3 {
    let c = |i: usize| coords.get(i).copied().unwrap_or(0.0);
    DVec3::new(c(0), c(1), c(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (ControlPoints, MeshShape) {
        // 3 x 2 mesh, value = i + 10 j.
        let shape = MeshShape::new(3, 2);
        let values = (0..6).map(|k| (k % 3 + 10 * (k / 3)) as f64).collect();
        (ControlPoints::from_coords(vec![values]).unwrap(), shape)
    }

    #[test]
    fn test_mesh_index() {
        let shape = MeshShape::new(3, 2);
        assert_eq!(shape.index(Direction::U, 2, 1), 5);
        assert_eq!(shape.index(Direction::V, 1, 2), 5);
        assert_eq!(shape.row(Direction::V, 2), (2, 3));
    }

    #[test]
    fn test_slice_along_v() {
        let (pts, shape) = grid();
        let (top, top_shape) = pts.slice_along(shape, Direction::V, 1..2);
        assert_eq!(top_shape, MeshShape::new(3, 1));
        assert_eq!(top.channel(0), &[10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_wrap_along_u() {
        let (pts, shape) = grid();
        let (wrapped, ws) = pts.wrap_along(shape, Direction::U, 2);
        assert_eq!(ws, MeshShape::new(5, 2));
        assert_eq!(
            wrapped.channel(0),
            &[0.0, 1.0, 2.0, 0.0, 1.0, 10.0, 11.0, 12.0, 10.0, 11.0]
        );
    }

    #[test]
    fn test_concat_along_u() {
        let (pts, shape) = grid();
        let (left, ls) = pts.slice_along(shape, Direction::U, 0..1);
        let (right, rs) = pts.slice_along(shape, Direction::U, 1..3);
        let (joined, js) = left.concat_along(ls, &right, rs, Direction::U).unwrap();
        assert_eq!(js, shape);
        assert_eq!(joined, pts);
    }

    #[test]
    fn test_rational_projection() {
        let pts = ControlPoints::rational_from_points3(
            &[DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 0.0, 0.0)],
            &[2.0, 0.5],
        )
        .unwrap();
        assert_eq!(pts.point(0), vec![2.0, 2.0, 4.0, 6.0]);
        assert_eq!(pts.euclidean(0), vec![1.0, 2.0, 3.0]);
        assert_eq!(to_dvec3(&pts.euclidean(1)), DVec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_channel_mismatch() {
        assert!(ControlPoints::new(PointType::e(2), vec![vec![0.0]]).is_err());
        assert!(ControlPoints::from_coords(vec![vec![0.0, 1.0], vec![0.0]]).is_err());
        assert!(ControlPoints::rational_from_points3(&[DVec3::ZERO], &[0.0]).is_err());
    }
}

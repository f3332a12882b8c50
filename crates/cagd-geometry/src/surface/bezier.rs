//! Tensor product Bezier patches.

use cagd_core::{CagdError, Result};
use serde::{Deserialize, Serialize};

use super::{BsplineSurface, Surface};
use crate::nurbs::basis::bezier_basis;
use crate::nurbs::blossom::{srf_blossom_eval, BlossomContext, PolarDir};
use crate::nurbs::deboor::unit_param;
use crate::points::{project, ControlPoints, MeshShape};

/// A Bezier patch on `[0, 1] x [0, 1]` with `u_order * v_order` points,
/// U fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierSurface {
    u_order: usize,
    v_order: usize,
    points: ControlPoints,
}

impl BezierSurface {
    pub fn new(u_order: usize, v_order: usize, points: ControlPoints) -> Result<Self> {
        if u_order == 0 || v_order == 0 {
            return Err(CagdError::InvalidOrder("patch orders must be positive".into()));
        }
        if points.len() != u_order * v_order {
            return Err(CagdError::LengthMismatch {
                expected: u_order * v_order,
                found: points.len(),
            });
        }
        Ok(Self {
            u_order,
            v_order,
            points,
        })
    }

    pub fn u_order(&self) -> usize {
        self.u_order
    }

    pub fn v_order(&self) -> usize {
        self.v_order
    }

    pub fn points(&self) -> &ControlPoints {
        &self.points
    }

    pub fn shape(&self) -> MeshShape {
        MeshShape::new(self.u_order, self.v_order)
    }

    pub fn blossom_eval(
        &self,
        ctx: &mut BlossomContext,
        u_vals: &[f64],
        v_vals: &[f64],
    ) -> Result<Vec<f64>> {
        srf_blossom_eval(
            ctx,
            &self.points,
            self.u_order,
            PolarDir {
                order: self.u_order,
                knots: None,
                vals: u_vals,
            },
            PolarDir {
                order: self.v_order,
                knots: None,
                vals: v_vals,
            },
        )
    }

    pub fn to_bspline(&self) -> Result<BsplineSurface> {
        BsplineSurface::from_bezier(self)
    }

    pub fn degree_raise(&self, new_u_order: usize, new_v_order: usize) -> Result<Self> {
        crate::raise::bezier_surface_degree_raise_n(self, new_u_order, new_v_order)
    }
}

impl Surface for BezierSurface {
    fn evaluate(&self, u: f64, v: f64) -> Result<Vec<f64>> {
        let (u, v) = (unit_param(u)?, unit_param(v)?);
        let bu = bezier_basis(self.u_order, u);
        let bv = bezier_basis(self.v_order, v);
        let raw: Vec<f64> = self
            .points
            .channels()
            .iter()
            .map(|c| {
                bv.iter()
                    .enumerate()
                    .map(|(j, wv)| {
                        let row = &c[j * self.u_order..(j + 1) * self.u_order];
                        wv * bu.iter().zip(row).map(|(wu, x)| wu * x).sum::<f64>()
                    })
                    .sum()
            })
            .collect();
        Ok(project(self.points.ptype(), &raw))
    }

    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }
}

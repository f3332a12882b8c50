//! Degree raising of curves and surfaces.
//!
//! A space is brought into a form the alpha matrix accepts before the
//! matrix is built: periodic spaces are floated, floating ones opened, and
//! spaces with C0 discontinuities are split there, raised piecewise and
//! merged back.

use cagd_core::{CagdError, Result};
use log::debug;

use crate::curve::{BezierCurve, BsplineCurve, Curve};
use crate::mesh::DirectedMesh;
use crate::nurbs::alpha::AlphaMatrix;
use crate::nurbs::blossom::BlossomContext;
use crate::points::Direction;
use crate::surface::{BezierSurface, BsplineSurface};

fn check_target(order: usize, new_order: usize) -> Result<()> {
    if new_order < order {
        return Err(CagdError::InvalidOrder(format!(
            "cannot lower order {order} to {new_order} by degree raising"
        )));
    }
    Ok(())
}

/// Raise the space of `mesh` to `new_order`, contracting every row of the
/// mesh along its direction.
pub(crate) fn raise_directed(
    ctx: &mut BlossomContext,
    mesh: &DirectedMesh,
    new_order: usize,
) -> Result<DirectedMesh> {
    let order = mesh.space.order;
    check_target(order, new_order)?;
    if new_order == order {
        return Ok(mesh.clone());
    }
    if mesh.space.periodic {
        return raise_directed(ctx, &mesh.to_float(), new_order);
    }
    if !mesh.space.is_open_end() {
        return raise_directed(ctx, &mesh.to_open_end()?, new_order);
    }
    if let Some(t) = mesh.space.c0_discont() {
        debug!("splitting order {order} space at C0 discontinuity {t} before raising");
        let (left, right) = mesh.subdivide(t)?;
        let left = raise_directed(ctx, &left, new_order)?;
        let right = raise_directed(ctx, &right, new_order)?;
        return DirectedMesh::merge_c0(&left, &right);
    }

    let space = &mesh.space;
    let alpha =
        AlphaMatrix::degree_raise_n_with(ctx, &space.knots, order, space.length, new_order)?;
    mesh.refined(&alpha)
}

/// Raise a B-spline curve to `new_order`.
pub fn curve_degree_raise_n(curve: &BsplineCurve, new_order: usize) -> Result<BsplineCurve> {
    check_target(curve.order(), new_order)?;
    if new_order == curve.order() {
        return Ok(curve.clone());
    }
    let mut ctx = BlossomContext::new();
    let mesh = curve.clone().into_mesh();
    Ok(BsplineCurve::from_mesh(raise_directed(
        &mut ctx, &mesh, new_order,
    )?))
}

/// Raise a Bezier curve to `new_order`.
pub fn bezier_curve_degree_raise_n(curve: &BezierCurve, new_order: usize) -> Result<BezierCurve> {
    check_target(curve.order(), new_order)?;
    if new_order == curve.order() {
        return Ok(curve.clone());
    }
    curve_degree_raise_n(&curve.to_bspline()?, new_order)?.to_bezier()
}

/// Raise a B-spline surface, U first and then V.
pub fn surface_degree_raise_n(
    srf: &BsplineSurface,
    new_u_order: usize,
    new_v_order: usize,
) -> Result<BsplineSurface> {
    check_target(srf.u_space().order(), new_u_order)?;
    check_target(srf.v_space().order(), new_v_order)?;

    let mut ctx = BlossomContext::new();
    let mut out = srf.clone();
    for (dir, new_order) in [(Direction::U, new_u_order), (Direction::V, new_v_order)] {
        if out.space(dir).order() == new_order {
            continue;
        }
        let raised = raise_directed(&mut ctx, &out.mesh(dir), new_order)?;
        out = out.with_mesh(raised);
    }
    Ok(out)
}

/// Raise a Bezier patch in both directions.
pub fn bezier_surface_degree_raise_n(
    srf: &BezierSurface,
    new_u_order: usize,
    new_v_order: usize,
) -> Result<BezierSurface> {
    surface_degree_raise_n(&srf.to_bspline()?, new_u_order, new_v_order)?.to_bezier()
}

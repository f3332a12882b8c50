//! Evaluation kernels: contract basis values with control coefficients.
//!
//! Results are raw coefficients (weight first when rational); callers
//! project them with [`crate::points::project`].

use cagd_core::{CagdError, Result};

use super::basis::{bezier_basis, eval_derivs, BasisEvaluator};
use super::knot::knot_le;
use super::space::SplineSpace;
use crate::points::ControlPoints;

/// Raw point of a spline curve at `t`.
pub fn curve_point(
    ev: &mut BasisEvaluator,
    space: &SplineSpace,
    points: &ControlPoints,
    t: f64,
) -> Result<Vec<f64>> {
    check_points(space.length, points.len())?;
    let len = space.length;
    let blend = ev.eval(&space.knots, space.order, len, space.periodic, t)?;
    Ok(points
        .channels()
        .iter()
        .map(|c| {
            blend
                .values
                .iter()
                .enumerate()
                .map(|(s, &b)| b * c[(blend.index_first + s) % len])
                .sum()
        })
        .collect())
}

/// Raw derivatives `0..=max_deriv` of a spline curve at `t`, one vector of
/// channel values per derivative order.
pub fn curve_derivs(
    space: &SplineSpace,
    points: &ControlPoints,
    t: f64,
    max_deriv: usize,
) -> Result<Vec<Vec<f64>>> {
    check_points(space.length, points.len())?;
    let len = space.length;
    let basis = eval_derivs(&space.knots, space.order, len, space.periodic, t, max_deriv)?;
    Ok(basis
        .derivs
        .iter()
        .map(|row| {
            points
                .channels()
                .iter()
                .map(|c| {
                    row.iter()
                        .enumerate()
                        .map(|(s, &b)| b * c[(basis.index_first + s) % len])
                        .sum()
                })
                .collect()
        })
        .collect())
}

/// Euclidean first derivative from raw point and raw derivative.
pub fn euclidean_derivative(rational: bool, p: &[f64], dp: &[f64]) -> Vec<f64> {
    if !rational {
        return dp.to_vec();
    }
    let (w, dw) = (p[0], dp[0]);
    p[1..]
        .iter()
        .zip(&dp[1..])
        .map(|(x, dx)| (dx * w - x * dw) / (w * w))
        .collect()
}

/// Check `t` against the Bezier domain `[0, 1]` within the knot epsilon
/// and clamp it into the interval.
pub(crate) fn unit_param(t: f64) -> Result<f64> {
    if !(knot_le(0.0, t) && knot_le(t, 1.0)) {
        return Err(CagdError::ParamOutOfDomain {
            t,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(t.clamp(0.0, 1.0))
}

/// Raw point of a Bezier curve at `t` in `[0, 1]`.
pub fn bezier_point(points: &ControlPoints, t: f64) -> Result<Vec<f64>> {
    let t = unit_param(t)?;
    let basis = bezier_basis(points.len(), t);
    Ok(points
        .channels()
        .iter()
        .map(|c| basis.iter().zip(c).map(|(b, x)| b * x).sum())
        .collect())
}

/// Raw point of a tensor product surface at `(u, v)`; the mesh is stored U
/// fastest.
pub fn surface_point(
    ev: &mut BasisEvaluator,
    u_space: &SplineSpace,
    v_space: &SplineSpace,
    points: &ControlPoints,
    u: f64,
    v: f64,
) -> Result<Vec<f64>> {
    let (u_len, v_len) = (u_space.length, v_space.length);
    check_points(u_len * v_len, points.len())?;
    let bu = ev
        .eval(&u_space.knots, u_space.order, u_len, u_space.periodic, u)?
        .to_eval();
    let bv = ev.eval(&v_space.knots, v_space.order, v_len, v_space.periodic, v)?;

    Ok(points
        .channels()
        .iter()
        .map(|c| {
            let mut sum = 0.0;
            for (sv, &wv) in bv.values.iter().enumerate() {
                let j = (bv.index_first + sv) % v_len;
                for (su, &wu) in bu.values.iter().enumerate() {
                    let i = (bu.index_first + su) % u_len;
                    sum += wu * wv * c[i + j * u_len];
                }
            }
            sum
        })
        .collect())
}

fn check_points(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(CagdError::LengthMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::project;
    use approx::assert_abs_diff_eq;
    use glam::DVec3;

    #[test]
    fn test_quadratic_bezier_midpoint() {
        let space = SplineSpace::bezier(3).unwrap();
        let points = ControlPoints::from_points3(&[
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(0.5, 1.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
        ]);
        let mut ev = BasisEvaluator::new();
        let p = curve_point(&mut ev, &space, &points, 0.5).unwrap();
        assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 0.5, epsilon = 1e-12);
        let q = bezier_point(&points, 0.5).unwrap();
        assert_abs_diff_eq!(q[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bezier_domain_tolerates_knot_eps() {
        let points = ControlPoints::from_coords(vec![vec![0.0, 1.0, 2.0]]).unwrap();
        let end = bezier_point(&points, 1.0 + 1e-12).unwrap();
        assert_abs_diff_eq!(end[0], 2.0, epsilon = 1e-12);
        let start = bezier_point(&points, -1e-12).unwrap();
        assert_abs_diff_eq!(start[0], 0.0, epsilon = 1e-12);
        assert!(bezier_point(&points, 1.0 + 1e-8).is_err());

        let mut ev = BasisEvaluator::new();
        let spline = curve_point(&mut ev, &SplineSpace::bezier(3).unwrap(), &points, 1.0 + 1e-12)
            .unwrap();
        assert_abs_diff_eq!(spline[0], end[0], epsilon = 1e-12);
    }

    #[test]
    fn test_rational_quarter_circle() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let space = SplineSpace::bezier(3).unwrap();
        let points = ControlPoints::rational_from_points3(
            &[DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y],
            &[1.0, w, 1.0],
        )
        .unwrap();
        let mut ev = BasisEvaluator::new();
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            let p = project(points.ptype(), &curve_point(&mut ev, &space, &points, t).unwrap());
            assert_abs_diff_eq!(p[0].hypot(p[1]), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_line_derivative() {
        let space = SplineSpace::bezier(2).unwrap();
        let points = ControlPoints::from_points3(&[DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0)]);
        let d = curve_derivs(&space, &points, 0.3, 1).unwrap();
        assert_abs_diff_eq!(d[1][0], 2.0, epsilon = 1e-12);
        assert_eq!(euclidean_derivative(false, &d[0], &d[1]), d[1]);
    }

    #[test]
    fn test_bilinear_surface() {
        let space = SplineSpace::bezier(2).unwrap();
        let points = ControlPoints::from_coords(vec![vec![0.0, 1.0, 2.0, 3.0]]).unwrap();
        let mut ev = BasisEvaluator::new();
        let p = surface_point(&mut ev, &space, &space, &points, 0.5, 0.5).unwrap();
        assert_abs_diff_eq!(p[0], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        let space = SplineSpace::bezier(3).unwrap();
        let points = ControlPoints::from_points3(&[DVec3::ZERO, DVec3::X]);
        let mut ev = BasisEvaluator::new();
        assert!(curve_point(&mut ev, &space, &points, 0.5).is_err());
    }
}

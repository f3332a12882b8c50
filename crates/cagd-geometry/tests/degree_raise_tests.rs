use approx::assert_abs_diff_eq;
use cagd_core::{CagdError, Validate};
use cagd_geometry::nurbs::{basis_eval, knot};
use cagd_geometry::{
    bezier_curve_degree_raise_n, bezier_surface_degree_raise_n, curve_degree_raise_n,
    surface_degree_raise_n, AlphaMatrix, BezierCurve, BezierSurface, BsplineCurve,
    BsplineSurface, ControlPoints, Curve, SplineSpace, Surface,
};
use glam::DVec3;

const SAMPLES: usize = 50;

fn assert_same_curve(a: &impl Curve, b: &impl Curve) {
    let (t0, t1) = a.domain();
    assert_eq!(a.domain(), b.domain());
    for i in 0..=SAMPLES {
        let t = t0 + (t1 - t0) * i as f64 / SAMPLES as f64;
        let (p, q) = (a.point3_at(t).unwrap(), b.point3_at(t).unwrap());
        assert!((p - q).length() < 1e-9, "curves differ at t = {t}: {p} vs {q}");
    }
}

fn assert_same_surface(a: &impl Surface, b: &impl Surface) {
    let (u0, u1) = a.domain_u();
    let (v0, v1) = a.domain_v();
    for i in 0..=10 {
        for j in 0..=10 {
            let u = u0 + (u1 - u0) * i as f64 / 10.0;
            let v = v0 + (v1 - v0) * j as f64 / 10.0;
            let (p, q) = (a.point3_at(u, v).unwrap(), b.point3_at(u, v).unwrap());
            assert!((p - q).length() < 1e-9, "surfaces differ at ({u}, {v})");
        }
    }
}

fn spiral(n: usize) -> Vec<DVec3> {
    (0..n)
        .map(|i| {
            let a = i as f64 * 0.9;
            DVec3::new(a.cos() * (1.0 + 0.1 * i as f64), a.sin(), 0.3 * i as f64)
        })
        .collect()
}

#[test]
fn test_basis_partition_of_unity() {
    let kv = vec![0.0, 0.0, 0.0, 0.0, 0.1, 0.4, 0.4, 0.8, 1.0, 1.0, 1.0, 1.0];
    for i in 0..=SAMPLES {
        let t = i as f64 / SAMPLES as f64;
        let basis = basis_eval(&kv, 4, 8, false, t).unwrap();
        let sum: f64 = basis.values.iter().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_cubic_bezier_basis_at_half() {
    let basis = basis_eval(&[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], 4, 4, false, 0.5).unwrap();
    assert_eq!(basis.index_first, 0);
    for (v, e) in basis.values.iter().zip([0.125, 0.375, 0.375, 0.125]) {
        assert_abs_diff_eq!(*v, e, epsilon = 1e-14);
    }
}

#[test]
fn test_uniform_open_and_c0_discont() {
    let kv = knot::uniform_open(5, 3).unwrap();
    let expected = [0.0, 0.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0, 1.0];
    for (k, e) in kv.iter().zip(expected) {
        assert_abs_diff_eq!(*k, e, epsilon = 1e-14);
    }
    let kv = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
    assert_eq!(knot::c0_discont(&kv, 3, 6), Some(1.0));
}

#[test]
fn test_raise_open_curve() {
    let curve = BsplineCurve::uniform_open(4, ControlPoints::from_points3(&spiral(7))).unwrap();
    for new_order in [5, 6, 8] {
        let raised = curve_degree_raise_n(&curve, new_order).unwrap();
        assert_eq!(raised.order(), new_order);
        raised.validate().unwrap();
        assert_same_curve(&curve, &raised);
    }
}

#[test]
fn test_raise_rational_curve() {
    let w = std::f64::consts::FRAC_1_SQRT_2;
    let points = ControlPoints::rational_from_points3(
        &[
            DVec3::X,
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::Y,
            DVec3::new(-1.0, 1.0, 0.0),
            DVec3::NEG_X,
        ],
        &[1.0, w, 1.0, w, 1.0],
    )
    .unwrap();
    let kv = vec![0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0];
    let arc = BsplineCurve::new(3, kv, points).unwrap();
    let raised = arc.degree_raise(5).unwrap();
    assert_same_curve(&arc, &raised);
    for i in 0..=SAMPLES {
        let p = raised.point3_at(i as f64 / SAMPLES as f64).unwrap();
        assert_abs_diff_eq!(p.length(), 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_raise_periodic_curve() {
    let curve = BsplineCurve::new_periodic(
        3,
        knot::uniform_periodic(5, 3).unwrap(),
        ControlPoints::from_points3(&spiral(5)),
    )
    .unwrap();
    let raised = curve_degree_raise_n(&curve, 5).unwrap();
    assert!(!raised.is_periodic());
    assert!(raised.space().is_open_end());
    assert_same_curve(&curve, &raised);
}

#[test]
fn test_raise_float_curve() {
    let space = SplineSpace::new(3, 6, false, knot::uniform_float(6, 3).unwrap()).unwrap();
    let curve = BsplineCurve::from_space(space, ControlPoints::from_points3(&spiral(6))).unwrap();
    let raised = curve_degree_raise_n(&curve, 4).unwrap();
    assert!(raised.space().is_open_end());
    assert_same_curve(&curve, &raised);
}

#[test]
fn test_raise_curve_with_c0_corner() {
    // A continuous polyline-like quadratic with a full multiplicity knot.
    let kv = vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 1.0, 1.0, 1.0];
    let points = ControlPoints::from_points3(&[
        DVec3::ZERO,
        DVec3::new(1.0, 1.0, 0.0),
        DVec3::new(2.0, 0.0, 0.0),
        DVec3::new(2.0, 0.0, 0.0),
        DVec3::new(3.0, -2.0, 0.0),
        DVec3::new(4.0, 0.0, 1.0),
    ]);
    let curve = BsplineCurve::new(3, kv, points).unwrap();
    let raised = curve_degree_raise_n(&curve, 5).unwrap();
    assert_eq!(knot::find_mult(raised.knots(), 0.5), 5);
    assert_same_curve(&curve, &raised);
}

#[test]
fn test_raise_bezier_curve() {
    let line = BezierCurve::new(ControlPoints::from_coords(vec![vec![0.0, 1.0]]).unwrap()).unwrap();
    let quad = bezier_curve_degree_raise_n(&line, 3).unwrap();
    let xs = quad.points().channel(0);
    for (x, e) in xs.iter().zip([0.0, 0.5, 1.0]) {
        assert_abs_diff_eq!(*x, e, epsilon = 1e-14);
    }

    let cubic = BezierCurve::new(ControlPoints::from_points3(&spiral(4))).unwrap();
    let raised = cubic.degree_raise(7).unwrap();
    assert_eq!(raised.order(), 7);
    assert_same_curve(&cubic, &raised);
}

#[test]
fn test_fused_matrix_matches_steps() {
    let kv = vec![0.0, 0.0, 0.0, 0.2, 0.7, 1.0, 1.0, 1.0];
    let fused = AlphaMatrix::degree_raise_n(&kv, 3, 5, 6).unwrap();
    let mut stepwise = AlphaMatrix::identity(&kv, 3, 5).unwrap();
    for _ in 3..6 {
        let step = AlphaMatrix::degree_raise(
            stepwise.new_kv(),
            stepwise.new_order(),
            stepwise.new_length(),
        )
        .unwrap();
        stepwise = AlphaMatrix::compose(&stepwise, &step).unwrap();
    }
    assert_eq!(fused.new_kv(), stepwise.new_kv());
    for l in 0..fused.new_length() {
        assert_abs_diff_eq!(fused.row_sum(l), 1.0, epsilon = 1e-12);
        for c in 0..fused.length() {
            assert_abs_diff_eq!(fused.get(l, c), stepwise.get(l, c), epsilon = 1e-12);
        }
    }
}

#[test]
fn test_raise_surface() {
    let mut pts = Vec::new();
    for j in 0..4 {
        for i in 0..5 {
            let (x, y) = (i as f64, j as f64);
            pts.push(DVec3::new(x, y, (x * 0.7).sin() * (y * 0.5).cos()));
        }
    }
    let srf = BsplineSurface::uniform_open(3, 2, 5, 4, ControlPoints::from_points3(&pts)).unwrap();
    let raised = surface_degree_raise_n(&srf, 5, 4).unwrap();
    assert_eq!(raised.u_space().order(), 5);
    assert_eq!(raised.v_space().order(), 4);
    raised.validate().unwrap();
    assert_same_surface(&srf, &raised);

    let u_only = srf.degree_raise(4, 2).unwrap();
    assert_eq!(u_only.v_space(), srf.v_space());
    assert_same_surface(&srf, &u_only);
}

#[test]
fn test_raise_bezier_surface() {
    let patch = BezierSurface::new(
        2,
        3,
        ControlPoints::from_points3(&[
            DVec3::ZERO,
            DVec3::X,
            DVec3::new(0.0, 0.5, 1.0),
            DVec3::new(1.0, 0.5, -1.0),
            DVec3::Y,
            DVec3::new(1.0, 1.0, 0.5),
        ]),
    )
    .unwrap();
    let raised = bezier_surface_degree_raise_n(&patch, 4, 4).unwrap();
    assert_eq!((raised.u_order(), raised.v_order()), (4, 4));
    assert_same_surface(&patch, &raised);
}

#[test]
fn test_lower_target_is_an_error() {
    let curve = BsplineCurve::uniform_open(4, ControlPoints::from_points3(&spiral(6))).unwrap();
    assert!(matches!(
        curve_degree_raise_n(&curve, 3),
        Err(CagdError::InvalidOrder(_))
    ));
}

#[test]
fn test_serde_round_trip() {
    let curve = BsplineCurve::uniform_open(3, ControlPoints::from_points3(&spiral(5))).unwrap();
    let raised = curve.degree_raise(4).unwrap();
    let json = serde_json::to_string(&raised).unwrap();
    let back: BsplineCurve = serde_json::from_str(&json).unwrap();
    assert_eq!(back, raised);
}

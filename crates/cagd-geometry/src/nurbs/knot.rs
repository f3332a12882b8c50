//! Knot vector utilities: search, domain and validity checks, generators,
//! multiplicity editing, merging, node estimation and continuity analysis.
//!
//! A knot vector is a plain non-decreasing `&[f64]`. Functions that need the
//! number of control points take it explicitly as `len`; the stored length is
//! `len + order`, or `len + 2 * order - 1` for periodic spaces.

use cagd_core::{apx_eq, CagdError, Result, Tolerance};

#[inline]
pub(crate) fn knot_le(k: f64, t: f64) -> bool {
    k < t || apx_eq(k, t)
}

#[inline]
fn knot_lt(k: f64, t: f64) -> bool {
    k < t && !apx_eq(k, t)
}

#[inline]
fn knot_gt(k: f64, t: f64) -> bool {
    k > t && !apx_eq(k, t)
}

/// Number of leading knots of `kv` that coincide with `t`.
fn run_length(kv: &[f64], t: f64) -> usize {
    kv.iter().take_while(|&&k| apx_eq(k, t)).count()
}

/// Coarse halving search followed by a linear scan.
///
/// Returns the number of leading knots satisfying `pred`, which must be
/// monotone (true on a prefix of the vector).
fn count_prefix(kv: &[f64], pred: impl Fn(f64) -> bool) -> usize {
    let len = kv.len();
    let mut i = 0;
    let mut step = len >> 1;

    while step > 2 {
        if pred(kv[i + step]) {
            i += step;
        }
        step >>= 1;
    }

    // The halving pass cannot resolve epsilon ties, the scan does.
    while i < len && pred(kv[i]) {
        i += 1;
    }
    i
}

/// Index of the last knot less than or equal to `t` (epsilon-tolerant).
///
/// Returns `None` if `t` precedes the first knot.
pub fn last_index_le(kv: &[f64], t: f64) -> Option<usize> {
    count_prefix(kv, |k| knot_le(k, t)).checked_sub(1)
}

/// Index of the last knot strictly less than `t` (epsilon-tolerant).
pub fn last_index_l(kv: &[f64], t: f64) -> Option<usize> {
    count_prefix(kv, |k| knot_lt(k, t)).checked_sub(1)
}

/// Index of the first knot strictly greater than `t`, scanning from the end.
///
/// Returns `kv.len()` if no knot is greater than `t`.
pub fn first_index_g(kv: &[f64], t: f64) -> usize {
    let mut i = kv.len();
    while i > 0 && knot_gt(kv[i - 1], t) {
        i -= 1;
    }
    i
}

/// Check that `kv` has the stored length a space of `len` control points of
/// the given `order` requires.
pub fn check_length(kv: &[f64], len: usize, order: usize, periodic: bool) -> Result<()> {
    if order == 0 {
        return Err(CagdError::InvalidOrder("order must be at least 1".into()));
    }
    if !periodic && len < order {
        return Err(CagdError::InvalidOrder(format!(
            "{len} control points cannot support order {order}"
        )));
    }
    let expected = if periodic {
        len + 2 * order - 1
    } else {
        len + order
    };
    if kv.len() != expected {
        return Err(CagdError::LengthMismatch {
            expected,
            found: kv.len(),
        });
    }
    Ok(())
}

fn has_open_start(kv: &[f64], order: usize) -> bool {
    let first = kv[0];
    kv[1..order].iter().all(|&k| apx_eq(k, first))
}

fn has_open_end(kv: &[f64], len: usize, order: usize) -> bool {
    let last = kv[len + order - 1];
    kv[len..len + order - 1].iter().all(|&k| apx_eq(k, last))
}

/// True iff the first `order` knots coincide and the last `order` knots
/// coincide.
pub fn has_open_ec(kv: &[f64], len: usize, order: usize) -> bool {
    if order == 0 || kv.len() < len + order {
        return false;
    }
    has_open_start(kv, order) && has_open_end(kv, len, order)
}

/// Open-ended with no interior knots.
pub fn has_bezier_kv(kv: &[f64], len: usize, order: usize) -> bool {
    len == order && has_open_ec(kv, len, order)
}

/// Parametric domain `(t_min, t_max)` of the function space.
///
/// # Panics
///
/// If `order == 0` or `kv` has fewer than `len + order` knots. Use
/// [`check_length`] first on unvalidated input.
pub fn domain(kv: &[f64], len: usize, order: usize, periodic: bool) -> (f64, f64) {
    let end = if periodic { len + order - 1 } else { len };
    (kv[order - 1], kv[end])
}

fn checked_domain(kv: &[f64], len: usize, order: usize, periodic: bool) -> Option<(f64, f64)> {
    if order == 0 || kv.len() < len + order {
        return None;
    }
    Some(domain(kv, len, order, periodic))
}

/// Whether `t` lies in the domain, inclusive and epsilon-tolerant.
///
/// A knot vector too short for `len` and `order` has no domain.
pub fn param_in_domain(kv: &[f64], len: usize, order: usize, periodic: bool, t: f64) -> bool {
    match checked_domain(kv, len, order, periodic) {
        Some((t_min, t_max)) => knot_le(t_min, t) && knot_le(t, t_max),
        None => false,
    }
}

/// Fail with [`CagdError::ParamOutOfDomain`] unless `t` is in the domain.
pub fn ensure_param_in_domain(
    kv: &[f64],
    len: usize,
    order: usize,
    periodic: bool,
    t: f64,
) -> Result<()> {
    let Some((min, max)) = checked_domain(kv, len, order, periodic) else {
        return Err(CagdError::InvalidKnotVector(format!(
            "{} knots cannot hold {len} points of order {order}",
            kv.len()
        )));
    };
    if knot_le(min, t) && knot_le(t, max) {
        Ok(())
    } else {
        Err(CagdError::ParamOutOfDomain { t, min, max })
    }
}

/// Repair a nearly valid knot vector in place.
///
/// Near-equal or slightly inverted neighbours are made equal, end knot
/// multiplicities above `order` are nudged apart, and the result is checked
/// for monotonicity. Returns `false` when the input is not even approximately
/// non-decreasing.
pub fn verify_kv_validity(kv: &mut [f64], order: usize, len: usize, tol: Tolerance) -> bool {
    let n = len + order;
    if order == 0 || len < order || kv.len() < n {
        return false;
    }
    let kv = &mut kv[..n];
    let mut repaired = false;

    for i in 1..n {
        if kv[i] != kv[i - 1] && (kv[i] < kv[i - 1] || tol.knot_eq(kv[i], kv[i - 1])) {
            if kv[i - 1] - kv[i] >= tol.knot {
                return false;
            }
            kv[i] = kv[i - 1];
            repaired = true;
        }
    }

    let start_mult = run_length_exact(kv.iter());
    if start_mult > order {
        let excess = start_mult - order;
        let base = kv[0];
        for (j, k) in kv[..excess].iter_mut().enumerate() {
            *k = base - (excess - j) as f64 * tol.knot;
        }
        repaired = true;
    }

    let end_mult = run_length_exact(kv.iter().rev());
    if end_mult > order {
        let excess = end_mult - order;
        let base = kv[n - 1];
        for j in 0..excess {
            kv[n - 1 - j] = base + (excess - j) as f64 * tol.knot;
        }
        repaired = true;
    }

    if repaired {
        log::warn!("knot vector of order {order} and length {len} was repaired");
    }

    kv.windows(2).all(|w| w[0] <= w[1]) && kv[order - 1] < kv[len]
}

fn run_length_exact<'a>(mut it: impl Iterator<Item = &'a f64>) -> usize {
    match it.next() {
        Some(&first) => 1 + it.take_while(|&&k| k == first).count(),
        None => 0,
    }
}

/// Snap epsilon-equal neighbours to exact equality.
///
/// Returns `false` if the vector decreases by more than the knot epsilon.
pub fn make_robust_kv(kv: &mut [f64]) -> bool {
    for i in 1..kv.len() {
        if apx_eq(kv[i], kv[i - 1]) {
            kv[i] = kv[i - 1];
        } else if kv[i] < kv[i - 1] {
            return false;
        }
    }
    true
}

fn check_generator_args(len: usize, order: usize) -> Result<()> {
    if order == 0 || len < order {
        return Err(CagdError::InvalidOrder(format!(
            "cannot build a knot vector of order {order} for {len} control points"
        )));
    }
    Ok(())
}

/// Uniform open (clamped) knot vector over `[0, 1]`.
pub fn uniform_open(len: usize, order: usize) -> Result<Vec<f64>> {
    check_generator_args(len, order)?;
    let segments = (len - order + 1) as f64;
    let mut kv = Vec::with_capacity(len + order);
    kv.extend(std::iter::repeat(0.0).take(order));
    kv.extend((1..=len - order).map(|i| i as f64 / segments));
    kv.extend(std::iter::repeat(1.0).take(order));
    Ok(kv)
}

/// Uniform floating knot vector whose domain is `[0, 1]`.
pub fn uniform_float(len: usize, order: usize) -> Result<Vec<f64>> {
    check_generator_args(len, order)?;
    let segments = (len - order + 1) as f64;
    Ok((0..len + order)
        .map(|i| (i as f64 - (order - 1) as f64) / segments)
        .collect())
}

/// Uniform periodic knot vector of `len + 2 * order - 1` knots, domain `[0, 1]`.
pub fn uniform_periodic(len: usize, order: usize) -> Result<Vec<f64>> {
    if order == 0 || len == 0 {
        return Err(CagdError::InvalidOrder(format!(
            "cannot build a periodic knot vector of order {order} for {len} control points"
        )));
    }
    Ok((0..len + 2 * order - 1)
        .map(|i| (i as f64 - (order - 1) as f64) / len as f64)
        .collect())
}

/// Open knot vector whose interior knots all have multiplicity `order - 1`,
/// splitting the space into independent Bezier-like segments.
pub fn discont_uniform_open(len: usize, order: usize) -> Result<Vec<f64>> {
    check_generator_args(len, order)?;
    if order < 2 || (len - order) % (order - 1) != 0 {
        return Err(CagdError::InvalidKnotVector(format!(
            "{len} control points cannot be split evenly into segments of order {order}"
        )));
    }
    let interior = (len - order) / (order - 1);
    let segments = (interior + 1) as f64;
    let mut kv = Vec::with_capacity(len + order);
    kv.extend(std::iter::repeat(0.0).take(order));
    for i in 1..=interior {
        kv.extend(std::iter::repeat(i as f64 / segments).take(order - 1));
    }
    kv.extend(std::iter::repeat(1.0).take(order));
    Ok(kv)
}

/// Insert one copy of `t`, after any knots equal to it.
pub fn insert_one(kv: &[f64], t: f64) -> Vec<f64> {
    let at = last_index_le(kv, t).map_or(0, |i| i + 1);
    let mut out = Vec::with_capacity(kv.len() + 1);
    out.extend_from_slice(&kv[..at]);
    out.push(t);
    out.extend_from_slice(&kv[at..]);
    out
}

/// Multiplicity of `t`: knots coinciding with `t`, counted from the first
/// knot not less than `t`.
pub fn find_mult(kv: &[f64], t: f64) -> usize {
    let start = last_index_l(kv, t).map_or(0, |i| i + 1);
    run_length(&kv[start..], t)
}

/// New knot vector in which `t` has multiplicity exactly `mult`.
///
/// Adds or removes copies as needed. Returns the new vector together with
/// the new control point count `len + mult - find_mult(kv, t)`.
pub fn insert_mult(
    kv: &[f64],
    order: usize,
    len: usize,
    t: f64,
    mult: usize,
) -> Result<(Vec<f64>, usize)> {
    ensure_param_in_domain(kv, len, order, false, t)?;
    if mult > order {
        return Err(CagdError::InvalidKnot(format!(
            "multiplicity {mult} exceeds order {order}"
        )));
    }
    let current = find_mult(kv, t);
    let start = last_index_l(kv, t).map_or(0, |i| i + 1);

    let mut out = Vec::with_capacity(kv.len() + mult);
    out.extend_from_slice(&kv[..start]);
    out.extend(std::iter::repeat(t).take(mult));
    out.extend_from_slice(&kv[start + current..]);

    let new_len = (len + mult).checked_sub(current).ok_or_else(|| {
        CagdError::InvalidKnot(format!("removing knot {t} leaves no control points"))
    })?;
    Ok((out, new_len))
}

/// Knots of `kv1` that are not in `kv2`, with multiplicity.
///
/// Both inputs must be sorted; typically they are the interior knots of two
/// curves and the result is what must be refined into the first to match the
/// second.
pub fn subtr_two(kv1: &[f64], kv2: &[f64]) -> Vec<f64> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();

    while i < kv1.len() && j < kv2.len() {
        if apx_eq(kv1[i], kv2[j]) {
            i += 1;
            j += 1;
        } else if kv1[i] > kv2[j] {
            j += 1;
        } else {
            out.push(kv1[i]);
            i += 1;
        }
    }
    out.extend_from_slice(&kv1[i..]);
    out
}

/// Sorted union of two knot vectors.
///
/// Coinciding knots appear once per pair; no value appears more than `mult`
/// times unless `mult` is zero.
pub fn merge_two(kv1: &[f64], kv2: &[f64], mult: usize) -> Vec<f64> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(kv1.len() + kv2.len());

    let push = |out: &mut Vec<f64>, t: f64| {
        if mult > 0 && out.len() >= mult && out[out.len() - mult..].iter().all(|&k| apx_eq(k, t)) {
            return;
        }
        out.push(t);
    };

    while i < kv1.len() && j < kv2.len() {
        let t = if apx_eq(kv1[i], kv2[j]) {
            i += 1;
            j += 1;
            kv1[i - 1]
        } else if kv1[i] < kv2[j] {
            i += 1;
            kv1[i - 1]
        } else {
            j += 1;
            kv2[j - 1]
        };
        push(&mut out, t);
    }
    for &t in kv1[i..].iter().chain(&kv2[j..]) {
        push(&mut out, t);
    }
    out
}

/// Continuity (number of continuous derivatives) of an order-`order` space
/// at a knot of multiplicity `mult`. Absent knots are infinitely smooth.
fn continuity_at(order: usize, mult: usize) -> isize {
    if mult == 0 {
        isize::MAX / 2
    } else {
        order as isize - 1 - mult as isize
    }
}

/// Union of two knot vectors for a space of order `res_order` that keeps, at
/// every knot, the lower of the two input continuities.
///
/// Both inputs are expected to share a domain; each may belong to a
/// different order.
pub fn continuity_merge_two(
    kv1: &[f64],
    order1: usize,
    kv2: &[f64],
    order2: usize,
    res_order: usize,
) -> Vec<f64> {
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();

    while i < kv1.len() || j < kv2.len() {
        let t = match (kv1.get(i), kv2.get(j)) {
            (Some(&a), Some(&b)) => {
                if apx_eq(a, b) || a < b {
                    a
                } else {
                    b
                }
            }
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => break,
        };
        let m1 = run_length(&kv1[i..], t);
        let m2 = run_length(&kv2[j..], t);
        i += m1;
        j += m2;

        let c = continuity_at(order1, m1).min(continuity_at(order2, m2));
        let mult = (res_order as isize - 1 - c).clamp(0, res_order as isize) as usize;
        out.extend(std::iter::repeat(t).take(mult));
    }
    out
}

/// Sliding averages of `ave_len` consecutive knots; `kv.len() - ave_len + 1`
/// values.
pub fn average(kv: &[f64], ave_len: usize) -> Result<Vec<f64>> {
    if ave_len == 0 || ave_len > kv.len() {
        return Err(CagdError::InvalidKnotVector(format!(
            "cannot average {ave_len} of {} knots",
            kv.len()
        )));
    }
    let n = kv.len() - ave_len + 1;
    let mut out = Vec::with_capacity(n);
    let mut sum: f64 = kv[..ave_len].iter().sum();
    out.push(sum / ave_len as f64);
    for i in 1..n {
        sum += kv[i + ave_len - 1] - kv[i - 1];
        out.push(sum / ave_len as f64);
    }
    Ok(out)
}

/// Node (Greville) parameters, one per control point, clamped to the domain.
pub fn nodes(kv: &[f64], len: usize, order: usize) -> Result<Vec<f64>> {
    check_length(kv, len, order, false)?;
    let (t_min, t_max) = domain(kv, len, order, false);
    let raw = if order == 1 {
        kv.windows(2).take(len).map(|w| 0.5 * (w[0] + w[1])).collect()
    } else {
        average(&kv[1..len + order - 1], order - 1)?
    };
    Ok(raw.into_iter().map(|t| t.clamp(t_min, t_max)).collect())
}

/// Node parameters of a periodic space, wrapped into the domain.
pub fn periodic_nodes(kv: &[f64], len: usize, order: usize) -> Result<Vec<f64>> {
    check_length(kv, len, order, true)?;
    let (t_min, t_max) = domain(kv, len, order, true);
    let period = t_max - t_min;
    let raw = if order == 1 {
        kv.windows(2).take(len).map(|w| 0.5 * (w[0] + w[1])).collect()
    } else {
        average(&kv[1..len + order - 1], order - 1)?
    };
    Ok(raw
        .into_iter()
        .map(|t| {
            if t < t_min && !apx_eq(t, t_min) {
                t + period
            } else if t > t_max && !apx_eq(t, t_max) {
                t - period
            } else {
                t
            }
        })
        .collect())
}

/// Refine by inserting the midpoint of every non-degenerate domain interval.
///
/// Returns the refined vector and its control point count.
pub fn double_knots(kv: &[f64], len: usize, order: usize) -> Result<(Vec<f64>, usize)> {
    check_length(kv, len, order, false)?;
    let mids: Vec<f64> = kv[order - 1..=len]
        .windows(2)
        .filter(|w| !apx_eq(w[0], w[1]))
        .map(|w| 0.5 * (w[0] + w[1]))
        .collect();
    let new_len = len + mids.len();
    Ok((merge_two(kv, &mids, 0), new_len))
}

/// Knot vector of the same space raised to `new_order`: every distinct knot
/// gains `new_order - order` copies, capped at `new_order`.
pub fn degree_raised_kv(kv: &[f64], len: usize, order: usize, new_order: usize) -> Result<Vec<f64>> {
    check_length(kv, len, order, false)?;
    if new_order < order {
        return Err(CagdError::InvalidOrder(format!(
            "cannot raise order {order} to {new_order}"
        )));
    }
    let extra = new_order - order;
    let mut out = Vec::with_capacity(kv.len() * 2);
    let mut i = 0;
    while i < kv.len() {
        let t = kv[i];
        let mult = run_length(&kv[i..], t);
        out.extend(std::iter::repeat(t).take((mult + extra).min(new_order)));
        i += mult;
    }
    Ok(out)
}

/// Scale every knot by `scale`.
pub fn scale(kv: &mut [f64], scale: f64) {
    kv.iter_mut().for_each(|k| *k *= scale);
}

/// Scale about the first knot, then translate.
pub fn affine_trans(kv: &mut [f64], translate: f64, scale: f64) {
    let Some(&first) = kv.first() else {
        return;
    };
    for k in kv.iter_mut() {
        *k = (*k - first) * scale + first + translate;
    }
}

/// Map the domain of the space affinely onto `[min, max]`.
pub fn affine_trans_to(kv: &mut [f64], len: usize, order: usize, min: f64, max: f64) -> Result<()> {
    check_length(kv, len, order, false)?;
    let (t_min, t_max) = domain(kv, len, order, false);
    if apx_eq(t_min, t_max) {
        return Err(CagdError::InvalidKnotVector("degenerate domain".into()));
    }
    let s = (max - min) / (t_max - t_min);
    for k in kv.iter_mut() {
        *k = (*k - t_min) * s + min;
    }
    Ok(())
}

/// A run of coinciding interior knots.
#[derive(Debug, Clone, Copy, PartialEq)]
struct KnotRun {
    start: usize,
    mult: usize,
    value: f64,
}

/// Run-length encode the interior knots `kv[order..len]`.
fn interior_runs(kv: &[f64], order: usize, len: usize) -> Vec<KnotRun> {
    let mut runs = Vec::new();
    if len <= order || kv.len() < len {
        return runs;
    }
    let interior = &kv[order..len];
    let mut i = 0;
    while i < interior.len() {
        let value = interior[i];
        let mult = run_length(&interior[i..], value);
        runs.push(KnotRun {
            start: order + i,
            mult,
            value,
        });
        i += mult;
    }
    runs
}

fn threshold(order: usize, drop: usize) -> usize {
    order.saturating_sub(drop).max(1)
}

fn all_discont(kv: &[f64], order: usize, len: usize, drop: usize) -> Vec<f64> {
    let min_mult = threshold(order, drop);
    interior_runs(kv, order, len)
        .into_iter()
        .filter(|r| r.mult >= min_mult)
        .map(|r| r.value)
        .collect()
}

/// Search runs outward from the one covering the middle of the knot
/// vector; the first qualifying run wins, the right neighbour before the
/// left one at equal distance.
fn discont(kv: &[f64], order: usize, len: usize, drop: usize) -> Option<f64> {
    let min_mult = threshold(order, drop);
    let runs = interior_runs(kv, order, len);
    if runs.is_empty() {
        return None;
    }
    let center = (order + len) / 2;
    let mid = runs
        .iter()
        .position(|r| r.start + r.mult > center)
        .unwrap_or(runs.len() - 1);

    for d in 0..runs.len() {
        let right = mid + d;
        if right < runs.len() && runs[right].mult >= min_mult {
            return Some(runs[right].value);
        }
        if d > 0 {
            if let Some(left) = mid.checked_sub(d) {
                if runs[left].mult >= min_mult {
                    return Some(runs[left].value);
                }
            }
        }
    }
    None
}

/// A parameter where the space is not even C0 (multiplicity `>= order`).
pub fn c0_discont(kv: &[f64], order: usize, len: usize) -> Option<f64> {
    discont(kv, order, len, 0)
}

/// A parameter where the space is not C1 (multiplicity `>= order - 1`).
pub fn c1_discont(kv: &[f64], order: usize, len: usize) -> Option<f64> {
    discont(kv, order, len, 1)
}

/// A parameter where the space is not C2 (multiplicity `>= order - 2`).
pub fn c2_discont(kv: &[f64], order: usize, len: usize) -> Option<f64> {
    discont(kv, order, len, 2)
}

/// Every C0 discontinuity, left to right.
pub fn all_c0_discont(kv: &[f64], order: usize, len: usize) -> Vec<f64> {
    all_discont(kv, order, len, 0)
}

/// Every C1 discontinuity, left to right.
pub fn all_c1_discont(kv: &[f64], order: usize, len: usize) -> Vec<f64> {
    all_discont(kv, order, len, 1)
}

/// Every C2 discontinuity, left to right.
pub fn all_c2_discont(kv: &[f64], order: usize, len: usize) -> Vec<f64> {
    all_discont(kv, order, len, 2)
}

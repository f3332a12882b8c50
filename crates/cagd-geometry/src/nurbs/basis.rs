//! Cox–de Boor evaluation of the non-zero B-spline basis functions.
//!
//! At most `order` basis functions are non-zero at any parameter. They are
//! returned together with the index of the first one.

use cagd_core::{apx_eq, Result, Tolerance};

use super::knot;

/// Highest derivative order the batch evaluator computes.
pub const MAX_DERIV: usize = 3;

/// Non-zero basis values borrowed from a [`BasisEvaluator`].
///
/// The view is invalidated by the next evaluation on the same evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendVector<'a> {
    pub index_first: usize,
    pub values: &'a [f64],
}

impl BlendVector<'_> {
    pub fn to_eval(&self) -> BasisFuncEval {
        BasisFuncEval {
            index_first: self.index_first,
            values: self.values.to_vec(),
        }
    }
}

/// Owned non-zero basis values at one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisFuncEval {
    pub index_first: usize,
    pub values: Vec<f64>,
}

/// Basis values and derivatives at one parameter.
///
/// `derivs[d][s]` is the `d`-th derivative of basis function
/// `index_first + s` (wrapped for periodic spaces).
#[derive(Debug, Clone, PartialEq)]
pub struct BasisDerivs {
    pub index_first: usize,
    pub derivs: Vec<Vec<f64>>,
}

/// Basis evaluator owning its scratch buffer.
///
/// The buffer grows to the largest order seen and is reused across calls.
#[derive(Debug, Default)]
pub struct BasisEvaluator {
    buf: Vec<f64>,
}

impl BasisEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn scratch(&mut self, size: usize) -> &mut [f64] {
        if self.buf.len() < size {
            self.buf.resize(size, 0.0);
        }
        let buf = &mut self.buf[..size];
        buf.fill(0.0);
        buf
    }

    /// Evaluate the non-zero basis functions of the space at `t`.
    pub fn eval(
        &mut self,
        kv: &[f64],
        order: usize,
        len: usize,
        periodic: bool,
        t: f64,
    ) -> Result<BlendVector<'_>> {
        knot::check_length(kv, len, order, periodic)?;
        knot::ensure_param_in_domain(kv, len, order, periodic, t)?;
        let (t_min, t_max) = knot::domain(kv, len, order, periodic);

        if !periodic && knot::has_bezier_kv(kv, len, order) {
            let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
            bernstein_into(self.scratch(order), u);
            return Ok(BlendVector {
                index_first: 0,
                values: &self.buf[..order],
            });
        }

        if !periodic && apx_eq(t, t_max) && kv[len..].iter().all(|&k| apx_eq(k, t_max)) {
            self.scratch(order)[order - 1] = 1.0;
            return Ok(BlendVector {
                index_first: len - order,
                values: &self.buf[..order],
            });
        }

        let t = if periodic && apx_eq(t, t_max) { t_min } else { t };
        let idx = span_index(kv, len, order, periodic, t);
        cox_de_boor_into(self.scratch(order + 1), kv, order, idx, t);

        let mut index_first = idx + 1 - order;
        if periodic {
            index_first %= len;
        }
        Ok(BlendVector {
            index_first,
            values: &self.buf[..order],
        })
    }

    /// Evaluate the basis at many parameters.
    pub fn eval_many(
        &mut self,
        kv: &[f64],
        order: usize,
        len: usize,
        periodic: bool,
        params: &[f64],
    ) -> Result<Vec<BasisFuncEval>> {
        params
            .iter()
            .map(|&t| Ok(self.eval(kv, order, len, periodic, t)?.to_eval()))
            .collect()
    }
}

/// Evaluate the basis at `t` with a temporary evaluator.
pub fn basis_eval(
    kv: &[f64],
    order: usize,
    len: usize,
    periodic: bool,
    t: f64,
) -> Result<BasisFuncEval> {
    let mut evaluator = BasisEvaluator::new();
    let blend = evaluator.eval(kv, order, len, periodic, t)?;
    Ok(blend.to_eval())
}

/// Bernstein basis of the given order at `t` in `[0, 1]`.
pub fn bezier_basis(order: usize, t: f64) -> Vec<f64> {
    let mut out = vec![0.0; order];
    bernstein_into(&mut out, t);
    out
}

fn bernstein_into(out: &mut [f64], u: f64) {
    let n = out.len();
    if n == 0 {
        return;
    }
    let u1 = 1.0 - u;
    out.fill(0.0);
    out[0] = 1.0;
    for k in 1..n {
        for j in (1..=k).rev() {
            out[j] = out[j] * u1 + out[j - 1] * u;
        }
        out[0] *= u1;
    }
}

/// Index `i` of the knot span `[kv[i], kv[i + 1])` holding `t`, clamped to
/// the spans of the domain.
pub(crate) fn span_index(kv: &[f64], len: usize, order: usize, periodic: bool, t: f64) -> usize {
    let last = if periodic { len + order - 2 } else { len - 1 };
    knot::last_index_le(kv, t)
        .unwrap_or(order - 1)
        .clamp(order - 1, last)
}

#[inline]
fn ratio(num: f64, den: f64) -> f64 {
    if Tolerance::DEFAULT.is_degenerate(den) {
        0.0
    } else {
        num / den
    }
}

/// Raise the basis from order 1 to `order` in place.
///
/// `buf[s]` holds function `idx - order + 1 + s`; `buf[order]` stays zero so
/// the last function never reads past its support.
fn cox_de_boor_into(buf: &mut [f64], kv: &[f64], order: usize, idx: usize, t: f64) {
    buf[order - 1] = 1.0;
    for k in 2..=order {
        raise_level(buf, kv, order, idx, t, k);
    }
}

fn raise_level(buf: &mut [f64], kv: &[f64], order: usize, idx: usize, t: f64, k: usize) {
    for s in order - k..order {
        let f = idx + 1 + s - order;
        let left = ratio(t - kv[f], kv[f + k - 1] - kv[f]) * buf[s];
        let right = ratio(kv[f + k] - t, kv[f + k] - kv[f + 1]) * buf[s + 1];
        buf[s] = left + right;
    }
}

/// Basis values and derivatives up to `max_deriv` at `t`.
///
/// Every basis level from order 1 to `order` is kept; derivative `d` of the
/// order-`k` basis is formed from derivative `d - 1` of the order-`k - 1`
/// basis over the same index window.
pub fn eval_derivs(
    kv: &[f64],
    order: usize,
    len: usize,
    periodic: bool,
    t: f64,
    max_deriv: usize,
) -> Result<BasisDerivs> {
    knot::check_length(kv, len, order, periodic)?;
    knot::ensure_param_in_domain(kv, len, order, periodic, t)?;
    let max_deriv = max_deriv.min(MAX_DERIV);
    let (t_min, t_max) = knot::domain(kv, len, order, periodic);
    let t = if periodic && apx_eq(t, t_max) { t_min } else { t };
    let idx = span_index(kv, len, order, periodic, t);

    let mut levels = Vec::with_capacity(order);
    let mut buf = vec![0.0; order + 1];
    buf[order - 1] = 1.0;
    levels.push(buf.clone());
    for k in 2..=order {
        raise_level(&mut buf, kv, order, idx, t, k);
        levels.push(buf.clone());
    }

    let mut derivs = Vec::with_capacity(max_deriv + 1);
    for d in 0..=max_deriv {
        if d >= order {
            derivs.push(vec![0.0; order]);
            continue;
        }
        let mut cur = levels[order - d - 1].clone();
        for k in order - d + 1..=order {
            cur = derive_level(&cur, kv, order, idx, k);
        }
        cur.truncate(order);
        derivs.push(cur);
    }

    let mut index_first = idx + 1 - order;
    if periodic {
        index_first %= len;
    }
    Ok(BasisDerivs {
        index_first,
        derivs,
    })
}

/// One derivative step: from derivative `d - 1` at order `k - 1` to
/// derivative `d` at order `k`.
fn derive_level(lower: &[f64], kv: &[f64], order: usize, idx: usize, k: usize) -> Vec<f64> {
    let mut out = vec![0.0; order + 1];
    let scale = (k - 1) as f64;
    for s in order - k..order {
        let f = idx + 1 + s - order;
        let left = ratio(lower[s], kv[f + k - 1] - kv[f]);
        let right = ratio(lower[s + 1], kv[f + k] - kv[f + 1]);
        out[s] = scale * (left - right);
    }
    out
}

/// [`eval_derivs`] at many parameters.
pub fn eval_derivs_many(
    kv: &[f64],
    order: usize,
    len: usize,
    periodic: bool,
    params: &[f64],
    max_deriv: usize,
) -> Result<Vec<BasisDerivs>> {
    params
        .iter()
        .map(|&t| eval_derivs(kv, order, len, periodic, t, max_deriv))
        .collect()
}

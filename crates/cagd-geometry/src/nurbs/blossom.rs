//! Blossom (polar form) evaluation.
//!
//! The blossom of an order-`k` spline at `k - 1` values is computed by the
//! de Boor recursion with a different parameter at every level. Spline knot
//! vectors select the polynomial piece holding the smallest blossom value
//! (the last piece when that value is the right end of the domain).
//!
//! Two flavours are provided: a numeric one working on control
//! coefficients, and a symbolic one returning the blend of the original
//! control points that produces the blossom. The symbolic flavour remembers
//! its last call and answers repeated identical requests from the memo.

use cagd_core::{apx_eq, CagdError, Result, Tolerance};

use super::basis::span_index;
use super::knot;
use crate::points::ControlPoints;

/// Blend of original control points, borrowed from a [`BlossomContext`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbBlend<'a> {
    pub index_first: usize,
    pub values: &'a [f64],
}

impl SymbBlend<'_> {
    /// Dot product of the blend with a strided coefficient array.
    pub fn contract(&self, coefs: &[f64], stride: usize) -> f64 {
        self.values
            .iter()
            .enumerate()
            .map(|(s, &w)| w * coefs[(self.index_first + s) * stride])
            .sum()
    }

    pub fn to_owned_blend(&self) -> OwnedBlend {
        OwnedBlend {
            index_first: self.index_first,
            values: self.values.to_vec(),
        }
    }
}

/// Owned copy of a [`SymbBlend`].
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedBlend {
    pub index_first: usize,
    pub values: Vec<f64>,
}

impl OwnedBlend {
    pub fn as_blend(&self) -> SymbBlend<'_> {
        SymbBlend {
            index_first: self.index_first,
            values: &self.values,
        }
    }
}

/// One symbolic recursion row: coefficients over the local control points
/// and the inclusive range that may be non-zero.
#[derive(Debug, Clone, Default)]
struct SymbRow {
    coef: Vec<f64>,
    min: usize,
    max: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct MemoKey {
    order: usize,
    knots: Option<Vec<f64>>,
    vals: Vec<f64>,
}

impl MemoKey {
    fn matches(&self, order: usize, knots: Option<&[f64]>, vals: &[f64]) -> bool {
        self.order == order && self.knots.as_deref() == knots && self.vals == vals
    }
}

/// Scratch state and last-call memo for blossom evaluation.
///
/// Each logical thread of control owns its own context; a context is never
/// shared, so the memo cannot be invalidated behind a caller's back.
#[derive(Debug, Default)]
pub struct BlossomContext {
    rows: Vec<SymbRow>,
    scratch: Vec<f64>,
    memo: Option<MemoKey>,
    result: Vec<f64>,
    result_first: usize,
    span_hint: Option<usize>,
    memo_hits: usize,
}

impl BlossomContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of symbolic calls answered from the memo.
    pub fn memo_hits(&self) -> usize {
        self.memo_hits
    }

    /// Numeric blossom of the coefficients `pts[i * step]`.
    ///
    /// `knots == None` means a Bezier segment, blending with the values
    /// directly.
    pub fn eval(
        &mut self,
        pts: &[f64],
        step: usize,
        order: usize,
        knots: Option<&[f64]>,
        vals: &[f64],
    ) -> Result<f64> {
        validate(order, knots, vals)?;
        let span = self.locate_span(order, knots, vals);
        let first = span + 1 - order;

        let needed = (first + order - 1) * step + 1;
        if step == 0 || pts.len() < needed {
            return Err(CagdError::LengthMismatch {
                expected: needed,
                found: pts.len(),
            });
        }

        if self.scratch.len() < order {
            self.scratch.resize(order, 0.0);
        }
        let work = &mut self.scratch[..order];
        for (s, w) in work.iter_mut().enumerate() {
            *w = pts[(first + s) * step];
        }

        for (r, &u) in vals.iter().enumerate() {
            for s in (r + 1..order).rev() {
                let alpha = blend_alpha(knots, order, span, r, s, u);
                work[s] = (1.0 - alpha) * work[s - 1] + alpha * work[s];
            }
        }
        Ok(work[order - 1])
    }

    /// Symbolic blossom: which original control points, with what weights,
    /// produce the blossom at `vals`.
    pub fn eval_symb(
        &mut self,
        order: usize,
        knots: Option<&[f64]>,
        vals: &[f64],
    ) -> Result<SymbBlend<'_>> {
        if self
            .memo
            .as_ref()
            .is_some_and(|key| key.matches(order, knots, vals))
        {
            self.memo_hits += 1;
            return Ok(SymbBlend {
                index_first: self.result_first,
                values: &self.result,
            });
        }

        validate(order, knots, vals)?;
        let span = self.locate_span(order, knots, vals);
        let first = span + 1 - order;

        self.reset_rows(order);
        for (r, &u) in vals.iter().enumerate() {
            for s in (r + 1..order).rev() {
                let alpha = blend_alpha(knots, order, span, r, s, u);
                blend_rows(&mut self.rows, s, alpha);
            }
        }

        let last = &self.rows[order - 1];
        self.result.clear();
        self.result.extend_from_slice(&last.coef[last.min..=last.max]);
        self.result_first = first + last.min;
        self.memo = Some(MemoKey {
            order,
            knots: knots.map(<[f64]>::to_vec),
            vals: vals.to_vec(),
        });

        Ok(SymbBlend {
            index_first: self.result_first,
            values: &self.result,
        })
    }

    fn reset_rows(&mut self, order: usize) {
        if self.rows.len() < order {
            self.rows.resize_with(order, SymbRow::default);
        }
        for (i, row) in self.rows[..order].iter_mut().enumerate() {
            row.coef.clear();
            row.coef.resize(order, 0.0);
            row.coef[i] = 1.0;
            row.min = i;
            row.max = i;
        }
    }

    /// Span `j` of the piece `[kv[j], kv[j + 1])` used for the recursion.
    ///
    /// Sorted values start from the previous span and walk to the answer;
    /// anything else is searched from scratch. Both give the same span.
    fn locate_span(&mut self, order: usize, knots: Option<&[f64]>, vals: &[f64]) -> usize {
        let Some(kv) = knots else {
            return order - 1;
        };
        let len = kv.len() - order;
        let sorted = vals.windows(2).all(|w| w[0] <= w[1]);
        let u_min = if sorted {
            vals.first().copied()
        } else {
            vals.iter().copied().reduce(f64::min)
        };
        let Some(u_min) = u_min else {
            return order - 1;
        };

        let span = match self.span_hint {
            Some(hint) if sorted => {
                let mut j = hint.clamp(order - 1, len - 1);
                while j > order - 1 && !knot::knot_le(kv[j], u_min) {
                    j -= 1;
                }
                while j < len - 1 && knot::knot_le(kv[j + 1], u_min) {
                    j += 1;
                }
                j
            }
            _ => span_index(kv, len, order, false, u_min),
        };
        self.span_hint = Some(span);
        span
    }
}

fn validate(order: usize, knots: Option<&[f64]>, vals: &[f64]) -> Result<()> {
    if order == 0 {
        return Err(CagdError::InvalidOrder("order must be at least 1".into()));
    }
    if vals.len() >= order {
        return Err(CagdError::BlossomTooLong {
            len: vals.len(),
            order,
        });
    }
    let (t_min, t_max) = match knots {
        None => (0.0, 1.0),
        Some(kv) => {
            if kv.len() < 2 * order {
                return Err(CagdError::InvalidKnotVector(format!(
                    "{} knots cannot support order {order}",
                    kv.len()
                )));
            }
            (kv[order - 1], kv[kv.len() - order])
        }
    };
    for &t in vals {
        let inside = (t >= t_min || apx_eq(t, t_min)) && (t <= t_max || apx_eq(t, t_max));
        if !inside {
            return Err(CagdError::ParamOutOfDomain {
                t,
                min: t_min,
                max: t_max,
            });
        }
    }
    Ok(())
}

/// Weight of row `s` at recursion level `r` (zero based) for value `u`.
fn blend_alpha(knots: Option<&[f64]>, order: usize, span: usize, r: usize, s: usize, u: f64) -> f64 {
    match knots {
        None => u,
        Some(kv) => {
            let j = span + 1 + s - order;
            let den = kv[j + order - r - 1] - kv[j];
            if Tolerance::DEFAULT.is_degenerate(den) {
                0.0
            } else {
                (u - kv[j]) / den
            }
        }
    }
}

/// `rows[s] = (1 - alpha) * rows[s - 1] + alpha * rows[s]`, over the union
/// of both non-zero ranges.
fn blend_rows(rows: &mut [SymbRow], s: usize, alpha: f64) {
    if alpha == 1.0 {
        return;
    }
    let (head, tail) = rows.split_at_mut(s);
    let prev = &head[s - 1];
    let cur = &mut tail[0];

    if alpha == 0.0 {
        cur.coef.copy_from_slice(&prev.coef);
        cur.min = prev.min;
        cur.max = prev.max;
        return;
    }

    let min = prev.min.min(cur.min);
    let max = prev.max.max(cur.max);
    for i in min..=max {
        cur.coef[i] = (1.0 - alpha) * prev.coef[i] + alpha * cur.coef[i];
    }
    cur.min = min;
    cur.max = max;
}

/// Blossom of a curve's control points, one value per channel.
///
/// Rational points are blended in homogeneous form.
pub fn crv_blossom_eval(
    ctx: &mut BlossomContext,
    points: &ControlPoints,
    order: usize,
    knots: Option<&[f64]>,
    vals: &[f64],
) -> Result<Vec<f64>> {
    let blend = ctx.eval_symb(order, knots, vals)?;
    check_reach(blend.index_first + blend.values.len(), points.len())?;
    Ok(points
        .channels()
        .iter()
        .map(|channel| blend.contract(channel, 1))
        .collect())
}

/// Polar data of one surface direction.
#[derive(Debug, Clone, Copy)]
pub struct PolarDir<'a> {
    pub order: usize,
    pub knots: Option<&'a [f64]>,
    pub vals: &'a [f64],
}

/// Blossom of a surface mesh (`u_len` fastest) in both directions.
pub fn srf_blossom_eval(
    ctx: &mut BlossomContext,
    points: &ControlPoints,
    u_len: usize,
    u: PolarDir<'_>,
    v: PolarDir<'_>,
) -> Result<Vec<f64>> {
    let blend_u = ctx.eval_symb(u.order, u.knots, u.vals)?.to_owned_blend();
    let blend_v = ctx.eval_symb(v.order, v.knots, v.vals)?;
    check_reach(blend_u.index_first + blend_u.values.len(), u_len)?;
    check_reach(
        (blend_v.index_first + blend_v.values.len()) * u_len,
        points.len(),
    )?;

    let bu = blend_u.as_blend();
    Ok(points
        .channels()
        .iter()
        .map(|channel| {
            blend_v
                .values
                .iter()
                .enumerate()
                .map(|(s, &w)| {
                    let row = (blend_v.index_first + s) * u_len;
                    w * bu.contract(&channel[row..], 1)
                })
                .sum()
        })
        .collect())
}

/// Blossom in U only: one control point per mesh row, i.e. the control
/// polygon of a curve in V.
pub fn srf_blossom_eval_u(
    ctx: &mut BlossomContext,
    points: &ControlPoints,
    u_len: usize,
    v_len: usize,
    u: PolarDir<'_>,
) -> Result<ControlPoints> {
    let blend = ctx.eval_symb(u.order, u.knots, u.vals)?;
    check_reach(blend.index_first + blend.values.len(), u_len)?;
    check_reach(u_len * v_len, points.len())?;

    let channels = points
        .channels()
        .iter()
        .map(|channel| {
            (0..v_len)
                .map(|j| blend.contract(&channel[j * u_len..], 1))
                .collect()
        })
        .collect();
    ControlPoints::new(points.ptype(), channels)
}

fn check_reach(needed: usize, available: usize) -> Result<()> {
    if needed > available {
        return Err(CagdError::LengthMismatch {
            expected: needed,
            found: available,
        });
    }
    Ok(())
}

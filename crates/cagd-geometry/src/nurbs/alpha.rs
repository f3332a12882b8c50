//! Alpha matrices: linear maps from the control points of one spline space
//! to those of an equivalent, richer space.
//!
//! Degree raising and Boehm knot insertion both produce one. Each output
//! point depends on a short run of input points; the run is recorded per
//! row so contraction only touches non-zero coefficients.

use cagd_core::{CagdError, Result, Tolerance, Validate};
use log::debug;
use nalgebra::DMatrix;

use super::basis::span_index;
use super::blossom::BlossomContext;
use super::knot;
use crate::points::{ControlPoints, Direction, MeshShape};

/// Refinement operator between two spline spaces.
///
/// `matrix` has `new_length` rows and `length` columns; row `l` is non-zero
/// only on columns `col_index[l] .. col_index[l] + col_length[l]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMatrix {
    order: usize,
    length: usize,
    new_order: usize,
    new_length: usize,
    kv: Vec<f64>,
    new_kv: Vec<f64>,
    matrix: DMatrix<f64>,
    col_index: Vec<usize>,
    col_length: Vec<usize>,
}

impl AlphaMatrix {
    fn from_matrix(
        order: usize,
        kv: Vec<f64>,
        new_order: usize,
        new_kv: Vec<f64>,
        matrix: DMatrix<f64>,
    ) -> Self {
        let mut alpha = Self {
            order,
            length: matrix.ncols(),
            new_order,
            new_length: matrix.nrows(),
            kv,
            new_kv,
            matrix,
            col_index: Vec::new(),
            col_length: Vec::new(),
        };
        alpha.set_domain();
        alpha
    }

    /// The identity map of a space onto itself.
    pub fn identity(kv: &[f64], order: usize, len: usize) -> Result<Self> {
        knot::check_length(kv, len, order, false)?;
        Ok(Self::from_matrix(
            order,
            kv.to_vec(),
            order,
            kv.to_vec(),
            DMatrix::identity(len, len),
        ))
    }

    /// Single degree raise from `order` to `order + 1`.
    ///
    /// The space must be open ended and C0 continuous; split it at its C0
    /// discontinuities first.
    pub fn degree_raise(kv: &[f64], order: usize, len: usize) -> Result<Self> {
        Self::degree_raise_with(&mut BlossomContext::new(), kv, order, len)
    }

    /// [`AlphaMatrix::degree_raise`] using the caller's blossom context.
    pub fn degree_raise_with(
        ctx: &mut BlossomContext,
        kv: &[f64],
        order: usize,
        len: usize,
    ) -> Result<Self> {
        knot::check_length(kv, len, order, false)?;
        if !knot::has_open_ec(kv, len, order) {
            return Err(CagdError::InvalidKnotVector(
                "degree raising expects open end conditions".into(),
            ));
        }
        if let Some(t) = knot::c0_discont(kv, order, len) {
            return Err(CagdError::C0Discontinuity(t));
        }

        let new_order = order + 1;
        let new_kv = knot::degree_raised_kv(kv, len, order, new_order)?;
        let new_len = new_kv.len() - new_order;
        let mut matrix = DMatrix::zeros(new_len, len);

        if order == 1 {
            // Piecewise constants: each new point copies the piece it lies on.
            for l in 0..new_len {
                let j = span_index(kv, len, 1, false, new_kv[l + 1]);
                matrix[(l, j)] = 1.0;
            }
        } else {
            // The blossom of the raised piece at k values is the mean of the
            // original blossom over the k ways to drop one value.
            let mut args = vec![0.0; order - 1];
            for l in 0..new_len {
                let window = &new_kv[l + 1..=l + order];
                args.copy_from_slice(&window[1..]);
                for d in 0..order {
                    if d > 0 {
                        args[d - 1] = window[d - 1];
                    }
                    let blend = ctx.eval_symb(order, Some(kv), &args)?;
                    for (s, &w) in blend.values.iter().enumerate() {
                        matrix[(l, blend.index_first + s)] += w;
                    }
                }
            }
            matrix /= order as f64;
        }

        let alpha = Self::from_matrix(order, kv.to_vec(), new_order, new_kv, matrix);
        debug!(
            "degree raise matrix {}x{} (order {} -> {})",
            alpha.new_length, alpha.length, order, new_order
        );
        Ok(alpha)
    }

    /// Raise from `order` to `new_order` in one fused matrix.
    pub fn degree_raise_n(kv: &[f64], order: usize, len: usize, new_order: usize) -> Result<Self> {
        Self::degree_raise_n_with(&mut BlossomContext::new(), kv, order, len, new_order)
    }

    pub fn degree_raise_n_with(
        ctx: &mut BlossomContext,
        kv: &[f64],
        order: usize,
        len: usize,
        new_order: usize,
    ) -> Result<Self> {
        if new_order < order {
            return Err(CagdError::InvalidOrder(format!(
                "cannot raise order {order} to {new_order}"
            )));
        }
        let mut alpha = Self::identity(kv, order, len)?;
        for _ in order..new_order {
            let step =
                Self::degree_raise_with(ctx, &alpha.new_kv, alpha.new_order, alpha.new_length)?;
            alpha = Self::compose(&alpha, &step)?;
        }
        Ok(alpha)
    }

    /// `a2` after `a1`: maps the input space of `a1` to the output space of
    /// `a2`.
    pub fn compose(a1: &Self, a2: &Self) -> Result<Self> {
        if a1.new_order != a2.order {
            return Err(CagdError::InvalidOrder(format!(
                "cannot compose order {} output with order {} input",
                a1.new_order, a2.order
            )));
        }
        if a1.new_length != a2.length {
            return Err(CagdError::LengthMismatch {
                expected: a2.length,
                found: a1.new_length,
            });
        }
        Ok(Self::from_matrix(
            a1.order,
            a1.kv.clone(),
            a2.new_order,
            a2.new_kv.clone(),
            &a2.matrix * &a1.matrix,
        ))
    }

    /// Boehm insertion of one knot `t`.
    pub fn knot_insert(kv: &[f64], order: usize, len: usize, t: f64) -> Result<Self> {
        knot::check_length(kv, len, order, false)?;
        knot::ensure_param_in_domain(kv, len, order, false, t)?;
        let mult = knot::find_mult(kv, t);
        if mult >= order {
            return Err(CagdError::InvalidKnot(format!(
                "knot {t} already has multiplicity {mult} for order {order}"
            )));
        }

        let k = span_index(kv, len, order, false, t);
        let new_kv = knot::insert_one(kv, t);
        let mut matrix = DMatrix::zeros(len + 1, len);
        for i in 0..=len {
            if i + order <= k + 1 {
                matrix[(i, i)] = 1.0;
            } else if i <= k {
                let den = kv[i + order - 1] - kv[i];
                let a = if Tolerance::DEFAULT.is_degenerate(den) {
                    0.0
                } else {
                    (t - kv[i]) / den
                };
                if i < len {
                    matrix[(i, i)] = a;
                }
                matrix[(i, i - 1)] = 1.0 - a;
            } else {
                matrix[(i, i - 1)] = 1.0;
            }
        }
        Ok(Self::from_matrix(order, kv.to_vec(), order, new_kv, matrix))
    }

    /// Insert every knot of `ts`, in order, as one fused matrix.
    pub fn knot_insert_n(kv: &[f64], order: usize, len: usize, ts: &[f64]) -> Result<Self> {
        let mut alpha = Self::identity(kv, order, len)?;
        for &t in ts {
            let step = Self::knot_insert(&alpha.new_kv, order, alpha.new_length, t)?;
            alpha = Self::compose(&alpha, &step)?;
        }
        Ok(alpha)
    }

    /// Recompute the non-zero column range of every row.
    pub fn set_domain(&mut self) {
        self.col_index.clear();
        self.col_length.clear();
        for l in 0..self.new_length {
            let row = self.row(l);
            let first = row.iter().position(|x| !Tolerance::DEFAULT.is_degenerate(*x));
            let last = row.iter().rposition(|x| !Tolerance::DEFAULT.is_degenerate(*x));
            match (first, last) {
                (Some(first), Some(last)) => {
                    self.col_index.push(first);
                    self.col_length.push(last + 1 - first);
                }
                _ => {
                    self.col_index.push(0);
                    self.col_length.push(0);
                }
            }
        }
    }

    /// Output coefficients for one strided input row: `src[c * stride]` is
    /// input point `c`.
    pub fn contract(&self, src: &[f64], stride: usize) -> Result<Vec<f64>> {
        let needed = (self.length.max(1) - 1) * stride + 1;
        if src.len() < needed {
            return Err(CagdError::LengthMismatch {
                expected: needed,
                found: src.len(),
            });
        }
        Ok((0..self.new_length)
            .map(|l| self.contract_row(l, src, stride))
            .collect())
    }

    fn contract_row(&self, l: usize, src: &[f64], stride: usize) -> f64 {
        let first = self.col_index[l];
        (first..first + self.col_length[l])
            .map(|c| self.matrix[(l, c)] * src[c * stride])
            .sum()
    }

    /// Map the control points of a curve.
    pub fn apply(&self, points: &ControlPoints) -> Result<ControlPoints> {
        let (out, _) = self.apply_mesh(points, MeshShape::curve(points.len()), Direction::U)?;
        Ok(out)
    }

    /// Map a control mesh along `dir`, row by row.
    pub fn apply_mesh(
        &self,
        points: &ControlPoints,
        shape: MeshShape,
        dir: Direction,
    ) -> Result<(ControlPoints, MeshShape)> {
        if shape.total() != points.len() {
            return Err(CagdError::LengthMismatch {
                expected: shape.total(),
                found: points.len(),
            });
        }
        if shape.along(dir) != self.length {
            return Err(CagdError::LengthMismatch {
                expected: self.length,
                found: shape.along(dir),
            });
        }

        let out_shape = shape.with_along(dir, self.new_length);
        let mut channels = Vec::with_capacity(points.channels().len());
        for src in points.channels() {
            let mut out = vec![0.0; out_shape.total()];
            for b in 0..shape.across(dir) {
                let (offset, stride) = shape.row(dir, b);
                for l in 0..self.new_length {
                    out[out_shape.index(dir, l, b)] = self.contract_row(l, &src[offset..], stride);
                }
            }
            channels.push(out);
        }
        Ok((ControlPoints::from_parts(points.ptype(), channels), out_shape))
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn new_order(&self) -> usize {
        self.new_order
    }

    pub fn new_length(&self) -> usize {
        self.new_length
    }

    pub fn kv(&self) -> &[f64] {
        &self.kv
    }

    pub fn new_kv(&self) -> &[f64] {
        &self.new_kv
    }

    pub fn into_new_kv(self) -> Vec<f64> {
        self.new_kv
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn get(&self, l: usize, c: usize) -> f64 {
        self.matrix[(l, c)]
    }

    /// Row `l` as a dense vector over all input points.
    pub fn row(&self, l: usize) -> Vec<f64> {
        self.matrix.row(l).iter().copied().collect()
    }

    pub fn row_sum(&self, l: usize) -> f64 {
        self.matrix.row(l).sum()
    }

    pub fn col_index(&self) -> &[usize] {
        &self.col_index
    }

    pub fn col_length(&self) -> &[usize] {
        &self.col_length
    }
}

impl Validate for AlphaMatrix {
    fn validate(&self) -> Result<()> {
        if self.matrix.shape() != (self.new_length, self.length) {
            return Err(CagdError::LengthMismatch {
                expected: self.new_length * self.length,
                found: self.matrix.len(),
            });
        }
        if self.new_kv.len() != self.new_length + self.new_order {
            return Err(CagdError::LengthMismatch {
                expected: self.new_length + self.new_order,
                found: self.new_kv.len(),
            });
        }
        for l in 0..self.new_length {
            if self.col_index[l] + self.col_length[l] > self.length {
                return Err(CagdError::Geometry(format!("row {l} exceeds the input length")));
            }
            let sum = self.row_sum(l);
            if (sum - 1.0).abs() > 1e-9 {
                return Err(CagdError::Geometry(format!("row {l} sums to {sum}")));
            }
        }
        Ok(())
    }
}

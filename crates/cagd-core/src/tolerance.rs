/// Approximate-equality epsilon for knot comparisons.
pub const KNOT_EPS: f64 = 1e-10;

/// Denominators below this are treated as zero by basis recursions.
pub const BASIS_EPS: f64 = 1e-20;

/// Check if two knot values coincide within [`KNOT_EPS`].
#[inline]
pub fn apx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < KNOT_EPS
}

/// Tolerances used by knot-vector and basis computations.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Knot coincidence tolerance
    pub knot: f64,
    /// Basis denominator guard
    pub basis: f64,
}

impl Tolerance {
    pub const DEFAULT_KNOT: f64 = KNOT_EPS;
    pub const DEFAULT_BASIS: f64 = BASIS_EPS;

    /// The contract tolerances, used by the basis and blossom recursions.
    pub const DEFAULT: Tolerance = Tolerance {
        knot: Self::DEFAULT_KNOT,
        basis: Self::DEFAULT_BASIS,
    };

    pub fn new(knot: f64, basis: f64) -> Self {
        Self { knot, basis }
    }

    pub fn default_precision() -> Self {
        Self::DEFAULT
    }

    pub fn loose() -> Self {
        Self {
            knot: 1e-6,
            basis: 1e-14,
        }
    }

    /// Check if two knots are equal within the knot tolerance
    pub fn knot_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.knot
    }

    /// Check if a denominator is too small to divide by
    pub fn is_degenerate(self, d: f64) -> bool {
        d.abs() < self.basis
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::default_precision()
    }
}

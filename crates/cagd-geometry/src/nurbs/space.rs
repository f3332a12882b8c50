//! Spline function spaces: order, control point count and knot vector.

use cagd_core::{CagdError, Result};
use serde::{Deserialize, Serialize};

use super::knot;

/// The function space of one parametric direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineSpace {
    pub(crate) order: usize,
    pub(crate) length: usize,
    pub(crate) periodic: bool,
    pub(crate) knots: Vec<f64>,
}

impl SplineSpace {
    pub fn new(order: usize, length: usize, periodic: bool, knots: Vec<f64>) -> Result<Self> {
        knot::check_length(&knots, length, order, periodic)?;
        if knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(CagdError::InvalidKnotVector("knots must be non-decreasing".into()));
        }
        Ok(Self {
            order,
            length,
            periodic,
            knots,
        })
    }

    /// Open uniform space on `[0, 1]`.
    pub fn uniform_open(length: usize, order: usize) -> Result<Self> {
        Self::new(order, length, false, knot::uniform_open(length, order)?)
    }

    /// Periodic uniform space.
    pub fn uniform_periodic(length: usize, order: usize) -> Result<Self> {
        Self::new(order, length, true, knot::uniform_periodic(length, order)?)
    }

    /// The single-segment space of a Bezier of `order` on `[0, 1]`.
    pub fn bezier(order: usize) -> Result<Self> {
        Self::uniform_open(order, order)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn domain(&self) -> (f64, f64) {
        knot::domain(&self.knots, self.length, self.order, self.periodic)
    }

    pub fn is_open_end(&self) -> bool {
        !self.periodic && knot::has_open_ec(&self.knots, self.length, self.order)
    }

    pub fn is_bezier(&self) -> bool {
        !self.periodic && knot::has_bezier_kv(&self.knots, self.length, self.order)
    }

    /// A C0 discontinuity of a non-periodic space.
    pub fn c0_discont(&self) -> Option<f64> {
        if self.periodic {
            return None;
        }
        knot::c0_discont(&self.knots, self.order, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces() {
        let open = SplineSpace::uniform_open(5, 3).unwrap();
        assert!(open.is_open_end());
        assert!(!open.is_bezier());
        assert_eq!(open.domain(), (0.0, 1.0));

        let bezier = SplineSpace::bezier(4).unwrap();
        assert!(bezier.is_bezier());

        let periodic = SplineSpace::uniform_periodic(4, 3).unwrap();
        assert_eq!(periodic.knots().len(), 4 + 2 * 3 - 1);
        assert!(!periodic.is_open_end());
    }

    #[test]
    fn test_rejects_bad_knots() {
        assert!(SplineSpace::new(2, 2, false, vec![0.0, 0.0, 1.0]).is_err());
        assert!(SplineSpace::new(2, 2, false, vec![0.0, 1.0, 0.5, 1.0]).is_err());
    }

    #[test]
    fn test_c0_discont() {
        let kv = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let space = SplineSpace::new(3, 6, false, kv).unwrap();
        assert_eq!(space.c0_discont(), Some(1.0));
    }
}

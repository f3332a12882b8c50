use crate::error::Result;

/// Validate structural integrity of a curve, surface, or operator.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CagdError {
    #[error("Parameter {t} is not in domain [{min}, {max}]")]
    ParamOutOfDomain { t: f64, min: f64, max: f64 },

    #[error("Invalid knot vector: {0}")]
    InvalidKnotVector(String),

    #[error("Length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Blossom of {len} values requested for order {order}, fewer than the order are allowed")]
    BlossomTooLong { len: usize, order: usize },

    #[error("Knot vector has a C0 discontinuity at {0}")]
    C0Discontinuity(f64),

    #[error("Invalid knot: {0}")]
    InvalidKnot(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Geometry error: {0}")]
    Geometry(String),
}

pub type Result<T> = std::result::Result<T, CagdError>;

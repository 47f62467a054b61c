use thiserror::Error;

/// Contract violations reported by spline construction and manipulation.
///
/// Fallible operations return `anyhow::Result`; the underlying error can be
/// recovered with `err.downcast_ref::<SplineError>()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplineError {
    /// Invalid degree/coefficient combinations or malformed knot sequences.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Array shapes that disagree with the sizes implied by the knot vectors.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A request that this engine cannot carry out exactly.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl SplineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

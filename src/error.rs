use thiserror::Error;

use crate::parameters::{BoundsError, ExpressionError, ParameterError};

/// Error types for the qef-rs library.
#[derive(Error, Debug)]
pub enum QefError {
    /// Error raised by the parameter system.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Two sub-models declare the same prefixed parameter names.
    #[error("Parameter collision between sub-models: {}", names.join(", "))]
    ParameterCollision { names: Vec<String> },

    /// Arrays that must share a length do not.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The convolution produced a result whose length differs from the energy axis.
    #[error("Convolution result has {found} samples, expected {expected}")]
    ConvolutionShape { expected: usize, found: usize },

    /// Tabulated samples cannot define an interpolant.
    #[error("Interpolation domain error: {0}")]
    InterpolationDomain(String),

    /// A model name was not found in the registry.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Not implemented functionality.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<BoundsError> for QefError {
    fn from(err: BoundsError) -> Self {
        QefError::Parameter(ParameterError::from(err))
    }
}

impl From<ExpressionError> for QefError {
    fn from(err: ExpressionError) -> Self {
        QefError::Parameter(ParameterError::from(err))
    }
}

impl QefError {
    /// Names of the parameters in a dependency cycle, if this is a cyclic-constraint error.
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            QefError::Parameter(ParameterError::CyclicConstraint { names }) => Some(names),
            _ => None,
        }
    }
}

/// Result type alias for qef-rs operations.
pub type Result<T> = std::result::Result<T, QefError>;

use std::{fmt, io, path::PathBuf};

/// Errors produced by learners while training or testing.
#[derive(Debug)]
pub enum LearnerError {
    /// An input is invalid for semantic or domain reasons.
    InvalidInput(String),

    /// A shape invariant was violated (e.g. mismatched lengths).
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "target", "features").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// Testing was requested before any model was trained.
    NotTrained(PathBuf),

    /// The model file could not be read or written.
    Io(io::Error),

    /// The model file does not hold a model of the expected kind.
    Corrupt(serde_json::Error),
}

impl fmt::Display for LearnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnerError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            LearnerError::ShapeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            LearnerError::NotTrained(path) => {
                write!(f, "no trained model at {}", path.display())
            }
            LearnerError::Io(e) => write!(f, "io error: {e}"),
            LearnerError::Corrupt(e) => write!(f, "corrupt model: {e}"),
        }
    }
}

impl std::error::Error for LearnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LearnerError::Io(e) => Some(e),
            LearnerError::Corrupt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LearnerError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for LearnerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Corrupt(e)
    }
}

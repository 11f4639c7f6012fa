//! Error types shared by the search index and the evaluators built on it.

use thiserror::Error;

/// Errors raised by index construction, queries, and fitness evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("insufficient population: requested {requested} neighbors from {population} points")]
    InsufficientPopulation { requested: usize, population: usize },

    /// The tree was built from zero points.
    #[error("query against an empty index")]
    EmptyIndex,

    #[error("cannot take the maximum distance of an empty set")]
    EmptySet,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// True for failures caused by a bad parameter rather than by the state
    /// of the index.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::DimensionMismatch { .. }
                | Error::InsufficientPopulation { .. }
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DimensionMismatch { expected: 3, got: 2 };
        assert!(err.to_string().contains("expected 3 features, got 2"));

        let err = Error::InsufficientPopulation { requested: 7, population: 6 };
        assert!(err.to_string().contains("requested 7 neighbors from 6 points"));

        assert!(Error::EmptyIndex.to_string().contains("empty index"));
    }

    #[test]
    fn test_parameter_failures_are_grouped() {
        assert!(Error::invalid("k must be positive").is_invalid_argument());
        assert!(Error::DimensionMismatch { expected: 1, got: 2 }.is_invalid_argument());
        let err = Error::InsufficientPopulation { requested: 2, population: 1 };
        assert!(err.is_invalid_argument());
        assert!(!Error::EmptyIndex.is_invalid_argument());
        assert!(!Error::EmptySet.is_invalid_argument());
    }
}

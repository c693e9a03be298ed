//! Error types for the early classification library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, EarlyRnnError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum EarlyRnnError {
    /// Input tensor does not have the configured or expected shape
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    /// Earliness/classification blend outside [0, 1]
    #[error("alpha must be within [0, 1], got {0}")]
    InvalidAlpha(f64),

    /// Entropy regularization factor is not a finite number
    #[error("entropy_factor must be finite, got {0}")]
    InvalidEntropyFactor(f64),

    /// Class target outside the configured number of classes
    #[error("Invalid target class {target} at [{batch}, {time}], expected < {nclasses}")]
    InvalidTarget {
        batch: usize,
        time: usize,
        target: usize,
        nclasses: usize,
    },

    /// Decision probability outside [0, 1]
    #[error("Invalid decision probability {value} at [{batch}, {time}]")]
    InvalidProbability {
        batch: usize,
        time: usize,
        value: f64,
    },

    /// NaN or infinity in a computed quantity
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    /// Invalid model configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Requested compute device is not available
    #[error("Unsupported device: {0}")]
    UnsupportedDevice(String),

    /// Snapshot lacks a parameter the model owns
    #[error("Missing parameter in snapshot: {0}")]
    MissingParameter(String),

    /// Snapshot carries a parameter the model does not own
    #[error("Unexpected parameter in snapshot: {0}")]
    UnexpectedParameter(String),

    /// Snapshot parameter has a different shape than the model's
    #[error("Shape mismatch for parameter {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Metadata uses a key reserved for the parameter map
    #[error("Metadata key '{0}' is reserved")]
    ReservedMetadataKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding/decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Config parsing error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config writing error
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl EarlyRnnError {
    /// Shorthand for a shape error built from two displayable shapes
    pub fn dims(what: &'static str, expected: impl std::fmt::Debug, actual: impl std::fmt::Debug) -> Self {
        EarlyRnnError::DimensionMismatch {
            what,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_message() {
        let err = EarlyRnnError::dims("inputs", [2, 4, 1], [2, 4, 3]);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch for inputs: expected [2, 4, 1], got [2, 4, 3]"
        );
    }

    #[test]
    fn test_alpha_message() {
        assert_eq!(
            EarlyRnnError::InvalidAlpha(1.5).to_string(),
            "alpha must be within [0, 1], got 1.5"
        );
    }
}

//! Error types for the safety layer.
//!
//! [`SafetyError`] is raised only while building a configuration or a layer.
//! [`PayloadError`] describes why a raw observation or command could not be
//! normalized; the layer turns it into an integrity fault and never returns
//! it to the caller of `step`.

use thiserror::Error;

use crate::report::SafetyFault;

/// Configuration errors, raised at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two index-aligned configuration vectors differ in length.
    #[error("{what} must be length {expected}, got {actual}")]
    LengthMismatch {
        /// Offending field.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A configuration vector or scalar is non-finite.
    #[error("{0} must be finite")]
    NonFinite(&'static str),
}

impl SafetyError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a length mismatch error.
    #[must_use]
    pub fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }
}

/// Result type for configuration operations.
pub type SafetyResult<T> = std::result::Result<T, SafetyError>;

/// Which payload a [`PayloadError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSide {
    /// Sensed observation.
    Observation,
    /// Desired command.
    Command,
}

/// A raw payload that cannot be trusted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    /// A required field is absent.
    #[error("{side:?} missing required field: {field}")]
    Missing {
        /// Payload side.
        side: PayloadSide,
        /// Field name.
        field: &'static str,
    },

    /// A field has the wrong length.
    #[error("{field} must be length {expected}, got {actual}")]
    Shape {
        /// Payload side.
        side: PayloadSide,
        /// Field name.
        field: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A field contains NaN or an infinity.
    #[error("{field} contains non-finite values")]
    NonFinite {
        /// Payload side.
        side: PayloadSide,
        /// Field name.
        field: &'static str,
    },
}

impl PayloadError {
    /// Integrity fault this error maps to.
    #[must_use]
    pub fn fault(&self) -> SafetyFault {
        match self {
            Self::Missing {
                side: PayloadSide::Observation,
                ..
            } => SafetyFault::MissingObs,
            Self::Missing {
                side: PayloadSide::Command,
                ..
            } => SafetyFault::MissingCmd,
            Self::Shape { .. } => SafetyFault::ShapeMismatch,
            Self::NonFinite {
                side: PayloadSide::Observation,
                ..
            } => SafetyFault::NanInfObs,
            Self::NonFinite {
                side: PayloadSide::Command,
                ..
            } => SafetyFault::NanInfCmd,
        }
    }

    /// Name of the offending field.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field, .. } | Self::Shape { field, .. } | Self::NonFinite { field, .. } => {
                *field
            }
        }
    }
}

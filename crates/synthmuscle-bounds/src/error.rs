//! Error types for bound construction and filtering.
//!
//! Every variant describes a configuration or programming mistake caught at a
//! validation boundary. None of them is raised for a finite, well-shaped
//! command that merely lies outside its bounds; that case is clipped.

use thiserror::Error;

/// Errors raised while validating or composing bounds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundsError {
    /// Two vectors that must be index-aligned have different lengths.
    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        /// Name of the offending vector.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A vector or scalar contains NaN or an infinity.
    #[error("{0} contains non-finite values")]
    NonFinite(&'static str),

    /// A magnitude that must be non-negative is negative.
    #[error("{what} must be >= 0 (index {index}: {value})")]
    Negative {
        /// Name of the offending vector.
        what: &'static str,
        /// First offending index.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// `lb[i] > ub[i]` for some index.
    #[error("lb must be <= ub elementwise (index {index}: lb={lb}, ub={ub})")]
    Inverted {
        /// First offending index.
        index: usize,
        /// Lower bound at that index.
        lb: f64,
        /// Upper bound at that index.
        ub: f64,
    },

    /// An actuator id appears more than once in a command map.
    #[error("idx_to_actuator must be unique: duplicate id '{0}'")]
    DuplicateActuator(String),

    /// No thermal limit was supplied for a mapped actuator.
    #[error("missing thermal limit for actuator: {0}")]
    MissingThermalLimit(String),

    /// A thermal limit is non-finite or negative.
    #[error("invalid thermal limit for actuator {actuator}: {limit}")]
    InvalidThermalLimit {
        /// Actuator id.
        actuator: String,
        /// Offending limit.
        limit: f64,
    },

    /// Derating policy or thermal model parameters are inconsistent.
    #[error("thermal: {0}")]
    Thermal(String),

    /// Linear constraint matrix or vector is mis-shaped or non-finite.
    #[error("linear constraints: {0}")]
    Constraints(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl BoundsError {
    /// Create a length mismatch error.
    #[must_use]
    pub fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Create a thermal model error.
    #[must_use]
    pub fn thermal(reason: impl Into<String>) -> Self {
        Self::Thermal(reason.into())
    }

    /// Create a linear constraints error.
    #[must_use]
    pub fn constraints(reason: impl Into<String>) -> Self {
        Self::Constraints(reason.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

/// A specialized `Result` type for bound operations.
pub type BoundsResult<T> = std::result::Result<T, BoundsError>;

//! Error types for the safety runtime.
//!
//! These are configuration mismatches between the caller and the runtime.
//! Out-of-envelope commands never produce an error; they are clipped or
//! resolved to the safe-stop command.

use synthmuscle_bounds::BoundsError;
use thiserror::Error;

/// Errors that can occur while constructing or stepping a runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A bound primitive rejected its inputs.
    #[error(transparent)]
    Bounds(#[from] BoundsError),

    /// The desired command does not match the command map.
    #[error("u_des length {actual} must match command map length {expected}")]
    CommandLength {
        /// Command-map length.
        expected: usize,
        /// Supplied command length.
        actual: usize,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The safety context rejected a value.
    #[error("Safety context: {0}")]
    Context(String),
}

impl RuntimeError {
    /// Create a command length error.
    #[must_use]
    pub fn command_length(expected: usize, actual: usize) -> Self {
        Self::CommandLength { expected, actual }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a context error.
    #[must_use]
    pub fn context(reason: impl Into<String>) -> Self {
        Self::Context(reason.into())
    }

    /// Returns `true` if a thermal limit was missing for a mapped actuator.
    #[must_use]
    pub fn is_missing_thermal_limit(&self) -> bool {
        matches!(self, Self::Bounds(BoundsError::MissingThermalLimit(_)))
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

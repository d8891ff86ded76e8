//! Shared test utilities for the SynthMuscle safety crates.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`assertions`] - Assertion macros for fixed-length command vectors
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! synthmuscle-test-helpers = { workspace = true }
//! ```
//!
//! ```rust,ignore
//! use synthmuscle_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::panic)]

pub mod assertions;
pub mod must;
pub mod prelude;

pub use must::*;

/// Result type used by integration tests.
pub type TestResult = Result<(), Box<dyn std::error::Error>>;

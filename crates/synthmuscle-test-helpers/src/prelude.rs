//! Convenience re-exports.
//!
//! ```rust
//! use synthmuscle_test_helpers::prelude::*;
//! ```

pub use crate::TestResult;
pub use crate::must::{must, must_err, must_some, must_with};
pub use crate::{assert_all_finite, assert_approx_eq, assert_vec_approx_eq, assert_within_bounds};

//! # synthmuscle-bounds
//!
//! Bound primitives used by the SynthMuscle safety supervisor.
//!
//! Every limit the supervisor enforces is reduced to per-index box bounds so
//! that hard, thermal and rate limits compose by intersection. The resulting
//! box is applied by a deterministic filter that also reports linear
//! constraint violations.
//!
//! ## Modules
//!
//! - [`bounds`] - Validated `[lb, ub]` boxes, clipping and intersection
//! - [`rate_limit`] - Maximum per-step command change around the previous command
//! - [`thermal`] - Derating curves, command maps and fail-closed thermal lookup
//! - [`thermal_model`] - First-order RC temperature estimate
//! - [`qp`] - Box filter with linear-constraint detection
//! - [`vector`] - Finiteness, length and closeness helpers
//! - [`error`] - Bound error types
//!
//! None of the operations here retain state between calls.
//!
//! ## Example
//!
//! ```rust
//! use synthmuscle_bounds::prelude::*;
//!
//! # fn main() -> Result<(), BoundsError> {
//! let hard = BoxBounds::symmetric(&[5.0, 5.0])?;
//! let rate = RateLimit::per_step(vec![0.5, 0.25]).bounds_around(&[0.0, 1.0])?;
//! let tightened = hard.intersect(&rate)?;
//!
//! let result = QpSafetyFilter::default().filter(&[10.0, 0.0], &tightened, None)?;
//! assert_eq!(result.u_safe, vec![0.5, 0.75]);
//! assert_eq!(result.status, QpStatus::Feasible);
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bounds;
pub mod error;
pub mod qp;
pub mod rate_limit;
pub mod thermal;
pub mod thermal_model;
pub mod vector;

pub mod prelude;

pub use bounds::{BoxBounds, bounds_from_limits};
pub use error::{BoundsError, BoundsResult};
pub use qp::{
    CONSTRAINT_TOLERANCE, LinearConstraints, QpFallback, QpResult, QpSafetyConfig, QpSafetyFilter,
    QpStatus,
};
pub use rate_limit::{RateLimit, apply_rate_limit, rate_limit_bounds};
pub use thermal::{
    CommandMap, DeratingPolicy, ThermalClip, ThermalLimit, ThermalLimitLookup,
    apply_thermal_limits, derate_all, derated_limit,
};
pub use thermal_model::{ThermalRcParams, ThermalState, i2r_losses_w, step_thermal};

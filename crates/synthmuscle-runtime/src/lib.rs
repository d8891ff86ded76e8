//! # synthmuscle-runtime
//!
//! Bound-composition safety runtime for SynthMuscle actuator groups.
//!
//! Each cycle the runtime intersects the hard absolute limits with the
//! thermal limits reported for each actuator and applies the resulting box
//! to the desired command. [`SafetyRuntimePlus`] additionally bounds the
//! per-step change against the previous output stored in a caller-owned
//! [`SafetyContext`], and latches a kill when the composed bounds become
//! inconsistent.
//!
//! ## Failure handling
//!
//! - A kill signal, a latched context kill or a non-finite command returns the
//!   safe-stop command tagged `KILL_OVERRIDE`
//! - A mapped actuator with no thermal limit is an error, never unlimited
//! - Linear constraints are checked, not enforced
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use synthmuscle_runtime::prelude::*;
//!
//! # fn main() -> Result<(), RuntimeError> {
//! let map = CommandMap::new(["a0", "a1"])?;
//! let runtime = SafetyRuntime::new(SafetyRuntimeConfig::new(vec![5.0, 5.0]).with_qp(false), map)?;
//!
//! let mut thermal = HashMap::new();
//! thermal.insert("a0".to_string(), ThermalLimit::new(3.0, true));
//! thermal.insert("a1".to_string(), ThermalLimit::new(1.0, true));
//!
//! let result = runtime.step(&[4.0, 4.0], &thermal, None, None)?;
//! assert_eq!(result.u_safe, vec![3.0, 1.0]);
//! assert_eq!(result.status.as_str(), "QP_DISABLED");
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

pub mod context;
pub mod error;
pub mod plus;
pub mod runtime;

pub mod prelude;

pub use context::{DEFAULT_KILL_REASON, SafetyContext};
pub use error::{RuntimeError, RuntimeResult};
pub use plus::{RATE_LIMIT_BOUNDS_INCONSISTENT, SafetyRuntimePlus, SafetyRuntimePlusConfig};
pub use runtime::{
    KillSignal, NON_FINITE_COMMAND, SafetyRuntime, SafetyRuntimeConfig, SafetyStepResult,
    StepStatus, ViolationReport, violation_report,
};

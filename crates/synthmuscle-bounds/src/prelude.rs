//! Prelude for synthmuscle-bounds.
//!
//! ```rust
//! use synthmuscle_bounds::prelude::*;
//!
//! let bounds = BoxBounds::symmetric(&[1.0]);
//! assert!(bounds.is_ok());
//! ```

pub use crate::bounds::{BoxBounds, bounds_from_limits};
pub use crate::error::{BoundsError, BoundsResult};
pub use crate::qp::{LinearConstraints, QpFallback, QpResult, QpSafetyConfig, QpSafetyFilter, QpStatus};
pub use crate::rate_limit::{RateLimit, apply_rate_limit, rate_limit_bounds};
pub use crate::thermal::{
    CommandMap, DeratingPolicy, ThermalClip, ThermalLimit, ThermalLimitLookup, apply_thermal_limits,
};
pub use crate::thermal_model::{ThermalRcParams, ThermalState, step_thermal};

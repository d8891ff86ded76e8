//! Prelude for synthmuscle-runtime.
//!
//! Re-exports the runtime types together with the bound primitives needed to
//! drive them.

pub use crate::context::SafetyContext;
pub use crate::error::{RuntimeError, RuntimeResult};
pub use crate::plus::{SafetyRuntimePlus, SafetyRuntimePlusConfig};
pub use crate::runtime::{
    KillSignal, SafetyRuntime, SafetyRuntimeConfig, SafetyStepResult, StepStatus, ViolationReport,
};
pub use synthmuscle_bounds::{
    BoxBounds, CommandMap, LinearConstraints, QpFallback, QpSafetyConfig, RateLimit, ThermalLimit,
    ThermalLimitLookup,
};

//! # synthmuscle-safety
//!
//! Fail-closed joint-space safety state machine for SynthMuscle limbs.
//!
//! [`SafetyLayer`] sits between a controller and the actuators. Each cycle it
//! validates the sensed state and the desired command, gates base tilt,
//! contact impulse, cable routing and command staleness, enforces joint
//! limits, and returns either the (possibly clamped) command or a safe
//! override that is always representable.
//!
//! ## Modules
//!
//! - [`config`] - Joint, contact and base limits and behavior flags
//! - [`payload`] - Raw payloads and their validated forms
//! - [`layer`] - The per-cycle state machine
//! - [`report`] - States, faults, events and the cycle report
//! - [`shared`] - Mutex-guarded handle for shared supervisors
//! - [`error`] - Configuration and payload error types
//!
//! ## Fault handling
//!
//! - Integrity faults (missing, mis-shaped or non-finite data) kill at once
//! - Limit faults are clamped when allowed and kill after a streak
//! - Tilt and contact warn above one threshold and kill above another
//! - With `latch_kill` the override persists until [`SafetyLayer::reset`]
//!
//! ## Example
//!
//! ```rust
//! use synthmuscle_safety::prelude::*;
//!
//! # fn main() -> Result<(), SafetyError> {
//! let config = SafetyConfig::builder(JointLimits::symmetric(2, 1.5, 3.0, 10.0))
//!     .consecutive_limit_frames_to_kill(3)
//!     .build()?;
//! let mut layer = SafetyLayer::new(config)?;
//!
//! let obs = RawObservation::new(vec![0.0, 0.1], vec![0.0, 0.0]);
//! let (out, report) = layer.step(0.0, &obs, &RawCommand::torque(vec![12.0, -1.0]));
//! assert_eq!(out.tau(), Some(&[10.0, -1.0][..]));
//! assert!(report.clamped);
//! assert_eq!(report.state, SafetyState::Clamping);
//!
//! let (out, report) = layer.step(0.01, &obs, &RawCommand::torque(vec![f64::NAN, 0.0]));
//! assert_eq!(out, NormalizedCommand::zero_torque(2));
//! assert!(report.killed);
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

pub mod config;
pub mod error;
pub mod layer;
pub mod payload;
pub mod report;
pub mod shared;

pub mod prelude;

pub use config::{BaseLimits, ContactLimits, JointLimits, SafetyConfig, SafetyConfigBuilder};
pub use error::{PayloadError, PayloadSide, SafetyError, SafetyResult};
pub use layer::SafetyLayer;
pub use payload::{
    CommandMode, NormalizedCommand, Observation, OneOrMany, RawCommand, RawObservation, Routing,
    quat_wxyz_to_rpy,
};
pub use report::{
    EventDetails, FaultCategory, SafetyEvent, SafetyFault, SafetyReport, SafetyState, Severity,
};
pub use shared::SharedSafetyLayer;

//! Prelude for synthmuscle-safety.
//!
//! ```rust
//! use synthmuscle_safety::prelude::*;
//!
//! let config = SafetyConfig::new(JointLimits::symmetric(1, 1.0, 1.0, 1.0));
//! assert!(SafetyLayer::new(config).is_ok());
//! ```

pub use crate::config::{BaseLimits, ContactLimits, JointLimits, SafetyConfig, SafetyConfigBuilder};
pub use crate::error::{PayloadError, SafetyError, SafetyResult};
pub use crate::layer::SafetyLayer;
pub use crate::payload::{CommandMode, NormalizedCommand, OneOrMany, RawCommand, RawObservation};
pub use crate::report::{SafetyEvent, SafetyFault, SafetyReport, SafetyState, Severity};
pub use crate::shared::SharedSafetyLayer;

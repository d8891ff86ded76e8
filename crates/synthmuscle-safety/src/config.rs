//! Joint, contact and base limits plus the layer's behavior flags.

use serde::{Deserialize, Serialize};
use synthmuscle_bounds::vector::all_finite;

use crate::error::{SafetyError, SafetyResult};

/// Per-joint limits. All vectors share length `n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower position bound.
    pub q_min: Vec<f64>,
    /// Upper position bound.
    pub q_max: Vec<f64>,
    /// Absolute velocity bound.
    pub qd_max: Vec<f64>,
    /// Absolute torque bound.
    pub tau_max: Vec<f64>,
}

impl JointLimits {
    /// `n` joints with `q ∈ [-q_abs, q_abs]`, `|qd| <= qd_max`, `|tau| <= tau_max`.
    #[must_use]
    pub fn symmetric(n: usize, q_abs: f64, qd_max: f64, tau_max: f64) -> Self {
        Self {
            q_min: vec![-q_abs; n],
            q_max: vec![q_abs; n],
            qd_max: vec![qd_max; n],
            tau_max: vec![tau_max; n],
        }
    }

    /// Number of joints.
    #[must_use]
    pub fn n(&self) -> usize {
        self.q_min.len()
    }

    /// Validate and return `n`.
    ///
    /// # Errors
    ///
    /// Requires equal lengths, finite values, `q_max >= q_min`, and strictly
    /// positive `qd_max` and `tau_max`.
    pub fn validate(&self) -> SafetyResult<usize> {
        let n = self.n();
        for (what, v) in [
            ("joint.q_max", &self.q_max),
            ("joint.qd_max", &self.qd_max),
            ("joint.tau_max", &self.tau_max),
        ] {
            if v.len() != n {
                return Err(SafetyError::length_mismatch(what, n, v.len()));
            }
        }
        for (what, v) in [
            ("joint.q_min", &self.q_min),
            ("joint.q_max", &self.q_max),
            ("joint.qd_max", &self.qd_max),
            ("joint.tau_max", &self.tau_max),
        ] {
            if !all_finite(v) {
                return Err(SafetyError::NonFinite(what));
            }
        }
        if self.q_min.iter().zip(&self.q_max).any(|(lo, hi)| hi < lo) {
            return Err(SafetyError::invalid_configuration(
                "JointLimits: q_max must be >= q_min",
            ));
        }
        if self.qd_max.iter().chain(&self.tau_max).any(|v| *v <= 0.0) {
            return Err(SafetyError::invalid_configuration(
                "JointLimits: qd_max and tau_max must be > 0",
            ));
        }
        Ok(n)
    }
}

/// Contact impulse thresholds, `0 < impulse_warn <= impulse_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactLimits {
    /// Warn above this impulse.
    pub impulse_warn: f64,
    /// Kill above this impulse.
    pub impulse_max: f64,
}

impl Default for ContactLimits {
    fn default() -> Self {
        Self {
            impulse_warn: 80.0,
            impulse_max: 120.0,
        }
    }
}

impl ContactLimits {
    /// Validate threshold ordering.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 < impulse_warn <= impulse_max`.
    pub fn validate(&self) -> SafetyResult<()> {
        if ordered_thresholds(self.impulse_warn, self.impulse_max) {
            Ok(())
        } else {
            Err(SafetyError::invalid_configuration(
                "ContactLimits: require 0 < impulse_warn <= impulse_max",
            ))
        }
    }
}

/// Base tilt thresholds in radians, `0 < tilt_warn_rad <= tilt_max_rad`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseLimits {
    /// Warn above this tilt.
    pub tilt_warn_rad: f64,
    /// Kill above this tilt.
    pub tilt_max_rad: f64,
}

impl Default for BaseLimits {
    fn default() -> Self {
        Self {
            tilt_warn_rad: 45.0_f64.to_radians(),
            tilt_max_rad: 65.0_f64.to_radians(),
        }
    }
}

impl BaseLimits {
    /// Validate threshold ordering.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 < tilt_warn_rad <= tilt_max_rad`.
    pub fn validate(&self) -> SafetyResult<()> {
        if ordered_thresholds(self.tilt_warn_rad, self.tilt_max_rad) {
            Ok(())
        } else {
            Err(SafetyError::invalid_configuration(
                "BaseLimits: require 0 < tilt_warn_rad <= tilt_max_rad",
            ))
        }
    }
}

fn ordered_thresholds(warn: f64, max: f64) -> bool {
    warn.is_finite() && max.is_finite() && 0.0 < warn && warn <= max
}

fn default_true() -> bool {
    true
}

fn default_frames_to_kill() -> u32 {
    10
}

fn default_cmd_timeout_s() -> f64 {
    0.25
}

/// Safety layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Joint limits; their length defines `n`.
    pub joint: JointLimits,
    /// Contact impulse thresholds.
    #[serde(default)]
    pub contact: ContactLimits,
    /// Base tilt thresholds.
    #[serde(default)]
    pub base: BaseLimits,
    /// Keep returning the safe override after a kill until reset.
    #[serde(default = "default_true")]
    pub latch_kill: bool,
    /// Clamp limit violations instead of killing immediately.
    #[serde(default = "default_true")]
    pub allow_clamp: bool,
    /// Consecutive limit-fault cycles that trigger a kill.
    #[serde(default = "default_frames_to_kill")]
    pub consecutive_limit_frames_to_kill: u32,
    /// Maximum age of the last command, checked once `last_cmd_t` is seen.
    #[serde(default = "default_cmd_timeout_s")]
    pub cmd_timeout_s: f64,
    /// Optional position override, clamped into joint limits.
    #[serde(default)]
    pub safe_pose_q: Option<Vec<f64>>,
    /// Use zero torque as the override.
    #[serde(default = "default_true")]
    pub safe_tau_off: bool,
}

impl SafetyConfig {
    /// Configuration with default thresholds and flags.
    #[must_use]
    pub fn new(joint: JointLimits) -> Self {
        Self {
            joint,
            contact: ContactLimits::default(),
            base: BaseLimits::default(),
            latch_kill: true,
            allow_clamp: true,
            consecutive_limit_frames_to_kill: default_frames_to_kill(),
            cmd_timeout_s: default_cmd_timeout_s(),
            safe_pose_q: None,
            safe_tau_off: true,
        }
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder(joint: JointLimits) -> SafetyConfigBuilder {
        SafetyConfigBuilder {
            config: Self::new(joint),
        }
    }

    /// Validate and return `n`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid limit or flag.
    pub fn validate(&self) -> SafetyResult<usize> {
        let n = self.joint.validate()?;
        self.contact.validate()?;
        self.base.validate()?;
        if self.consecutive_limit_frames_to_kill < 1 {
            return Err(SafetyError::invalid_configuration(
                "consecutive_limit_frames_to_kill must be >= 1",
            ));
        }
        if !self.cmd_timeout_s.is_finite() || self.cmd_timeout_s <= 0.0 {
            return Err(SafetyError::invalid_configuration(
                "cmd_timeout_s must be > 0",
            ));
        }
        if let Some(pose) = &self.safe_pose_q {
            if pose.len() != n {
                return Err(SafetyError::length_mismatch("safe_pose_q", n, pose.len()));
            }
            if !all_finite(pose) {
                return Err(SafetyError::NonFinite("safe_pose_q"));
            }
        }
        Ok(n)
    }
}

/// Builder for [`SafetyConfig`].
#[derive(Debug, Clone)]
pub struct SafetyConfigBuilder {
    config: SafetyConfig,
}

impl SafetyConfigBuilder {
    /// Set contact thresholds.
    #[must_use]
    pub fn contact(mut self, warn: f64, max: f64) -> Self {
        self.config.contact = ContactLimits {
            impulse_warn: warn,
            impulse_max: max,
        };
        self
    }

    /// Set base tilt thresholds in radians.
    #[must_use]
    pub fn base_tilt(mut self, warn_rad: f64, max_rad: f64) -> Self {
        self.config.base = BaseLimits {
            tilt_warn_rad: warn_rad,
            tilt_max_rad: max_rad,
        };
        self
    }

    /// Latch kills until reset.
    #[must_use]
    pub fn latch_kill(mut self, latch: bool) -> Self {
        self.config.latch_kill = latch;
        self
    }

    /// Clamp limit violations.
    #[must_use]
    pub fn allow_clamp(mut self, allow: bool) -> Self {
        self.config.allow_clamp = allow;
        self
    }

    /// Consecutive limit-fault cycles before a kill.
    #[must_use]
    pub fn consecutive_limit_frames_to_kill(mut self, frames: u32) -> Self {
        self.config.consecutive_limit_frames_to_kill = frames;
        self
    }

    /// Command staleness timeout in seconds.
    #[must_use]
    pub fn cmd_timeout_s(mut self, timeout_s: f64) -> Self {
        self.config.cmd_timeout_s = timeout_s;
        self
    }

    /// Position override. Only used when `safe_tau_off` is false.
    #[must_use]
    pub fn safe_pose_q(mut self, pose: Vec<f64>) -> Self {
        self.config.safe_pose_q = Some(pose);
        self
    }

    /// Use zero torque as the override.
    #[must_use]
    pub fn safe_tau_off(mut self, tau_off: bool) -> Self {
        self.config.safe_tau_off = tau_off;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> SafetyResult<SafetyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

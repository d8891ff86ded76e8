//! Hard ∩ thermal bound composition with an optional linear-constraint check.

use std::fmt;

use serde::{Deserialize, Serialize};
use synthmuscle_bounds::vector::{all_finite, clip, ensure_finite, ensure_len, ensure_non_negative, is_close, max_abs_diff};
use synthmuscle_bounds::{
    BoxBounds, CommandMap, LinearConstraints, QpSafetyConfig, QpSafetyFilter, QpStatus,
    ThermalClip, ThermalLimitLookup, apply_thermal_limits,
};

use crate::error::{RuntimeError, RuntimeResult};

/// Reason attached to a kill override caused by a non-finite `u_des`.
pub const NON_FINITE_COMMAND: &str = "non_finite_command";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRuntimeConfig {
    /// Absolute command limit per index, always enforced.
    pub hard_limit_abs: Vec<f64>,
    /// Run the linear-constraint filter instead of a plain box clip.
    #[serde(default = "default_use_qp")]
    pub use_qp: bool,
    /// Filter configuration.
    #[serde(default)]
    pub qp: QpSafetyConfig,
    /// Value of every component of the safe-stop command.
    #[serde(default)]
    pub safe_stop_value: f64,
}

fn default_use_qp() -> bool {
    true
}

impl SafetyRuntimeConfig {
    /// Create a configuration with the filter enabled and a zero safe stop.
    #[must_use]
    pub fn new(hard_limit_abs: Vec<f64>) -> Self {
        Self {
            hard_limit_abs,
            use_qp: default_use_qp(),
            qp: QpSafetyConfig::default(),
            safe_stop_value: 0.0,
        }
    }

    /// Enable or disable the linear-constraint filter.
    #[must_use]
    pub fn with_qp(mut self, use_qp: bool) -> Self {
        self.use_qp = use_qp;
        self
    }

    /// Set the filter configuration.
    #[must_use]
    pub fn with_qp_config(mut self, qp: QpSafetyConfig) -> Self {
        self.qp = qp;
        self
    }

    /// Set the safe-stop value.
    #[must_use]
    pub fn with_safe_stop_value(mut self, value: f64) -> Self {
        self.safe_stop_value = value;
        self
    }

    /// Validate against command dimension `n`.
    ///
    /// # Errors
    ///
    /// Returns an error if `hard_limit_abs` is non-finite, negative or not of
    /// length `n`, or `safe_stop_value` is non-finite.
    pub fn validate(&self, n: usize) -> RuntimeResult<()> {
        ensure_finite(&self.hard_limit_abs, "hard_limit_abs")?;
        ensure_len(&self.hard_limit_abs, n, "hard_limit_abs")?;
        ensure_non_negative(&self.hard_limit_abs, "hard_limit_abs")?;
        if !self.safe_stop_value.is_finite() {
            return Err(RuntimeError::invalid_configuration(
                "safe_stop_value must be finite",
            ));
        }
        Ok(())
    }
}

/// External kill request for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSignal {
    /// Force the safe-stop command.
    pub kill: bool,
    /// Reason reported with the override.
    #[serde(default)]
    pub reason: String,
}

impl KillSignal {
    /// An active kill with `reason`.
    #[must_use]
    pub fn kill(reason: impl Into<String>) -> Self {
        Self {
            kill: true,
            reason: reason.into(),
        }
    }
}

/// Which path produced a step result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Safe-stop command returned.
    KillOverride,
    /// Plain box clip.
    QpDisabled,
    /// Filter ran; constraints satisfied or absent.
    Feasible,
    /// Filter ran; a linear constraint is violated.
    InfeasibleConstraints,
    /// Plain box clip within rate-limited bounds.
    QpDisabledRateLimited,
    /// Filter ran within rate-limited bounds; feasible.
    FeasibleRateLimited,
    /// Filter ran within rate-limited bounds; infeasible.
    InfeasibleConstraintsRateLimited,
}

impl StepStatus {
    /// Stable status string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KillOverride => "KILL_OVERRIDE",
            Self::QpDisabled => "QP_DISABLED",
            Self::Feasible => "FEASIBLE",
            Self::InfeasibleConstraints => "INFEASIBLE_CONSTRAINTS",
            Self::QpDisabledRateLimited => "QP_DISABLED_RATE_LIMITED",
            Self::FeasibleRateLimited => "FEASIBLE_RATE_LIMITED",
            Self::InfeasibleConstraintsRateLimited => "INFEASIBLE_CONSTRAINTS_RATE_LIMITED",
        }
    }

    /// Map a filter status onto the runtime status.
    #[must_use]
    pub const fn from_qp(status: QpStatus) -> Self {
        match status {
            QpStatus::Feasible => Self::Feasible,
            QpStatus::InfeasibleConstraints => Self::InfeasibleConstraints,
        }
    }

    /// The rate-limited counterpart. `KillOverride` is unchanged.
    #[must_use]
    pub const fn rate_limited(self) -> Self {
        match self {
            Self::QpDisabled => Self::QpDisabledRateLimited,
            Self::Feasible => Self::FeasibleRateLimited,
            Self::InfeasibleConstraints => Self::InfeasibleConstraintsRateLimited,
            other => other,
        }
    }

    /// Returns `true` for [`StepStatus::KillOverride`].
    #[must_use]
    pub const fn is_kill_override(self) -> bool {
        matches!(self, Self::KillOverride)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far the output moved from the desired command.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViolationReport {
    /// Largest `|u_des - clip(u_des, bounds)|`.
    pub max_clip_mag: f64,
    /// Largest `|u_des - u_safe|`.
    pub max_delta_mag: f64,
    /// Fraction of components sitting on a bound.
    pub frac_saturated: f64,
    /// The safe-stop command was returned.
    pub kill_override: bool,
}

/// Compare `u_des` against its clip into `bounds` and against `u_safe`.
///
/// Non-finite components of `u_des` are skipped in the magnitudes.
#[must_use]
pub fn violation_report(u_des: &[f64], u_safe: &[f64], bounds: &BoxBounds) -> ViolationReport {
    let clipped = clip(u_des, bounds.lb(), bounds.ub());
    let saturated = u_safe
        .iter()
        .zip(bounds.lb().iter().zip(bounds.ub()))
        .filter(|(u, (lo, hi))| is_close(**u, **lo) || is_close(**u, **hi))
        .count();
    let frac_saturated = if u_safe.is_empty() {
        0.0
    } else {
        saturated as f64 / u_safe.len() as f64
    };

    ViolationReport {
        max_clip_mag: max_abs_diff(u_des, &clipped),
        max_delta_mag: max_abs_diff(u_des, u_safe),
        frac_saturated,
        kill_override: false,
    }
}

/// Output of one runtime step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyStepResult {
    /// Command to forward to the actuators.
    pub u_safe: Vec<f64>,
    /// Command as requested.
    pub u_des: Vec<f64>,
    /// Always `false`: no iterative solve runs.
    pub used_solver: bool,
    /// Path taken.
    pub status: StepStatus,
    /// Realized bounds.
    pub bounds: BoxBounds,
    /// At least one actuator reported thermally OK. `false` on kill.
    pub thermal_ok_any: bool,
    /// Every actuator reported thermally OK. `false` on kill.
    pub thermal_ok_all: bool,
    /// Distance between request and output.
    pub violations: ViolationReport,
    /// Kill reason when `status` is `KILL_OVERRIDE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Largest `A·u - b` residual when constraints were checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_constraint_violation: Option<f64>,
}

impl SafetyStepResult {
    /// Realized lower bounds.
    #[must_use]
    pub fn bounds_lb(&self) -> &[f64] {
        self.bounds.lb()
    }

    /// Realized upper bounds.
    #[must_use]
    pub fn bounds_ub(&self) -> &[f64] {
        self.bounds.ub()
    }

    /// Returns `true` if the safe-stop command was returned.
    #[must_use]
    pub fn is_kill_override(&self) -> bool {
        self.status.is_kill_override()
    }
}

/// Thermal pass and the hard ∩ thermal box for one command.
#[derive(Debug, Clone)]
pub(crate) struct ComposedBounds {
    pub(crate) thermal: ThermalClip,
    pub(crate) bounds: BoxBounds,
}

/// Combines hard absolute limits with per-actuator thermal limits and runs
/// the filter.
///
/// The runtime holds no per-cycle state; see
/// [`SafetyRuntimePlus`](crate::SafetyRuntimePlus) for rate limiting.
#[derive(Debug, Clone)]
pub struct SafetyRuntime {
    config: SafetyRuntimeConfig,
    cmd_map: CommandMap,
    hard: BoxBounds,
    filter: QpSafetyFilter,
}

impl SafetyRuntime {
    /// Create a runtime for the actuators in `cmd_map`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate against the
    /// command-map length.
    pub fn new(config: SafetyRuntimeConfig, cmd_map: CommandMap) -> RuntimeResult<Self> {
        cmd_map.validate(cmd_map.len())?;
        config.validate(cmd_map.len())?;
        let hard = BoxBounds::symmetric(&config.hard_limit_abs)?;
        let filter = QpSafetyFilter::new(config.qp);
        Ok(Self {
            config,
            cmd_map,
            hard,
            filter,
        })
    }

    /// Command dimension.
    #[must_use]
    pub fn n(&self) -> usize {
        self.cmd_map.len()
    }

    /// Runtime configuration.
    #[must_use]
    pub fn config(&self) -> &SafetyRuntimeConfig {
        &self.config
    }

    /// Command map.
    #[must_use]
    pub fn command_map(&self) -> &CommandMap {
        &self.cmd_map
    }

    /// The `±hard_limit_abs` box.
    #[must_use]
    pub fn hard_bounds(&self) -> &BoxBounds {
        &self.hard
    }

    /// Safe-stop command: every component equals `safe_stop_value`.
    #[must_use]
    pub fn safe_stop_command(&self) -> Vec<f64> {
        vec![self.config.safe_stop_value; self.n()]
    }

    /// Run one cycle.
    ///
    /// An active `kill` or a non-finite `u_des` returns the safe-stop command
    /// tagged [`StepStatus::KillOverride`] without touching the thermal map.
    ///
    /// # Errors
    ///
    /// Returns an error if `u_des` has the wrong length, a mapped actuator
    /// has no valid thermal limit, or `constraints` has the wrong number of
    /// columns.
    pub fn step<L>(
        &self,
        u_des: &[f64],
        thermal_limits: &L,
        constraints: Option<&LinearConstraints>,
        kill: Option<&KillSignal>,
    ) -> RuntimeResult<SafetyStepResult>
    where
        L: ThermalLimitLookup + ?Sized,
    {
        self.check_command_len(u_des)?;

        if let Some(signal) = kill.filter(|k| k.kill) {
            return Ok(self.kill_override(u_des, &signal.reason));
        }
        if !all_finite(u_des) {
            return Ok(self.kill_override(u_des, NON_FINITE_COMMAND));
        }

        let composed = self.compose(u_des, thermal_limits)?;
        self.finish(u_des, composed, None, constraints)
    }

    pub(crate) fn check_command_len(&self, u_des: &[f64]) -> RuntimeResult<()> {
        if u_des.len() == self.n() {
            Ok(())
        } else {
            Err(RuntimeError::command_length(self.n(), u_des.len()))
        }
    }

    /// Thermal clip and hard ∩ thermal box.
    pub(crate) fn compose<L>(&self, u_des: &[f64], thermal_limits: &L) -> RuntimeResult<ComposedBounds>
    where
        L: ThermalLimitLookup + ?Sized,
    {
        let thermal = apply_thermal_limits(u_des, &self.cmd_map, thermal_limits)?;
        let limits: Vec<f64> = self
            .config
            .hard_limit_abs
            .iter()
            .zip(thermal.limits_abs.iter())
            .map(|(hard, th)| hard.min(*th))
            .collect();
        let bounds = BoxBounds::symmetric(&limits)?;
        Ok(ComposedBounds { thermal, bounds })
    }

    /// Apply the realized bounds to `u_des` and assemble the result.
    ///
    /// `rate_bounds`, when set, replaces the hard ∩ thermal box as the
    /// realized bounds. The violation report always measures the clip
    /// against the hard ∩ thermal box.
    pub(crate) fn finish(
        &self,
        u_des: &[f64],
        composed: ComposedBounds,
        rate_bounds: Option<BoxBounds>,
        constraints: Option<&LinearConstraints>,
    ) -> RuntimeResult<SafetyStepResult> {
        let ComposedBounds { thermal, bounds: reference } = composed;
        let rate_limited = rate_bounds.is_some();
        let bounds = rate_bounds.unwrap_or_else(|| reference.clone());
        if let Some(c) = constraints {
            c.check_dimension(self.n())?;
        }

        let (u_safe, status, max_constraint_violation) = if self.config.use_qp {
            let res = self.filter.filter(u_des, &bounds, constraints)?;
            if res.status == QpStatus::InfeasibleConstraints {
                tracing::debug!(
                    max_violation = ?res.max_constraint_violation,
                    "linear constraints violated after box clip"
                );
            }
            (
                res.u_safe,
                StepStatus::from_qp(res.status),
                res.max_constraint_violation,
            )
        } else {
            (bounds.clip(u_des)?, StepStatus::QpDisabled, None)
        };
        let status = if rate_limited {
            status.rate_limited()
        } else {
            status
        };

        let violations = violation_report(u_des, &u_safe, &reference);
        Ok(SafetyStepResult {
            u_safe,
            u_des: u_des.to_vec(),
            used_solver: false,
            status,
            bounds,
            thermal_ok_any: thermal.ok_any(),
            thermal_ok_all: thermal.ok_all(),
            violations,
            reason: None,
            max_constraint_violation,
        })
    }

    /// Safe-stop result over the hard box.
    pub(crate) fn kill_override(&self, u_des: &[f64], reason: &str) -> SafetyStepResult {
        tracing::debug!(reason, "returning safe-stop command");
        let u_safe = self.safe_stop_command();
        let mut violations = violation_report(u_des, &u_safe, &self.hard);
        violations.kill_override = true;
        SafetyStepResult {
            u_safe,
            u_des: u_des.to_vec(),
            used_solver: false,
            status: StepStatus::KillOverride,
            bounds: self.hard.clone(),
            thermal_ok_any: false,
            thermal_ok_all: false,
            violations,
            reason: Some(reason.to_string()),
            max_constraint_violation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use synthmuscle_bounds::ThermalLimit;
    use synthmuscle_test_helpers::prelude::*;
    use tracing_test::traced_test;

    fn thermal(entries: &[(&str, f64, bool)]) -> HashMap<String, ThermalLimit> {
        entries
            .iter()
            .map(|(id, l, ok)| ((*id).to_string(), ThermalLimit::new(*l, *ok)))
            .collect()
    }

    fn runtime(use_qp: bool) -> RuntimeResult<SafetyRuntime> {
        let map = CommandMap::new(["a0", "a1"])?;
        SafetyRuntime::new(SafetyRuntimeConfig::new(vec![5.0, 5.0]).with_qp(use_qp), map)
    }

    #[test]
    fn test_thermal_and_hard_limits_compose() -> TestResult {
        let rt = runtime(false)?;
        let res = rt.step(
            &[4.0, 4.0],
            &thermal(&[("a0", 3.0, true), ("a1", 1.0, true)]),
            None,
            None,
        )?;
        assert_vec_approx_eq!(&res.u_safe, &[3.0, 1.0], 0.0);
        assert_eq!(res.status, StepStatus::QpDisabled);
        assert_vec_approx_eq!(res.bounds_ub(), &[3.0, 1.0], 0.0);
        assert!(res.thermal_ok_all);
        assert_approx_eq!(res.violations.max_clip_mag, 3.0, 1e-12);
        assert_approx_eq!(res.violations.frac_saturated, 1.0, 1e-12);
        Ok(())
    }

    #[test]
    fn test_hard_limit_wins_over_loose_thermal() -> TestResult {
        let rt = runtime(true)?;
        let res = rt.step(
            &[9.0, -9.0],
            &thermal(&[("a0", 100.0, true), ("a1", 100.0, false)]),
            None,
            None,
        )?;
        assert_vec_approx_eq!(&res.u_safe, &[5.0, -5.0], 0.0);
        assert_eq!(res.status, StepStatus::Feasible);
        assert!(res.thermal_ok_any);
        assert!(!res.thermal_ok_all);
        Ok(())
    }

    #[test]
    fn test_external_kill_returns_safe_stop() -> TestResult {
        let map = CommandMap::new(["a0", "a1"])?;
        let rt = SafetyRuntime::new(
            SafetyRuntimeConfig::new(vec![5.0, 5.0]).with_safe_stop_value(0.5),
            map,
        )?;
        let empty: HashMap<String, ThermalLimit> = HashMap::new();
        let res = rt.step(&[4.0, 4.0], &empty, None, Some(&KillSignal::kill("estop")))?;
        assert_vec_approx_eq!(&res.u_safe, &[0.5, 0.5], 0.0);
        assert_eq!(res.status, StepStatus::KillOverride);
        assert_eq!(res.reason.as_deref(), Some("estop"));
        assert!(res.violations.kill_override);
        assert_vec_approx_eq!(res.bounds_lb(), &[-5.0, -5.0], 0.0);
        Ok(())
    }

    #[test]
    fn test_inactive_kill_signal_is_ignored() -> TestResult {
        let rt = runtime(true)?;
        let res = rt.step(
            &[1.0, 1.0],
            &thermal(&[("a0", 3.0, true), ("a1", 3.0, true)]),
            None,
            Some(&KillSignal::default()),
        )?;
        assert_eq!(res.status, StepStatus::Feasible);
        Ok(())
    }

    #[test]
    fn test_non_finite_command_is_killed() -> TestResult {
        let rt = runtime(true)?;
        let res = rt.step(
            &[f64::NAN, 1.0],
            &thermal(&[("a0", 3.0, true), ("a1", 3.0, true)]),
            None,
            None,
        )?;
        assert!(res.is_kill_override());
        assert_eq!(res.reason.as_deref(), Some(NON_FINITE_COMMAND));
        assert_all_finite!(&res.u_safe);
        Ok(())
    }

    #[test]
    fn test_missing_thermal_entry_is_an_error() -> TestResult {
        let rt = runtime(true)?;
        let err = must_err(rt.step(&[0.0, 0.0], &thermal(&[("a0", 3.0, true)]), None, None));
        assert!(err.is_missing_thermal_limit());
        Ok(())
    }

    #[test]
    fn test_command_length_mismatch() -> TestResult {
        let rt = runtime(true)?;
        let err = must_err(rt.step(&[0.0], &thermal(&[]), None, None));
        assert_eq!(err, RuntimeError::command_length(2, 1));
        Ok(())
    }

    #[test]
    fn test_infeasible_constraints_reported() -> TestResult {
        let rt = runtime(true)?;
        let c = LinearConstraints::new(vec![vec![1.0, 1.0]], vec![1.0])?;
        let res = rt.step(
            &[3.0, 3.0],
            &thermal(&[("a0", 3.0, true), ("a1", 3.0, true)]),
            Some(&c),
            None,
        )?;
        assert_eq!(res.status, StepStatus::InfeasibleConstraints);
        assert_vec_approx_eq!(&res.u_safe, &[3.0, 3.0], 0.0);
        let worst = must_some(res.max_constraint_violation, "constraints were checked");
        assert_approx_eq!(worst, 5.0, 1e-12);
        Ok(())
    }

    #[test]
    fn test_config_validation() -> TestResult {
        let map = CommandMap::new(["a0", "a1"])?;
        assert!(SafetyRuntime::new(SafetyRuntimeConfig::new(vec![5.0]), map.clone()).is_err());
        assert!(
            SafetyRuntime::new(SafetyRuntimeConfig::new(vec![5.0, -1.0]), map.clone()).is_err()
        );
        assert!(
            SafetyRuntime::new(
                SafetyRuntimeConfig::new(vec![5.0, 5.0]).with_safe_stop_value(f64::NAN),
                map
            )
            .is_err()
        );
        Ok(())
    }

    #[test]
    fn test_config_deserialize_defaults() -> TestResult {
        let cfg: SafetyRuntimeConfig = serde_json::from_str(r#"{"hard_limit_abs": [1.0, 2.0]}"#)?;
        assert!(cfg.use_qp);
        assert_approx_eq!(cfg.safe_stop_value, 0.0, 0.0);
        assert_eq!(cfg, SafetyRuntimeConfig::new(vec![1.0, 2.0]));
        Ok(())
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(StepStatus::KillOverride.to_string(), "KILL_OVERRIDE");
        assert_eq!(
            StepStatus::from_qp(QpStatus::InfeasibleConstraints).rate_limited(),
            StepStatus::InfeasibleConstraintsRateLimited
        );
        assert_eq!(
            StepStatus::QpDisabled.rate_limited().as_str(),
            "QP_DISABLED_RATE_LIMITED"
        );
        assert_eq!(StepStatus::KillOverride.rate_limited(), StepStatus::KillOverride);
    }

    #[test]
    #[traced_test]
    fn test_non_finite_override_is_logged() -> TestResult {
        let rt = runtime(true)?;
        let res = rt.step(
            &[f64::NAN, 0.0],
            &thermal(&[("a0", 1.0, true), ("a1", 1.0, true)]),
            None,
            None,
        )?;
        assert!(res.is_kill_override());
        assert!(logs_contain("returning safe-stop command"));
        assert!(logs_contain(NON_FINITE_COMMAND));
        Ok(())
    }
}

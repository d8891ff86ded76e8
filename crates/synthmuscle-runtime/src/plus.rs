//! Runtime with per-step rate limiting against a caller-owned context.

use serde::{Deserialize, Serialize};
use synthmuscle_bounds::vector::all_finite;
use synthmuscle_bounds::{BoundsError, CommandMap, LinearConstraints, RateLimit, ThermalLimitLookup};

use crate::context::SafetyContext;
use crate::error::RuntimeResult;
use crate::runtime::{
    KillSignal, NON_FINITE_COMMAND, SafetyRuntime, SafetyRuntimeConfig, SafetyStepResult,
};

/// Reason latched when the rate-limit box does not overlap the hard ∩
/// thermal box.
pub const RATE_LIMIT_BOUNDS_INCONSISTENT: &str = "rate_limit_bounds_inconsistent";

/// Configuration for [`SafetyRuntimePlus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRuntimePlusConfig {
    /// Hard limits, filter and safe stop.
    pub base: SafetyRuntimeConfig,
    /// Per-step rate limit; `None` disables rate limiting.
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
}

impl SafetyRuntimePlusConfig {
    /// Wrap a base configuration without rate limiting.
    #[must_use]
    pub fn new(base: SafetyRuntimeConfig) -> Self {
        Self {
            base,
            rate_limit: None,
        }
    }

    /// Set the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

/// [`SafetyRuntime`] that also keeps each output within a rate limit of the
/// previous accepted output.
///
/// The previous output and the kill latch live in a [`SafetyContext`] the
/// caller passes to every [`step`](Self::step).
#[derive(Debug, Clone)]
pub struct SafetyRuntimePlus {
    base: SafetyRuntime,
    rate_limit: Option<RateLimit>,
}

impl SafetyRuntimePlus {
    /// Create a runtime for the actuators in `cmd_map`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base configuration or the rate limit does not
    /// validate against the command-map length.
    pub fn new(config: SafetyRuntimePlusConfig, cmd_map: CommandMap) -> RuntimeResult<Self> {
        let base = SafetyRuntime::new(config.base, cmd_map)?;
        if let Some(rl) = &config.rate_limit {
            rl.validate(base.n())?;
        }
        Ok(Self {
            base,
            rate_limit: config.rate_limit,
        })
    }

    /// The wrapped runtime.
    #[must_use]
    pub fn base(&self) -> &SafetyRuntime {
        &self.base
    }

    /// Configured rate limit.
    #[must_use]
    pub fn rate_limit(&self) -> Option<&RateLimit> {
        self.rate_limit.as_ref()
    }

    /// Run one cycle and record the output in `ctx`.
    ///
    /// A latched kill in `ctx` takes precedence over `kill`. A non-finite
    /// `u_des` latches a kill. If the rate-limit box does not overlap the
    /// hard ∩ thermal box for some index, the kill is latched with
    /// [`RATE_LIMIT_BOUNDS_INCONSISTENT`] and the safe-stop command returned.
    ///
    /// # Errors
    ///
    /// See [`SafetyRuntime::step`].
    pub fn step<L>(
        &self,
        ctx: &mut SafetyContext,
        u_des: &[f64],
        thermal_limits: &L,
        constraints: Option<&LinearConstraints>,
        kill: Option<&KillSignal>,
    ) -> RuntimeResult<SafetyStepResult>
    where
        L: ThermalLimitLookup + ?Sized,
    {
        self.base.check_command_len(u_des)?;

        if !ctx.is_kill_latched() && !all_finite(u_des) {
            ctx.latch_kill(NON_FINITE_COMMAND);
        }
        if ctx.is_kill_latched() {
            let res = self.base.kill_override(u_des, ctx.kill_reason());
            return Self::record(ctx, res);
        }
        if let Some(signal) = kill.filter(|k| k.kill) {
            let res = self.base.kill_override(u_des, &signal.reason);
            return Self::record(ctx, res);
        }

        let composed = self.base.compose(u_des, thermal_limits)?;
        let Some(rl) = &self.rate_limit else {
            let res = self.base.finish(u_des, composed, None, constraints)?;
            return Self::record(ctx, res);
        };

        let rate = rl.bounds_around(ctx.prev(self.base.n()))?;
        let bounds = match composed.bounds.intersect(&rate) {
            Ok(bounds) => bounds,
            Err(BoundsError::Inverted { index, lb, ub }) => {
                tracing::warn!(
                    index,
                    lb,
                    ub,
                    "rate-limit bounds do not overlap hard and thermal bounds"
                );
                ctx.latch_kill(RATE_LIMIT_BOUNDS_INCONSISTENT);
                let res = self.base.kill_override(u_des, ctx.kill_reason());
                return Self::record(ctx, res);
            }
            Err(other) => return Err(other.into()),
        };

        let res = self.base.finish(u_des, composed, Some(bounds), constraints)?;
        Self::record(ctx, res)
    }

    fn record(ctx: &mut SafetyContext, res: SafetyStepResult) -> RuntimeResult<SafetyStepResult> {
        ctx.set_prev(&res.u_safe)?;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::StepStatus;
    use std::collections::BTreeMap;
    use synthmuscle_bounds::ThermalLimit;
    use synthmuscle_test_helpers::prelude::*;
    use tracing_test::traced_test;

    fn limits(l: f64) -> BTreeMap<String, ThermalLimit> {
        ["a0", "a1"]
            .iter()
            .map(|id| ((*id).to_string(), ThermalLimit::new(l, true)))
            .collect()
    }

    fn plus(use_qp: bool, du: Vec<f64>) -> RuntimeResult<SafetyRuntimePlus> {
        let cfg = SafetyRuntimePlusConfig::new(
            SafetyRuntimeConfig::new(vec![5.0, 5.0]).with_qp(use_qp),
        )
        .with_rate_limit(RateLimit::per_step(du));
        SafetyRuntimePlus::new(cfg, CommandMap::new(["a0", "a1"])?)
    }

    #[test]
    fn test_rate_limited_clip() -> TestResult {
        let rt = plus(false, vec![0.5, 0.25])?;
        let mut ctx = SafetyContext::new();
        ctx.set_prev(&[0.0, 1.0])?;

        let res = rt.step(&mut ctx, &[10.0, 0.0], &limits(5.0), None, None)?;
        assert_vec_approx_eq!(&res.u_safe, &[0.5, 0.75], 1e-12);
        assert_vec_approx_eq!(res.bounds_lb(), &[-0.5, 0.75], 1e-12);
        assert_vec_approx_eq!(res.bounds_ub(), &[0.5, 1.25], 1e-12);
        assert_eq!(res.status, StepStatus::QpDisabledRateLimited);
        assert_eq!(ctx.u_prev(), Some(&res.u_safe[..]));

        // Clip magnitude is measured against the hard box, delta against the output.
        assert_approx_eq!(res.violations.max_clip_mag, 5.0, 1e-12);
        assert_approx_eq!(res.violations.max_delta_mag, 9.5, 1e-12);
        assert_approx_eq!(res.violations.frac_saturated, 0.0, 0.0);
        Ok(())
    }

    #[test]
    fn test_filter_status_is_suffixed() -> TestResult {
        let rt = plus(true, vec![1.0, 1.0])?;
        let mut ctx = SafetyContext::new();
        let res = rt.step(&mut ctx, &[3.0, 3.0], &limits(5.0), None, None)?;
        assert_eq!(res.status, StepStatus::FeasibleRateLimited);
        assert_vec_approx_eq!(&res.u_safe, &[1.0, 1.0], 0.0);

        let res = rt.step(&mut ctx, &[3.0, 3.0], &limits(5.0), None, None)?;
        assert_vec_approx_eq!(&res.u_safe, &[2.0, 2.0], 0.0);
        Ok(())
    }

    #[test]
    fn test_without_rate_limit_records_prev() -> TestResult {
        let cfg = SafetyRuntimePlusConfig::new(SafetyRuntimeConfig::new(vec![5.0, 5.0]));
        let rt = SafetyRuntimePlus::new(cfg, CommandMap::new(["a0", "a1"])?)?;
        let mut ctx = SafetyContext::new();
        let res = rt.step(&mut ctx, &[3.0, -3.0], &limits(2.0), None, None)?;
        assert_eq!(res.status, StepStatus::Feasible);
        assert_eq!(ctx.u_prev(), Some(&[2.0, -2.0][..]));
        Ok(())
    }

    #[test]
    fn test_inconsistent_bounds_latch_kill() -> TestResult {
        let rt = plus(false, vec![1.0, 1.0])?;
        let mut ctx = SafetyContext::new();
        ctx.set_prev(&[10.0, 0.0])?;

        let res = rt.step(&mut ctx, &[0.0, 0.0], &limits(5.0), None, None)?;
        assert!(res.is_kill_override());
        assert_eq!(res.reason.as_deref(), Some(RATE_LIMIT_BOUNDS_INCONSISTENT));
        assert!(ctx.is_kill_latched());
        assert_eq!(ctx.kill_reason(), RATE_LIMIT_BOUNDS_INCONSISTENT);
        assert_eq!(ctx.u_prev(), Some(&[0.0, 0.0][..]));

        // Latched: stays killed even with a benign command.
        let res = rt.step(&mut ctx, &[0.0, 0.0], &limits(5.0), None, None)?;
        assert!(res.is_kill_override());

        ctx.clear_kill();
        let res = rt.step(&mut ctx, &[0.5, 0.5], &limits(5.0), None, None)?;
        assert_eq!(res.status, StepStatus::QpDisabledRateLimited);
        Ok(())
    }

    #[test]
    fn test_non_finite_command_latches_context() -> TestResult {
        let rt = plus(true, vec![1.0, 1.0])?;
        let mut ctx = SafetyContext::new();
        let res = rt.step(&mut ctx, &[f64::INFINITY, 0.0], &limits(5.0), None, None)?;
        assert!(res.is_kill_override());
        assert!(ctx.is_kill_latched());
        assert_eq!(ctx.kill_reason(), NON_FINITE_COMMAND);
        Ok(())
    }

    #[test]
    fn test_external_kill_does_not_latch() -> TestResult {
        let rt = plus(true, vec![1.0, 1.0])?;
        let mut ctx = SafetyContext::new();
        let res = rt.step(
            &mut ctx,
            &[1.0, 1.0],
            &limits(5.0),
            None,
            Some(&KillSignal::kill("operator")),
        )?;
        assert_eq!(res.reason.as_deref(), Some("operator"));
        assert!(!ctx.is_kill_latched());
        Ok(())
    }

    #[test]
    fn test_rate_limit_length_checked_at_construction() -> TestResult {
        let cfg = SafetyRuntimePlusConfig::new(SafetyRuntimeConfig::new(vec![5.0, 5.0]))
            .with_rate_limit(RateLimit::per_step(vec![1.0]));
        assert!(SafetyRuntimePlus::new(cfg, CommandMap::new(["a0", "a1"])?).is_err());
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_context_latch_is_logged() -> TestResult {
        let rt = plus(false, vec![0.1, 0.1])?;
        let mut ctx = SafetyContext::new();
        ctx.set_prev(&[3.0, 3.0])?;

        let res = rt.step(&mut ctx, &[0.0, 0.0], &limits(1.0), None, None)?;
        assert!(res.is_kill_override());
        assert!(logs_contain("rate-limit bounds do not overlap"));
        assert!(logs_contain("safety context kill latched"));
        assert!(logs_contain(RATE_LIMIT_BOUNDS_INCONSISTENT));

        ctx.clear_kill();
        assert!(logs_contain("safety context kill cleared"));
        Ok(())
    }
}

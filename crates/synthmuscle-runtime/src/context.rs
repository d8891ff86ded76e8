//! Persistent per-session state for the rate-limited runtime.

use serde::{Deserialize, Serialize};
use synthmuscle_bounds::vector::all_finite;

use crate::error::{RuntimeError, RuntimeResult};

/// Reason recorded when [`SafetyContext::latch_kill`] is given an empty one.
pub const DEFAULT_KILL_REASON: &str = "kill_latched";

/// Previous accepted command and the latched kill flag.
///
/// One context belongs to one actuator group. It is owned by the caller and
/// passed by mutable reference into every
/// [`SafetyRuntimePlus::step`](crate::SafetyRuntimePlus::step).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyContext {
    u_prev: Option<Vec<f64>>,
    kill_latched: bool,
    kill_reason: String,
}

impl SafetyContext {
    /// Create an empty context with no previous command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the previous command to `n` copies of `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not finite.
    pub fn init_prev(&mut self, n: usize, value: f64) -> RuntimeResult<()> {
        if !value.is_finite() {
            return Err(RuntimeError::context("init value must be finite"));
        }
        self.u_prev = Some(vec![value; n]);
        Ok(())
    }

    /// Previous command of length `n`.
    ///
    /// Re-initializes to zeros when nothing has been recorded yet or the
    /// recorded command has a different length.
    pub fn prev(&mut self, n: usize) -> &[f64] {
        let u = self.u_prev.get_or_insert_with(|| vec![0.0; n]);
        if u.len() != n {
            *u = vec![0.0; n];
        }
        u
    }

    /// Last recorded command, if any.
    #[must_use]
    pub fn u_prev(&self) -> Option<&[f64]> {
        self.u_prev.as_deref()
    }

    /// Record the accepted command for the next cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if `u` contains non-finite values; the previous value
    /// is kept.
    pub fn set_prev(&mut self, u: &[f64]) -> RuntimeResult<()> {
        if !all_finite(u) {
            return Err(RuntimeError::context("u contains non-finite values"));
        }
        match &mut self.u_prev {
            Some(prev) => {
                prev.clear();
                prev.extend_from_slice(u);
            }
            None => self.u_prev = Some(u.to_vec()),
        }
        Ok(())
    }

    /// Latch a kill. An empty reason is recorded as [`DEFAULT_KILL_REASON`].
    pub fn latch_kill(&mut self, reason: &str) {
        let reason = if reason.is_empty() {
            DEFAULT_KILL_REASON
        } else {
            reason
        };
        if !self.kill_latched {
            tracing::warn!(reason, "safety context kill latched");
        }
        self.kill_latched = true;
        self.kill_reason = reason.to_string();
    }

    /// Clear a latched kill.
    pub fn clear_kill(&mut self) {
        if self.kill_latched {
            tracing::info!(reason = %self.kill_reason, "safety context kill cleared");
        }
        self.kill_latched = false;
        self.kill_reason.clear();
    }

    /// Returns `true` while a kill is latched.
    #[must_use]
    pub fn is_kill_latched(&self) -> bool {
        self.kill_latched
    }

    /// Reason recorded with the latched kill, empty when not latched.
    #[must_use]
    pub fn kill_reason(&self) -> &str {
        &self.kill_reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthmuscle_test_helpers::prelude::*;

    #[test]
    fn test_prev_initializes_and_resizes() -> TestResult {
        let mut ctx = SafetyContext::new();
        assert_eq!(ctx.u_prev(), None);
        assert_vec_approx_eq!(ctx.prev(2), &[0.0, 0.0], 0.0);

        ctx.set_prev(&[1.0, 2.0])?;
        assert_vec_approx_eq!(ctx.prev(2), &[1.0, 2.0], 0.0);
        assert_vec_approx_eq!(ctx.prev(3), &[0.0, 0.0, 0.0], 0.0);
        Ok(())
    }

    #[test]
    fn test_set_prev_rejects_non_finite() -> TestResult {
        let mut ctx = SafetyContext::new();
        ctx.init_prev(2, 0.5)?;
        assert!(ctx.set_prev(&[f64::NAN, 0.0]).is_err());
        assert_eq!(ctx.u_prev(), Some(&[0.5, 0.5][..]));
        assert!(ctx.init_prev(2, f64::INFINITY).is_err());
        Ok(())
    }

    #[test]
    fn test_latch_and_clear() {
        let mut ctx = SafetyContext::new();
        ctx.latch_kill("");
        assert!(ctx.is_kill_latched());
        assert_eq!(ctx.kill_reason(), DEFAULT_KILL_REASON);

        ctx.latch_kill("operator");
        assert_eq!(ctx.kill_reason(), "operator");

        ctx.clear_kill();
        assert!(!ctx.is_kill_latched());
        assert_eq!(ctx.kill_reason(), "");
    }
}

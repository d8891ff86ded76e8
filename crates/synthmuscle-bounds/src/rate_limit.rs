//! Per-index rate limiting.
//!
//! A rate limit restricts how far each command component may move from the
//! previously accepted command in one control step. It is expressed as box
//! bounds around the previous command so it composes with the other limits
//! by intersection.

use serde::{Deserialize, Serialize};

use crate::bounds::BoxBounds;
use crate::error::{BoundsError, BoundsResult};
use crate::vector::{clip, ensure_finite, ensure_len, ensure_non_negative};

/// Maximum absolute change per step for each command index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Per-index absolute max delta per step.
    pub du_max_abs: Vec<f64>,
}

impl RateLimit {
    /// Create a rate limit with a per-step delta directly.
    ///
    /// # Example
    ///
    /// ```
    /// use synthmuscle_bounds::RateLimit;
    ///
    /// let rl = RateLimit::per_step(vec![0.5, 0.25]);
    /// assert!(rl.validate(2).is_ok());
    /// ```
    #[must_use]
    pub fn per_step(du_max_abs: Vec<f64>) -> Self {
        Self { du_max_abs }
    }

    /// Create a rate limit from a per-second rate and the control period.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt_s` is not a positive finite number or a rate
    /// is non-finite or negative.
    pub fn from_rate(rate_per_s: &[f64], dt_s: f64) -> BoundsResult<Self> {
        if !dt_s.is_finite() || dt_s <= 0.0 {
            return Err(BoundsError::invalid_configuration("dt_s must be > 0"));
        }
        ensure_finite(rate_per_s, "rate_per_s")?;
        ensure_non_negative(rate_per_s, "rate_per_s")?;
        Ok(Self {
            du_max_abs: rate_per_s.iter().map(|r| r * dt_s).collect(),
        })
    }

    /// Enforce length `n`, finiteness and `du_max_abs[i] >= 0`.
    ///
    /// # Errors
    ///
    /// Returns the first violated condition.
    pub fn validate(&self, n: usize) -> BoundsResult<()> {
        ensure_finite(&self.du_max_abs, "du_max_abs")?;
        ensure_len(&self.du_max_abs, n, "du_max_abs")?;
        ensure_non_negative(&self.du_max_abs, "du_max_abs")
    }

    /// Bounds `u_prev ± du_max_abs` as a [`BoxBounds`].
    ///
    /// # Errors
    ///
    /// See [`rate_limit_bounds`].
    pub fn bounds_around(&self, u_prev: &[f64]) -> BoundsResult<BoxBounds> {
        let (lb, ub) = rate_limit_bounds(u_prev, &self.du_max_abs)?;
        BoxBounds::new(lb, ub)
    }
}

/// Compute `(u_prev - du_max_abs, u_prev + du_max_abs)`.
///
/// # Errors
///
/// Returns an error if either input is non-finite or their lengths differ.
pub fn rate_limit_bounds(u_prev: &[f64], du_max_abs: &[f64]) -> BoundsResult<(Vec<f64>, Vec<f64>)> {
    ensure_finite(u_prev, "u_prev")?;
    ensure_finite(du_max_abs, "du_max_abs")?;
    ensure_len(du_max_abs, u_prev.len(), "du_max_abs")?;
    let lb = u_prev.iter().zip(du_max_abs).map(|(u, d)| u - d).collect();
    let ub = u_prev.iter().zip(du_max_abs).map(|(u, d)| u + d).collect();
    Ok((lb, ub))
}

/// Clip `u_des` into the rate-limit bounds around `u_prev`.
///
/// # Errors
///
/// Returns an error if any input is non-finite or lengths differ.
pub fn apply_rate_limit(u_des: &[f64], u_prev: &[f64], du_max_abs: &[f64]) -> BoundsResult<Vec<f64>> {
    ensure_finite(u_des, "u_des")?;
    let (lb, ub) = rate_limit_bounds(u_prev, du_max_abs)?;
    ensure_len(u_des, lb.len(), "u_des")?;
    Ok(clip(u_des, &lb, &ub))
}

//! Deterministic box filter with optional linear-constraint check.
//!
//! The filter clips a desired command into box bounds and, when linear
//! constraints `A·u <= b` are supplied, reports whether the clipped command
//! satisfies them. It never re-optimizes: an infeasible result keeps the
//! box-clipped command and only changes the status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bounds::BoxBounds;
use crate::error::{BoundsError, BoundsResult};
use crate::vector::ensure_finite;

/// Slack allowed on `A·u <= b` before a row counts as violated.
pub const CONSTRAINT_TOLERANCE: f64 = 1e-9;

/// Fallback used by the filter.
///
/// Both variants currently clip; `Solver` is accepted so configurations that
/// select it keep loading once an iterative solve exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QpFallback {
    /// Clip to the box.
    #[default]
    Clip,
    /// Reserved for a real QP solve.
    Solver,
}

impl FromStr for QpFallback {
    type Err = BoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clip" => Ok(Self::Clip),
            "solver" => Ok(Self::Solver),
            other => Err(BoundsError::invalid_configuration(format!(
                "fallback must be 'clip' or 'solver', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QpFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clip => f.write_str("clip"),
            Self::Solver => f.write_str("solver"),
        }
    }
}

/// Filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QpSafetyConfig {
    /// Fallback strategy.
    #[serde(default)]
    pub fallback: QpFallback,
}

/// Dense linear inequality constraints `A·u <= b`, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraints {
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
}

impl LinearConstraints {
    /// Build constraints, checking that every row of `a` has one entry per
    /// command component and that `b` has one entry per row.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::Constraints`] for a ragged or mis-sized matrix
    /// or non-finite entries.
    pub fn new(a: Vec<Vec<f64>>, b: Vec<f64>) -> BoundsResult<Self> {
        if a.len() != b.len() {
            return Err(BoundsError::constraints(format!(
                "b length {} must match rows of A ({})",
                b.len(),
                a.len()
            )));
        }
        if let Some(first) = a.first() {
            let cols = first.len();
            if a.iter().any(|row| row.len() != cols) {
                return Err(BoundsError::constraints("A rows must have equal length"));
            }
        }
        if !a.iter().flatten().chain(b.iter()).all(|v| v.is_finite()) {
            return Err(BoundsError::constraints("A and b must be finite"));
        }
        Ok(Self { a, b })
    }

    /// Number of constraint rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.b.len()
    }

    /// Number of columns, `None` for zero rows.
    #[must_use]
    pub fn cols(&self) -> Option<usize> {
        self.a.first().map(Vec::len)
    }

    /// Check the column count against the command dimension.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::Constraints`] on mismatch.
    pub fn check_dimension(&self, n: usize) -> BoundsResult<()> {
        match self.cols() {
            Some(cols) if cols != n => Err(BoundsError::constraints(format!(
                "A columns ({cols}) must match command dimension ({n})"
            ))),
            _ => Ok(()),
        }
    }

    /// Per-row residual `A·u - b`.
    #[must_use]
    pub fn residuals(&self, u: &[f64]) -> Vec<f64> {
        self.a
            .iter()
            .zip(self.b.iter())
            .map(|(row, bi)| row.iter().zip(u).map(|(aij, uj)| aij * uj).sum::<f64>() - bi)
            .collect()
    }

    /// Largest residual, `f64::NEG_INFINITY` for zero rows.
    #[must_use]
    pub fn max_violation(&self, u: &[f64]) -> f64 {
        self.residuals(u)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// `true` if every row holds within [`CONSTRAINT_TOLERANCE`].
    #[must_use]
    pub fn is_satisfied(&self, u: &[f64]) -> bool {
        self.residuals(u).iter().all(|r| *r <= CONSTRAINT_TOLERANCE)
    }
}

/// Filter outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QpStatus {
    /// No constraints, or all satisfied after clipping.
    Feasible,
    /// At least one linear constraint is violated after clipping.
    InfeasibleConstraints,
}

impl QpStatus {
    /// Stable status string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feasible => "FEASIBLE",
            Self::InfeasibleConstraints => "INFEASIBLE_CONSTRAINTS",
        }
    }
}

impl fmt::Display for QpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`QpSafetyFilter::filter`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QpResult {
    /// Box-clipped command.
    pub u_safe: Vec<f64>,
    /// Always `false`: no iterative solve runs.
    pub used_solver: bool,
    /// Feasibility of the linear constraints.
    pub status: QpStatus,
    /// Largest `A·u - b` residual when constraints were checked.
    pub max_constraint_violation: Option<f64>,
}

/// Box filter with linear-constraint detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct QpSafetyFilter {
    config: QpSafetyConfig,
}

impl QpSafetyFilter {
    /// Create a filter.
    #[must_use]
    pub const fn new(config: QpSafetyConfig) -> Self {
        Self { config }
    }

    /// Configured fallback.
    #[must_use]
    pub const fn config(&self) -> &QpSafetyConfig {
        &self.config
    }

    /// Clip `u_des` into `bounds` and check `constraints` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if `u_des` is non-finite or mis-sized, or the
    /// constraint columns do not match the command dimension.
    pub fn filter(
        &self,
        u_des: &[f64],
        bounds: &BoxBounds,
        constraints: Option<&LinearConstraints>,
    ) -> BoundsResult<QpResult> {
        ensure_finite(u_des, "u_des")?;
        let u_safe = match self.config.fallback {
            QpFallback::Clip | QpFallback::Solver => bounds.clip(u_des)?,
        };

        let (status, max_constraint_violation) = match constraints {
            Some(c) => {
                c.check_dimension(u_safe.len())?;
                let worst = c.max_violation(&u_safe);
                let status = if worst > CONSTRAINT_TOLERANCE {
                    QpStatus::InfeasibleConstraints
                } else {
                    QpStatus::Feasible
                };
                (status, Some(worst))
            }
            None => (QpStatus::Feasible, None),
        };

        Ok(QpResult {
            u_safe,
            used_solver: false,
            status,
            max_constraint_violation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthmuscle_test_helpers::prelude::*;

    #[test]
    fn test_fallback_parse() -> TestResult {
        assert_eq!(" Clip ".parse::<QpFallback>()?, QpFallback::Clip);
        assert_eq!("SOLVER".parse::<QpFallback>()?, QpFallback::Solver);
        assert!("osqp".parse::<QpFallback>().is_err());
        assert_eq!(QpFallback::Solver.to_string(), "solver");
        Ok(())
    }

    #[test]
    fn test_filter_without_constraints_is_feasible_clip() -> TestResult {
        let filter = QpSafetyFilter::default();
        let bounds = BoxBounds::symmetric(&[1.0, 2.0])?;
        let r = filter.filter(&[5.0, -5.0], &bounds, None)?;
        assert_vec_approx_eq!(&r.u_safe, &[1.0, -2.0], 0.0);
        assert_eq!(r.status, QpStatus::Feasible);
        assert!(!r.used_solver);
        assert_eq!(r.max_constraint_violation, None);
        Ok(())
    }

    #[test]
    fn test_infeasible_constraint_is_detected_not_fixed() -> TestResult {
        let filter = QpSafetyFilter::default();
        let bounds = BoxBounds::symmetric(&[1.0, 1.0])?;
        // u0 + u1 <= 0.5
        let c = LinearConstraints::new(vec![vec![1.0, 1.0]], vec![0.5])?;
        let r = filter.filter(&[1.0, 1.0], &bounds, Some(&c))?;
        assert_eq!(r.status, QpStatus::InfeasibleConstraints);
        assert_vec_approx_eq!(&r.u_safe, &[1.0, 1.0], 0.0);

        let r = filter.filter(&[0.25, 0.25], &bounds, Some(&c))?;
        assert_eq!(r.status, QpStatus::Feasible);
        Ok(())
    }

    #[test]
    fn test_constraint_tolerance() -> TestResult {
        let c = LinearConstraints::new(vec![vec![1.0]], vec![1.0])?;
        assert!(c.is_satisfied(&[1.0 + 1e-10]));
        assert!(!c.is_satisfied(&[1.0 + 1e-6]));
        Ok(())
    }

    #[test]
    fn test_constraints_shape_errors() -> TestResult {
        assert!(LinearConstraints::new(vec![vec![1.0, 0.0]], vec![]).is_err());
        assert!(LinearConstraints::new(vec![vec![1.0, 0.0], vec![1.0]], vec![0.0, 0.0]).is_err());
        assert!(LinearConstraints::new(vec![vec![f64::NAN]], vec![0.0]).is_err());

        let c = LinearConstraints::new(vec![vec![1.0, 0.0, 0.0]], vec![0.0])?;
        let bounds = BoxBounds::symmetric(&[1.0, 1.0])?;
        let err = must_err(QpSafetyFilter::default().filter(&[0.0, 0.0], &bounds, Some(&c)));
        assert!(matches!(err, BoundsError::Constraints(_)));
        Ok(())
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(QpStatus::Feasible.as_str(), "FEASIBLE");
        assert_eq!(
            QpStatus::InfeasibleConstraints.to_string(),
            "INFEASIBLE_CONSTRAINTS"
        );
    }
}

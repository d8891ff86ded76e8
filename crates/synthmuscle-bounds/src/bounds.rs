//! Per-index lower/upper box bounds.

use serde::Serialize;

use crate::error::{BoundsError, BoundsResult};
use crate::vector::{clip, ensure_finite, ensure_len, ensure_non_negative};

/// Independent per-component `[lb, ub]` limits applied element-wise.
///
/// A constructed `BoxBounds` is always finite with `lb[i] <= ub[i]`; the
/// fields are private so that invariant cannot be broken afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxBounds {
    lb: Vec<f64>,
    ub: Vec<f64>,
}

impl BoxBounds {
    /// Build bounds from explicit lower and upper vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the lengths differ, a value is non-finite, or
    /// `lb[i] > ub[i]` for any index.
    pub fn new(lb: Vec<f64>, ub: Vec<f64>) -> BoundsResult<Self> {
        let bounds = Self { lb, ub };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Build `[-limit, +limit]` bounds from a symmetric absolute-limit vector.
    ///
    /// # Errors
    ///
    /// Returns an error if a limit is non-finite or negative.
    pub fn symmetric(limit_abs: &[f64]) -> BoundsResult<Self> {
        ensure_finite(limit_abs, "limit_abs_by_index")?;
        ensure_non_negative(limit_abs, "limit_abs_by_index")?;
        Self::new(limit_abs.iter().map(|l| -l).collect(), limit_abs.to_vec())
    }

    /// Check finiteness, matching lengths and ordering.
    ///
    /// # Errors
    ///
    /// See [`BoxBounds::new`].
    pub fn validate(&self) -> BoundsResult<()> {
        ensure_len(&self.ub, self.lb.len(), "ub")?;
        ensure_finite(&self.lb, "lb")?;
        ensure_finite(&self.ub, "ub")?;
        let inverted = self
            .lb
            .iter()
            .zip(self.ub.iter())
            .enumerate()
            .find(|(_, (lo, hi))| lo > hi);
        match inverted {
            Some((index, (lo, hi))) => Err(BoundsError::Inverted {
                index,
                lb: *lo,
                ub: *hi,
            }),
            None => Ok(()),
        }
    }

    /// Number of bounded components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lb.len()
    }

    /// Returns `true` for zero-dimensional bounds.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lb.is_empty()
    }

    /// Lower bound vector.
    #[must_use]
    pub fn lb(&self) -> &[f64] {
        &self.lb
    }

    /// Upper bound vector.
    #[must_use]
    pub fn ub(&self) -> &[f64] {
        &self.ub
    }

    /// Consume the bounds into `(lb, ub)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.lb, self.ub)
    }

    /// Clip `u` element-wise into the box.
    ///
    /// # Errors
    ///
    /// Returns an error if `u` has the wrong length or is non-finite.
    pub fn clip(&self, u: &[f64]) -> BoundsResult<Vec<f64>> {
        ensure_len(u, self.len(), "u")?;
        ensure_finite(u, "u")?;
        Ok(clip(u, &self.lb, &self.ub))
    }

    /// Returns `true` if every component of `u` lies within the box,
    /// widened by `tol` on both sides.
    #[must_use]
    pub fn contains(&self, u: &[f64], tol: f64) -> bool {
        u.len() == self.len()
            && u
                .iter()
                .zip(self.lb.iter().zip(self.ub.iter()))
                .all(|(v, (lo, hi))| *v >= lo - tol && *v <= hi + tol)
    }

    /// Element-wise intersection `[max(lb), min(ub)]`.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::Inverted`] if the intersection is empty for any
    /// index, or a length mismatch.
    pub fn intersect(&self, other: &Self) -> BoundsResult<Self> {
        ensure_len(&other.lb, self.len(), "intersect.other")?;
        let lb = self
            .lb
            .iter()
            .zip(other.lb.iter())
            .map(|(a, b)| a.max(*b))
            .collect();
        let ub = self
            .ub
            .iter()
            .zip(other.ub.iter())
            .map(|(a, b)| a.min(*b))
            .collect();
        Self::new(lb, ub)
    }

    /// Returns `true` if this box lies inside `other` for every index.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .lb
                .iter()
                .zip(other.lb.iter())
                .all(|(inner, outer)| inner >= outer)
            && self
                .ub
                .iter()
                .zip(other.ub.iter())
                .all(|(inner, outer)| inner <= outer)
    }
}

/// Build symmetric bounds from per-index absolute limits.
///
/// # Errors
///
/// See [`BoxBounds::symmetric`].
pub fn bounds_from_limits(limit_abs_by_index: &[f64]) -> BoundsResult<BoxBounds> {
    BoxBounds::symmetric(limit_abs_by_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthmuscle_test_helpers::prelude::*;

    #[test]
    fn test_symmetric_bounds() -> TestResult {
        let b = BoxBounds::symmetric(&[5.0, 1.0, 0.0])?;
        assert_vec_approx_eq!(b.lb(), &[-5.0, -1.0, 0.0], 0.0);
        assert_vec_approx_eq!(b.ub(), &[5.0, 1.0, 0.0], 0.0);
        Ok(())
    }

    #[test]
    fn test_symmetric_rejects_negative_and_nan() {
        assert!(matches!(
            BoxBounds::symmetric(&[1.0, -1.0]),
            Err(BoundsError::Negative { index: 1, .. })
        ));
        assert!(matches!(
            BoxBounds::symmetric(&[f64::NAN]),
            Err(BoundsError::NonFinite(_))
        ));
    }

    #[test]
    fn test_new_rejects_inverted() {
        let err = must_err(BoxBounds::new(vec![0.0, 2.0], vec![1.0, 1.0]));
        assert!(matches!(err, BoundsError::Inverted { index: 1, .. }));
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = must_err(BoxBounds::new(vec![0.0, 0.0], vec![1.0]));
        assert!(matches!(err, BoundsError::LengthMismatch { .. }));
    }

    #[test]
    fn test_clip_and_contains() -> TestResult {
        let b = BoxBounds::new(vec![-1.0, -2.0, -0.1], vec![1.0, 2.0, 0.1])?;
        let u = b.clip(&[10.0, -10.0, 0.5])?;
        assert_vec_approx_eq!(&u, &[1.0, -2.0, 0.1], 0.0);
        assert!(b.contains(&u, 0.0));
        assert!(!b.contains(&[10.0, 0.0, 0.0], 1e-9));
        assert!(!b.contains(&[0.0], 1e-9));
        Ok(())
    }

    #[test]
    fn test_intersect_and_subset() -> TestResult {
        let hard = BoxBounds::symmetric(&[5.0, 5.0])?;
        let rate = BoxBounds::new(vec![-0.5, 0.75], vec![0.5, 1.25])?;
        let both = hard.intersect(&rate)?;
        assert_vec_approx_eq!(both.lb(), &[-0.5, 0.75], 0.0);
        assert_vec_approx_eq!(both.ub(), &[0.5, 1.25], 0.0);
        assert!(both.is_subset_of(&hard));
        assert!(!hard.is_subset_of(&both));
        Ok(())
    }

    #[test]
    fn test_intersect_empty_is_inverted() -> TestResult {
        let a = BoxBounds::new(vec![0.0], vec![1.0])?;
        let b = BoxBounds::new(vec![2.0], vec![3.0])?;
        assert!(matches!(
            a.intersect(&b),
            Err(BoundsError::Inverted { index: 0, .. })
        ));
        Ok(())
    }
}

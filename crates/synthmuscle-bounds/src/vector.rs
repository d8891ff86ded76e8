//! Checks and element-wise operations on fixed-length command vectors.
//!
//! All helpers iterate with `zip` so mismatched lengths never index out of
//! bounds; callers validate lengths first with [`ensure_len`].

use crate::error::{BoundsError, BoundsResult};

/// Relative tolerance used by [`is_close`].
pub const CLOSE_RTOL: f64 = 1e-5;
/// Absolute tolerance used by [`is_close`].
pub const CLOSE_ATOL: f64 = 1e-8;

/// Returns `true` if every component is finite.
#[inline]
#[must_use]
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Reject vectors containing NaN or infinities.
///
/// # Errors
///
/// Returns [`BoundsError::NonFinite`] naming `what`.
pub fn ensure_finite(values: &[f64], what: &'static str) -> BoundsResult<()> {
    if all_finite(values) {
        Ok(())
    } else {
        Err(BoundsError::NonFinite(what))
    }
}

/// Reject vectors whose length differs from `expected`.
///
/// # Errors
///
/// Returns [`BoundsError::LengthMismatch`].
pub fn ensure_len(values: &[f64], expected: usize, what: &'static str) -> BoundsResult<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(BoundsError::length_mismatch(what, expected, values.len()))
    }
}

/// Reject vectors with a negative component.
///
/// # Errors
///
/// Returns [`BoundsError::Negative`] with the first offending index.
pub fn ensure_non_negative(values: &[f64], what: &'static str) -> BoundsResult<()> {
    match values.iter().position(|v| *v < 0.0) {
        None => Ok(()),
        Some(index) => Err(BoundsError::Negative {
            what,
            index,
            value: values.get(index).copied().unwrap_or_default(),
        }),
    }
}

/// Clip one value into `[lo, hi]` without panicking on inverted input.
#[inline]
#[must_use]
pub fn clip_scalar(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Element-wise clip of `values` into `[lb, ub]`.
///
/// The output has the length of the shortest input.
#[must_use]
pub fn clip(values: &[f64], lb: &[f64], ub: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(lb.iter().zip(ub.iter()))
        .map(|(v, (lo, hi))| clip_scalar(*v, *lo, *hi))
        .collect()
}

/// Closeness test `|a - b| <= CLOSE_ATOL + CLOSE_RTOL * |b|`.
#[inline]
#[must_use]
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= CLOSE_ATOL + CLOSE_RTOL * b.abs()
}

/// Largest absolute component-wise difference, `0.0` for empty input.
#[must_use]
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

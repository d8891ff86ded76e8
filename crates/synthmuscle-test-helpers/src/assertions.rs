//! Assertion macros for command and bound vectors.

/// Assert that two floating-point values are approximately equal.
///
/// # Example
///
/// ```rust
/// use synthmuscle_test_helpers::assert_approx_eq;
///
/// assert_approx_eq!(1.0_f64, 1.0001_f64, 0.001_f64);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr $(,)?) => {
        let left = $left;
        let right = $right;
        let tolerance = $tolerance;
        let diff = (left - right).abs();
        if diff > tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n  tolerance: `{:?}`",
                left, right, diff, tolerance
            );
        }
    };
}

/// Assert that two slices have the same length and are element-wise
/// approximately equal.
///
/// # Example
///
/// ```rust
/// use synthmuscle_test_helpers::assert_vec_approx_eq;
///
/// assert_vec_approx_eq!(&[0.5, 0.75], &[0.5, 0.75000001], 1e-6);
/// ```
#[macro_export]
macro_rules! assert_vec_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr $(,)?) => {
        let left: &[f64] = $left;
        let right: &[f64] = $right;
        let tolerance: f64 = $tolerance;
        if left.len() != right.len() {
            panic!(
                "assertion failed: length mismatch\n  left: `{:?}`,\n right: `{:?}`",
                left, right
            );
        }
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if (l - r).abs() > tolerance {
                panic!(
                    "assertion failed: vectors differ at index {}\n  left: `{:?}`,\n right: `{:?}`,\n  tolerance: `{:?}`",
                    i, left, right, tolerance
                );
            }
        }
    };
}

/// Assert that every component of a slice is finite.
///
/// # Example
///
/// ```rust
/// use synthmuscle_test_helpers::assert_all_finite;
///
/// assert_all_finite!(&[0.0, -1.5, 2.0]);
/// ```
#[macro_export]
macro_rules! assert_all_finite {
    ($values:expr $(,)?) => {
        let values: &[f64] = $values;
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            panic!(
                "assertion failed: non-finite component at index {}: `{:?}`",
                i, values
            );
        }
    };
}

/// Assert that `lb[i] - tol <= value[i] <= ub[i] + tol` for every index.
///
/// # Example
///
/// ```rust
/// use synthmuscle_test_helpers::assert_within_bounds;
///
/// assert_within_bounds!(&[0.5, -1.0], &[-1.0, -1.0], &[1.0, 1.0], 1e-12);
/// ```
#[macro_export]
macro_rules! assert_within_bounds {
    ($values:expr, $lb:expr, $ub:expr, $tolerance:expr $(,)?) => {
        let values: &[f64] = $values;
        let lb: &[f64] = $lb;
        let ub: &[f64] = $ub;
        let tolerance: f64 = $tolerance;
        if values.len() != lb.len() || values.len() != ub.len() {
            panic!(
                "assertion failed: length mismatch between values ({}) and bounds ({}, {})",
                values.len(),
                lb.len(),
                ub.len()
            );
        }
        for (i, ((v, lo), hi)) in values.iter().zip(lb.iter()).zip(ub.iter()).enumerate() {
            if *v < lo - tolerance || *v > hi + tolerance {
                panic!(
                    "assertion failed: value {} at index {} outside [{}, {}]",
                    v, i, lo, hi
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_vec_approx_eq_passes() {
        assert_vec_approx_eq!(&[1.0, 2.0], &[1.0, 2.0 + 1e-12], 1e-9);
    }

    #[test]
    #[should_panic(expected = "vectors differ at index 1")]
    fn test_vec_approx_eq_reports_index() {
        assert_vec_approx_eq!(&[1.0, 2.0], &[1.0, 3.0], 1e-9);
    }

    #[test]
    #[should_panic(expected = "non-finite component at index 2")]
    fn test_all_finite_detects_nan() {
        assert_all_finite!(&[0.0, 1.0, f64::NAN]);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_within_bounds_detects_violation() {
        assert_within_bounds!(&[2.0], &[-1.0], &[1.0], 0.0);
    }
}

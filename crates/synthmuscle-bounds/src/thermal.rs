//! Thermal derating and per-actuator thermal limits.
//!
//! The thermal model that produces limits lives outside the supervisor. This
//! module holds the derating curve, the mapping from command indices to
//! actuator ids, and the fail-closed lookup of one limit per actuator.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{BoundsError, BoundsResult};
use crate::vector::{clip_scalar, ensure_len};

/// Allowed output magnitude for one actuator and whether it is thermally OK.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalLimit {
    /// Currently allowed absolute output.
    pub limit_abs: f64,
    /// `false` once the actuator is above its hard temperature ceiling.
    pub ok: bool,
}

impl ThermalLimit {
    /// Create a thermal limit.
    #[must_use]
    pub const fn new(limit_abs: f64, ok: bool) -> Self {
        Self { limit_abs, ok }
    }
}

impl From<(f64, bool)> for ThermalLimit {
    fn from((limit_abs, ok): (f64, bool)) -> Self {
        Self { limit_abs, ok }
    }
}

/// Source of per-actuator thermal limits.
pub trait ThermalLimitLookup {
    /// Limit for `actuator_id`, or `None` when the source has no entry.
    fn thermal_limit(&self, actuator_id: &str) -> Option<ThermalLimit>;
}

impl<S: std::hash::BuildHasher> ThermalLimitLookup for HashMap<String, ThermalLimit, S> {
    fn thermal_limit(&self, actuator_id: &str) -> Option<ThermalLimit> {
        self.get(actuator_id).copied()
    }
}

impl ThermalLimitLookup for BTreeMap<String, ThermalLimit> {
    fn thermal_limit(&self, actuator_id: &str) -> Option<ThermalLimit> {
        self.get(actuator_id).copied()
    }
}

/// Maps command indices to actuator identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMap {
    idx_to_actuator: Vec<String>,
}

impl CommandMap {
    /// Create a command map, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::DuplicateActuator`] for a repeated id.
    pub fn new<I, S>(ids: I) -> BoundsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let map = Self {
            idx_to_actuator: ids.into_iter().map(Into::into).collect(),
        };
        map.check_unique()?;
        Ok(map)
    }

    fn check_unique(&self) -> BoundsResult<()> {
        let mut seen = HashSet::with_capacity(self.idx_to_actuator.len());
        for id in &self.idx_to_actuator {
            if !seen.insert(id.as_str()) {
                return Err(BoundsError::DuplicateActuator(id.clone()));
            }
        }
        Ok(())
    }

    /// Check that the map covers exactly `n` command indices.
    ///
    /// # Errors
    ///
    /// Returns an error on length mismatch or duplicate ids.
    pub fn validate(&self, n: usize) -> BoundsResult<()> {
        if self.idx_to_actuator.len() != n {
            return Err(BoundsError::length_mismatch(
                "idx_to_actuator",
                n,
                self.idx_to_actuator.len(),
            ));
        }
        self.check_unique()
    }

    /// Number of mapped command indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idx_to_actuator.len()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idx_to_actuator.is_empty()
    }

    /// Actuator ids in command-index order.
    pub fn actuator_ids(&self) -> impl Iterator<Item = &str> {
        self.idx_to_actuator.iter().map(String::as_str)
    }

    /// Look up one finite, non-negative limit per mapped actuator.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::MissingThermalLimit`] if any mapped id has no
    /// entry and [`BoundsError::InvalidThermalLimit`] for a non-finite or
    /// negative limit. A missing entry is never treated as unlimited.
    pub fn resolve_limits<L>(&self, limits: &L) -> BoundsResult<Vec<ThermalLimit>>
    where
        L: ThermalLimitLookup + ?Sized,
    {
        self.actuator_ids()
            .map(|id| {
                let limit = limits
                    .thermal_limit(id)
                    .ok_or_else(|| BoundsError::MissingThermalLimit(id.to_string()))?;
                if !limit.limit_abs.is_finite() || limit.limit_abs < 0.0 {
                    return Err(BoundsError::InvalidThermalLimit {
                        actuator: id.to_string(),
                        limit: limit.limit_abs,
                    });
                }
                Ok(limit)
            })
            .collect()
    }
}

/// Output of [`apply_thermal_limits`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalClip {
    /// Command clipped into each actuator's thermal limit.
    pub clipped: Vec<f64>,
    /// Per-index thermal limits, in command order.
    pub limits_abs: Vec<f64>,
    /// Per-actuator thermal ok flags.
    pub ok_flags: BTreeMap<String, bool>,
}

impl ThermalClip {
    /// `true` if any actuator is thermally OK; `true` for an empty map.
    #[must_use]
    pub fn ok_any(&self) -> bool {
        self.ok_flags.is_empty() || self.ok_flags.values().any(|ok| *ok)
    }

    /// `true` if every actuator is thermally OK.
    #[must_use]
    pub fn ok_all(&self) -> bool {
        self.ok_flags.values().all(|ok| *ok)
    }
}

/// Clip each command index into its actuator's absolute thermal limit.
///
/// # Errors
///
/// Fails closed: any mapped actuator without a valid limit is an error.
pub fn apply_thermal_limits<L>(cmd: &[f64], cmd_map: &CommandMap, limits: &L) -> BoundsResult<ThermalClip>
where
    L: ThermalLimitLookup + ?Sized,
{
    cmd_map.validate(cmd.len())?;
    let resolved = cmd_map.resolve_limits(limits)?;

    let clipped = cmd
        .iter()
        .zip(resolved.iter())
        .map(|(u, l)| clip_scalar(*u, -l.limit_abs, l.limit_abs))
        .collect();
    let limits_abs = resolved.iter().map(|l| l.limit_abs).collect();
    let ok_flags = cmd_map
        .actuator_ids()
        .zip(resolved.iter())
        .map(|(id, l)| (id.to_string(), l.ok))
        .collect();

    Ok(ThermalClip {
        clipped,
        limits_abs,
        ok_flags,
    })
}

/// Temperature-dependent output limit.
///
/// - at or below `start_derate_temp_c`: `peak_limit`
/// - between start and end: linear blend from peak to continuous
/// - at or above `end_derate_temp_c`: `continuous_limit`
/// - at or above `max_temp_c`: zero, not OK
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeratingPolicy {
    /// Output safe indefinitely.
    pub continuous_limit: f64,
    /// Output allowed transiently while cool.
    pub peak_limit: f64,
    /// Hard temperature ceiling in °C.
    pub max_temp_c: f64,
    /// Temperature where the peak starts to derate.
    pub start_derate_temp_c: f64,
    /// Temperature where the limit reaches `continuous_limit`.
    pub end_derate_temp_c: f64,
}

impl DeratingPolicy {
    /// Create a policy with the default 60/100/120 °C breakpoints.
    #[must_use]
    pub fn new(continuous_limit: f64, peak_limit: f64) -> Self {
        Self {
            continuous_limit,
            peak_limit,
            max_temp_c: 120.0,
            start_derate_temp_c: 60.0,
            end_derate_temp_c: 100.0,
        }
    }

    /// Override the temperature breakpoints.
    #[must_use]
    pub fn with_temperatures(mut self, start_c: f64, end_c: f64, max_c: f64) -> Self {
        self.start_derate_temp_c = start_c;
        self.end_derate_temp_c = end_c;
        self.max_temp_c = max_c;
        self
    }

    /// Validate limits and breakpoints.
    ///
    /// # Errors
    ///
    /// Requires finite values, limits `>= 0`, `peak >= continuous` and
    /// `0 < start < end < max`.
    pub fn validate(&self) -> BoundsResult<()> {
        let values = [
            self.continuous_limit,
            self.peak_limit,
            self.max_temp_c,
            self.start_derate_temp_c,
            self.end_derate_temp_c,
        ];
        if !values.iter().all(|v| v.is_finite()) {
            return Err(BoundsError::thermal("derating policy values must be finite"));
        }
        if self.continuous_limit < 0.0 || self.peak_limit < 0.0 {
            return Err(BoundsError::thermal("limits must be >= 0"));
        }
        if self.peak_limit < self.continuous_limit {
            return Err(BoundsError::thermal("peak_limit must be >= continuous_limit"));
        }
        let ordered = 0.0 < self.start_derate_temp_c
            && self.start_derate_temp_c < self.end_derate_temp_c
            && self.end_derate_temp_c < self.max_temp_c;
        if !ordered {
            return Err(BoundsError::thermal(
                "require 0 < start_derate < end_derate < max_temp",
            ));
        }
        Ok(())
    }

    /// Current allowed limit at `temp_c`.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid policy or a non-finite temperature.
    pub fn derated_limit(&self, temp_c: f64) -> BoundsResult<ThermalLimit> {
        self.validate()?;
        if !temp_c.is_finite() {
            return Err(BoundsError::thermal("temp_c must be finite"));
        }

        if temp_c >= self.max_temp_c {
            return Ok(ThermalLimit::new(0.0, false));
        }
        if temp_c <= self.start_derate_temp_c {
            return Ok(ThermalLimit::new(self.peak_limit, true));
        }
        if temp_c >= self.end_derate_temp_c {
            return Ok(ThermalLimit::new(self.continuous_limit, true));
        }

        let a = (temp_c - self.start_derate_temp_c)
            / (self.end_derate_temp_c - self.start_derate_temp_c);
        let lim = self.peak_limit + a * (self.continuous_limit - self.peak_limit);
        Ok(ThermalLimit::new(
            clip_scalar(lim, self.continuous_limit, self.peak_limit),
            true,
        ))
    }
}

/// Free-function form of [`DeratingPolicy::derated_limit`].
///
/// # Errors
///
/// See [`DeratingPolicy::derated_limit`].
pub fn derated_limit(policy: &DeratingPolicy, temp_c: f64) -> BoundsResult<ThermalLimit> {
    policy.derated_limit(temp_c)
}

/// Build a thermal-limit map from per-actuator policies and temperatures.
///
/// `temps_c` is index-aligned with `cmd_map`.
///
/// # Errors
///
/// Returns an error if a policy is missing or invalid, or lengths differ.
pub fn derate_all(
    cmd_map: &CommandMap,
    policies: &BTreeMap<String, DeratingPolicy>,
    temps_c: &[f64],
) -> BoundsResult<BTreeMap<String, ThermalLimit>> {
    ensure_len(temps_c, cmd_map.len(), "temps_c")?;
    cmd_map
        .actuator_ids()
        .zip(temps_c.iter())
        .map(|(id, t)| {
            let policy = policies
                .get(id)
                .ok_or_else(|| BoundsError::MissingThermalLimit(id.to_string()))?;
            Ok((id.to_string(), policy.derated_limit(*t)?))
        })
        .collect()
}

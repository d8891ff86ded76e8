//! Raw observation and command payloads and their validated forms.
//!
//! Raw payloads mirror the loose key-value maps a controller produces: every
//! field is optional and vectors carry no length guarantee. Normalization
//! checks presence, then shape, then finiteness, and returns the first
//! problem as a [`PayloadError`].

use std::slice;

use serde::{Deserialize, Serialize};
use synthmuscle_bounds::vector::all_finite;

use crate::error::{PayloadError, PayloadSide};

/// A scalar or a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// Single value.
    One(f64),
    /// Several values.
    Many(Vec<f64>),
}

impl OneOrMany {
    /// View as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::One(v) => slice::from_ref(v),
            Self::Many(v) => v,
        }
    }
}

/// Cable routing metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routing {
    /// Smallest bend radius along the routed cables, in meters.
    #[serde(default)]
    pub min_bend_radius_m: Option<f64>,
}

/// Sensed state as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawObservation {
    /// Joint positions. Required.
    pub q: Option<Vec<f64>>,
    /// Joint velocities. Required.
    pub qd: Option<Vec<f64>>,
    /// Base roll, pitch, yaw.
    pub base_rpy: Option<Vec<f64>>,
    /// Base orientation quaternion `[w, x, y, z]`, used when `base_rpy` is absent.
    pub base_quat_wxyz: Option<Vec<f64>>,
    /// Contact impulse.
    pub contact_impulse: Option<f64>,
    /// Per-contact impulses, reduced by max when `contact_impulse` is absent.
    pub contact_impulses: Option<Vec<f64>>,
    /// Actuator temperatures. Carried through, not gated.
    pub actuator_temp: Option<OneOrMany>,
    /// Routing metrics.
    pub routing: Option<Routing>,
    /// Time the last command was issued.
    pub last_cmd_t: Option<f64>,
}

impl RawObservation {
    /// Observation with positions and velocities only.
    #[must_use]
    pub fn new(q: Vec<f64>, qd: Vec<f64>) -> Self {
        Self {
            q: Some(q),
            qd: Some(qd),
            ..Self::default()
        }
    }

    /// Set base roll, pitch, yaw.
    #[must_use]
    pub fn with_base_rpy(mut self, rpy: [f64; 3]) -> Self {
        self.base_rpy = Some(rpy.to_vec());
        self
    }

    /// Set base orientation quaternion `[w, x, y, z]`.
    #[must_use]
    pub fn with_base_quat_wxyz(mut self, quat: [f64; 4]) -> Self {
        self.base_quat_wxyz = Some(quat.to_vec());
        self
    }

    /// Set a scalar contact impulse.
    #[must_use]
    pub fn with_contact_impulse(mut self, impulse: f64) -> Self {
        self.contact_impulse = Some(impulse);
        self
    }

    /// Set per-contact impulses.
    #[must_use]
    pub fn with_contact_impulses(mut self, impulses: Vec<f64>) -> Self {
        self.contact_impulses = Some(impulses);
        self
    }

    /// Set actuator temperatures.
    #[must_use]
    pub fn with_actuator_temp(mut self, temp: OneOrMany) -> Self {
        self.actuator_temp = Some(temp);
        self
    }

    /// Set the routing minimum bend radius.
    #[must_use]
    pub fn with_min_bend_radius_m(mut self, radius_m: f64) -> Self {
        self.routing = Some(Routing {
            min_bend_radius_m: Some(radius_m),
        });
        self
    }

    /// Set the last command time.
    #[must_use]
    pub fn with_last_cmd_t(mut self, t: f64) -> Self {
        self.last_cmd_t = Some(t);
        self
    }
}

/// Desired command as supplied by the caller.
///
/// When both `tau` and `q_des` are present the command is read as torque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCommand {
    /// Joint torques.
    pub tau: Option<Vec<f64>>,
    /// Joint position targets.
    pub q_des: Option<Vec<f64>>,
    /// Joint velocity targets, position mode only.
    pub qd_des: Option<Vec<f64>>,
}

impl RawCommand {
    /// Torque command.
    #[must_use]
    pub fn torque(tau: Vec<f64>) -> Self {
        Self {
            tau: Some(tau),
            ..Self::default()
        }
    }

    /// Position command.
    #[must_use]
    pub fn position(q_des: Vec<f64>) -> Self {
        Self {
            q_des: Some(q_des),
            ..Self::default()
        }
    }

    /// Set velocity targets.
    #[must_use]
    pub fn with_qd_des(mut self, qd_des: Vec<f64>) -> Self {
        self.qd_des = Some(qd_des);
        self
    }
}

fn require<'a>(
    value: Option<&'a Vec<f64>>,
    side: PayloadSide,
    field: &'static str,
) -> Result<&'a [f64], PayloadError> {
    value
        .map(Vec::as_slice)
        .ok_or(PayloadError::Missing { side, field })
}

fn check_len(
    values: &[f64],
    expected: usize,
    side: PayloadSide,
    field: &'static str,
) -> Result<(), PayloadError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(PayloadError::Shape {
            side,
            field,
            expected,
            actual: values.len(),
        })
    }
}

fn check_finite(values: &[f64], side: PayloadSide, field: &'static str) -> Result<(), PayloadError> {
    if all_finite(values) {
        Ok(())
    } else {
        Err(PayloadError::NonFinite { side, field })
    }
}

fn fixed<const N: usize>(values: &[f64], field: &'static str) -> Result<[f64; N], PayloadError> {
    <[f64; N]>::try_from(values)
        .ok()
        .ok_or_else(|| PayloadError::Shape {
            side: PayloadSide::Observation,
            field,
            expected: N,
            actual: values.len(),
        })
}

/// Roll, pitch, yaw from a unit quaternion `[w, x, y, z]`.
#[must_use]
pub fn quat_wxyz_to_rpy(quat: [f64; 4]) -> [f64; 3] {
    let [w, x, y, z] = quat;
    let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
    let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
    [roll, pitch, yaw]
}

/// Validated observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    q: Vec<f64>,
    qd: Vec<f64>,
    base_rpy: Option<[f64; 3]>,
    contact_impulse: Option<f64>,
    actuator_temp: Option<Vec<f64>>,
    min_bend_radius_m: Option<f64>,
    last_cmd_t: Option<f64>,
}

impl Observation {
    /// Validate `raw` for `n` joints.
    ///
    /// # Errors
    ///
    /// Returns the first missing, mis-shaped or non-finite field.
    pub fn from_raw(raw: &RawObservation, n: usize) -> Result<Self, PayloadError> {
        const SIDE: PayloadSide = PayloadSide::Observation;

        let q = require(raw.q.as_ref(), SIDE, "obs.q")?;
        let qd = require(raw.qd.as_ref(), SIDE, "obs.qd")?;
        check_len(q, n, SIDE, "obs.q")?;
        check_len(qd, n, SIDE, "obs.qd")?;

        let rpy = raw
            .base_rpy
            .as_deref()
            .map(|v| fixed::<3>(v, "obs.base_rpy"))
            .transpose()?;
        let quat = raw
            .base_quat_wxyz
            .as_deref()
            .map(|v| fixed::<4>(v, "obs.base_quat_wxyz"))
            .transpose()?;

        check_finite(q, SIDE, "obs.q")?;
        check_finite(qd, SIDE, "obs.qd")?;
        if let Some(rpy) = &rpy {
            check_finite(rpy, SIDE, "obs.base_rpy")?;
        }
        if let Some(quat) = &quat {
            check_finite(quat, SIDE, "obs.base_quat_wxyz")?;
        }
        if let Some(impulse) = raw.contact_impulse {
            check_finite(&[impulse], SIDE, "obs.contact_impulse")?;
        }
        if let Some(impulses) = &raw.contact_impulses {
            check_finite(impulses, SIDE, "obs.contact_impulses")?;
        }
        if let Some(temp) = &raw.actuator_temp {
            check_finite(temp.as_slice(), SIDE, "obs.actuator_temp")?;
        }
        let min_bend_radius_m = raw.routing.as_ref().and_then(|r| r.min_bend_radius_m);
        if let Some(radius) = min_bend_radius_m {
            check_finite(&[radius], SIDE, "obs.routing.min_bend_radius_m")?;
        }
        if let Some(t) = raw.last_cmd_t {
            check_finite(&[t], SIDE, "obs.last_cmd_t")?;
        }

        let contact_impulse = raw.contact_impulse.or_else(|| {
            raw.contact_impulses
                .as_deref()
                .and_then(|v| v.iter().copied().reduce(f64::max))
        });

        Ok(Self {
            q: q.to_vec(),
            qd: qd.to_vec(),
            base_rpy: rpy.or_else(|| quat.map(quat_wxyz_to_rpy)),
            contact_impulse,
            actuator_temp: raw.actuator_temp.as_ref().map(|t| t.as_slice().to_vec()),
            min_bend_radius_m,
            last_cmd_t: raw.last_cmd_t,
        })
    }

    /// Joint positions.
    #[must_use]
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// Joint velocities.
    #[must_use]
    pub fn qd(&self) -> &[f64] {
        &self.qd
    }

    /// Base roll, pitch, yaw, from `base_rpy` or converted from the quaternion.
    #[must_use]
    pub fn base_rpy(&self) -> Option<[f64; 3]> {
        self.base_rpy
    }

    /// Contact impulse; the max of `contact_impulses` when no scalar was given.
    #[must_use]
    pub fn contact_impulse(&self) -> Option<f64> {
        self.contact_impulse
    }

    /// Actuator temperatures.
    #[must_use]
    pub fn actuator_temp(&self) -> Option<&[f64]> {
        self.actuator_temp.as_deref()
    }

    /// Routing minimum bend radius.
    #[must_use]
    pub fn min_bend_radius_m(&self) -> Option<f64> {
        self.min_bend_radius_m
    }

    /// Last command time.
    #[must_use]
    pub fn last_cmd_t(&self) -> Option<f64> {
        self.last_cmd_t
    }
}

/// Command mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandMode {
    /// Joint torques.
    Torque,
    /// Joint position targets.
    Position,
}

/// Validated command. Serializes to the same keys as [`RawCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedCommand {
    /// Torque command.
    Torque {
        /// Joint torques.
        tau: Vec<f64>,
    },
    /// Position command.
    Position {
        /// Joint position targets.
        q_des: Vec<f64>,
        /// Joint velocity targets.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qd_des: Option<Vec<f64>>,
    },
}

impl NormalizedCommand {
    /// Validate `raw` for `n` joints.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Missing`] when neither `tau` nor `q_des` is
    /// present, otherwise the first mis-shaped or non-finite field.
    pub fn from_raw(raw: &RawCommand, n: usize) -> Result<Self, PayloadError> {
        const SIDE: PayloadSide = PayloadSide::Command;

        if let Some(tau) = &raw.tau {
            check_len(tau, n, SIDE, "cmd.tau")?;
            check_finite(tau, SIDE, "cmd.tau")?;
            return Ok(Self::Torque { tau: tau.clone() });
        }

        let q_des = require(raw.q_des.as_ref(), SIDE, "cmd.tau|cmd.q_des")?;
        check_len(q_des, n, SIDE, "cmd.q_des")?;
        if let Some(qd_des) = &raw.qd_des {
            check_len(qd_des, n, SIDE, "cmd.qd_des")?;
        }
        check_finite(q_des, SIDE, "cmd.q_des")?;
        if let Some(qd_des) = &raw.qd_des {
            check_finite(qd_des, SIDE, "cmd.qd_des")?;
        }
        Ok(Self::Position {
            q_des: q_des.to_vec(),
            qd_des: raw.qd_des.clone(),
        })
    }

    /// All-zero torque command.
    #[must_use]
    pub fn zero_torque(n: usize) -> Self {
        Self::Torque { tau: vec![0.0; n] }
    }

    /// Command mode.
    #[must_use]
    pub fn mode(&self) -> CommandMode {
        match self {
            Self::Torque { .. } => CommandMode::Torque,
            Self::Position { .. } => CommandMode::Position,
        }
    }

    /// Torques in torque mode.
    #[must_use]
    pub fn tau(&self) -> Option<&[f64]> {
        match self {
            Self::Torque { tau } => Some(tau),
            Self::Position { .. } => None,
        }
    }

    /// Position targets in position mode.
    #[must_use]
    pub fn q_des(&self) -> Option<&[f64]> {
        match self {
            Self::Position { q_des, .. } => Some(q_des),
            Self::Torque { .. } => None,
        }
    }

    /// Velocity targets in position mode, when supplied.
    #[must_use]
    pub fn qd_des(&self) -> Option<&[f64]> {
        match self {
            Self::Position { qd_des, .. } => qd_des.as_deref(),
            Self::Torque { .. } => None,
        }
    }
}

//! Safety states, fault taxonomy and the per-cycle report.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Supervisor state.
///
/// `SafeOverride` is part of the reported vocabulary but the layer moves
/// directly to `Killed` on every fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyState {
    /// No active faults.
    #[default]
    Nominal,
    /// Warnings or clamped limit faults this cycle.
    Clamping,
    /// Reserved for an override that is not a kill.
    SafeOverride,
    /// Safe override returned; latched until reset when `latch_kill` is set.
    Killed,
}

impl SafetyState {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nominal => "NOMINAL",
            Self::Clamping => "CLAMPING",
            Self::SafeOverride => "SAFE_OVERRIDE",
            Self::Killed => "KILLED",
        }
    }
}

impl fmt::Display for SafetyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCategory {
    /// Missing, mis-shaped or non-finite data. Always fatal.
    Integrity,
    /// Finite but outside joint limits. Clamped when allowed.
    Limit,
    /// Base tilt and contact impulse.
    Environment,
    /// Routing, actuator thermal and comms hooks.
    Hook,
}

/// Fault kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyFault {
    /// Non-finite observation value.
    NanInfObs,
    /// Non-finite command value.
    NanInfCmd,
    /// Required observation field absent.
    MissingObs,
    /// Neither `tau` nor `q_des` supplied.
    MissingCmd,
    /// A vector has the wrong length.
    ShapeMismatch,
    /// Position outside `[q_min, q_max]`.
    JointPosLimit,
    /// Velocity magnitude above `qd_max`.
    JointVelLimit,
    /// Torque magnitude above `tau_max`.
    JointTorqueLimit,
    /// Contact impulse above a threshold.
    ContactImpulse,
    /// Base tilt above a threshold.
    BaseTilt,
    /// Cable routing sanity check failed.
    RoutingViolation,
    /// Actuator over temperature.
    ActuatorThermal,
    /// Command stream went stale.
    CommsTimeout,
}

impl SafetyFault {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NanInfObs => "NAN_INF_OBS",
            Self::NanInfCmd => "NAN_INF_CMD",
            Self::MissingObs => "MISSING_OBS",
            Self::MissingCmd => "MISSING_CMD",
            Self::ShapeMismatch => "SHAPE_MISMATCH",
            Self::JointPosLimit => "JOINT_POS_LIMIT",
            Self::JointVelLimit => "JOINT_VEL_LIMIT",
            Self::JointTorqueLimit => "JOINT_TORQUE_LIMIT",
            Self::ContactImpulse => "CONTACT_IMPULSE",
            Self::BaseTilt => "BASE_TILT",
            Self::RoutingViolation => "ROUTING_VIOLATION",
            Self::ActuatorThermal => "ACTUATOR_THERMAL",
            Self::CommsTimeout => "COMMS_TIMEOUT",
        }
    }

    /// Fault family.
    #[must_use]
    pub const fn category(self) -> FaultCategory {
        match self {
            Self::NanInfObs
            | Self::NanInfCmd
            | Self::MissingObs
            | Self::MissingCmd
            | Self::ShapeMismatch => FaultCategory::Integrity,
            Self::JointPosLimit | Self::JointVelLimit | Self::JointTorqueLimit => {
                FaultCategory::Limit
            }
            Self::ContactImpulse | Self::BaseTilt => FaultCategory::Environment,
            Self::RoutingViolation | Self::ActuatorThermal | Self::CommsTimeout => {
                FaultCategory::Hook
            }
        }
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity, ordered `Warn < Error < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Noted; output still passes.
    Warn,
    /// Limit fault with clamping disabled.
    Error,
    /// Kill.
    Fatal,
}

impl Severity {
    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form event details keyed by name.
pub type EventDetails = BTreeMap<String, Value>;

/// Build [`EventDetails`] from `(name, value)` pairs.
#[must_use]
pub fn details<const N: usize>(pairs: [(&str, Value); N]) -> EventDetails {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// One state transition caused by one fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    /// Cycle time.
    pub t: f64,
    /// Fault that caused the transition.
    pub fault: SafetyFault,
    /// Severity.
    pub severity: Severity,
    /// State before the event.
    pub state_before: SafetyState,
    /// State after the event.
    pub state_after: SafetyState,
    /// Measured values and thresholds.
    #[serde(default)]
    pub details: EventDetails,
}

impl SafetyEvent {
    fn to_json_value(&self) -> Value {
        json!({
            "t": self.t,
            "fault": self.fault.as_str(),
            "severity": self.severity.as_str(),
            "state_before": self.state_before.as_str(),
            "state_after": self.state_after.as_str(),
            "details": self.details,
        })
    }
}

/// Diagnostic report for one cycle. Rebuilt every cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    /// Cycle time.
    pub t: f64,
    /// State at the end of the cycle.
    pub state: SafetyState,
    /// Faults in emission order.
    pub faults: Vec<SafetyFault>,
    /// Events in emission order.
    pub events: Vec<SafetyEvent>,
    /// The command was clamped into joint limits.
    pub clamped: bool,
    /// The safe override was returned.
    pub overridden: bool,
    /// The layer is killed.
    pub killed: bool,
    /// Fault that latched the kill.
    pub latched_fault: Option<SafetyFault>,
}

impl SafetyReport {
    /// Empty report for time `t`.
    #[must_use]
    pub fn new(t: f64, state: SafetyState, latched_fault: Option<SafetyFault>) -> Self {
        Self {
            t,
            state,
            faults: Vec::new(),
            events: Vec::new(),
            clamped: false,
            overridden: false,
            killed: false,
            latched_fault,
        }
    }

    /// Returns `true` if `fault` was raised this cycle.
    #[must_use]
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults.contains(&fault)
    }

    /// Highest event severity, `None` without events.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.events.iter().map(|e| e.severity).max()
    }

    /// Plain key-value form with enum names as strings.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        let faults: Vec<&str> = self.faults.iter().map(|f| f.as_str()).collect();
        let events: Vec<Value> = self.events.iter().map(SafetyEvent::to_json_value).collect();
        json!({
            "t": self.t,
            "state": self.state.as_str(),
            "faults": faults,
            "events": events,
            "clamped": self.clamped,
            "overridden": self.overridden,
            "killed": self.killed,
            "latched_fault": self.latched_fault.map(SafetyFault::as_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthmuscle_test_helpers::prelude::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn test_fault_categories() {
        assert_eq!(SafetyFault::NanInfCmd.category(), FaultCategory::Integrity);
        assert_eq!(SafetyFault::ShapeMismatch.category(), FaultCategory::Integrity);
        assert_eq!(SafetyFault::JointVelLimit.category(), FaultCategory::Limit);
        assert_eq!(SafetyFault::BaseTilt.category(), FaultCategory::Environment);
        assert_eq!(SafetyFault::CommsTimeout.category(), FaultCategory::Hook);
    }

    #[test]
    fn test_names_match_serde() -> TestResult {
        for fault in [
            SafetyFault::NanInfObs,
            SafetyFault::JointTorqueLimit,
            SafetyFault::RoutingViolation,
        ] {
            assert_eq!(serde_json::to_value(fault)?, Value::from(fault.as_str()));
        }
        assert_eq!(
            serde_json::to_value(SafetyState::SafeOverride)?,
            Value::from("SAFE_OVERRIDE")
        );
        assert_eq!(serde_json::to_value(Severity::Fatal)?, Value::from("FATAL"));
        Ok(())
    }

    #[test]
    fn test_json_value_matches_derived_serialization() -> TestResult {
        let mut report = SafetyReport::new(1.5, SafetyState::Nominal, None);
        report.events.push(SafetyEvent {
            t: 1.5,
            fault: SafetyFault::ContactImpulse,
            severity: Severity::Warn,
            state_before: SafetyState::Nominal,
            state_after: SafetyState::Clamping,
            details: details([("impulse", json!(90.0)), ("impulse_warn", json!(80.0))]),
        });
        report.faults.push(SafetyFault::ContactImpulse);
        report.state = SafetyState::Clamping;

        assert_eq!(report.to_json_value(), serde_json::to_value(&report)?);
        assert_eq!(report.max_severity(), Some(Severity::Warn));
        assert!(report.has_fault(SafetyFault::ContactImpulse));
        Ok(())
    }
}

//! Joint-space safety state machine.
//!
//! [`SafetyLayer::step`] validates one observation and one command, checks
//! them against the configured limits and returns either the (possibly
//! clamped) command or the safe override, together with a [`SafetyReport`].
//! It never fails: every problem becomes a fault in the report.
//!
//! Checks run in a fixed order and the first fatal condition ends the cycle:
//!
//! 1. latched kill
//! 2. observation presence, shape and finiteness
//! 3. command presence, shape and finiteness
//! 4. command staleness
//! 5. base tilt
//! 6. contact impulse
//! 7. routing
//! 8. joint limits on observation and command

use serde_json::json;
use synthmuscle_bounds::vector::{clip, clip_scalar};
use tracing::{debug, info, warn};

use crate::config::SafetyConfig;
use crate::error::{PayloadError, SafetyResult};
use crate::payload::{NormalizedCommand, Observation, RawCommand, RawObservation};
use crate::report::{EventDetails, SafetyEvent, SafetyFault, SafetyReport, SafetyState, Severity, details};

/// Marker for a cycle that ended in a kill.
struct Tripped;

type CycleResult<T> = Result<T, Tripped>;

fn outside_range(values: &[f64], lo: &[f64], hi: &[f64]) -> bool {
    values
        .iter()
        .zip(lo.iter().zip(hi))
        .any(|(v, (lo, hi))| v < lo || v > hi)
}

fn exceeds_abs(values: &[f64], limit: &[f64]) -> bool {
    values.iter().zip(limit).any(|(v, l)| v.abs() > *l)
}

fn clip_abs(values: &[f64], limit: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(limit)
        .map(|(v, l)| clip_scalar(*v, -l, *l))
        .collect()
}

/// Fail-closed safety supervisor for one actuator group.
///
/// One instance per control session. `step` takes `&mut self`; share an
/// instance across threads through [`SharedSafetyLayer`](crate::SharedSafetyLayer).
#[derive(Debug, Clone)]
pub struct SafetyLayer {
    config: SafetyConfig,
    n: usize,
    safe_override: NormalizedCommand,
    state: SafetyState,
    killed: bool,
    latched_fault: Option<SafetyFault>,
    limit_frames: u32,
    last_cmd_t_seen: Option<f64>,
}

impl SafetyLayer {
    /// Create a layer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: SafetyConfig) -> SafetyResult<Self> {
        let n = config.validate()?;
        let safe_override = Self::build_safe_override(&config, n);
        Ok(Self {
            config,
            n,
            safe_override,
            state: SafetyState::Nominal,
            killed: false,
            latched_fault: None,
            limit_frames: 0,
            last_cmd_t_seen: None,
        })
    }

    fn build_safe_override(config: &SafetyConfig, n: usize) -> NormalizedCommand {
        match (&config.safe_pose_q, config.safe_tau_off) {
            (Some(pose), false) => NormalizedCommand::Position {
                q_des: clip(pose, &config.joint.q_min, &config.joint.q_max),
                qd_des: Some(vec![0.0; n]),
            },
            _ => NormalizedCommand::zero_torque(n),
        }
    }

    /// Number of joints.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Validated configuration.
    #[must_use]
    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SafetyState {
        self.state
    }

    /// Whether any cycle killed since construction or the last reset.
    ///
    /// Without `latch_kill` commands pass again after a kill, but the flag
    /// stays set until [`reset`](Self::reset).
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Fault that latched the kill.
    #[must_use]
    pub fn latched_fault(&self) -> Option<SafetyFault> {
        self.latched_fault
    }

    /// Consecutive cycles with a joint-limit fault.
    #[must_use]
    pub fn limit_frames(&self) -> u32 {
        self.limit_frames
    }

    /// Command returned whenever the layer kills.
    #[must_use]
    pub fn safe_override(&self) -> &NormalizedCommand {
        &self.safe_override
    }

    /// Clear the kill latch, the limit streak and the last seen command time.
    pub fn reset(&mut self, reason: &str) {
        info!(reason, state = %self.state, "safety layer reset");
        self.state = SafetyState::Nominal;
        self.killed = false;
        self.latched_fault = None;
        self.limit_frames = 0;
        self.last_cmd_t_seen = None;
    }

    /// Run one cycle at time `t`.
    ///
    /// Returns the command to forward and the cycle report. The command is
    /// the safe override whenever `report.overridden` is set.
    pub fn step(
        &mut self,
        t: f64,
        obs: &RawObservation,
        cmd: &RawCommand,
    ) -> (NormalizedCommand, SafetyReport) {
        if self.killed && self.config.latch_kill {
            let mut report = SafetyReport::new(t, SafetyState::Killed, self.latched_fault);
            report.killed = true;
            report.overridden = true;
            return (self.safe_override.clone(), report);
        }

        let mut report = SafetyReport::new(t, self.state, self.latched_fault);
        match self.evaluate(t, obs, cmd, &mut report) {
            Ok((command, clamped)) => {
                if report.faults.is_empty() {
                    self.state = SafetyState::Nominal;
                }
                report.state = self.state;
                report.clamped = clamped;
                report.killed = self.killed;
                report.latched_fault = self.latched_fault;
                (command, report)
            }
            Err(Tripped) => {
                report.state = self.state;
                report.killed = true;
                report.overridden = true;
                report.latched_fault = self.latched_fault;
                (self.safe_override.clone(), report)
            }
        }
    }

    fn evaluate(
        &mut self,
        t: f64,
        raw_obs: &RawObservation,
        raw_cmd: &RawCommand,
        report: &mut SafetyReport,
    ) -> CycleResult<(NormalizedCommand, bool)> {
        if !t.is_finite() {
            return Err(self.kill(
                report,
                t,
                SafetyFault::NanInfObs,
                details([("field", json!("t")), ("error", json!("cycle time must be finite"))]),
            ));
        }
        let obs = Observation::from_raw(raw_obs, self.n).map_err(|e| self.reject(report, t, &e))?;
        let cmd = NormalizedCommand::from_raw(raw_cmd, self.n).map_err(|e| self.reject(report, t, &e))?;

        self.check_comms(t, &obs, report)?;
        self.check_base_tilt(t, &obs, report)?;
        self.check_contact(t, &obs, report)?;
        self.check_routing(t, &obs, report)?;
        self.check_joint_limits(t, &obs, cmd, report)
    }

    fn reject(&mut self, report: &mut SafetyReport, t: f64, err: &PayloadError) -> Tripped {
        self.kill(
            report,
            t,
            err.fault(),
            details([("field", json!(err.field())), ("error", json!(err.to_string()))]),
        )
    }

    fn check_comms(&mut self, t: f64, obs: &Observation, report: &mut SafetyReport) -> CycleResult<()> {
        if let Some(last) = obs.last_cmd_t() {
            self.last_cmd_t_seen = Some(last);
        }
        let Some(seen) = self.last_cmd_t_seen else {
            return Ok(());
        };
        let dt_cmd = t - seen;
        if dt_cmd > self.config.cmd_timeout_s {
            return Err(self.kill(
                report,
                t,
                SafetyFault::CommsTimeout,
                details([
                    ("dt_cmd", json!(dt_cmd)),
                    ("timeout_s", json!(self.config.cmd_timeout_s)),
                ]),
            ));
        }
        Ok(())
    }

    fn check_base_tilt(&mut self, t: f64, obs: &Observation, report: &mut SafetyReport) -> CycleResult<()> {
        let Some([roll, pitch, _]) = obs.base_rpy() else {
            return Ok(());
        };
        let tilt = roll.hypot(pitch);
        let limits = self.config.base;
        if tilt > limits.tilt_max_rad {
            return Err(self.kill(
                report,
                t,
                SafetyFault::BaseTilt,
                details([("tilt_rad", json!(tilt)), ("tilt_max_rad", json!(limits.tilt_max_rad))]),
            ));
        }
        if tilt > limits.tilt_warn_rad {
            self.emit(
                report,
                t,
                SafetyFault::BaseTilt,
                Severity::Warn,
                SafetyState::Clamping,
                details([("tilt_rad", json!(tilt)), ("tilt_warn_rad", json!(limits.tilt_warn_rad))]),
            );
        }
        Ok(())
    }

    fn check_contact(&mut self, t: f64, obs: &Observation, report: &mut SafetyReport) -> CycleResult<()> {
        let Some(impulse) = obs.contact_impulse() else {
            return Ok(());
        };
        let limits = self.config.contact;
        if impulse > limits.impulse_max {
            return Err(self.kill(
                report,
                t,
                SafetyFault::ContactImpulse,
                details([("impulse", json!(impulse)), ("impulse_max", json!(limits.impulse_max))]),
            ));
        }
        if impulse > limits.impulse_warn {
            self.emit(
                report,
                t,
                SafetyFault::ContactImpulse,
                Severity::Warn,
                SafetyState::Clamping,
                details([("impulse", json!(impulse)), ("impulse_warn", json!(limits.impulse_warn))]),
            );
        }
        Ok(())
    }

    /// Only a non-positive radius is rejected. No minimum-radius threshold
    /// is configured, so any positive radius passes.
    fn check_routing(&mut self, t: f64, obs: &Observation, report: &mut SafetyReport) -> CycleResult<()> {
        match obs.min_bend_radius_m() {
            Some(radius) if radius <= 0.0 => Err(self.kill(
                report,
                t,
                SafetyFault::RoutingViolation,
                details([("min_bend_radius_m", json!(radius)), ("reason", json!("non-positive"))]),
            )),
            _ => Ok(()),
        }
    }

    fn check_joint_limits(
        &mut self,
        t: f64,
        obs: &Observation,
        cmd: NormalizedCommand,
        report: &mut SafetyReport,
    ) -> CycleResult<(NormalizedCommand, bool)> {
        let allow_clamp = self.config.allow_clamp;
        let jl = &self.config.joint;
        let mut faults = Vec::new();
        let mut clamped = false;

        if outside_range(obs.q(), &jl.q_min, &jl.q_max) {
            faults.push(SafetyFault::JointPosLimit);
        }
        if exceeds_abs(obs.qd(), &jl.qd_max) {
            faults.push(SafetyFault::JointVelLimit);
        }

        let out = match cmd {
            NormalizedCommand::Torque { tau } => {
                if exceeds_abs(&tau, &jl.tau_max) {
                    faults.push(SafetyFault::JointTorqueLimit);
                    if allow_clamp {
                        clamped = true;
                        NormalizedCommand::Torque {
                            tau: clip_abs(&tau, &jl.tau_max),
                        }
                    } else {
                        NormalizedCommand::Torque { tau }
                    }
                } else {
                    NormalizedCommand::Torque { tau }
                }
            }
            NormalizedCommand::Position { mut q_des, mut qd_des } => {
                if outside_range(&q_des, &jl.q_min, &jl.q_max) {
                    faults.push(SafetyFault::JointPosLimit);
                    if allow_clamp {
                        q_des = clip(&q_des, &jl.q_min, &jl.q_max);
                        clamped = true;
                    }
                }
                if let Some(qd) = qd_des.as_mut()
                    && exceeds_abs(qd, &jl.qd_max)
                {
                    faults.push(SafetyFault::JointVelLimit);
                    if allow_clamp {
                        *qd = clip_abs(qd, &jl.qd_max);
                        clamped = true;
                    }
                }
                NormalizedCommand::Position { q_des, qd_des }
            }
        };

        let Some(&first) = faults.first() else {
            self.limit_frames = 0;
            return Ok((out, false));
        };

        self.limit_frames = self.limit_frames.saturating_add(1);
        let severity = if allow_clamp { Severity::Warn } else { Severity::Error };
        for fault in &faults {
            self.emit(
                report,
                t,
                *fault,
                severity,
                SafetyState::Clamping,
                details([("limit_frames", json!(self.limit_frames))]),
            );
        }

        let threshold = self.config.consecutive_limit_frames_to_kill;
        if !allow_clamp || self.limit_frames >= threshold {
            return Err(self.kill(
                report,
                t,
                first,
                details([
                    ("limit_frames", json!(self.limit_frames)),
                    ("threshold", json!(threshold)),
                    ("allow_clamp", json!(allow_clamp)),
                ]),
            ));
        }

        if clamped {
            debug!(
                limit_frames = self.limit_frames,
                faults = faults.len(),
                "clamped joint-limit violations"
            );
        }
        Ok((out, clamped))
    }

    fn kill(
        &mut self,
        report: &mut SafetyReport,
        t: f64,
        fault: SafetyFault,
        details: EventDetails,
    ) -> Tripped {
        self.emit(report, t, fault, Severity::Fatal, SafetyState::Killed, details);
        Tripped
    }

    fn emit(
        &mut self,
        report: &mut SafetyReport,
        t: f64,
        fault: SafetyFault,
        severity: Severity,
        next_state: SafetyState,
        details: EventDetails,
    ) {
        let state_before = self.state;
        report.events.push(SafetyEvent {
            t,
            fault,
            severity,
            state_before,
            state_after: next_state,
            details,
        });
        report.faults.push(fault);
        self.state = next_state;

        if next_state == SafetyState::Killed {
            warn!(fault = %fault, t, state_before = %state_before, "safety layer killed");
            self.killed = true;
            if self.config.latch_kill {
                self.latched_fault = Some(fault);
            }
        }
    }
}

//! Snapshot tests for the serialized cycle report and output commands.
//!
//! The report is what integrators log every cycle, so its key names, enum
//! spellings and event ordering must stay stable.

use insta::assert_snapshot;
use synthmuscle_safety::prelude::*;
use synthmuscle_test_helpers::prelude::*;

fn obs() -> RawObservation {
    RawObservation::new(vec![0.0, 0.0], vec![0.0, 0.0])
}

#[test]
fn test_clamp_disabled_kill_report() -> TestResult {
    let config = SafetyConfig::builder(JointLimits::symmetric(2, 1.0, 2.0, 10.0))
        .allow_clamp(false)
        .build()?;
    let mut layer = SafetyLayer::new(config)?;
    let (_, report) = layer.step(0.5, &obs(), &RawCommand::torque(vec![15.0, 0.0]));
    assert_snapshot!("clamp_disabled_kill_report", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[test]
fn test_contact_warning_with_clamp_report() -> TestResult {
    let mut layer = SafetyLayer::new(SafetyConfig::new(JointLimits::symmetric(2, 1.0, 2.0, 10.0)))?;
    let (out, report) = layer.step(
        1.0,
        &obs().with_contact_impulse(90.0),
        &RawCommand::torque(vec![12.0, -1.0]),
    );
    assert_eq!(out.tau(), Some(&[10.0, -1.0][..]));
    assert_snapshot!("contact_warning_with_clamp_report", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[test]
fn test_latched_short_circuit_report() -> TestResult {
    let mut layer = SafetyLayer::new(SafetyConfig::new(JointLimits::symmetric(2, 1.0, 2.0, 10.0)))?;
    layer.step(1.0, &obs(), &RawCommand::default());
    let (_, report) = layer.step(2.0, &obs(), &RawCommand::torque(vec![0.0, 0.0]));
    assert_snapshot!("latched_short_circuit_report", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[test]
fn test_safe_pose_override_payload() -> TestResult {
    let config = SafetyConfig::builder(JointLimits::symmetric(2, 1.0, 2.0, 10.0))
        .safe_tau_off(false)
        .safe_pose_q(vec![0.5, 3.0])
        .build()?;
    let layer = SafetyLayer::new(config)?;
    assert_snapshot!(
        "safe_pose_override_payload",
        serde_json::to_string_pretty(layer.safe_override())?
    );
    Ok(())
}

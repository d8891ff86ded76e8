//! Derating curves feeding the fail-closed thermal clip.

use std::collections::BTreeMap;

use synthmuscle_bounds::prelude::*;
use synthmuscle_bounds::{derate_all, i2r_losses_w};
use synthmuscle_test_helpers::prelude::*;

fn policies(ids: &[&str], policy: DeratingPolicy) -> BTreeMap<String, DeratingPolicy> {
    ids.iter().map(|id| ((*id).to_string(), policy)).collect()
}

#[test]
fn test_hot_actuator_is_clipped_to_zero() -> TestResult {
    let map = CommandMap::new(["shoulder", "elbow"])?;
    let limits = derate_all(
        &map,
        &policies(&["shoulder", "elbow"], DeratingPolicy::new(2.0, 6.0)),
        &[40.0, 125.0],
    )?;

    let out = apply_thermal_limits(&[5.0, 5.0], &map, &limits)?;
    assert_vec_approx_eq!(&out.clipped, &[5.0, 0.0], 0.0);
    assert_eq!(out.ok_flags.get("elbow"), Some(&false));
    assert!(out.ok_any());
    assert!(!out.ok_all());
    Ok(())
}

#[test]
fn test_missing_policy_fails_closed() -> TestResult {
    let map = CommandMap::new(["shoulder", "elbow"])?;
    let err = must_err(derate_all(
        &map,
        &policies(&["shoulder"], DeratingPolicy::new(2.0, 6.0)),
        &[40.0, 40.0],
    ));
    assert_eq!(err, BoundsError::MissingThermalLimit("elbow".to_string()));
    Ok(())
}

#[test]
fn test_rc_estimate_drives_derating() -> TestResult {
    let params = ThermalRcParams::new(20.0, 2.0);
    let policy = DeratingPolicy::new(1.0, 4.0);
    let mut state = ThermalState::default();
    let loss = i2r_losses_w(8.0, 1.0)?;

    let cold = policy.derated_limit(state.t_c)?;
    assert_approx_eq!(cold.limit_abs, 4.0, 1e-12);

    // 64 W into 2 °C/W settles far above the 120 °C ceiling.
    for _ in 0..2_000 {
        state.step(&params, loss, 0.05)?;
    }
    let hot = policy.derated_limit(state.t_c)?;
    assert!(!hot.ok);
    assert_approx_eq!(hot.limit_abs, 0.0, 0.0);
    Ok(())
}

#[test]
fn test_command_map_length_checked_against_command() -> TestResult {
    let map = CommandMap::new(["a0", "a1"])?;
    let limits: BTreeMap<String, ThermalLimit> = BTreeMap::new();
    let err = must_err(apply_thermal_limits(&[1.0], &map, &limits));
    assert!(matches!(err, BoundsError::LengthMismatch { .. }));
    Ok(())
}

//! Property-based tests for the safety layer's fail-closed guarantees.

use proptest::prelude::*;
use synthmuscle_safety::prelude::*;

fn limits(n: usize) -> JointLimits {
    JointLimits::symmetric(n, 1.0, 2.0, 10.0)
}

fn in_bounds_obs(n: usize) -> RawObservation {
    RawObservation::new(vec![0.0; n], vec![0.0; n])
}

fn non_finite() -> impl Strategy<Value = f64> + Clone {
    prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
}

/// Arbitrary raw command, including malformed and non-finite ones.
fn any_command(n: usize) -> impl Strategy<Value = RawCommand> {
    let value = prop_oneof![
        8 => -50.0..50.0f64,
        1 => non_finite(),
    ];
    let vector = prop::collection::vec(value, 0..=n + 1);
    (
        prop::option::of(vector.clone()),
        prop::option::of(vector.clone()),
        prop::option::of(vector),
    )
        .prop_map(|(tau, q_des, qd_des)| RawCommand { tau, q_des, qd_des })
}

fn any_observation(n: usize) -> impl Strategy<Value = RawObservation> {
    let vector = prop::collection::vec(-5.0..5.0f64, n);
    (
        prop::option::of(vector.clone()),
        prop::option::of(vector),
        prop::option::of(0.0..200.0f64),
    )
        .prop_map(|(q, qd, contact_impulse)| RawObservation {
            q,
            qd,
            contact_impulse,
            ..RawObservation::default()
        })
}

proptest! {
    #[test]
    fn test_latched_override_is_idempotent(
        n in 1usize..5,
        steps in prop::collection::vec((any_observation(4), any_command(4)), 1..8),
    ) {
        let mut layer = SafetyLayer::new(SafetyConfig::new(limits(n)))?;
        layer.step(0.0, &in_bounds_obs(n), &RawCommand::default());
        prop_assert!(layer.is_killed());
        let latched = layer.latched_fault();

        for (i, (obs, cmd)) in steps.iter().enumerate() {
            let t = f64::from(u32::try_from(i + 1).unwrap_or(u32::MAX));
            let (out, report) = layer.step(t, obs, cmd);
            prop_assert_eq!(&out, layer.safe_override());
            prop_assert_eq!(report.state, SafetyState::Killed);
            prop_assert!(report.killed && report.overridden);
            prop_assert!(report.faults.is_empty());
            prop_assert_eq!(report.latched_fault, latched);
        }

        let (out, report) = layer.step(100.0, &in_bounds_obs(n), &RawCommand::torque(vec![0.0; n]));
        prop_assert_eq!(&out, layer.safe_override());
        prop_assert!(report.killed);

        layer.reset("test");
        let (_, report) = layer.step(101.0, &in_bounds_obs(n), &RawCommand::torque(vec![0.0; n]));
        prop_assert!(!report.killed);
    }

    #[test]
    fn test_non_finite_input_fails_closed(
        n in 1usize..6,
        idx in 0usize..6,
        bad in non_finite(),
        target in 0usize..4,
    ) {
        let idx = idx % n;
        let mut q = vec![0.0; n];
        let mut qd = vec![0.0; n];
        let mut cmd_values = vec![0.0; n];
        let slot = match target {
            0 => q.get_mut(idx),
            1 => qd.get_mut(idx),
            _ => cmd_values.get_mut(idx),
        };
        if let Some(v) = slot {
            *v = bad;
        }
        let cmd = if target == 3 {
            RawCommand::position(cmd_values)
        } else {
            RawCommand::torque(cmd_values)
        };

        let mut layer = SafetyLayer::new(SafetyConfig::new(limits(n)))?;
        let (out, report) = layer.step(0.0, &RawObservation::new(q, qd), &cmd);

        prop_assert!(report.killed);
        prop_assert!(report.overridden);
        prop_assert_eq!(out, NormalizedCommand::zero_torque(n));
        let expected = if target < 2 { SafetyFault::NanInfObs } else { SafetyFault::NanInfCmd };
        prop_assert_eq!(report.faults, vec![expected]);
    }

    #[test]
    fn test_torque_clamp_is_exact(
        tau in prop::collection::vec(-30.0..30.0f64, 1..6),
        over_idx in 0usize..6,
        over in 10.5..100.0f64,
        negative in any::<bool>(),
    ) {
        let n = tau.len();
        let mut tau = tau;
        if let Some(v) = tau.get_mut(over_idx % n) {
            *v = if negative { -over } else { over };
        }
        let tau_max = 10.0_f64;

        let mut layer = SafetyLayer::new(SafetyConfig::new(limits(n)))?;
        let (out, report) = layer.step(0.0, &in_bounds_obs(n), &RawCommand::torque(tau.clone()));

        prop_assert!(report.clamped);
        prop_assert!(report.has_fault(SafetyFault::JointTorqueLimit));
        let Some(clamped) = out.tau() else {
            return Err(TestCaseError::fail("torque command expected"));
        };
        for (out_v, in_v) in clamped.iter().zip(&tau) {
            prop_assert!(out_v.abs() <= tau_max);
            if in_v.abs() <= tau_max {
                prop_assert_eq!(out_v.to_bits(), in_v.to_bits());
            } else {
                prop_assert_eq!(out_v.to_bits(), tau_max.copysign(*in_v).to_bits());
            }
        }
    }

    #[test]
    fn test_kill_after_exactly_k_frames(k in 1u32..12, n in 1usize..4) {
        let config = SafetyConfig::builder(limits(n))
            .consecutive_limit_frames_to_kill(k)
            .build()?;
        let mut layer = SafetyLayer::new(config)?;
        let cmd = RawCommand::torque(vec![25.0; n]);

        for frame in 1..=k {
            let (out, report) = layer.step(f64::from(frame) * 0.01, &in_bounds_obs(n), &cmd);
            if frame < k {
                prop_assert!(!report.killed);
                prop_assert_eq!(report.state, SafetyState::Clamping);
                prop_assert_eq!(out.tau(), Some(&vec![10.0; n][..]));
            } else {
                prop_assert!(report.killed);
                prop_assert_eq!(report.state, SafetyState::Killed);
                prop_assert_eq!(report.latched_fault, Some(SafetyFault::JointTorqueLimit));
            }
        }
    }
}

#[cfg(test)]
mod proptest_engine {
    use crate::coil::{CoilMode, DWELL_TIME_US, SAFE_FAIL_TIME_US};
    use crate::engine::{CoilEngine, SensorFrame, CYLINDER_COUNT};
    use crate::timebase::Micros;
    use proptest::prelude::*;

    // One sampled cycle: time step since the previous sample plus the inputs.
    fn cycle() -> impl Strategy<Value = (u32, [bool; CYLINDER_COUNT], bool)> {
        (1u32..=700, any::<[bool; CYLINDER_COUNT]>(), any::<bool>())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: a coil is driven exactly when its cylinder holds a dwell start
        #[test]
        fn coil_output_tracks_dwell_start(
            start in any::<u32>(),
            fixed in any::<bool>(),
            cycles in prop::collection::vec(cycle(), 1..200),
        ) {
            let mode = if fixed { CoilMode::FixedDwell } else { CoilMode::TriggerGated };
            let mut engine = CoilEngine::new(mode);
            let mut now = Micros(start);
            for (dt, positions, trigger) in cycles {
                now = now.wrapping_add(dt);
                let out = engine.evaluate(&SensorFrame { position_active: positions, trigger_high: trigger }, now);
                for (i, cyl) in engine.cylinders().iter().enumerate() {
                    prop_assert_eq!(cyl.dwell_start().is_some(), out.coils[i]);
                    prop_assert_eq!(cyl.coil_output(), out.coils[i]);
                }
            }
        }

        // Property: the tachometer mirrors the trigger sample of the same cycle
        #[test]
        fn tacho_mirrors_trigger(
            fixed in any::<bool>(),
            cycles in prop::collection::vec(cycle(), 1..200),
        ) {
            let mode = if fixed { CoilMode::FixedDwell } else { CoilMode::TriggerGated };
            let mut engine = CoilEngine::new(mode);
            let mut now = Micros(0);
            for (dt, positions, trigger) in cycles {
                now = now.wrapping_add(dt);
                let out = engine.evaluate(&SensorFrame { position_active: positions, trigger_high: trigger }, now);
                prop_assert_eq!(out.tacho, trigger);
            }
        }

        // Property: in trigger-gated mode a coil is only on while position and
        // trigger have both been high at every sample since its dwell began,
        // and never for longer than the safe-fail time
        #[test]
        fn trigger_gated_dwell_is_gated_and_bounded(
            start in any::<u32>(),
            cycles in prop::collection::vec(cycle(), 1..300),
        ) {
            let mut engine = CoilEngine::new(CoilMode::TriggerGated);
            let mut now = Micros(start);
            let mut held_since: [Option<Micros>; CYLINDER_COUNT] = [None; CYLINDER_COUNT];
            for (dt, positions, trigger) in cycles {
                now = now.wrapping_add(dt);
                let out = engine.evaluate(&SensorFrame { position_active: positions, trigger_high: trigger }, now);
                for i in 0..CYLINDER_COUNT {
                    let gated = positions[i] && trigger;
                    if !gated {
                        held_since[i] = None;
                    } else if held_since[i].is_none() {
                        held_since[i] = Some(now);
                    }
                    if out.coils[i] {
                        prop_assert!(gated);
                        let start = engine.cylinders()[i].dwell_start().unwrap();
                        let held = held_since[i].unwrap();
                        prop_assert!(now.wrapping_since(held) >= now.wrapping_since(start));
                        prop_assert!(now.wrapping_since(start) <= SAFE_FAIL_TIME_US);
                    }
                }
            }
        }

        // Property: in fixed-dwell mode a dwell lasts at least DWELL_TIME unless
        // safe-fail cut it, and never beyond SAFE_FAIL_TIME
        #[test]
        fn fixed_dwell_duration_is_bounded(
            start in any::<u32>(),
            cycles in prop::collection::vec(cycle(), 1..300),
        ) {
            let mut engine = CoilEngine::new(CoilMode::FixedDwell);
            let mut now = Micros(start);
            for (dt, positions, trigger) in cycles {
                let before: Vec<Option<Micros>> =
                    engine.cylinders().iter().map(|c| c.dwell_start()).collect();
                now = now.wrapping_add(dt);
                let out = engine.evaluate(&SensorFrame { position_active: positions, trigger_high: trigger }, now);
                for i in 0..CYLINDER_COUNT {
                    if let Some(began) = before[i] {
                        let elapsed = now.wrapping_since(began);
                        if !out.coils[i] || engine.cylinders()[i].dwell_start() != Some(began) {
                            // released this cycle
                            prop_assert!(elapsed >= DWELL_TIME_US.min(SAFE_FAIL_TIME_US));
                        } else {
                            prop_assert!(elapsed <= SAFE_FAIL_TIME_US);
                        }
                    }
                }
            }
        }

        // Property: re-evaluating unchanged inputs at the same instant is a no-op
        #[test]
        fn unchanged_inputs_are_idempotent(
            positions in any::<[bool; CYLINDER_COUNT]>(),
            trigger in any::<bool>(),
            fixed in any::<bool>(),
            t in any::<u32>(),
        ) {
            let mode = if fixed { CoilMode::FixedDwell } else { CoilMode::TriggerGated };
            let mut engine = CoilEngine::new(mode);
            let frame = SensorFrame { position_active: positions, trigger_high: trigger };
            let first = engine.evaluate(&frame, Micros(t));
            let starts: Vec<_> = engine.cylinders().iter().map(|c| c.dwell_start()).collect();
            let second = engine.evaluate(&frame, Micros(t));
            let again: Vec<_> = engine.cylinders().iter().map(|c| c.dwell_start()).collect();
            prop_assert_eq!(first, second);
            prop_assert_eq!(starts, again);
        }
    }
}

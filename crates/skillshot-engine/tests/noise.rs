//! Noise-immunity properties: switch chatter inside the debounce
//! windows never moves a count, and the core invariants survive
//! arbitrary interleavings of stimuli.

use proptest::prelude::*;
use skillshot_core::Event;
use skillshot_engine::{EjectArgs, Machine};
use skillshot_test_utils::{standard_config, RecordingDrivers};

fn standard_machine() -> Machine {
    let drivers = RecordingDrivers::new();
    let mut machine = Machine::new(&standard_config(), Box::new(drivers)).unwrap();
    machine
        .power_up(&["trough_1", "trough_2", "trough_3"])
        .unwrap();
    machine
}

fn assert_invariants(machine: &Machine) {
    for name in ["trough", "plunger"] {
        let dev = machine.device(name).unwrap();
        assert!(
            dev.balls() <= dev.capacity(),
            "'{name}' over capacity: {} > {}",
            dev.balls(),
            dev.capacity()
        );
        assert_eq!(
            dev.eject_in_progress_target().is_some(),
            dev.num_balls_ejecting() > 0,
            "'{name}' eject-in-progress flag out of sync"
        );
    }
}

proptest! {
    // A switch bouncing with every dwell shorter than both count delays
    // produces no count change and no arrival/departure events.
    #[test]
    fn chatter_inside_debounce_never_changes_counts(
        dwells in prop::collection::vec(1u64..500, 1..30)
    ) {
        let mut machine = standard_machine();
        machine.take_events();

        let mut active = true; // trough_2 starts seeded active
        for dwell in dwells {
            active = !active;
            machine.switch_event("trough_2", active).unwrap();
            machine.advance(dwell).unwrap();
        }

        // Park the switch back where it started and let it settle.
        if !active {
            machine.switch_event("trough_2", true).unwrap();
        }
        machine.advance(500).unwrap();

        prop_assert_eq!(machine.device("trough").unwrap().balls(), 3);
        let trace = machine.take_events();
        prop_assert!(
            !trace.iter().any(|e| matches!(
                e,
                Event::BallEnter { .. } | Event::BallMissing { .. }
            )),
            "chatter leaked count-change events: {trace:?}"
        );
    }

    // Random interleavings of ejects, switch edges, and time keep the
    // structural invariants intact.
    #[test]
    fn invariants_survive_random_stimuli(
        steps in prop::collection::vec((0u8..5, 0u64..800), 1..40)
    ) {
        let mut machine = standard_machine();

        for (op, ms) in steps {
            match op {
                0 => {
                    let _ = machine.eject("trough", EjectArgs::default());
                }
                1 => {
                    let _ = machine.switch_event("trough_1", ms % 2 == 0);
                }
                2 => {
                    let _ = machine.switch_event("plunger_ball", ms % 2 == 0);
                }
                3 => {
                    let _ = machine.switch_event("trough_jam", ms % 2 == 0);
                }
                _ => {}
            }
            machine.advance(ms).unwrap();
            assert_invariants(&machine);
        }

        // Quiescing any device afterwards is always safe.
        machine.stop_device("trough").unwrap();
        assert_invariants(&machine);
        prop_assert_eq!(machine.device("trough").unwrap().eject_queue_len(), 0);
    }
}

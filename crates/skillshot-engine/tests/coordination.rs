//! Inter-device handshake and receive-policy tests: request/volunteer
//! flows, unexpected-ball handling, confirmation variants, and the
//! hold-coil mechanism.

use skillshot_core::{
    BallSaveConfig, ConfirmEjectType, DeviceConfig, Event, MachineConfig, PlayfieldConfig,
};
use skillshot_engine::{EjectArgs, Machine};
use skillshot_test_utils::{standard_config, CoilAction, DriverLog, RecordingDrivers};

fn machine_from(config: &MachineConfig, boot: &[&str]) -> (Machine, DriverLog) {
    let drivers = RecordingDrivers::new();
    let log = drivers.handle();
    let mut machine = Machine::new(config, Box::new(drivers)).unwrap();
    machine.power_up(boot).unwrap();
    (machine, log)
}

fn has_attempt(trace: &[Event], device: skillshot_core::DeviceId) -> bool {
    trace
        .iter()
        .any(|e| matches!(e, Event::EjectAttempt { device: d, .. } if *d == device))
}

// ── request / volunteer flow ───────────────────────────────────

#[test]
fn request_ball_is_served_by_upstream_volunteer() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2", "trough_3"]);
    let trough = machine.device("trough").unwrap().id();
    let plunger = machine.device("plunger").unwrap().id();

    // The plunger asks for a ball; the trough volunteers an eject.
    let requested = machine.request_ball("plunger", 1).unwrap();
    assert_eq!(requested, 1);

    let trace = machine.take_events();
    assert!(trace.contains(&Event::BallRequest {
        device: plunger,
        balls: 1
    }));
    assert!(has_attempt(&trace, trough));
    assert_eq!(machine.device("plunger").unwrap().num_balls_in_transit(), 1);

    // The ball transfers.
    machine.switch_event("trough_1", false).unwrap();
    machine.switch_event("plunger_ball", true).unwrap();
    machine.advance(500).unwrap();

    let trace = machine.take_events();
    // The requested ball was claimed: the plunger keeps it instead of
    // re-ejecting it, and no capture is attributed to the playfield.
    assert!(!has_attempt(&trace, plunger));
    assert!(!trace
        .iter()
        .any(|e| matches!(e, Event::CapturedFrom { .. })));
    let plunger_dev = machine.device("plunger").unwrap();
    assert_eq!(plunger_dev.balls(), 1);
    assert_eq!(plunger_dev.num_balls_requested(), 0);
    assert_eq!(plunger_dev.num_balls_in_transit(), 0);
}

#[test]
fn eject_from_empty_device_pulls_a_ball_first() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2", "trough_3"]);
    let trough = machine.device("trough").unwrap().id();
    let plunger = machine.device("plunger").unwrap().id();

    // The plunger is empty; asking it to eject makes it request a ball.
    machine
        .eject(
            "plunger",
            EjectArgs {
                get_ball: true,
                ..EjectArgs::default()
            },
        )
        .unwrap();
    let trace = machine.take_events();
    assert!(trace.contains(&Event::BallRequest {
        device: plunger,
        balls: 1
    }));
    assert!(has_attempt(&trace, trough));
    assert_eq!(machine.device("plunger").unwrap().eject_queue_len(), 1);

    // Once the ball arrives, the queued eject proceeds on its own.
    machine.switch_event("trough_1", false).unwrap();
    machine.switch_event("plunger_ball", true).unwrap();
    machine.advance(500).unwrap();

    let trace = machine.take_events();
    assert!(has_attempt(&trace, plunger));
    assert_eq!(machine.device("plunger").unwrap().eject_queue_len(), 0);
}

// ── unexpected-ball policy ─────────────────────────────────────

#[test]
fn unexpected_ball_is_captured_and_reejected() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2", "trough_3"]);
    let plunger = machine.device("plunger").unwrap().id();
    let playfield = machine.device("playfield").unwrap().id();

    // A ball appears in the plunger lane out of nowhere.
    machine.switch_event("plunger_ball", true).unwrap();
    machine.advance(500).unwrap();

    let trace = machine.take_events();
    assert!(trace.contains(&Event::CapturedFrom {
        playfield,
        balls: 1
    }));
    // Nobody claimed it, so the (non-trough) device sends it onward.
    assert!(has_attempt(&trace, plunger));
}

#[test]
fn trough_keeps_unexpected_balls() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2"]);
    let trough = machine.device("trough").unwrap().id();
    let playfield = machine.device("playfield").unwrap().id();
    assert_eq!(machine.device("trough").unwrap().balls(), 2);

    // A drained ball arrives on the free trough switch.
    machine.switch_event("trough_3", true).unwrap();
    machine.advance(500).unwrap();

    let trace = machine.take_events();
    assert!(trace.contains(&Event::CapturedFrom {
        playfield,
        balls: 1
    }));
    assert!(!has_attempt(&trace, trough), "troughs retain stuck balls");
    assert_eq!(machine.device("trough").unwrap().balls(), 3);
}

#[test]
fn vanished_ball_posts_ball_missing() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2", "trough_3"]);
    let trough = machine.device("trough").unwrap().id();

    machine.switch_event("trough_2", false).unwrap();
    machine.advance(500).unwrap();

    let trace = machine.take_events();
    assert!(trace.contains(&Event::BallMissing {
        device: trough,
        balls: 1
    }));
}

// ── eject-request event intake ─────────────────────────────────

#[test]
fn eject_request_event_triggers_eject() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2", "trough_3"]);
    let trough = machine.device("trough").unwrap().id();

    machine
        .post(Event::EjectRequest {
            device: trough,
            balls: 1,
            target: None,
        })
        .unwrap();

    let trace = machine.take_events();
    assert!(has_attempt(&trace, trough));
}

// ── named eject triggers ───────────────────────────────────────

#[test]
fn configured_eject_event_fires_an_eject() {
    let mut config = standard_config();
    config.devices[0].eject_events = vec!["release_lock".to_string()];
    let (mut machine, _log) =
        machine_from(&config, &["trough_1", "trough_2", "trough_3"]);
    let trough = machine.device("trough").unwrap().id();

    machine.post_named("release_lock").unwrap();
    let trace = machine.take_events();
    assert!(has_attempt(&trace, trough));
}

#[test]
fn trigger_event_arms_player_controlled_eject() {
    let (mut machine, _log) =
        machine_from(&standard_config(), &["trough_1", "trough_2", "trough_3"]);

    machine
        .setup_player_controlled_eject("trough", 1, None, Some("launch_button"))
        .unwrap();
    machine.take_events();

    // The trough is not mechanical and has no eject events, so arming
    // fell through to an automatic eject already.
    let dev = machine.device("trough").unwrap();
    assert!(dev.eject_in_progress_target().is_some());
}

// ── entrance-switch counting ───────────────────────────────────

fn entrance_config() -> MachineConfig {
    let mut config = standard_config();
    config.devices.push(DeviceConfig {
        name: "subway".to_string(),
        ball_capacity: Some(2),
        entrance_switch: Some("subway_enter".to_string()),
        eject_coil: Some("subway_coil".to_string()),
        eject_targets: vec!["playfield".to_string()],
        confirm_eject_type: ConfirmEjectType::Fake,
        // Retain counted balls; this fixture ejects explicitly.
        tags: vec!["trough".to_string()],
        ..DeviceConfig::default()
    });
    config
}

#[test]
fn entrance_switch_counts_up_to_capacity() {
    let (mut machine, _log) =
        machine_from(&entrance_config(), &["trough_1", "trough_2", "trough_3"]);

    for _ in 0..2 {
        machine.switch_event("subway_enter", true).unwrap();
        machine.switch_event("subway_enter", false).unwrap();
    }
    assert_eq!(machine.device("subway").unwrap().balls(), 2);

    // A third activation is refused: the device is full.
    machine.switch_event("subway_enter", true).unwrap();
    assert_eq!(machine.device("subway").unwrap().balls(), 2);
}

#[test]
fn entrance_device_ejects_without_ball_switches() {
    let (mut machine, log) =
        machine_from(&entrance_config(), &["trough_1", "trough_2", "trough_3"]);
    let subway = machine.device("subway").unwrap().id();

    machine.switch_event("subway_enter", true).unwrap();
    machine.take_events();

    machine.eject("subway", EjectArgs::default()).unwrap();
    // With no ball switches, the count drops immediately.
    assert_eq!(machine.device("subway").unwrap().balls(), 0);
    let coil = machine.coil_id("subway_coil").unwrap();
    assert_eq!(log.pulses(coil), 1);

    // The fake confirmation matures after a millisecond.
    machine.advance(1).unwrap();
    let trace = machine.take_events();
    assert!(trace.iter().any(|e| matches!(
        e,
        Event::EjectSuccess { device, .. } if *device == subway
    )));
}

// ── confirmation variants ──────────────────────────────────────

fn confirm_config(confirm: ConfirmEjectType) -> MachineConfig {
    let mut config = standard_config();
    config.devices.push(DeviceConfig {
        name: "vuk".to_string(),
        ball_switches: vec!["vuk_ball".to_string()],
        eject_coil: Some("vuk_coil".to_string()),
        eject_targets: vec!["playfield".to_string()],
        confirm_eject_type: confirm,
        confirm_eject_switch: Some("vuk_exit".to_string()),
        confirm_eject_event: Some("vuk_made_it".to_string()),
        ..DeviceConfig::default()
    });
    config
}

#[test]
fn switch_confirmation_succeeds_on_switch_hit() {
    let (mut machine, _log) = machine_from(
        &confirm_config(ConfirmEjectType::Switch),
        &["trough_1", "vuk_ball"],
    );
    let vuk = machine.device("vuk").unwrap().id();

    machine.eject("vuk", EjectArgs::default()).unwrap();
    machine.take_events();

    machine.switch_event("vuk_exit", true).unwrap();
    let trace = machine.take_events();
    assert!(trace.iter().any(|e| matches!(
        e,
        Event::EjectSuccess { device, .. } if *device == vuk
    )));
}

#[test]
fn event_confirmation_succeeds_on_named_event() {
    let (mut machine, _log) = machine_from(
        &confirm_config(ConfirmEjectType::Event),
        &["trough_1", "vuk_ball"],
    );
    let vuk = machine.device("vuk").unwrap().id();

    machine.eject("vuk", EjectArgs::default()).unwrap();
    machine.take_events();

    machine.post_named("vuk_made_it").unwrap();
    let trace = machine.take_events();
    assert!(trace.iter().any(|e| matches!(
        e,
        Event::EjectSuccess { device, .. } if *device == vuk
    )));
}

#[test]
fn playfield_switch_confirms_playfield_eject() {
    let (mut machine, _log) = machine_from(
        &confirm_config(ConfirmEjectType::Target),
        &["trough_1", "vuk_ball"],
    );
    let vuk = machine.device("vuk").unwrap().id();
    let playfield = machine.device("playfield").unwrap().id();

    machine.eject("vuk", EjectArgs::default()).unwrap();
    // The ball leaves the VUK.
    machine.switch_event("vuk_ball", false).unwrap();
    machine.take_events();

    // The first playfield switch hit confirms.
    machine
        .post(Event::PlayfieldSwitch { playfield })
        .unwrap();
    let trace = machine.take_events();
    assert!(trace.iter().any(|e| matches!(
        e,
        Event::EjectSuccess { device, .. } if *device == vuk
    )));
}

// ── hold coil mechanism ────────────────────────────────────────

fn hold_config() -> MachineConfig {
    MachineConfig {
        devices: vec![DeviceConfig {
            name: "lock".to_string(),
            ball_switches: vec!["lock_ball".to_string()],
            hold_coil: Some("lock_hold".to_string()),
            hold_coil_release_time: "200ms".to_string(),
            hold_switches: vec!["lock_ball".to_string()],
            eject_targets: vec!["playfield".to_string()],
            confirm_eject_type: ConfirmEjectType::Fake,
            ..DeviceConfig::default()
        }],
        playfields: vec![PlayfieldConfig::default()],
        ball_saves: Vec::new(),
    }
}

#[test]
fn hold_coil_release_cycle() {
    let (mut machine, log) = machine_from(&hold_config(), &["lock_ball"]);
    let hold = machine.coil_id("lock_hold").unwrap();

    machine.eject("lock", EjectArgs::default()).unwrap();
    // The release opened the coil.
    assert_eq!(log.actions(), vec![CoilAction::Disable(hold)]);

    // The ball rolls out during the release window.
    machine.switch_event("lock_ball", false).unwrap();
    machine.advance(200).unwrap();
    // Device empty at window close: the coil stays released.
    assert_eq!(log.actions(), vec![CoilAction::Disable(hold)]);

    // A new ball settles on the hold switch: re-energize.
    machine.switch_event("lock_ball", true).unwrap();
    assert_eq!(
        log.actions(),
        vec![CoilAction::Disable(hold), CoilAction::Enable(hold)]
    );
}

#[test]
fn hold_coil_reenables_when_balls_remain() {
    let mut config = hold_config();
    config.devices[0].ball_switches = vec![
        "lock_ball".to_string(),
        "lock_ball_2".to_string(),
    ];
    let (mut machine, log) = machine_from(&config, &["lock_ball", "lock_ball_2"]);
    let hold = machine.coil_id("lock_hold").unwrap();

    machine.eject("lock", EjectArgs::default()).unwrap();
    machine.switch_event("lock_ball", false).unwrap();
    machine.advance(200).unwrap();

    // One ball stayed behind: the window close re-energizes.
    assert!(log.actions().contains(&CoilAction::Enable(hold)));
}

// ── ball-save timer-start events ───────────────────────────────

#[test]
fn save_timer_starts_on_configured_event() {
    let mut config = standard_config();
    config.ball_saves.push(BallSaveConfig {
        name: "default".to_string(),
        balls_to_save: 1,
        active_time: "5s".to_string(),
        timer_start_events: vec!["ball_started".to_string()],
        ..BallSaveConfig::default()
    });
    let (mut machine, _log) =
        machine_from(&config, &["trough_1", "trough_2", "trough_3"]);
    let save = machine.ball_save("default").unwrap().id();

    machine.enable_ball_save("default").unwrap();
    machine.take_events();

    // No timer yet: nothing fires.
    machine.advance(10_000).unwrap();
    assert!(machine.ball_save("default").unwrap().is_enabled());

    // The start event arms the clock.
    machine.post_named("ball_started").unwrap();
    machine.advance(5_000).unwrap();
    let trace = machine.take_events();
    assert!(trace.contains(&Event::SaveDisabled { save }));
}

// ── stop cancels outstanding requests ──────────────────────────

#[test]
fn stop_cancels_outstanding_ball_request() {
    let (mut machine, _log) = machine_from(&standard_config(), &[]);
    let plunger = machine.device("plunger").unwrap().id();

    // Empty machine: the request stays outstanding (the trough has
    // nothing to volunteer).
    machine.request_ball("plunger", 1).unwrap();
    assert_eq!(machine.device("plunger").unwrap().num_balls_requested(), 1);
    machine.take_events();

    machine.stop_device("plunger").unwrap();
    let trace = machine.take_events();
    assert!(trace.contains(&Event::CancelBallRequest { device: plunger }));
    assert_eq!(machine.device("plunger").unwrap().num_balls_requested(), 0);
}

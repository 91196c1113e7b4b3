//! Skillshot quickstart — a trough feeding a plunger lane from scratch.
//!
//! Demonstrates:
//!   1. Describing devices, a playfield, and their wiring in a MachineConfig
//!   2. Building and powering up a Machine with a DriverBank
//!   3. Driving switch edges and the clock by hand
//!   4. Watching the eject handshake resolve through the event trace
//!
//! Run with:
//!   cargo run --example trough_demo

use skillshot_core::{CoilId, DeviceConfig, DriverBank, MachineConfig, PlayfieldConfig};
use skillshot_engine::{EjectArgs, Machine};

// ─── A driver bank that just narrates ───────────────────────────

struct PrintingDrivers;

impl DriverBank for PrintingDrivers {
    fn pulse(&mut self, coil: CoilId) {
        println!("  [coil {coil}] pulse");
    }
    fn enable(&mut self, coil: CoilId) {
        println!("  [coil {coil}] enable");
    }
    fn disable(&mut self, coil: CoilId) {
        println!("  [coil {coil}] disable");
    }
}

fn main() {
    let config = MachineConfig {
        devices: vec![
            DeviceConfig {
                name: "trough".to_string(),
                ball_switches: vec![
                    "trough_1".to_string(),
                    "trough_2".to_string(),
                    "trough_3".to_string(),
                ],
                eject_coil: Some("trough_eject".to_string()),
                eject_targets: vec!["plunger".to_string()],
                eject_timeouts: vec!["3s".to_string()],
                tags: vec!["trough".to_string()],
                ..DeviceConfig::default()
            },
            DeviceConfig {
                name: "plunger".to_string(),
                ball_switches: vec!["plunger_ball".to_string()],
                mechanical_eject: true,
                eject_targets: vec!["playfield".to_string()],
                ..DeviceConfig::default()
            },
        ],
        playfields: vec![PlayfieldConfig::default()],
        ball_saves: Vec::new(),
    };

    let mut machine =
        Machine::new(&config, Box::new(PrintingDrivers)).expect("config is valid");

    // Three balls sit in the trough at boot.
    machine
        .power_up(&["trough_1", "trough_2", "trough_3"])
        .expect("power up");
    println!(
        "boot: trough holds {} ball(s)",
        machine.device("trough").unwrap().balls()
    );

    // Ask the trough for one ball; the coil fires via the queued
    // attempt event.
    machine
        .eject("trough", EjectArgs::default())
        .expect("eject");

    // The ball rolls off its trough switch and into the plunger lane.
    machine.switch_event("trough_1", false).expect("edge");
    machine.switch_event("plunger_ball", true).expect("edge");

    // Let the plunger's entrance count settle.
    machine.advance(500).expect("advance");

    println!(
        "after handoff: trough={} plunger={}",
        machine.device("trough").unwrap().balls(),
        machine.device("plunger").unwrap().balls(),
    );

    println!("events:");
    for event in machine.take_events() {
        println!("  {}", machine.event_name(&event));
    }
}

//! Test utilities and fixtures for Skillshot development.
//!
//! Provides [`RecordingDrivers`] (a [`DriverBank`] that logs every coil
//! action through a shareable handle), [`ManualClock`] for realtime-mode
//! tests, and standard machine configurations used across the engine
//! test suites.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::cell::RefCell;
use std::rc::Rc;

use skillshot_core::{
    BallSaveConfig, Clock, CoilId, DeviceConfig, DriverBank, MachineConfig, PlayfieldConfig,
};

/// One recorded driver action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoilAction {
    Pulse(CoilId),
    Enable(CoilId),
    Disable(CoilId),
}

/// [`DriverBank`] that records every action.
///
/// The machine takes the bank by value; keep a [`handle`](RecordingDrivers::handle)
/// to inspect the log from the test afterwards.
pub struct RecordingDrivers {
    log: Rc<RefCell<Vec<CoilAction>>>,
}

impl RecordingDrivers {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A handle onto the shared action log.
    pub fn handle(&self) -> DriverLog {
        DriverLog {
            log: Rc::clone(&self.log),
        }
    }
}

impl Default for RecordingDrivers {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBank for RecordingDrivers {
    fn pulse(&mut self, coil: CoilId) {
        self.log.borrow_mut().push(CoilAction::Pulse(coil));
    }
    fn enable(&mut self, coil: CoilId) {
        self.log.borrow_mut().push(CoilAction::Enable(coil));
    }
    fn disable(&mut self, coil: CoilId) {
        self.log.borrow_mut().push(CoilAction::Disable(coil));
    }
}

/// Inspection handle for a [`RecordingDrivers`] log.
#[derive(Clone)]
pub struct DriverLog {
    log: Rc<RefCell<Vec<CoilAction>>>,
}

impl DriverLog {
    /// Snapshot of all recorded actions.
    pub fn actions(&self) -> Vec<CoilAction> {
        self.log.borrow().clone()
    }

    /// Number of pulses recorded for `coil`.
    pub fn pulses(&self, coil: CoilId) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|a| **a == CoilAction::Pulse(coil))
            .count()
    }

    /// Drop all recorded actions.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

/// Settable [`Clock`] for realtime-runner tests.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<RefCell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(RefCell::new(start_ms)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: u64) {
        *self.now.borrow_mut() += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.now.borrow()
    }
}

/// The standard three-device fixture: a 3-switch trough with an eject
/// coil feeding a mechanical plunger lane, which feeds the playfield.
///
/// Switches: `trough_1..trough_3`, `trough_jam`, `plunger_ball`.
/// Coils: `trough_eject`.
pub fn standard_config() -> MachineConfig {
    MachineConfig {
        devices: vec![
            DeviceConfig {
                name: "trough".to_string(),
                ball_switches: vec![
                    "trough_1".to_string(),
                    "trough_2".to_string(),
                    "trough_3".to_string(),
                ],
                jam_switch: Some("trough_jam".to_string()),
                eject_coil: Some("trough_eject".to_string()),
                eject_targets: vec!["plunger".to_string()],
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
    }
}

/// [`standard_config`] plus a one-ball auto-launch ball save.
pub fn config_with_ball_save() -> MachineConfig {
    let mut config = standard_config();
    config.ball_saves.push(BallSaveConfig {
        name: "default".to_string(),
        balls_to_save: 1,
        active_time: "10s".to_string(),
        hurry_up_time: "2s".to_string(),
        grace_period: "1s".to_string(),
        ..BallSaveConfig::default()
    });
    config
}

//! Skillshot: the ball-device coordination core of a pinball machine
//! controller.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Skillshot sub-crates. For most users, adding `skillshot` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use skillshot::prelude::*;
//!
//! // A driver bank that ignores the hardware (tests and examples only).
//! struct NullDrivers;
//! impl DriverBank for NullDrivers {
//!     fn pulse(&mut self, _coil: CoilId) {}
//!     fn enable(&mut self, _coil: CoilId) {}
//!     fn disable(&mut self, _coil: CoilId) {}
//! }
//!
//! // A trough holding three balls, feeding the playfield.
//! let config = MachineConfig {
//!     devices: vec![DeviceConfig {
//!         name: "trough".into(),
//!         ball_switches: vec!["trough_1".into(), "trough_2".into(), "trough_3".into()],
//!         eject_coil: Some("trough_eject".into()),
//!         eject_targets: vec!["playfield".into()],
//!         tags: vec!["trough".into()],
//!         ..DeviceConfig::default()
//!     }],
//!     playfields: vec![PlayfieldConfig::default()],
//!     ball_saves: vec![],
//! };
//!
//! let mut machine = Machine::new(&config, Box::new(NullDrivers)).unwrap();
//! machine.power_up(&["trough_1", "trough_2", "trough_3"]).unwrap();
//! assert_eq!(machine.device("trough").unwrap().balls(), 3);
//!
//! // Serve a ball: the attempt event precedes the coil pulse.
//! machine.eject("trough", EjectArgs::default()).unwrap();
//! machine.switch_event("trough_1", false).unwrap();
//! machine.advance(500).unwrap();
//! assert_eq!(machine.device("trough").unwrap().balls(), 2);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skillshot-core` | IDs, events, errors, configuration, hardware traits |
//! | [`bus`] | `skillshot-bus` | Dispatcher, event queue, delays, switch monitor |
//! | [`device`] | `skillshot-device` | Ball devices, registry, ball saves, hooks |
//! | [`engine`] | `skillshot-engine` | The machine and the realtime runner |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`skillshot-core`).
pub use skillshot_core as types;

/// Event plumbing: dispatch, delays, switch monitoring (`skillshot-bus`).
pub use skillshot_bus as bus;

/// Ball devices, the eject engine, and the ball save (`skillshot-device`).
pub use skillshot_device as device;

/// Machine orchestration and the realtime runner (`skillshot-engine`).
pub use skillshot_engine as engine;

/// The most commonly used types, re-exported flat.
pub mod prelude {
    pub use skillshot_core::{
        BallSaveConfig, Clock, CoilId, ConfigError, ConfirmEjectType, DeviceConfig, DeviceId,
        DriverBank, Event, MachineConfig, MachineError, MsTime, PlayfieldConfig, SwitchId,
        SystemClock,
    };
    pub use skillshot_device::{BallDevice, BallSave};
    pub use skillshot_engine::{EjectArgs, InputEvent, Machine, RealtimeRunner};
}

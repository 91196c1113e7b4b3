//! Error types for the Skillshot coordination core.
//!
//! Two enums, split by phase: [`ConfigError`] for construction-time
//! validation failures (fatal, per the error taxonomy — a machine is never
//! built from a bad configuration) and [`MachineError`] for runtime
//! operations against a built machine. Invariant violations at runtime are
//! never errors: they are logged and clamped where they occur.

use std::error::Error;
use std::fmt;

/// Errors detected while validating or resolving a machine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// No ball devices configured.
    NoDevices,
    /// Two devices (or a device and a playfield) share a name.
    DuplicateDevice {
        /// The duplicated name.
        name: String,
    },
    /// A name reference (eject target, `captures_from`, save playfield)
    /// does not resolve to any configured device.
    UnknownDevice {
        /// The unresolved name.
        name: String,
    },
    /// `captures_from` or a ball save's source names a device that is not
    /// a playfield.
    NotAPlayfield {
        /// The referenced name.
        name: String,
    },
    /// A device confirms via `target` but configures no eject targets.
    MissingEjectTarget {
        /// The misconfigured device.
        device: String,
    },
    /// A device confirms via `switch` but names no confirmation switch.
    MissingConfirmSwitch {
        /// The misconfigured device.
        device: String,
    },
    /// A device confirms via `event` but names no confirmation event.
    MissingConfirmEvent {
        /// The misconfigured device.
        device: String,
    },
    /// A duration string could not be parsed.
    InvalidDuration {
        /// The offending value.
        value: String,
    },
    /// A device configures both an eject coil and a hold coil.
    ConflictingCoils {
        /// The misconfigured device.
        device: String,
    },
    /// `balls_per_eject` is zero.
    ZeroBallsPerEject {
        /// The misconfigured device.
        device: String,
    },
    /// A device resolves to a capacity of zero balls.
    ZeroCapacity {
        /// The misconfigured device.
        device: String,
    },
    /// A ball save's timing or count fields are inconsistent.
    InvalidBallSave {
        /// Description of which field is inconsistent.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => write!(f, "no ball devices configured"),
            Self::DuplicateDevice { name } => {
                write!(f, "duplicate device name '{name}'")
            }
            Self::UnknownDevice { name } => {
                write!(f, "reference to unknown device '{name}'")
            }
            Self::NotAPlayfield { name } => {
                write!(f, "'{name}' is referenced as a playfield but is not one")
            }
            Self::MissingEjectTarget { device } => {
                write!(
                    f,
                    "device '{device}' confirms by target but has no eject targets"
                )
            }
            Self::MissingConfirmSwitch { device } => {
                write!(
                    f,
                    "device '{device}' confirms by switch but names no confirm switch"
                )
            }
            Self::MissingConfirmEvent { device } => {
                write!(
                    f,
                    "device '{device}' confirms by event but names no confirm event"
                )
            }
            Self::InvalidDuration { value } => {
                write!(f, "invalid duration '{value}'")
            }
            Self::ConflictingCoils { device } => {
                write!(
                    f,
                    "device '{device}' configures both an eject coil and a hold coil"
                )
            }
            Self::ZeroBallsPerEject { device } => {
                write!(f, "device '{device}' has balls_per_eject of 0")
            }
            Self::ZeroCapacity { device } => {
                write!(f, "device '{device}' resolves to a capacity of 0 balls")
            }
            Self::InvalidBallSave { reason } => {
                write!(f, "invalid ball save config: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Errors from runtime operations against a built machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MachineError {
    /// The named device does not exist.
    UnknownDevice {
        /// The unresolved name.
        name: String,
    },
    /// The named switch does not exist.
    UnknownSwitch {
        /// The unresolved name.
        name: String,
    },
    /// The named ball save does not exist.
    UnknownSave {
        /// The unresolved name.
        name: String,
    },
    /// An operation was issued before the machine was powered up.
    NotPoweredUp,
    /// `power_up` was called twice.
    AlreadyPoweredUp,
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDevice { name } => write!(f, "unknown device '{name}'"),
            Self::UnknownSwitch { name } => write!(f, "unknown switch '{name}'"),
            Self::UnknownSave { name } => write!(f, "unknown ball save '{name}'"),
            Self::NotPoweredUp => write!(f, "machine has not been powered up"),
            Self::AlreadyPoweredUp => write!(f, "machine is already powered up"),
        }
    }
}

impl Error for MachineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::MissingEjectTarget {
            device: "vuk".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("vuk"));
        assert!(msg.contains("no eject targets"));
    }

    #[test]
    fn machine_error_display() {
        let err = MachineError::UnknownSwitch {
            name: "trough_4".to_string(),
        };
        assert_eq!(err.to_string(), "unknown switch 'trough_4'");
    }
}

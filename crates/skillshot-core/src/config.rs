//! Machine configuration, validation, and duration parsing.
//!
//! [`MachineConfig`] is the builder-input for constructing a machine.
//! [`validate()`](MachineConfig::validate) checks structural invariants up
//! front; the machine constructor re-resolves names into IDs after a
//! successful validation. Duration fields are configuration strings
//! (`"500ms"`, `"2s"`, or a bare number meaning milliseconds) and are
//! parsed once, at validation/resolution time.

use std::fmt;

use crate::error::ConfigError;

/// Parse a configuration duration string to milliseconds.
///
/// Accepts `"250ms"`, `"2s"`, `"1.5s"`, `"3m"`, or a bare number (taken as
/// milliseconds). Fractions are rounded to the nearest millisecond.
pub fn parse_duration_ms(value: &str) -> Result<u64, ConfigError> {
    let trimmed = value.trim();
    let err = || ConfigError::InvalidDuration {
        value: value.to_string(),
    };

    let (number, scale) = if let Some(stripped) = trimmed.strip_suffix("ms") {
        (stripped, 1.0)
    } else if let Some(stripped) = trimmed.strip_suffix('s') {
        (stripped, 1_000.0)
    } else if let Some(stripped) = trimmed.strip_suffix('m') {
        (stripped, 60_000.0)
    } else {
        (trimmed, 1.0)
    };

    let parsed: f64 = number.trim().parse().map_err(|_| err())?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(err());
    }
    Ok((parsed * scale).round() as u64)
}

// ── ConfirmEjectType ───────────────────────────────────────────────

/// How an eject is confirmed as having reached its destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfirmEjectType {
    /// Confirm when the target device reports a ball entering. Playfield
    /// targets fall back to count-based confirmation, optionally helped
    /// by the first playfield switch hit.
    #[default]
    Target,
    /// Confirm when a dedicated switch activates.
    Switch,
    /// Confirm when a named event is published.
    Event,
    /// Confirm when a recount shows the ball left and did not return.
    Count,
    /// Confirm unconditionally after 1 ms. For locks and captive balls
    /// whose "eject" never physically moves a ball.
    Fake,
}

impl fmt::Display for ConfirmEjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Target => "target",
            Self::Switch => "switch",
            Self::Event => "event",
            Self::Count => "count",
            Self::Fake => "fake",
        };
        write!(f, "{s}")
    }
}

// ── DeviceConfig ───────────────────────────────────────────────────

/// Configuration for one ball device.
///
/// All cross-references (switches, coils, other devices) are by name and
/// resolved to IDs at machine construction. Duration fields are strings
/// in the `"500ms"` / `"2s"` format.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Unique name among devices and playfields.
    pub name: String,
    /// Switches that each contribute one ball to the count while active.
    pub ball_switches: Vec<String>,
    /// Maximum balls held. Defaults to the number of ball switches.
    pub ball_capacity: Option<u32>,
    /// Switch at the eject opening; its activation pattern distinguishes
    /// a clean eject from a bounce-back.
    pub jam_switch: Option<String>,
    /// Entrance switch, used to count balls in when no ball switches
    /// exist.
    pub entrance_switch: Option<String>,
    /// How long a ball switch must be active before it counts.
    pub entrance_count_delay: String,
    /// How long a ball switch must be inactive before it uncounts.
    pub exit_count_delay: String,
    /// Pulse-to-eject coil. Mutually exclusive with `hold_coil`.
    pub eject_coil: Option<String>,
    /// Continuously-energized retention coil, released to eject.
    pub hold_coil: Option<String>,
    /// How long the hold coil stays released per eject.
    pub hold_coil_release_time: String,
    /// Switches that re-energize the hold coil when a ball settles.
    pub hold_switches: Vec<String>,
    /// Downstream devices, in preference order. The first is the default
    /// eject target.
    pub eject_targets: Vec<String>,
    /// Per-target confirmation deadlines, aligned with `eject_targets`.
    /// Missing entries default to 10 seconds.
    pub eject_timeouts: Vec<String>,
    /// Confirmation strategy.
    pub confirm_eject_type: ConfirmEjectType,
    /// Confirmation switch for [`ConfirmEjectType::Switch`].
    pub confirm_eject_switch: Option<String>,
    /// Confirmation event name for [`ConfirmEjectType::Event`].
    pub confirm_eject_event: Option<String>,
    /// Retry budget per queue entry. 0 = unbounded.
    pub max_eject_attempts: u32,
    /// 1 ejects a single ball; any other value ejects everything held
    /// (scoop-style).
    pub balls_per_eject: u32,
    /// Whether a player-operated plunger may fire the eject with no coil.
    pub mechanical_eject: bool,
    /// How long a ball switch must stay open before a plunger pull is
    /// recognized.
    pub mechanical_eject_trigger_time: String,
    /// Named events that trigger an eject from this device.
    pub eject_events: Vec<String>,
    /// The playfield unexpected arrivals are attributed to.
    pub captures_from: String,
    /// Opaque labels. `trough` makes the device keep unclaimed balls
    /// instead of re-ejecting them.
    pub tags: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            ball_switches: Vec::new(),
            ball_capacity: None,
            jam_switch: None,
            entrance_switch: None,
            entrance_count_delay: "500ms".to_string(),
            exit_count_delay: "500ms".to_string(),
            eject_coil: None,
            hold_coil: None,
            hold_coil_release_time: "1s".to_string(),
            hold_switches: Vec::new(),
            eject_targets: vec!["playfield".to_string()],
            eject_timeouts: Vec::new(),
            confirm_eject_type: ConfirmEjectType::Target,
            confirm_eject_switch: None,
            confirm_eject_event: None,
            max_eject_attempts: 0,
            balls_per_eject: 1,
            mechanical_eject: false,
            mechanical_eject_trigger_time: "500ms".to_string(),
            eject_events: Vec::new(),
            captures_from: "playfield".to_string(),
            tags: Vec::new(),
        }
    }
}

impl DeviceConfig {
    /// The capacity this device resolves to: explicit, or one per ball
    /// switch.
    pub fn resolved_capacity(&self) -> u32 {
        self.ball_capacity
            .unwrap_or(self.ball_switches.len() as u32)
    }
}

// ── PlayfieldConfig ────────────────────────────────────────────────

/// Configuration for a playfield: a degenerate device with effectively
/// unlimited capacity. Balls "on the playfield" are in play.
#[derive(Clone, Debug)]
pub struct PlayfieldConfig {
    /// Unique name among devices and playfields.
    pub name: String,
    /// Whether ejects to this playfield may additionally be confirmed by
    /// the first playfield switch hit.
    pub confirm_ball_via_switch: bool,
}

impl Default for PlayfieldConfig {
    fn default() -> Self {
        Self {
            name: "playfield".to_string(),
            confirm_ball_via_switch: true,
        }
    }
}

// ── BallSaveConfig ─────────────────────────────────────────────────

/// Configuration for a ball-save adjunct.
#[derive(Clone, Debug)]
pub struct BallSaveConfig {
    /// Unique name among ball saves.
    pub name: String,
    /// The playfield drained balls are returned to.
    pub source_playfield: String,
    /// Balls saved per enable. -1 = unlimited.
    pub balls_to_save: i32,
    /// How long the save stays armed after its timer starts. `"0"` means
    /// it stays armed until disabled.
    pub active_time: String,
    /// How long before expiry the hurry-up warning fires.
    pub hurry_up_time: String,
    /// Extra time after expiry during which drains are still saved.
    pub grace_period: String,
    /// Whether saved balls launch automatically or wait for the player.
    pub auto_launch: bool,
    /// Events that start the save timer. Empty = the timer starts at
    /// enable.
    pub timer_start_events: Vec<String>,
}

impl Default for BallSaveConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            source_playfield: "playfield".to_string(),
            balls_to_save: 1,
            active_time: "0".to_string(),
            hurry_up_time: "0".to_string(),
            grace_period: "0".to_string(),
            auto_launch: true,
            timer_start_events: Vec::new(),
        }
    }
}

// ── MachineConfig ──────────────────────────────────────────────────

/// Complete configuration for constructing a machine.
#[derive(Clone, Debug, Default)]
pub struct MachineConfig {
    /// Ball devices, in registration order.
    pub devices: Vec<DeviceConfig>,
    /// Playfields. Most machines have exactly one, named `playfield`.
    pub playfields: Vec<PlayfieldConfig>,
    /// Ball-save adjuncts.
    pub ball_saves: Vec<BallSaveConfig>,
}

impl MachineConfig {
    /// Validate all structural invariants.
    ///
    /// A pure pass: no IDs are assigned here. The machine constructor
    /// resolves names after a successful validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one device.
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        // 2. Names unique across devices and playfields.
        let mut seen: Vec<&str> = Vec::new();
        for name in self
            .devices
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.playfields.iter().map(|p| p.name.as_str()))
        {
            if seen.contains(&name) {
                return Err(ConfigError::DuplicateDevice {
                    name: name.to_string(),
                });
            }
            seen.push(name);
        }
        let known = |name: &str| seen.contains(&name);
        let is_playfield = |name: &str| self.playfields.iter().any(|p| p.name == name);

        // 3. Per-device invariants.
        for dev in &self.devices {
            parse_duration_ms(&dev.entrance_count_delay)?;
            parse_duration_ms(&dev.exit_count_delay)?;
            parse_duration_ms(&dev.hold_coil_release_time)?;
            parse_duration_ms(&dev.mechanical_eject_trigger_time)?;
            for timeout in &dev.eject_timeouts {
                parse_duration_ms(timeout)?;
            }

            if dev.eject_coil.is_some() && dev.hold_coil.is_some() {
                return Err(ConfigError::ConflictingCoils {
                    device: dev.name.clone(),
                });
            }
            if dev.balls_per_eject == 0 {
                return Err(ConfigError::ZeroBallsPerEject {
                    device: dev.name.clone(),
                });
            }
            if dev.resolved_capacity() == 0 {
                return Err(ConfigError::ZeroCapacity {
                    device: dev.name.clone(),
                });
            }

            for target in &dev.eject_targets {
                if !known(target) {
                    return Err(ConfigError::UnknownDevice {
                        name: target.clone(),
                    });
                }
            }
            if !known(&dev.captures_from) {
                return Err(ConfigError::UnknownDevice {
                    name: dev.captures_from.clone(),
                });
            }
            if !is_playfield(&dev.captures_from) {
                return Err(ConfigError::NotAPlayfield {
                    name: dev.captures_from.clone(),
                });
            }

            match dev.confirm_eject_type {
                ConfirmEjectType::Target if dev.eject_targets.is_empty() => {
                    return Err(ConfigError::MissingEjectTarget {
                        device: dev.name.clone(),
                    });
                }
                ConfirmEjectType::Switch if dev.confirm_eject_switch.is_none() => {
                    return Err(ConfigError::MissingConfirmSwitch {
                        device: dev.name.clone(),
                    });
                }
                ConfirmEjectType::Event if dev.confirm_eject_event.is_none() => {
                    return Err(ConfigError::MissingConfirmEvent {
                        device: dev.name.clone(),
                    });
                }
                _ => {}
            }
        }

        // 4. Ball saves.
        let mut save_names: Vec<&str> = Vec::new();
        for save in &self.ball_saves {
            if save_names.contains(&save.name.as_str()) {
                return Err(ConfigError::DuplicateDevice {
                    name: save.name.clone(),
                });
            }
            save_names.push(&save.name);

            if !known(&save.source_playfield) {
                return Err(ConfigError::UnknownDevice {
                    name: save.source_playfield.clone(),
                });
            }
            if !is_playfield(&save.source_playfield) {
                return Err(ConfigError::NotAPlayfield {
                    name: save.source_playfield.clone(),
                });
            }
            if save.balls_to_save == 0 || save.balls_to_save < -1 {
                return Err(ConfigError::InvalidBallSave {
                    reason: format!(
                        "balls_to_save must be positive or -1, got {}",
                        save.balls_to_save
                    ),
                });
            }
            let active = parse_duration_ms(&save.active_time)?;
            let hurry = parse_duration_ms(&save.hurry_up_time)?;
            parse_duration_ms(&save.grace_period)?;
            if active > 0 && hurry > active {
                return Err(ConfigError::InvalidBallSave {
                    reason: format!(
                        "hurry_up_time ({hurry}ms) exceeds active_time ({active}ms)"
                    ),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trough() -> DeviceConfig {
        DeviceConfig {
            name: "trough".to_string(),
            ball_switches: vec![
                "trough_1".to_string(),
                "trough_2".to_string(),
                "trough_3".to_string(),
            ],
            eject_coil: Some("trough_eject".to_string()),
            eject_targets: vec!["playfield".to_string()],
            tags: vec!["trough".to_string()],
            ..DeviceConfig::default()
        }
    }

    fn valid_config() -> MachineConfig {
        MachineConfig {
            devices: vec![trough()],
            playfields: vec![PlayfieldConfig::default()],
            ball_saves: Vec::new(),
        }
    }

    // ── duration parsing ───────────────────────────────────────

    #[test]
    fn parse_duration_accepts_common_forms() {
        assert_eq!(parse_duration_ms("500ms").unwrap(), 500);
        assert_eq!(parse_duration_ms("2s").unwrap(), 2_000);
        assert_eq!(parse_duration_ms("1.5s").unwrap(), 1_500);
        assert_eq!(parse_duration_ms("3m").unwrap(), 180_000);
        assert_eq!(parse_duration_ms("250").unwrap(), 250);
        assert_eq!(parse_duration_ms("0").unwrap(), 0);
        assert_eq!(parse_duration_ms(" 10s ").unwrap(), 10_000);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        for bad in ["", "fast", "-5ms", "nan", "10h"] {
            assert!(parse_duration_ms(bad).is_err(), "accepted {bad:?}");
        }
    }

    // ── validation ─────────────────────────────────────────────

    #[test]
    fn validate_valid_config_succeeds() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_empty_devices_fails() {
        let cfg = MachineConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::NoDevices));
    }

    #[test]
    fn validate_duplicate_name_fails() {
        let mut cfg = valid_config();
        cfg.devices.push(trough());
        match cfg.validate() {
            Err(ConfigError::DuplicateDevice { name }) => assert_eq!(name, "trough"),
            other => panic!("expected DuplicateDevice, got {other:?}"),
        }
    }

    #[test]
    fn validate_unknown_target_fails() {
        let mut cfg = valid_config();
        cfg.devices[0].eject_targets = vec!["vuk".to_string()];
        match cfg.validate() {
            Err(ConfigError::UnknownDevice { name }) => assert_eq!(name, "vuk"),
            other => panic!("expected UnknownDevice, got {other:?}"),
        }
    }

    #[test]
    fn validate_captures_from_must_be_playfield() {
        let mut cfg = valid_config();
        cfg.devices.push(DeviceConfig {
            name: "vuk".to_string(),
            ball_switches: vec!["vuk_ball".to_string()],
            eject_coil: Some("vuk_coil".to_string()),
            eject_targets: vec!["playfield".to_string()],
            captures_from: "trough".to_string(),
            ..DeviceConfig::default()
        });
        match cfg.validate() {
            Err(ConfigError::NotAPlayfield { name }) => assert_eq!(name, "trough"),
            other => panic!("expected NotAPlayfield, got {other:?}"),
        }
    }

    #[test]
    fn validate_both_coils_fails() {
        let mut cfg = valid_config();
        cfg.devices[0].hold_coil = Some("trough_hold".to_string());
        match cfg.validate() {
            Err(ConfigError::ConflictingCoils { device }) => assert_eq!(device, "trough"),
            other => panic!("expected ConflictingCoils, got {other:?}"),
        }
    }

    #[test]
    fn validate_zero_capacity_fails() {
        let mut cfg = valid_config();
        cfg.devices[0].ball_switches.clear();
        match cfg.validate() {
            Err(ConfigError::ZeroCapacity { device }) => assert_eq!(device, "trough"),
            other => panic!("expected ZeroCapacity, got {other:?}"),
        }
    }

    #[test]
    fn validate_switch_confirm_needs_switch() {
        let mut cfg = valid_config();
        cfg.devices[0].confirm_eject_type = ConfirmEjectType::Switch;
        match cfg.validate() {
            Err(ConfigError::MissingConfirmSwitch { device }) => {
                assert_eq!(device, "trough");
            }
            other => panic!("expected MissingConfirmSwitch, got {other:?}"),
        }
    }

    #[test]
    fn validate_event_confirm_needs_event() {
        let mut cfg = valid_config();
        cfg.devices[0].confirm_eject_type = ConfirmEjectType::Event;
        match cfg.validate() {
            Err(ConfigError::MissingConfirmEvent { device }) => {
                assert_eq!(device, "trough");
            }
            other => panic!("expected MissingConfirmEvent, got {other:?}"),
        }
    }

    #[test]
    fn validate_bad_ball_save_count() {
        let mut cfg = valid_config();
        cfg.ball_saves.push(BallSaveConfig {
            balls_to_save: 0,
            ..BallSaveConfig::default()
        });
        match cfg.validate() {
            Err(ConfigError::InvalidBallSave { .. }) => {}
            other => panic!("expected InvalidBallSave, got {other:?}"),
        }
    }

    #[test]
    fn validate_hurry_up_longer_than_active_fails() {
        let mut cfg = valid_config();
        cfg.ball_saves.push(BallSaveConfig {
            active_time: "10s".to_string(),
            hurry_up_time: "15s".to_string(),
            ..BallSaveConfig::default()
        });
        match cfg.validate() {
            Err(ConfigError::InvalidBallSave { .. }) => {}
            other => panic!("expected InvalidBallSave, got {other:?}"),
        }
    }

    #[test]
    fn capacity_defaults_to_switch_count() {
        assert_eq!(trough().resolved_capacity(), 3);
        let explicit = DeviceConfig {
            ball_capacity: Some(6),
            ..trough()
        };
        assert_eq!(explicit.resolved_capacity(), 6);
    }

    // ── proptest ───────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn bare_numbers_parse_as_ms(n in 0u64..1_000_000) {
                prop_assert_eq!(parse_duration_ms(&n.to_string()).unwrap(), n);
                prop_assert_eq!(parse_duration_ms(&format!("{n}ms")).unwrap(), n);
            }

            #[test]
            fn seconds_scale_by_a_thousand(n in 0u64..10_000) {
                prop_assert_eq!(
                    parse_duration_ms(&format!("{n}s")).unwrap(),
                    n * 1_000
                );
            }
        }
    }
}

//! The machine event type, its subscription key, and legacy wire names.
//!
//! Each event is a variant of one tagged union; the bus dispatches on
//! [`EventKey`] with priority-ordered handlers. External consumers and
//! logs still see the string-keyed names this controller family has
//! always published, rendered by [`Event::wire_name`]. Two historical
//! name quirks are preserved verbatim for compatibility: the
//! permanent-failure event omits the underscore between the device name
//! and the suffix, and the ball-missing event embeds the missing-ball
//! count where every other event embeds the device name.

use crate::id::{DeviceId, SaveId};

/// Resolves IDs back to configured names for wire-name rendering.
///
/// Implemented by the device registry; kept as a trait so the event type
/// stays in the leaf crate.
pub trait NameResolver {
    /// The configured name of a device (playfields included).
    fn device_name(&self, device: DeviceId) -> &str;
    /// The configured name of a ball save.
    fn save_name(&self, save: SaveId) -> &str;
}

/// All events published by the coordination core.
///
/// `balls` counts are physical balls and always non-negative. Events that
/// deliver as relays ([`Event::BallEnter`], [`Event::BallDrain`]) treat
/// their `balls` field as the initial accumulator value; handlers see the
/// value left by higher-priority handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Balls entered a device. Relay: handlers may claim balls by
    /// returning a reduced count; unclaimed balls reach the device's
    /// post-relay bookkeeping.
    BallEnter {
        /// The receiving device.
        device: DeviceId,
        /// Number of balls that entered.
        balls: u32,
    },
    /// External request for a device to eject.
    EjectRequest {
        /// The device that should eject.
        device: DeviceId,
        /// Number of balls to eject.
        balls: u32,
        /// Explicit target, or `None` for the device's default target.
        target: Option<DeviceId>,
    },
    /// A device is attempting an eject. Queued: the coil fires only after
    /// this event has been delivered to all subscribers.
    EjectAttempt {
        /// The ejecting device.
        device: DeviceId,
        /// Number of balls in this attempt.
        balls: u32,
        /// The intended receiver.
        target: DeviceId,
        /// Confirmation deadline in ms (0 = no timeout).
        timeout: u64,
        /// Attempt ordinal against the current queue head (1-based;
        /// 0 for player-controlled attempts).
        num_attempts: u32,
    },
    /// An eject was confirmed.
    EjectSuccess {
        /// The ejecting device.
        device: DeviceId,
        /// Number of balls confirmed out.
        balls: u32,
        /// The receiver they were confirmed into.
        target: DeviceId,
    },
    /// An eject attempt failed (timeout or detected return).
    EjectFailed {
        /// The ejecting device.
        device: DeviceId,
        /// The intended receiver.
        target: DeviceId,
        /// Number of balls that were in the attempt.
        balls: u32,
        /// Attempts made so far against this queue head.
        num_attempts: u32,
    },
    /// Retries exhausted; no further automatic action.
    EjectPermanentFailure {
        /// The ejecting device.
        device: DeviceId,
    },
    /// A device asks upstream peers to send it balls.
    BallRequest {
        /// The requesting device.
        device: DeviceId,
        /// Number of balls requested.
        balls: u32,
    },
    /// A device withdraws its outstanding ball request.
    CancelBallRequest {
        /// The withdrawing device.
        device: DeviceId,
    },
    /// A previously-full device can receive again; stalled attempts at
    /// sources targeting it resume.
    OkToReceive {
        /// The device that can receive.
        device: DeviceId,
        /// Its current additional capacity.
        balls: u32,
    },
    /// A player-powered (plunger) eject has started.
    MechanicalEjectAttempt {
        /// The armed device.
        device: DeviceId,
        /// Balls in the attempt.
        balls: u32,
    },
    /// A player-powered eject failed (the ball fell back).
    MechanicalEjectFailed {
        /// The armed device.
        device: DeviceId,
        /// The intended receiver.
        target: DeviceId,
        /// Balls that were in the attempt.
        balls: u32,
        /// Attempts made so far.
        num_attempts: u32,
    },
    /// A ball was added while a player-controlled eject was pending.
    PlayerControlledEjectFailed {
        /// The armed device.
        device: DeviceId,
    },
    /// Unexpected balls were attributed to a playfield.
    CapturedFrom {
        /// The playfield the balls came from.
        playfield: DeviceId,
        /// Number of balls captured.
        balls: u32,
    },
    /// Balls went missing from a device outside any tracked eject.
    BallMissing {
        /// The device they went missing from. Not part of the wire name
        /// (legacy format); carried for observability.
        device: DeviceId,
        /// Number of missing balls.
        balls: u32,
    },
    /// Balls drained from play. Relay: a ball save may claim them.
    BallDrain {
        /// Number of drained balls.
        balls: u32,
    },
    /// A playfield switch registered a hit. Posted by the playfield
    /// accounting layer; used for playfield-target eject confirmation.
    PlayfieldSwitch {
        /// The playfield whose switch was hit.
        playfield: DeviceId,
    },
    /// Ask the playfield accounting layer to put balls into play.
    PlayfieldAddBall {
        /// The playfield to feed.
        playfield: DeviceId,
        /// Number of balls wanted.
        balls: u32,
        /// Whether the launch waits for the player.
        player_controlled: bool,
    },
    /// A ball save armed.
    SaveEnabled {
        /// The save that armed.
        save: SaveId,
    },
    /// A ball save disarmed.
    SaveDisabled {
        /// The save that disarmed.
        save: SaveId,
    },
    /// A ball save is about to expire.
    SaveHurryUp {
        /// The save nearing expiry.
        save: SaveId,
    },
    /// A ball save entered its grace period.
    SaveGracePeriod {
        /// The save in grace.
        save: SaveId,
    },
    /// A ball save swallowed a drain and is replacing the ball.
    SaveSavingBall {
        /// The save acting.
        save: SaveId,
        /// Balls being replaced.
        balls: u32,
    },
    /// A free-form named event. Used for confirmation-by-event, eject
    /// triggers, and ball-save timer starts.
    Custom {
        /// The event name.
        name: String,
    },
}

/// Subscription key for the dispatcher.
///
/// Every [`Event`] maps to exactly one key via [`Event::key`]; handlers
/// subscribe to keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// `BallEnter` for one device.
    BallEnter(DeviceId),
    /// `EjectRequest` for one device.
    EjectRequest(DeviceId),
    /// `EjectAttempt` from one device.
    EjectAttempt(DeviceId),
    /// `EjectSuccess` from one device.
    EjectSuccess(DeviceId),
    /// `EjectFailed` from one device.
    EjectFailed(DeviceId),
    /// `EjectPermanentFailure` from one device.
    EjectPermanentFailure(DeviceId),
    /// `BallRequest` from one device.
    BallRequest(DeviceId),
    /// `CancelBallRequest` from one device.
    CancelBallRequest(DeviceId),
    /// `OkToReceive` from one device.
    OkToReceive(DeviceId),
    /// `MechanicalEjectAttempt` from one device.
    MechanicalEjectAttempt(DeviceId),
    /// `MechanicalEjectFailed` from one device.
    MechanicalEjectFailed(DeviceId),
    /// `PlayerControlledEjectFailed` from one device.
    PlayerControlledEjectFailed(DeviceId),
    /// `CapturedFrom` for one playfield.
    CapturedFrom(DeviceId),
    /// `BallMissing` from any device (legacy events carry no device).
    BallMissing,
    /// `BallDrain` (machine-wide).
    BallDrain,
    /// `PlayfieldSwitch` for one playfield.
    PlayfieldSwitch(DeviceId),
    /// `PlayfieldAddBall` for one playfield.
    PlayfieldAddBall(DeviceId),
    /// `SaveEnabled` for one save.
    SaveEnabled(SaveId),
    /// `SaveDisabled` for one save.
    SaveDisabled(SaveId),
    /// `SaveHurryUp` for one save.
    SaveHurryUp(SaveId),
    /// `SaveGracePeriod` for one save.
    SaveGracePeriod(SaveId),
    /// `SaveSavingBall` for one save.
    SaveSavingBall(SaveId),
    /// A free-form named event.
    Custom(String),
}

impl Event {
    /// The subscription key this event dispatches under.
    pub fn key(&self) -> EventKey {
        match self {
            Event::BallEnter { device, .. } => EventKey::BallEnter(*device),
            Event::EjectRequest { device, .. } => EventKey::EjectRequest(*device),
            Event::EjectAttempt { device, .. } => EventKey::EjectAttempt(*device),
            Event::EjectSuccess { device, .. } => EventKey::EjectSuccess(*device),
            Event::EjectFailed { device, .. } => EventKey::EjectFailed(*device),
            Event::EjectPermanentFailure { device } => {
                EventKey::EjectPermanentFailure(*device)
            }
            Event::BallRequest { device, .. } => EventKey::BallRequest(*device),
            Event::CancelBallRequest { device } => EventKey::CancelBallRequest(*device),
            Event::OkToReceive { device, .. } => EventKey::OkToReceive(*device),
            Event::MechanicalEjectAttempt { device, .. } => {
                EventKey::MechanicalEjectAttempt(*device)
            }
            Event::MechanicalEjectFailed { device, .. } => {
                EventKey::MechanicalEjectFailed(*device)
            }
            Event::PlayerControlledEjectFailed { device } => {
                EventKey::PlayerControlledEjectFailed(*device)
            }
            Event::CapturedFrom { playfield, .. } => EventKey::CapturedFrom(*playfield),
            Event::BallMissing { .. } => EventKey::BallMissing,
            Event::BallDrain { .. } => EventKey::BallDrain,
            Event::PlayfieldSwitch { playfield } => EventKey::PlayfieldSwitch(*playfield),
            Event::PlayfieldAddBall { playfield, .. } => {
                EventKey::PlayfieldAddBall(*playfield)
            }
            Event::SaveEnabled { save } => EventKey::SaveEnabled(*save),
            Event::SaveDisabled { save } => EventKey::SaveDisabled(*save),
            Event::SaveHurryUp { save } => EventKey::SaveHurryUp(*save),
            Event::SaveGracePeriod { save } => EventKey::SaveGracePeriod(*save),
            Event::SaveSavingBall { save, .. } => EventKey::SaveSavingBall(*save),
            Event::Custom { name } => EventKey::Custom(name.clone()),
        }
    }

    /// The relay accumulator for relay-delivered events, or `None` for
    /// fire-and-forget events.
    pub fn relay_balls(&self) -> Option<u32> {
        match self {
            Event::BallEnter { balls, .. } | Event::BallDrain { balls } => Some(*balls),
            _ => None,
        }
    }

    /// Render the legacy wire name of this event.
    ///
    /// Names match the historical string-keyed format byte for byte,
    /// including the two preserved quirks described in the module docs.
    pub fn wire_name(&self, names: &dyn NameResolver) -> String {
        match self {
            Event::BallEnter { device, .. } => {
                format!("balldevice_{}_ball_enter", names.device_name(*device))
            }
            Event::EjectRequest { device, .. } => {
                format!(
                    "balldevice_{}_ball_eject_request",
                    names.device_name(*device)
                )
            }
            Event::EjectAttempt { device, .. } => {
                format!(
                    "balldevice_{}_ball_eject_attempt",
                    names.device_name(*device)
                )
            }
            Event::EjectSuccess { device, .. } => {
                format!(
                    "balldevice_{}_ball_eject_success",
                    names.device_name(*device)
                )
            }
            Event::EjectFailed { device, .. } => {
                format!(
                    "balldevice_{}_ball_eject_failed",
                    names.device_name(*device)
                )
            }
            // Legacy quirk: no underscore between the name and the suffix.
            Event::EjectPermanentFailure { device } => {
                format!(
                    "balldevice_{}ball_eject_permanent_failure",
                    names.device_name(*device)
                )
            }
            Event::BallRequest { device, .. } => {
                format!("balldevice_{}_ball_request", names.device_name(*device))
            }
            Event::CancelBallRequest { device } => {
                format!(
                    "balldevice_{}_cancel_ball_request",
                    names.device_name(*device)
                )
            }
            Event::OkToReceive { device, .. } => {
                format!("balldevice_{}_ok_to_receive", names.device_name(*device))
            }
            Event::MechanicalEjectAttempt { device, .. } => {
                format!(
                    "balldevice_{}_mechanical_eject_attempt",
                    names.device_name(*device)
                )
            }
            Event::MechanicalEjectFailed { device, .. } => {
                format!(
                    "balldevice_{}_mechanical_eject_failed",
                    names.device_name(*device)
                )
            }
            Event::PlayerControlledEjectFailed { device } => {
                format!(
                    "balldevice_{}_player_controlled_eject_failed",
                    names.device_name(*device)
                )
            }
            Event::CapturedFrom { playfield, .. } => {
                format!(
                    "balldevice_captured_from_{}",
                    names.device_name(*playfield)
                )
            }
            // Legacy quirk: the count is in the name, the device is not.
            Event::BallMissing { balls, .. } => {
                format!("balldevice_{balls}_ball_missing")
            }
            Event::BallDrain { .. } => "ball_drain".to_string(),
            Event::PlayfieldSwitch { playfield } => {
                format!("sw_{}_active", names.device_name(*playfield))
            }
            Event::PlayfieldAddBall { playfield, .. } => {
                format!("playfield_{}_add_ball", names.device_name(*playfield))
            }
            Event::SaveEnabled { save } => {
                format!("ball_save_{}_enabled", names.save_name(*save))
            }
            Event::SaveDisabled { save } => {
                format!("ball_save_{}_disabled", names.save_name(*save))
            }
            Event::SaveHurryUp { save } => {
                format!("ball_save_{}_hurry_up", names.save_name(*save))
            }
            Event::SaveGracePeriod { save } => {
                format!("ball_save_{}_grace_period", names.save_name(*save))
            }
            Event::SaveSavingBall { save, .. } => {
                format!("ball_save_{}_saving_ball", names.save_name(*save))
            }
            Event::Custom { name } => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Names;

    impl NameResolver for Names {
        fn device_name(&self, device: DeviceId) -> &str {
            match device.0 {
                0 => "trough",
                1 => "plunger",
                _ => "playfield",
            }
        }
        fn save_name(&self, _save: SaveId) -> &str {
            "default"
        }
    }

    #[test]
    fn wire_names_match_legacy_format() {
        let ev = Event::EjectSuccess {
            device: DeviceId(0),
            balls: 1,
            target: DeviceId(1),
        };
        assert_eq!(ev.wire_name(&Names), "balldevice_trough_ball_eject_success");
    }

    #[test]
    fn permanent_failure_keeps_missing_underscore() {
        let ev = Event::EjectPermanentFailure { device: DeviceId(0) };
        assert_eq!(
            ev.wire_name(&Names),
            "balldevice_troughball_eject_permanent_failure"
        );
    }

    #[test]
    fn ball_missing_embeds_count_not_device() {
        let ev = Event::BallMissing {
            device: DeviceId(0),
            balls: 2,
        };
        assert_eq!(ev.wire_name(&Names), "balldevice_2_ball_missing");
    }

    #[test]
    fn relay_events_expose_accumulator() {
        assert_eq!(Event::BallDrain { balls: 3 }.relay_balls(), Some(3));
        assert_eq!(
            Event::BallEnter {
                device: DeviceId(0),
                balls: 1
            }
            .relay_balls(),
            Some(1)
        );
        assert_eq!(
            Event::EjectPermanentFailure { device: DeviceId(0) }.relay_balls(),
            None
        );
    }

    #[test]
    fn key_distinguishes_devices() {
        let a = Event::BallEnter {
            device: DeviceId(0),
            balls: 1,
        };
        let b = Event::BallEnter {
            device: DeviceId(1),
            balls: 1,
        };
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), EventKey::BallEnter(DeviceId(0)));
    }

    #[test]
    fn custom_key_carries_name() {
        let ev = Event::Custom {
            name: "mode_shot_made".to_string(),
        };
        assert_eq!(ev.key(), EventKey::Custom("mode_shot_made".to_string()));
        assert_eq!(ev.wire_name(&Names), "mode_shot_made");
    }
}

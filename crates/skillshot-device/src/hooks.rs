//! Handlers as data: the hook enums and the dispatch context.
//!
//! Every handler registered on the bus, the switch monitor, or the delay
//! scheduler is a variant of a small enum naming its owner; the machine
//! matches on the variant and calls the owning component with a [`Cx`]
//! of split borrows. Nothing in this crate stores a closure, which is
//! what keeps the registry the sole owner of device state.

use skillshot_bus::{DelayManager, Dispatcher, EventQueue, SwitchMonitor};
use skillshot_core::{DeviceId, DriverBank, MsTime, SaveId};

/// Hooks fired by the switch monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchHook {
    /// A ball switch settled (either edge): recount.
    CountBalls {
        /// The counting device.
        device: DeviceId,
    },
    /// A ball switch moved: the count is no longer valid.
    Invalidate {
        /// The counting device.
        device: DeviceId,
    },
    /// A ball switch stayed open long enough to mean a plunger pull.
    MechanicalEject {
        /// The armed device.
        device: DeviceId,
    },
    /// The jam switch activated.
    JamSwitch {
        /// The device owning the jam switch.
        device: DeviceId,
    },
    /// The entrance switch activated.
    EntranceSwitch {
        /// The device owning the entrance switch.
        device: DeviceId,
    },
    /// A ball settled on a hold switch: re-energize the hold coil.
    Hold {
        /// The device owning the hold coil.
        device: DeviceId,
    },
    /// An active ball switch opened during an eject attempt. One-shot.
    BallLeft {
        /// The ejecting device.
        device: DeviceId,
        /// Balls in the attempt when the handler was installed.
        balls: u32,
    },
    /// The dedicated confirmation switch activated.
    ConfirmSwitch {
        /// The ejecting device.
        device: DeviceId,
    },
}

/// Hooks fired by the event dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventHook {
    /// A device's own eject-request event: service it.
    EjectRequested {
        /// The device that should eject.
        device: DeviceId,
    },
    /// One of our targets requested balls: volunteer an eject at it.
    TargetBallRequest {
        /// The volunteering source.
        device: DeviceId,
        /// The requesting target.
        target: DeviceId,
    },
    /// A stalled target can receive again: resume the queue.
    ResumeEject {
        /// The stalled source.
        device: DeviceId,
    },
    /// A source announced an eject attempt (possibly at us).
    SourceEjectAttempt {
        /// The listening receiver.
        device: DeviceId,
    },
    /// A source's eject attempt failed (possibly one aimed at us).
    SourceEjectFailed {
        /// The listening receiver.
        device: DeviceId,
    },
    /// Relay on our own ball-enter while a request is outstanding:
    /// claim the requested balls, pass the rest on.
    RequestedBallReceived {
        /// The requesting device.
        device: DeviceId,
    },
    /// Eject confirmation evidence arrived.
    ConfirmEjectSuccess {
        /// The ejecting device.
        device: DeviceId,
    },
    /// A player trigger event fired: eject now.
    TriggerEject {
        /// The armed device.
        device: DeviceId,
    },
    /// A configured eject event fired: eject, requesting a ball first
    /// if empty.
    EjectEvent {
        /// The device the event is configured on.
        device: DeviceId,
    },
    /// A ball drained while a ball save watches.
    SaveDrain {
        /// The watching save.
        save: SaveId,
    },
    /// A ball save's timer-start event fired.
    SaveTimerStart {
        /// The save whose timer starts.
        save: SaveId,
    },
}

/// Post-commit hooks for queued and relay deliveries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AfterHook {
    /// The eject-attempt event was delivered: fire the mechanism.
    PerformEject {
        /// The ejecting device.
        device: DeviceId,
        /// The attempt's receiver.
        target: DeviceId,
        /// The attempt's confirmation deadline in ms.
        timeout: u64,
    },
    /// The ball-enter relay finished: run the unclaimed-ball policy.
    BallsAdded {
        /// The receiving device.
        device: DeviceId,
    },
    /// The player-controlled attempt event was delivered. Nothing fires;
    /// the player supplies the energy.
    MechanicalAttemptPosted {
        /// The armed device.
        device: DeviceId,
    },
}

/// Hooks fired by the delay scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DelayHook {
    /// The hold-coil release window closed.
    HoldReleaseDone {
        /// The device owning the hold coil.
        device: DeviceId,
    },
    /// The confirmation deadline passed: the eject failed.
    EjectTimeout {
        /// The ejecting device.
        device: DeviceId,
    },
    /// The fake confirmation matured: the eject "succeeded".
    FakeConfirm {
        /// The ejecting device.
        device: DeviceId,
    },
    /// Ball-save final disable.
    SaveDisable {
        /// The expiring save.
        save: SaveId,
    },
    /// Ball-save hurry-up warning.
    SaveHurryUp {
        /// The warned save.
        save: SaveId,
    },
    /// Ball-save grace period start.
    SaveGracePeriod {
        /// The save entering grace.
        save: SaveId,
    },
}

/// Key for the named-delay scheduler.
///
/// One key per named delay, so cancellation stays idempotent and
/// re-adding replaces the pending timer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DelayKey {
    /// The timed hold-coil release for one device.
    HoldCoilRelease(DeviceId),
    /// The eject-confirmation timer (timeout or fake) for one device.
    EjectConfirm(DeviceId),
    /// Ball-save final disable.
    SaveDisable(SaveId),
    /// Ball-save hurry-up warning.
    SaveHurryUp(SaveId),
    /// Ball-save grace period start.
    SaveGracePeriod(SaveId),
}

/// Split borrows of everything a handler may touch besides its own
/// device: the event queue, subscriptions, delays, switches, coils, and
/// the machine-level ball bookkeeping.
///
/// Built fresh by the machine for every hook invocation; devices mutate
/// only themselves plus these shared services, never each other.
pub struct Cx<'a> {
    /// The machine's current time.
    pub now: MsTime,
    /// Pending-event queue; posts land behind in-flight work.
    pub events: &'a mut EventQueue<AfterHook>,
    /// Subscription table.
    pub bus: &'a mut Dispatcher<EventHook>,
    /// Named delay scheduler.
    pub delays: &'a mut DelayManager<DelayKey, DelayHook>,
    /// Switch state, queries, and settle registrations.
    pub switches: &'a mut SwitchMonitor<SwitchHook>,
    /// Coil drivers.
    pub drivers: &'a mut dyn DriverBank,
    /// Balls currently in play, maintained by the embedding game layer.
    pub balls_in_play: u32,
    /// Total balls the machine knows about, if the embedder tracks it.
    pub num_balls_known: Option<u32>,
}

//! Eject confirmation: installing and cancelling the evidence watch.
//!
//! Five strategies, selected per device by
//! [`ConfirmEjectType`](skillshot_core::ConfirmEjectType):
//!
//! - **Target** — watch the target's ball-enter event at high priority,
//!   with a failure timer at the attempt's deadline. Playfield targets
//!   fall back to count-based confirmation and, when the playfield allows
//!   it, additionally confirm on its first switch hit.
//! - **Switch** — a dedicated switch going active confirms.
//! - **Event** — a named event being published confirms.
//! - **Count** — a recount showing the ball left and did not return
//!   confirms (see [`count_balls`](crate::device::BallDevice::count_balls)).
//! - **Fake** — a 1 ms delay confirms unconditionally, for locks and
//!   captive balls whose "eject" never moves a ball.
//!
//! Cancellation removes every installed handler and timer by key; it is
//! safe to call with nothing installed.

use skillshot_core::{ConfirmEjectType, DeviceId, EventKey};

use crate::device::BallDevice;
use crate::hooks::{Cx, DelayHook, DelayKey, EventHook, SwitchHook};
use crate::registry::PeerDevices;

/// Priority of the success watch on the target's ball-enter relay. Must
/// outrank every bookkeeping handler so the source sees the arrival
/// before lower handlers mutate the count.
const CONFIRM_PRIORITY: u32 = 100_000;

impl BallDevice {
    pub(crate) fn setup_eject_confirmation(
        &mut self,
        target: DeviceId,
        timeout: u64,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) {
        self.confirm_via_count = false;

        match self.confirm_eject_type {
            ConfirmEjectType::Target => {
                if let Some(t) = peers.get(target) {
                    if t.is_playfield() {
                        // Playfields have no entry event of their own;
                        // fall back to recounting our own switches.
                        self.confirm_via_count = true;

                        if t.confirms_ball_via_switch() {
                            let key = cx.bus.add(
                                EventKey::PlayfieldSwitch(target),
                                CONFIRM_PRIORITY,
                                EventHook::ConfirmEjectSuccess { device: self.id },
                            );
                            self.confirm_event_keys.push(key);
                        }
                    }
                }

                if timeout > 0 {
                    cx.delays.add(
                        DelayKey::EjectConfirm(self.id),
                        cx.now.after(timeout),
                        DelayHook::EjectTimeout { device: self.id },
                    );
                }

                // Watch for the ball entering the target. Must outrank
                // the target's own bookkeeping handlers.
                let key = cx.bus.add(
                    EventKey::BallEnter(target),
                    CONFIRM_PRIORITY,
                    EventHook::ConfirmEjectSuccess { device: self.id },
                );
                self.confirm_event_keys.push(key);
            }
            ConfirmEjectType::Switch => {
                if let Some(switch) = self.confirm_eject_switch {
                    if let Some(stale) = self.confirm_switch_key.take() {
                        cx.switches.remove(stale);
                    }
                    self.confirm_switch_key = Some(cx.switches.add(
                        switch,
                        true,
                        0,
                        SwitchHook::ConfirmSwitch { device: self.id },
                    ));
                }
            }
            ConfirmEjectType::Event => {
                if let Some(name) = self.confirm_eject_event.clone() {
                    let key = cx.bus.add(
                        EventKey::Custom(name),
                        1,
                        EventHook::ConfirmEjectSuccess { device: self.id },
                    );
                    self.confirm_event_keys.push(key);
                }
            }
            ConfirmEjectType::Count => {
                self.confirm_via_count = true;
            }
            ConfirmEjectType::Fake => {
                // Delayed rather than immediate to keep the call order of
                // a real confirmation.
                cx.delays.add(
                    DelayKey::EjectConfirm(self.id),
                    cx.now.after(1),
                    DelayHook::FakeConfirm { device: self.id },
                );
            }
        }
    }

    /// Tear down every confirmation watch: event handlers, trigger
    /// subscriptions, the confirmation switch, and the deadline timer.
    /// Also disarms any player-controlled eject.
    pub(crate) fn cancel_eject_confirmation(&mut self, cx: &mut Cx<'_>) {
        self.eject_in_progress_target = None;

        for key in self.confirm_event_keys.drain(..) {
            cx.bus.remove(key);
        }
        cx.bus.remove_keys(&self.pending_eject_event_keys);
        self.pending_eject_event_keys.clear();

        self.manual_eject_target = None;
        self.waiting_for_eject_trigger = false;
        self.mechanical_eject_in_progress = 0;

        if let Some(key) = self.confirm_switch_key.take() {
            cx.switches.remove(key);
        }
        cx.delays.remove(&DelayKey::EjectConfirm(self.id));
    }
}

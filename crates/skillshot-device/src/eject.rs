//! The eject engine: queueing, attempts, retries, and the mechanism.
//!
//! Lifecycle of one eject: [`eject`](BallDevice::eject) appends
//! `(target, timeout)` entries to the queue; [`do_eject`](BallDevice::do_eject)
//! starts the next attempt when the device holds a ball and the target can
//! receive; the queued attempt event's post-commit hook fires the
//! mechanism; confirmation (see [`crate::confirm`]) resolves the attempt
//! into success or failure; failure pushes the head back onto the front of
//! the queue and retries until the attempt budget runs out.
//!
//! Attempts are counted once, when they start. A failed attempt posts the
//! count it ran under; cancellation never touches the counter, and both a
//! confirmed success and a permanent failure reset it, so a bounded budget
//! of N allows exactly N attempt events per queue head.

use log::{debug, warn};
use skillshot_core::{DeviceId, Event, EventKey};

use crate::device::BallDevice;
use crate::hooks::{AfterHook, Cx, DelayHook, DelayKey, EventHook, SwitchHook};
use crate::registry::PeerDevices;

impl BallDevice {
    // ── queueing ───────────────────────────────────────────────

    /// Eject one or more balls. Returns whether anything was queued.
    ///
    /// `target` defaults to the first configured eject target, `timeout`
    /// to the per-target configured deadline. With `get_ball` the device
    /// queues the full amount and requests balls from upstream as needed;
    /// without it the amount is capped at the balls currently held, so an
    /// empty device queues nothing. Requests for zero balls are rejected.
    pub fn eject(
        &mut self,
        balls: u32,
        target: Option<DeviceId>,
        timeout: Option<u64>,
        get_ball: bool,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) -> bool {
        if balls < 1 {
            warn!(
                "device '{}': eject of {} balls makes no sense; ignoring",
                self.name, balls
            );
            return false;
        }
        let Some(target) = target.or_else(|| self.eject_targets.first().copied()) else {
            warn!("device '{}': eject with no target configured", self.name);
            return false;
        };
        let timeout = timeout.unwrap_or_else(|| self.timeout_for(target));

        let mut to_eject = balls;
        if to_eject > self.balls && !get_ball {
            to_eject = self.balls;
        }

        debug!(
            "device '{}': queueing {} eject(s) to target {}",
            self.name, to_eject, target
        );
        for _ in 0..to_eject {
            self.eject_queue.push_back((target, timeout));
        }

        self.do_eject(peers, cx);
        to_eject > 0
    }

    /// Eject every ball held. Returns whether there was anything to
    /// eject.
    pub fn eject_all(
        &mut self,
        target: Option<DeviceId>,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) -> bool {
        debug!("device '{}': ejecting all balls", self.name);
        if self.balls > 0 {
            self.eject(self.balls, target, None, false, peers, cx);
            true
        } else {
            false
        }
    }

    // ── the attempt protocol ───────────────────────────────────

    /// Start the next attempt if one can start: queue non-empty, no
    /// attempt in flight, a ball on hand (requesting one otherwise), and
    /// a target able to receive. Aborted attempts restart when the target
    /// publishes ok-to-receive or a requested ball arrives.
    pub fn do_eject(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        if self.eject_queue.is_empty() {
            return;
        }
        debug!(
            "device '{}': servicing eject queue (in progress: {:?}, queue: {:?})",
            self.name, self.eject_in_progress_target, self.eject_queue
        );

        if self.eject_in_progress_target.is_some() {
            return; // don't get in the way of the current attempt
        }

        if self.balls == 0 {
            if self.num_balls_requested == 0 {
                debug!("device '{}': no balls on hand, requesting one", self.name);
                self.request_ball(1, cx);
                // The queue restarts this once the ball is delivered.
            }
            return;
        }

        let Some(&(peek_target, _)) = self.eject_queue.front() else {
            return;
        };
        let target_capacity = peers
            .get(peek_target)
            .map(|t| t.additional_capacity())
            .unwrap_or(0);
        if target_capacity == 0 {
            debug!(
                "device '{}': target {} cannot receive now; will retry on ok_to_receive",
                self.name, peek_target
            );
            return;
        }

        let Some((target, timeout)) = self.eject_queue.pop_front() else {
            return;
        };
        self.eject_in_progress_target = Some(target);
        self.num_eject_attempts += 1;

        if let Some(jam) = self.jam_switch {
            self.num_jam_switch_count = 0;
            if cx.switches.is_active(jam, 0, cx.now) {
                // A ball is blocking the opening before we even fire.
                self.num_jam_switch_count = 1;
            }
        }

        self.num_balls_ejecting = if self.balls_per_eject == 1 {
            1
        } else {
            self.balls + self.mechanical_eject_in_progress
        };

        // The mechanism fires from the post-commit hook so the coil pulse
        // lands after all same-drain bookkeeping has been delivered.
        cx.events.post_queue(
            Event::EjectAttempt {
                device: self.id,
                balls: self.num_balls_ejecting,
                target,
                timeout,
                num_attempts: self.num_eject_attempts,
            },
            AfterHook::PerformEject {
                device: self.id,
                target,
                timeout,
            },
        );
    }

    /// Fire the mechanism for the attempt in flight: install the
    /// confirmation, arm ball-left detection, then pulse the eject coil
    /// or open the hold coil.
    pub fn perform_eject(
        &mut self,
        target: DeviceId,
        timeout: u64,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) {
        self.setup_eject_confirmation(target, timeout, peers, cx);
        self.ejected_ball_left = false;

        if self.ball_switches.is_empty() {
            // No switches to watch the ball leave; assume it is instant.
            self.balls = self.balls.saturating_sub(self.num_balls_ejecting);
            self.ejected_ball_left = true;
        } else {
            for switch in self.ball_switches.clone() {
                if cx
                    .switches
                    .is_active(switch, self.entrance_count_delay, cx.now)
                {
                    let key = cx.switches.add(
                        switch,
                        false,
                        0,
                        SwitchHook::BallLeft {
                            device: self.id,
                            balls: self.num_balls_ejecting,
                        },
                    );
                    self.ball_left_keys.push(key);
                }
            }
        }

        if self.eject_coil.is_some() {
            self.fire_eject_coil(cx);
        } else if self.hold_coil.is_some() {
            self.disable_hold_coil(cx);
            self.hold_release_in_progress = true;
            cx.delays.add(
                DelayKey::HoldCoilRelease(self.id),
                cx.now.after(self.hold_coil_release_time),
                DelayHook::HoldReleaseDone { device: self.id },
            );
        }
    }

    /// An armed ball switch opened: the ejected ball left the device.
    pub fn ball_left(&mut self, balls: u32, cx: &mut Cx<'_>) {
        if balls > self.balls {
            warn!(
                "device '{}': {} ball(s) left but only {} were counted; clamping to 0",
                self.name, balls, self.balls
            );
        }
        self.balls = self.balls.saturating_sub(balls);
        self.ejected_ball_left = true;

        for key in self.ball_left_keys.drain(..) {
            cx.switches.remove(key);
        }
    }

    // ── resolution ─────────────────────────────────────────────

    /// The attempt in flight was confirmed. Reset the counters, publish
    /// the success, tear down the confirmation, then either service the
    /// next queue entry or advertise free capacity.
    pub fn eject_success(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        debug!(
            "device '{}': eject success (target: {:?})",
            self.name, self.eject_in_progress_target
        );
        self.confirm_via_count = false;

        if let Some(target) = self.eject_in_progress_target.take() {
            self.num_jam_switch_count = 0;
            self.num_eject_attempts = 0;
            let balls_ejected = self.num_balls_ejecting;
            self.num_balls_ejecting = 0;

            cx.events.post(Event::EjectSuccess {
                device: self.id,
                balls: balls_ejected,
                target,
            });
        } else {
            warn!(
                "device '{}': eject success with no eject in progress",
                self.name
            );
        }

        self.cancel_eject_confirmation(cx);

        if !self.eject_queue.is_empty() {
            self.do_eject(peers, cx);
        } else if self.additional_capacity() > 0 {
            self.ok_to_receive(cx);
        }
    }

    /// The attempt in flight failed (timeout, jam-detected return, or an
    /// external verdict). The head goes back to the front of the queue
    /// with its default timeout; retries continue while the budget lasts
    /// or `force_retry` is set.
    pub fn eject_failed(
        &mut self,
        retry: bool,
        force_retry: bool,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) {
        let Some(target) = self.eject_in_progress_target else {
            warn!(
                "device '{}': eject_failed with no eject in progress",
                self.name
            );
            return;
        };
        debug!("device '{}': eject failed", self.name);

        self.eject_queue
            .push_front((target, self.timeout_for(target)));

        let balls = self.num_balls_ejecting;
        let attempts = self.num_eject_attempts;
        self.eject_in_progress_target = None;
        self.num_balls_ejecting = 0;

        if !self.ejected_ball_left {
            warn!(
                "device '{}': ball did not leave the device during the eject; \
                 possible mechanical or electrical trouble",
                self.name
            );
        }

        cx.events.post(Event::EjectFailed {
            device: self.id,
            target,
            balls,
            num_attempts: attempts,
        });

        self.cancel_eject_confirmation(cx);

        if retry && (self.max_eject_attempts == 0 || attempts < self.max_eject_attempts) {
            self.do_eject(peers, cx);
        } else if force_retry {
            self.do_eject(peers, cx);
        } else {
            self.eject_permanently_failed(cx);
        }
    }

    fn eject_permanently_failed(&mut self, cx: &mut Cx<'_>) {
        warn!(
            "device '{}': eject failed {} times, permanently giving up",
            self.name, self.max_eject_attempts
        );
        // The re-queued head stays put with a fresh budget; nothing
        // drives it again until an external stimulus does.
        self.num_eject_attempts = 0;
        cx.events
            .post(Event::EjectPermanentFailure { device: self.id });
    }

    pub(crate) fn ok_to_receive(&mut self, cx: &mut Cx<'_>) {
        cx.events.post(Event::OkToReceive {
            device: self.id,
            balls: self.additional_capacity(),
        });
    }

    // ── player-controlled (mechanical) eject ───────────────────

    /// Arm the device for a player-powered eject. Falls through to an
    /// automatic [`eject`](BallDevice::eject) when neither a mechanical
    /// plunger nor eject events are configured. When armed, a shortfall
    /// of balls is requested from upstream.
    pub fn setup_player_controlled_eject(
        &mut self,
        balls: u32,
        target: Option<DeviceId>,
        trigger_event: Option<&str>,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) -> bool {
        debug!(
            "device '{}': player-controlled eject, balls={}, target={:?}, trigger={:?}",
            self.name, balls, target, trigger_event
        );
        if balls < 1 {
            warn!(
                "device '{}': eject of {} balls makes no sense; ignoring",
                self.name, balls
            );
            return false;
        }
        let Some(target) = target.or_else(|| self.eject_targets.first().copied()) else {
            warn!("device '{}': eject with no target configured", self.name);
            return false;
        };

        self.waiting_for_eject_trigger = true;

        if let Some(event) = trigger_event {
            let key = cx.bus.add(
                EventKey::Custom(event.to_string()),
                1,
                EventHook::TriggerEject { device: self.id },
            );
            self.pending_eject_event_keys.push(key);
        }

        if self.mechanical_eject {
            self.manual_eject_target = Some(target);
        }

        if !self.mechanical_eject && self.eject_events.is_empty() {
            // Nothing for the player to operate; eject automatically.
            self.waiting_for_eject_trigger = false;
            self.manual_eject_target = None;
            self.mechanical_eject_in_progress = 0;
            self.eject(balls, Some(target), None, true, peers, cx);
        } else if balls > self.balls {
            debug!(
                "device '{}': holding {} of {} balls wanted, requesting the rest",
                self.name, self.balls, balls
            );
            self.request_ball((balls - self.balls) as i32, cx);
            self.mechanical_eject_in_progress = balls;
        }
        true
    }

    /// A ball switch stayed open past the trigger time while armed: the
    /// player pulled the plunger. Post the attempt and install a
    /// no-deadline confirmation; the ball is out of our hands.
    pub fn mechanical_eject_triggered(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        debug!(
            "device '{}': mechanical eject switch open (pending: {})",
            self.name, self.mechanical_eject_in_progress
        );
        let Some(target) = self.manual_eject_target else {
            return;
        };

        self.eject_in_progress_target = Some(target);
        self.eject_queue.clear();
        self.balls = 0;
        self.num_balls_ejecting = 1;
        self.mechanical_eject_in_progress = 1;

        cx.events.post(Event::MechanicalEjectAttempt {
            device: self.id,
            balls: self.mechanical_eject_in_progress,
        });
        cx.events.post_queue(
            Event::EjectAttempt {
                device: self.id,
                balls: self.mechanical_eject_in_progress,
                target,
                timeout: 0,
                num_attempts: 0,
            },
            AfterHook::MechanicalAttemptPosted { device: self.id },
        );

        // Drop any stale confirmation watch before installing the new one.
        for key in self.confirm_event_keys.drain(..) {
            cx.bus.remove(key);
        }
        self.setup_eject_confirmation(target, 0, peers, cx);
    }

    /// A ball came back while a player-controlled eject was in flight:
    /// the plunge failed. Re-queue the target and tear down the attempt,
    /// leaving the device armed for another pull.
    pub(crate) fn mechanical_eject_failed(&mut self, cx: &mut Cx<'_>) {
        debug!("device '{}': mechanical eject failed", self.name);
        let Some(target) = self.eject_in_progress_target else {
            return;
        };

        self.eject_queue
            .push_front((target, self.timeout_for(target)));

        cx.events.post(Event::MechanicalEjectFailed {
            device: self.id,
            target,
            balls: self.num_balls_ejecting,
            num_attempts: self.num_eject_attempts,
        });

        self.eject_in_progress_target = None;
        self.num_balls_ejecting = 0;
        self.num_eject_attempts += 1;
        self.mechanical_eject_in_progress = 0;

        // Partial teardown: the device stays armed, only the attempt's
        // confirmation watch goes away.
        for key in self.confirm_event_keys.drain(..) {
            cx.bus.remove(key);
        }
        if let Some(key) = self.confirm_switch_key.take() {
            cx.switches.remove(key);
        }
        cx.delays.remove(&DelayKey::EjectConfirm(self.id));
    }

    // ── trigger intake ─────────────────────────────────────────

    /// A player trigger event fired: eject one ball to the default
    /// target.
    pub fn trigger_eject(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        self.eject(1, None, None, false, peers, cx);
    }

    /// A configured eject event fired: get a ball on hand first when
    /// empty, otherwise eject one.
    pub fn eject_event_fired(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        if self.balls == 0 {
            self.request_ball(1, cx);
        } else {
            self.eject(1, None, None, false, peers, cx);
        }
    }

    // ── the mechanism ──────────────────────────────────────────

    /// A ball settled on a hold switch: keep it held, unless a timed
    /// release is letting balls out right now.
    pub fn hold_switch_hit(&mut self, cx: &mut Cx<'_>) {
        if self.hold_release_in_progress {
            return;
        }
        self.enable_hold_coil(cx);
    }

    /// The hold-coil release window closed: re-energize if balls remain.
    pub fn hold_release_done(&mut self, cx: &mut Cx<'_>) {
        self.hold_release_in_progress = false;
        if self.balls > 0 {
            self.enable_hold_coil(cx);
        }
    }

    fn fire_eject_coil(&mut self, cx: &mut Cx<'_>) {
        if let Some(coil) = self.eject_coil {
            cx.drivers.pulse(coil);
            debug!(
                "device '{}': firing eject coil (ejecting {}, balls now {})",
                self.name, self.num_balls_ejecting, self.balls
            );
        }
    }

    fn enable_hold_coil(&mut self, cx: &mut Cx<'_>) {
        if let Some(coil) = self.hold_coil {
            cx.drivers.enable(coil);
            debug!(
                "device '{}': enabling hold coil (ejecting {}, balls now {})",
                self.name, self.num_balls_ejecting, self.balls
            );
        }
    }

    fn disable_hold_coil(&mut self, cx: &mut Cx<'_>) {
        if let Some(coil) = self.hold_coil {
            cx.drivers.disable(coil);
            debug!(
                "device '{}': disabling hold coil (ejecting {}, balls now {})",
                self.name, self.num_balls_ejecting, self.balls
            );
        }
    }
}

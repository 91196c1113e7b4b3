//! The ball device: state, construction, and the switch-to-count mapper.
//!
//! A ball device is anything that can hold one or more balls and hand
//! them on: a trough, an eject hole, a vertical up-kicker, a catapult, a
//! lock, a plunger lane. This module owns the device struct, its
//! resolution from configuration, and the counting side of the state
//! machine — turning settled switch states into an authoritative ball
//! count and classifying every count change as an arrival, a departure,
//! or a failed eject falling back in.
//!
//! The eject engine lives in [`crate::eject`], confirmation strategies in
//! [`crate::confirm`].

use std::collections::VecDeque;

use indexmap::IndexMap;
use log::{debug, warn};
use smallvec::SmallVec;
use skillshot_core::{
    parse_duration_ms, CoilId, ConfigError, ConfirmEjectType, DeviceConfig, DeviceId, Event,
    EventKey, HandlerId, PlayfieldConfig, SwitchId,
};

use crate::hooks::{AfterHook, Cx, DelayKey, EventHook};
use crate::registry::PeerDevices;

/// Confirmation deadline applied when a target has no configured timeout.
pub const DEFAULT_EJECT_TIMEOUT_MS: u64 = 10_000;

/// Capacity reported by playfields, which never fill up.
pub(crate) const PLAYFIELD_CAPACITY: u32 = u32::MAX;

/// One ball device (or a degenerate playfield entry).
///
/// Construction happens through [`DeviceRegistry::build`]
/// (resolving names to IDs); mutation happens through the machine, which
/// routes hooks into the methods on this type with a [`Cx`] of shared
/// services.
///
/// [`DeviceRegistry::build`]: crate::registry::DeviceRegistry::build
pub struct BallDevice {
    // Identity and resolved configuration.
    pub(crate) id: DeviceId,
    pub(crate) name: String,
    pub(crate) playfield: bool,
    pub(crate) confirm_ball_via_switch: bool,
    pub(crate) capacity: u32,
    pub(crate) ball_switches: SmallVec<[SwitchId; 8]>,
    pub(crate) jam_switch: Option<SwitchId>,
    pub(crate) entrance_switch: Option<SwitchId>,
    pub(crate) entrance_count_delay: u64,
    pub(crate) exit_count_delay: u64,
    pub(crate) eject_coil: Option<CoilId>,
    pub(crate) hold_coil: Option<CoilId>,
    pub(crate) hold_coil_release_time: u64,
    pub(crate) hold_switches: SmallVec<[SwitchId; 4]>,
    pub(crate) eject_targets: SmallVec<[DeviceId; 4]>,
    pub(crate) eject_timeouts: IndexMap<DeviceId, u64>,
    pub(crate) confirm_eject_type: ConfirmEjectType,
    pub(crate) confirm_eject_switch: Option<SwitchId>,
    pub(crate) confirm_eject_event: Option<String>,
    pub(crate) max_eject_attempts: u32,
    pub(crate) balls_per_eject: u32,
    pub(crate) mechanical_eject: bool,
    pub(crate) mechanical_eject_trigger_time: u64,
    pub(crate) eject_events: Vec<String>,
    pub(crate) captures_from: DeviceId,
    pub(crate) tags: Vec<String>,

    // Runtime state.
    pub(crate) balls: u32,
    pub(crate) valid: bool,
    pub(crate) need_first_time_count: bool,
    pub(crate) eject_queue: VecDeque<(DeviceId, u64)>,
    pub(crate) eject_in_progress_target: Option<DeviceId>,
    pub(crate) num_balls_ejecting: u32,
    pub(crate) num_eject_attempts: u32,
    pub(crate) num_jam_switch_count: u32,
    pub(crate) num_balls_requested: u32,
    pub(crate) num_balls_in_transit: u32,
    pub(crate) mechanical_eject_in_progress: u32,
    pub(crate) manual_eject_target: Option<DeviceId>,
    pub(crate) waiting_for_eject_trigger: bool,
    pub(crate) hold_release_in_progress: bool,
    pub(crate) ejected_ball_left: bool,
    pub(crate) confirm_via_count: bool,

    // Installed-handler bookkeeping, for unambiguous cancellation.
    pub(crate) confirm_event_keys: SmallVec<[HandlerId; 2]>,
    pub(crate) confirm_switch_key: Option<HandlerId>,
    pub(crate) ball_left_keys: SmallVec<[HandlerId; 4]>,
    pub(crate) pending_eject_event_keys: Vec<HandlerId>,
    pub(crate) requested_ball_key: Option<HandlerId>,
}

impl BallDevice {
    /// Resolve a device configuration into a registry entry.
    pub(crate) fn from_config(
        id: DeviceId,
        cfg: &DeviceConfig,
        device_ids: &IndexMap<String, DeviceId>,
        intern_switch: &mut dyn FnMut(&str) -> SwitchId,
        intern_coil: &mut dyn FnMut(&str) -> CoilId,
    ) -> Result<Self, ConfigError> {
        let resolve = |name: &str| -> Result<DeviceId, ConfigError> {
            device_ids
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownDevice {
                    name: name.to_string(),
                })
        };

        let eject_targets: SmallVec<[DeviceId; 4]> = cfg
            .eject_targets
            .iter()
            .map(|t| resolve(t))
            .collect::<Result<_, _>>()?;

        // Pad missing timeout entries with the default, then key by target.
        let mut eject_timeouts = IndexMap::new();
        for (i, target) in eject_targets.iter().enumerate() {
            let ms = match cfg.eject_timeouts.get(i) {
                Some(s) => parse_duration_ms(s)?,
                None => DEFAULT_EJECT_TIMEOUT_MS,
            };
            eject_timeouts.insert(*target, ms);
        }

        Ok(Self {
            id,
            name: cfg.name.clone(),
            playfield: false,
            confirm_ball_via_switch: false,
            capacity: cfg.resolved_capacity(),
            ball_switches: cfg.ball_switches.iter().map(|s| intern_switch(s)).collect(),
            jam_switch: cfg.jam_switch.as_deref().map(&mut *intern_switch),
            entrance_switch: cfg.entrance_switch.as_deref().map(&mut *intern_switch),
            entrance_count_delay: parse_duration_ms(&cfg.entrance_count_delay)?,
            exit_count_delay: parse_duration_ms(&cfg.exit_count_delay)?,
            eject_coil: cfg.eject_coil.as_deref().map(&mut *intern_coil),
            hold_coil: cfg.hold_coil.as_deref().map(&mut *intern_coil),
            hold_coil_release_time: parse_duration_ms(&cfg.hold_coil_release_time)?,
            hold_switches: cfg.hold_switches.iter().map(|s| intern_switch(s)).collect(),
            eject_targets,
            eject_timeouts,
            confirm_eject_type: cfg.confirm_eject_type,
            confirm_eject_switch: cfg.confirm_eject_switch.as_deref().map(&mut *intern_switch),
            confirm_eject_event: cfg.confirm_eject_event.clone(),
            max_eject_attempts: cfg.max_eject_attempts,
            balls_per_eject: cfg.balls_per_eject,
            mechanical_eject: cfg.mechanical_eject,
            mechanical_eject_trigger_time: parse_duration_ms(
                &cfg.mechanical_eject_trigger_time,
            )?,
            eject_events: cfg.eject_events.clone(),
            captures_from: resolve(&cfg.captures_from)?,
            tags: cfg.tags.clone(),
            balls: 0,
            valid: false,
            need_first_time_count: true,
            eject_queue: VecDeque::new(),
            eject_in_progress_target: None,
            num_balls_ejecting: 0,
            num_eject_attempts: 0,
            num_jam_switch_count: 0,
            num_balls_requested: 0,
            num_balls_in_transit: 0,
            mechanical_eject_in_progress: 0,
            manual_eject_target: None,
            waiting_for_eject_trigger: false,
            hold_release_in_progress: false,
            ejected_ball_left: false,
            confirm_via_count: false,
            confirm_event_keys: SmallVec::new(),
            confirm_switch_key: None,
            ball_left_keys: SmallVec::new(),
            pending_eject_event_keys: Vec::new(),
            requested_ball_key: None,
        })
    }

    /// Build a degenerate playfield entry: unlimited capacity, no
    /// switches, no coils, never ejects through this core.
    pub(crate) fn playfield(id: DeviceId, cfg: &PlayfieldConfig) -> Self {
        Self {
            id,
            name: cfg.name.clone(),
            playfield: true,
            confirm_ball_via_switch: cfg.confirm_ball_via_switch,
            capacity: PLAYFIELD_CAPACITY,
            ball_switches: SmallVec::new(),
            jam_switch: None,
            entrance_switch: None,
            entrance_count_delay: 0,
            exit_count_delay: 0,
            eject_coil: None,
            hold_coil: None,
            hold_coil_release_time: 0,
            hold_switches: SmallVec::new(),
            eject_targets: SmallVec::new(),
            eject_timeouts: IndexMap::new(),
            confirm_eject_type: ConfirmEjectType::Count,
            confirm_eject_switch: None,
            confirm_eject_event: None,
            max_eject_attempts: 0,
            balls_per_eject: 1,
            mechanical_eject: false,
            mechanical_eject_trigger_time: 0,
            eject_events: Vec::new(),
            captures_from: id,
            tags: Vec::new(),
            balls: 0,
            valid: true,
            need_first_time_count: false,
            eject_queue: VecDeque::new(),
            eject_in_progress_target: None,
            num_balls_ejecting: 0,
            num_eject_attempts: 0,
            num_jam_switch_count: 0,
            num_balls_requested: 0,
            num_balls_in_transit: 0,
            mechanical_eject_in_progress: 0,
            manual_eject_target: None,
            waiting_for_eject_trigger: false,
            hold_release_in_progress: false,
            ejected_ball_left: false,
            confirm_via_count: false,
            confirm_event_keys: SmallVec::new(),
            confirm_switch_key: None,
            ball_left_keys: SmallVec::new(),
            pending_eject_event_keys: Vec::new(),
            requested_ball_key: None,
        }
    }

    // ── accessors ──────────────────────────────────────────────

    /// This device's registry ID.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// The configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Balls currently counted in the device.
    pub fn balls(&self) -> u32 {
        self.balls
    }

    /// Maximum balls this device can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether the last count reflects stable switches.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether this is a playfield entry.
    pub fn is_playfield(&self) -> bool {
        self.playfield
    }

    /// Whether ejects into this playfield may be confirmed by its first
    /// switch hit. Always false for non-playfields.
    pub fn confirms_ball_via_switch(&self) -> bool {
        self.playfield && self.confirm_ball_via_switch
    }

    /// The target of the eject currently in progress, if any.
    pub fn eject_in_progress_target(&self) -> Option<DeviceId> {
        self.eject_in_progress_target
    }

    /// Queued eject entries awaiting service.
    pub fn eject_queue_len(&self) -> usize {
        self.eject_queue.len()
    }

    /// Balls in the attempt currently in flight.
    pub fn num_balls_ejecting(&self) -> u32 {
        self.num_balls_ejecting
    }

    /// Attempts made against the current queue head.
    pub fn num_eject_attempts(&self) -> u32 {
        self.num_eject_attempts
    }

    /// Balls requested from upstream and not yet delivered.
    pub fn num_balls_requested(&self) -> u32 {
        self.num_balls_requested
    }

    /// Balls upstream has promised us.
    pub fn num_balls_in_transit(&self) -> u32 {
        self.num_balls_in_transit
    }

    /// Whether the device carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The ball switches, in configuration order.
    pub fn ball_switches(&self) -> &[SwitchId] {
        &self.ball_switches
    }

    /// The jam switch, if configured.
    pub fn jam_switch(&self) -> Option<SwitchId> {
        self.jam_switch
    }

    /// The entrance switch, if configured.
    pub fn entrance_switch(&self) -> Option<SwitchId> {
        self.entrance_switch
    }

    /// The hold switches, in configuration order.
    pub fn hold_switches(&self) -> &[SwitchId] {
        &self.hold_switches
    }

    /// How long a ball switch must be active before it counts, in ms.
    pub fn entrance_count_delay(&self) -> u64 {
        self.entrance_count_delay
    }

    /// How long a ball switch must be inactive before it uncounts, in ms.
    pub fn exit_count_delay(&self) -> u64 {
        self.exit_count_delay
    }

    /// Whether a player-operated plunger may fire the eject.
    pub fn is_mechanical_eject(&self) -> bool {
        self.mechanical_eject
    }

    /// How long a ball switch must stay open to mean a plunger pull,
    /// in ms.
    pub fn mechanical_eject_trigger_time(&self) -> u64 {
        self.mechanical_eject_trigger_time
    }

    /// The configured eject targets, default first.
    pub fn eject_targets(&self) -> &[DeviceId] {
        &self.eject_targets
    }

    /// Named events that trigger an eject from this device.
    pub fn eject_events(&self) -> &[String] {
        &self.eject_events
    }

    /// Balls this device can accept right now. Zero while an eject is in
    /// progress, so an attempt never races an arrival for the same slot.
    pub fn additional_capacity(&self) -> u32 {
        if self.playfield {
            return PLAYFIELD_CAPACITY;
        }
        if self.num_balls_ejecting > 0 {
            return 0;
        }
        if self.balls > self.capacity {
            warn!(
                "device '{}' reports more balls ({}) than its capacity ({})",
                self.name, self.balls, self.capacity
            );
        }
        self.capacity.saturating_sub(self.balls)
    }

    /// Whether the device holds its maximum, or every ball the machine
    /// knows about.
    pub fn is_full(&self, num_balls_known: Option<u32>) -> bool {
        if self.playfield {
            return false;
        }
        if self.balls >= self.capacity {
            return true;
        }
        matches!(num_balls_known, Some(known) if self.balls >= known)
    }

    pub(crate) fn timeout_for(&self, target: DeviceId) -> u64 {
        self.eject_timeouts
            .get(&target)
            .copied()
            .unwrap_or(DEFAULT_EJECT_TIMEOUT_MS)
    }

    // ── switch-to-count mapper ─────────────────────────────────

    /// Mark the count invalid the instant a ball switch moves. The
    /// matching settle handler recounts once the switch stays put.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Count the balls in the device and process any change.
    ///
    /// Every ball switch must have been in its state for the configured
    /// entrance/exit delay; otherwise the count is declared invalid and
    /// the previous value is returned unchanged (the settle handlers
    /// guarantee a recount once the switch stops moving). A delta is then
    /// classified: zero may confirm a count-based eject, positive is an
    /// arrival or a mechanical-eject failure, negative is a departure.
    pub fn count_balls(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) -> u32 {
        debug!("device '{}': counting balls", self.name);
        self.valid = true;

        if self.ball_switches.is_empty() {
            // Entrance-switch devices advance their count in the
            // entrance handler; nothing to recount here.
            if self.need_first_time_count {
                self.balls = 0;
            }
            self.need_first_time_count = false;
            return self.balls;
        }

        let previous = self.balls;
        let mut count = 0;
        for switch in self.ball_switches.clone() {
            if cx.switches.is_active(switch, self.entrance_count_delay, cx.now) {
                count += 1;
            } else if !cx.switches.is_inactive(switch, self.exit_count_delay, cx.now) {
                // Changed too recently; the settle handler will recount.
                debug!(
                    "device '{}': switch {} changed too recently, keeping count {}",
                    self.name, switch, previous
                );
                self.valid = false;
                return previous;
            }
        }

        if count > self.capacity {
            warn!(
                "device '{}' counted {} balls but capacity is {}; clamping",
                self.name, count, self.capacity
            );
            count = self.capacity;
        }
        self.balls = count;

        let delta: i64 = if self.need_first_time_count {
            0
        } else {
            i64::from(count) - i64::from(previous)
        };
        self.need_first_time_count = false;
        debug!("device '{}': counted {} balls (delta {})", self.name, count, delta);
        self.status_dump();

        if delta == 0
            && self.confirm_via_count
            && self.eject_in_progress_target.is_some()
            && self.ejected_ball_left
        {
            // The ball went out and did not come back: count-confirmed.
            self.eject_success(peers, cx);
        }

        if delta > 0 {
            if self.mechanical_eject_in_progress > 0 && self.eject_in_progress_target.is_some()
            {
                self.mechanical_eject_failed(cx);
            } else {
                self.balls_added(delta as u32, peers, cx);
            }
        } else if delta < 0 {
            self.balls_missing((-delta) as u32, cx);
        }

        self.balls
    }

    /// Classify newly-counted balls: a bounced-back eject (jam heuristic)
    /// or a genuine arrival.
    pub(crate) fn balls_added(&mut self, balls: u32, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        if self.eject_in_progress_target.is_some()
            && self.jam_switch.is_some()
            && self.num_jam_switch_count > 1
        {
            // More than one jam hit since the attempt started: the ball
            // we ejected fell back in.
            debug!(
                "device '{}': jam switch count {} during eject, treating as failure",
                self.name, self.num_jam_switch_count
            );
            self.eject_failed(true, false, peers, cx);
            return;
        }

        // With a single jam hit, no jam switch, or no eject in progress,
        // the balls are genuine arrivals.
        if self.num_balls_in_transit == 0 {
            cx.events.post(Event::CapturedFrom {
                playfield: self.captures_from,
                balls,
            });
        }
        cx.events.post_relay(
            Event::BallEnter {
                device: self.id,
                balls,
            },
            AfterHook::BallsAdded { device: self.id },
        );

        if self.mechanical_eject_in_progress > 0 && self.eject_in_progress_target.is_some() {
            debug!(
                "device '{}': ball added while waiting for player eject, assuming failure",
                self.name
            );
            self.mechanical_eject_failed(cx);
            cx.events
                .post(Event::PlayerControlledEjectFailed { device: self.id });
        }
    }

    /// Post-relay bookkeeping for our own ball-enter event: balls nobody
    /// claimed are stuck, so re-eject them unless this device is a
    /// trough; then service any waiting queue.
    pub fn balls_added_callback(
        &mut self,
        balls: u32,
        peers: &PeerDevices<'_>,
        cx: &mut Cx<'_>,
    ) {
        if self.mechanical_eject_in_progress > 0 || self.waiting_for_eject_trigger {
            return; // the mechanical-eject path picks these up
        }

        if balls > 0 && !self.has_tag("trough") {
            self.eject(balls, None, None, false, peers, cx);
        }

        if !self.eject_queue.is_empty() {
            debug!(
                "device '{}': ball added with a non-empty eject queue, servicing it",
                self.name
            );
            self.do_eject(peers, cx);
        }
    }

    pub(crate) fn balls_missing(&mut self, balls: u32, cx: &mut Cx<'_>) {
        debug!(
            "device '{}': {} ball(s) missing (mechanical watch: {})",
            self.name,
            balls,
            self.manual_eject_target.is_some()
        );
        if self.manual_eject_target.is_none() {
            cx.events.post(Event::BallMissing {
                device: self.id,
                balls,
            });
        }
    }

    /// The jam switch activated.
    pub fn jam_switch_hit(&mut self) {
        self.num_jam_switch_count += 1;
        debug!(
            "device '{}': jam switch hit, count now {}",
            self.name, self.num_jam_switch_count
        );
    }

    /// The entrance switch activated: one ball in, for devices counting
    /// without ball switches.
    pub fn entrance_switch_hit(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        if !self.ball_switches.is_empty() {
            return;
        }
        if self.is_full(cx.num_balls_known) {
            warn!(
                "device '{}' received a ball but is already full; ignoring",
                self.name
            );
            return;
        }
        self.balls += 1;
        self.balls_added(1, peers, cx);
    }

    // ── upstream requests ──────────────────────────────────────

    /// Ask upstream to deliver up to `balls` balls (-1 = fill to
    /// capacity). Returns the number actually requested; declines while
    /// an eject is in progress or the device cannot receive.
    pub fn request_ball(&mut self, balls: i32, cx: &mut Cx<'_>) -> u32 {
        debug!("device '{}': request_ball({balls})", self.name);

        if self.eject_in_progress_target.is_some() {
            debug!(
                "device '{}': not requesting, eject in progress",
                self.name
            );
            return 0;
        }
        if self.additional_capacity() == 0 {
            debug!("device '{}': not requesting, cannot receive", self.name);
            return 0;
        }

        let remaining = self
            .capacity
            .saturating_sub(self.balls)
            .saturating_sub(self.num_balls_requested);
        let want = if balls < 0 {
            remaining
        } else {
            (balls as u32).min(remaining)
        };
        if want == 0 {
            return 0;
        }

        self.num_balls_requested += want;
        cx.events.post(Event::BallRequest {
            device: self.id,
            balls: want,
        });
        want
    }

    /// Relay handler on our own ball-enter while a request is
    /// outstanding: claim the requested balls, return the unexpected
    /// remainder for downstream handlers.
    pub fn requested_ball_received(&mut self, balls: u32, cx: &mut Cx<'_>) -> u32 {
        let unexpected = balls.saturating_sub(self.num_balls_in_transit);
        self.num_balls_requested = self.num_balls_requested.saturating_sub(balls);
        self.num_balls_in_transit = self.num_balls_in_transit.saturating_sub(balls);

        if self.num_balls_in_transit == 0 {
            if let Some(key) = self.requested_ball_key.take() {
                cx.bus.remove(key);
            }
        }
        unexpected
    }

    pub(crate) fn cancel_request_ball(&mut self, cx: &mut Cx<'_>) {
        cx.events.post(Event::CancelBallRequest { device: self.id });
    }

    // ── inter-device coordination ──────────────────────────────

    /// A source device announced an eject attempt; if it is aimed at us,
    /// account for the promised balls and watch our own entry event while
    /// a request is outstanding.
    pub fn source_eject_attempt(&mut self, balls: u32, target: DeviceId, cx: &mut Cx<'_>) {
        if target != self.id {
            return;
        }
        debug!("device '{}': waiting for {} ball(s)", self.name, balls);
        self.num_balls_in_transit += balls;

        if self.num_balls_requested > 0 && self.requested_ball_key.is_none() {
            self.requested_ball_key = Some(cx.bus.add(
                EventKey::BallEnter(self.id),
                1000,
                EventHook::RequestedBallReceived { device: self.id },
            ));
        }
    }

    /// A source device's attempt failed; if it was aimed at us, the
    /// promised balls are no longer coming.
    pub fn source_eject_failed(&mut self, balls: u32, target: DeviceId, cx: &mut Cx<'_>) {
        if target != self.id {
            return;
        }
        self.num_balls_in_transit = self.num_balls_in_transit.saturating_sub(balls);
        if self.num_balls_in_transit == 0 {
            if let Some(key) = self.requested_ball_key.take() {
                cx.bus.remove(key);
            }
        }
    }

    // ── stop ───────────────────────────────────────────────────

    /// Quiesce all in-flight activity: clear the queue, cancel pending
    /// requests and confirmations, and recount. Peer state is never
    /// touched.
    pub fn stop(&mut self, peers: &PeerDevices<'_>, cx: &mut Cx<'_>) {
        debug!("device '{}': stopping all activity", self.name);
        self.eject_in_progress_target = None;
        self.eject_queue.clear();
        self.num_jam_switch_count = 0;
        self.num_eject_attempts = 0;
        self.num_balls_ejecting = 0;

        if self.num_balls_requested > 0 {
            self.num_balls_requested = 0;
            self.cancel_request_ball(cx);
        }
        for key in self.ball_left_keys.drain(..) {
            cx.switches.remove(key);
        }
        if cx.delays.remove(&DelayKey::HoldCoilRelease(self.id)) {
            self.hold_release_in_progress = false;
        }
        self.cancel_eject_confirmation(cx);
        self.count_balls(peers, cx);
    }

    pub(crate) fn status_dump(&self) {
        debug!(
            "device '{}': balls={} eject_in_progress_target={:?} num_balls_ejecting={} \
             num_jam_switch_count={} num_eject_attempts={} num_balls_requested={} \
             eject_queue={:?} manual_eject_target={:?} mechanical_eject_in_progress={}",
            self.name,
            self.balls,
            self.eject_in_progress_target,
            self.num_balls_ejecting,
            self.num_jam_switch_count,
            self.num_eject_attempts,
            self.num_balls_requested,
            self.eject_queue,
            self.manual_eject_target,
            self.mechanical_eject_in_progress,
        );
    }
}

impl std::fmt::Debug for BallDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BallDevice")
            .field("name", &self.name)
            .field("balls", &self.balls)
            .field("capacity", &self.capacity)
            .field("valid", &self.valid)
            .field("eject_in_progress_target", &self.eject_in_progress_target)
            .field("eject_queue", &self.eject_queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillshot_bus::{DelayManager, Dispatcher, EventQueue, SwitchMonitor};
    use skillshot_core::{DriverBank, MachineConfig, MsTime};

    use crate::registry::DeviceRegistry;

    struct NullDrivers;

    impl DriverBank for NullDrivers {
        fn pulse(&mut self, _coil: CoilId) {}
        fn enable(&mut self, _coil: CoilId) {}
        fn disable(&mut self, _coil: CoilId) {}
    }

    use crate::hooks::{DelayHook, DelayKey, SwitchHook};

    /// Standalone service state for driving device methods directly.
    struct Harness {
        events: EventQueue<AfterHook>,
        bus: Dispatcher<EventHook>,
        delays: DelayManager<DelayKey, DelayHook>,
        switches: SwitchMonitor<SwitchHook>,
        drivers: NullDrivers,
    }

    impl Harness {
        fn new(switch_count: usize) -> Self {
            Self {
                events: EventQueue::new(),
                bus: Dispatcher::new(),
                delays: DelayManager::new(),
                switches: SwitchMonitor::new(switch_count),
                drivers: NullDrivers,
            }
        }

        fn cx(&mut self, now: MsTime) -> Cx<'_> {
            Cx {
                now,
                events: &mut self.events,
                bus: &mut self.bus,
                delays: &mut self.delays,
                switches: &mut self.switches,
                drivers: &mut self.drivers,
                balls_in_play: 0,
                num_balls_known: None,
            }
        }
    }

    fn trough_registry() -> DeviceRegistry {
        let config = MachineConfig {
            devices: vec![DeviceConfig {
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
            }],
            playfields: vec![PlayfieldConfig::default()],
            ball_saves: Vec::new(),
        };
        DeviceRegistry::build(&config).unwrap().devices
    }

    // ── capacity and fullness ──────────────────────────────────

    #[test]
    fn additional_capacity_zero_during_eject() {
        let mut reg = trough_registry();
        let dev = reg.device_mut(DeviceId(0));
        dev.balls = 1;
        assert_eq!(dev.additional_capacity(), 2);
        dev.num_balls_ejecting = 1;
        assert_eq!(dev.additional_capacity(), 0);
    }

    #[test]
    fn playfield_capacity_is_unbounded() {
        let reg = trough_registry();
        let playfield = reg.device(DeviceId(1));
        assert_eq!(playfield.additional_capacity(), PLAYFIELD_CAPACITY);
        assert!(!playfield.is_full(Some(1)));
    }

    #[test]
    fn is_full_at_capacity_or_known_balls() {
        let mut reg = trough_registry();
        let dev = reg.device_mut(DeviceId(0));
        dev.balls = 3;
        assert!(dev.is_full(None));
        dev.balls = 2;
        assert!(!dev.is_full(None));
        assert!(dev.is_full(Some(2)));
    }

    #[test]
    fn timeout_defaults_for_unconfigured_target() {
        let reg = trough_registry();
        let dev = reg.device(DeviceId(0));
        assert_eq!(dev.timeout_for(DeviceId(1)), DEFAULT_EJECT_TIMEOUT_MS);
        assert_eq!(dev.timeout_for(DeviceId(7)), DEFAULT_EJECT_TIMEOUT_MS);
    }

    // ── request bookkeeping ────────────────────────────────────

    #[test]
    fn request_ball_clamps_to_remaining_capacity() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        let dev = reg.device_mut(DeviceId(0));
        dev.balls = 1;

        let mut cx = h.cx(MsTime(0));
        assert_eq!(dev.request_ball(5, &mut cx), 2);
        assert_eq!(dev.num_balls_requested, 2);
        // A second request finds no remaining headroom.
        assert_eq!(dev.request_ball(1, &mut cx), 0);
    }

    #[test]
    fn request_ball_fill_uses_all_headroom() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        let dev = reg.device_mut(DeviceId(0));

        let mut cx = h.cx(MsTime(0));
        assert_eq!(dev.request_ball(-1, &mut cx), 3);
    }

    #[test]
    fn request_ball_declines_during_eject() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        let dev = reg.device_mut(DeviceId(0));
        dev.balls = 1;
        dev.eject_in_progress_target = Some(DeviceId(1));

        let mut cx = h.cx(MsTime(0));
        assert_eq!(dev.request_ball(1, &mut cx), 0);
    }

    #[test]
    fn requested_ball_received_claims_and_reports_excess() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        let dev = reg.device_mut(DeviceId(0));
        dev.num_balls_requested = 1;
        dev.num_balls_in_transit = 1;

        let mut cx = h.cx(MsTime(0));
        // Two balls arrive, one was promised: one is unexpected.
        assert_eq!(dev.requested_ball_received(2, &mut cx), 1);
        assert_eq!(dev.num_balls_requested, 0);
        assert_eq!(dev.num_balls_in_transit, 0);
    }

    #[test]
    fn source_failure_returns_promised_balls() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        let dev = reg.device_mut(DeviceId(0));
        dev.num_balls_requested = 1;

        let mut cx = h.cx(MsTime(0));
        dev.source_eject_attempt(1, DeviceId(0), &mut cx);
        assert_eq!(dev.num_balls_in_transit, 1);
        assert!(dev.requested_ball_key.is_some());

        dev.source_eject_failed(1, DeviceId(0), &mut cx);
        assert_eq!(dev.num_balls_in_transit, 0);
        assert!(dev.requested_ball_key.is_none());
    }

    #[test]
    fn source_events_for_other_targets_are_ignored() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        let dev = reg.device_mut(DeviceId(0));

        let mut cx = h.cx(MsTime(0));
        dev.source_eject_attempt(2, DeviceId(1), &mut cx);
        assert_eq!(dev.num_balls_in_transit, 0);
    }

    // ── counting ───────────────────────────────────────────────

    #[test]
    fn count_invalid_while_switch_settling() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        h.switches.seed(skillshot_core::SwitchId(0), true);
        h.switches.seed(skillshot_core::SwitchId(1), true);

        let (dev, peers) = reg.split_mut(DeviceId(0));
        {
            let mut cx = h.cx(MsTime(0));
            assert_eq!(dev.count_balls(&peers, &mut cx), 2);
        }
        assert!(dev.is_valid());

        // A switch starts moving: the count goes invalid and holds.
        h.switches
            .on_edge(skillshot_core::SwitchId(2), true, MsTime(10));
        {
            let mut cx = h.cx(MsTime(100));
            assert_eq!(dev.count_balls(&peers, &mut cx), 2);
        }
        assert!(!dev.is_valid());

        // After the entrance delay it counts.
        {
            let mut cx = h.cx(MsTime(510));
            assert_eq!(dev.count_balls(&peers, &mut cx), 3);
        }
        assert!(dev.is_valid());
    }

    #[test]
    fn first_count_posts_no_arrival_events() {
        let mut reg = trough_registry();
        let mut h = Harness::new(4);
        h.switches.seed(skillshot_core::SwitchId(0), true);

        let (dev, peers) = reg.split_mut(DeviceId(0));
        {
            let mut cx = h.cx(MsTime(0));
            dev.count_balls(&peers, &mut cx);
        }
        assert_eq!(dev.balls(), 1);
        assert!(h.events.is_empty());
    }

    // ── proptest ───────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // However balls are requested, the device never promises
            // itself more than it can hold.
            #[test]
            fn requests_never_exceed_headroom(
                held in 0u32..4,
                requests in prop::collection::vec(-1i32..6, 1..16)
            ) {
                let mut reg = trough_registry();
                let mut h = Harness::new(4);
                let dev = reg.device_mut(DeviceId(0));
                dev.balls = held.min(dev.capacity());

                let mut cx = h.cx(MsTime(0));
                for balls in requests {
                    dev.request_ball(balls, &mut cx);
                    prop_assert!(
                        dev.balls() + dev.num_balls_requested() <= dev.capacity(),
                        "over-promised: {} held + {} requested > {}",
                        dev.balls(),
                        dev.num_balls_requested(),
                        dev.capacity()
                    );
                }
            }
        }
    }
}

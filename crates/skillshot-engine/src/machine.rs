//! The machine: single-threaded owner of all coordination state.
//!
//! [`Machine`] owns the device registry, the subscription table, the
//! pending-event queue, the delay scheduler, the switch monitor, the
//! ball saves, and the driver bank. All logic runs on one cooperative
//! loop: external stimuli ([`switch_event`](Machine::switch_event),
//! [`post`](Machine::post), [`advance_to`](Machine::advance_to)) feed
//! hooks, every hook is dispatched by matching its variant and calling
//! the owning component with split borrows, and the event queue is
//! drained to quiescence before the call returns.
//!
//! # Initialization
//!
//! Construction resolves and validates the configuration. [`power_up`]
//! then runs the two init phases: phase 1 wires each device to its own
//! switches and its targets' request/ok-to-receive events and takes the
//! first count (boot-seeded switch states count immediately, with no
//! arrival events); phase 2 subscribes each device to the attempt and
//! failure events of every peer that ejects into it.
//!
//! [`power_up`]: Machine::power_up

use indexmap::IndexMap;
use log::debug;

use skillshot_bus::{DelayManager, Delivery, Dispatcher, EventQueue, Pending, SwitchMonitor};
use skillshot_core::{
    CoilId, ConfigError, DeviceId, DriverBank, Event, EventKey, MachineConfig, MachineError,
    MsTime, NameResolver, SaveId, SwitchId,
};
use skillshot_device::{
    AfterHook, BallDevice, BallSave, Cx, DelayHook, DelayKey, DeviceRegistry, EventHook,
    SwitchHook,
};

/// Arguments for [`Machine::eject`].
#[derive(Clone, Debug)]
pub struct EjectArgs {
    /// Number of balls to eject.
    pub balls: u32,
    /// Target device name, or `None` for the first configured target.
    pub target: Option<String>,
    /// Confirmation deadline override in ms (0 = no deadline).
    pub timeout_ms: Option<u64>,
    /// Whether to request balls from upstream if the device is short.
    pub get_ball: bool,
}

impl Default for EjectArgs {
    fn default() -> Self {
        Self {
            balls: 1,
            target: None,
            timeout_ms: None,
            get_ball: false,
        }
    }
}

struct Names<'a> {
    registry: &'a DeviceRegistry,
    saves: &'a [BallSave],
}

impl NameResolver for Names<'_> {
    fn device_name(&self, device: DeviceId) -> &str {
        self.registry.name(device)
    }
    fn save_name(&self, save: SaveId) -> &str {
        self.saves[save.0 as usize].name()
    }
}

/// Single-threaded coordination machine.
///
/// All mutating operations take `&mut self` and settle fully (drain the
/// event queue) before returning, so callers always observe a coherent
/// state. Devices never hold references to each other; every
/// cross-device effect flows through the event queue owned here.
pub struct Machine {
    now: MsTime,
    registry: DeviceRegistry,
    saves: Vec<BallSave>,
    save_ids: IndexMap<String, SaveId>,
    bus: Dispatcher<EventHook>,
    queue: EventQueue<AfterHook>,
    delays: DelayManager<DelayKey, DelayHook>,
    switches: SwitchMonitor<SwitchHook>,
    switch_ids: IndexMap<String, SwitchId>,
    coil_ids: IndexMap<String, CoilId>,
    drivers: Box<dyn DriverBank>,
    balls_in_play: u32,
    num_balls_known: Option<u32>,
    powered_up: bool,
    trace: Vec<Event>,
}

impl Machine {
    /// Build a machine from a configuration and a driver bank.
    ///
    /// Validates the configuration, resolves every name to an ID, and
    /// interns switches and coils. The machine is inert until
    /// [`power_up`](Machine::power_up) runs.
    pub fn new(config: &MachineConfig, drivers: Box<dyn DriverBank>) -> Result<Self, ConfigError> {
        let built = DeviceRegistry::build(config)?;
        let registry = built.devices;

        let mut saves = Vec::with_capacity(config.ball_saves.len());
        let mut save_ids = IndexMap::new();
        for cfg in &config.ball_saves {
            let id = SaveId(saves.len() as u32);
            let playfield = registry
                .lookup(&cfg.source_playfield)
                .ok_or_else(|| ConfigError::UnknownDevice {
                    name: cfg.source_playfield.clone(),
                })?;
            saves.push(BallSave::from_config(id, cfg, playfield)?);
            save_ids.insert(cfg.name.clone(), id);
        }

        let switches = SwitchMonitor::new(built.switch_ids.len());
        Ok(Self {
            now: MsTime(0),
            registry,
            saves,
            save_ids,
            bus: Dispatcher::new(),
            queue: EventQueue::new(),
            delays: DelayManager::new(),
            switches,
            switch_ids: built.switch_ids,
            coil_ids: built.coil_ids,
            drivers,
            balls_in_play: 0,
            num_balls_known: None,
            powered_up: false,
            trace: Vec::new(),
        })
    }

    // ── initialization ─────────────────────────────────────────

    /// Run both init phases with the given switches active at boot.
    ///
    /// Seeded switches count as settled immediately, so the first count
    /// is valid without waiting out the entrance delays, and posts no
    /// arrival events.
    pub fn power_up(&mut self, active_switches: &[&str]) -> Result<(), MachineError> {
        if self.powered_up {
            return Err(MachineError::AlreadyPoweredUp);
        }
        for name in active_switches {
            let id = self.switch_id(name)?;
            self.switches.seed(id, true);
        }

        // Phase 1: each device wires its own switches and its targets'
        // request/ok-to-receive events, then counts.
        let device_ids: Vec<DeviceId> =
            self.registry.iter().map(BallDevice::id).collect();
        for &id in &device_ids {
            self.init_device_phase1(id);
        }
        for &id in &device_ids {
            if !self.registry.device(id).is_playfield() {
                self.with_device(id, |dev, peers, cx| {
                    dev.count_balls(peers, cx);
                });
            }
        }

        // Phase 2: each device watches the attempt/failure events of
        // every peer that ejects into it.
        for &id in &device_ids {
            for &source in &device_ids {
                if source == id {
                    continue;
                }
                let targets_us = self
                    .registry
                    .device(source)
                    .eject_targets()
                    .contains(&id);
                if targets_us {
                    debug!(
                        "wiring source '{}' -> '{}'",
                        self.registry.name(source),
                        self.registry.name(id)
                    );
                    self.bus.add(
                        EventKey::EjectFailed(source),
                        1,
                        EventHook::SourceEjectFailed { device: id },
                    );
                    self.bus.add(
                        EventKey::EjectAttempt(source),
                        1,
                        EventHook::SourceEjectAttempt { device: id },
                    );
                }
            }
        }

        // Ball saves: timer-start event subscriptions are standing.
        for save in &self.saves {
            for event in save.timer_start_events() {
                self.bus.add(
                    EventKey::Custom(event.clone()),
                    1,
                    EventHook::SaveTimerStart { save: save.id() },
                );
            }
        }

        self.powered_up = true;
        self.drain_queue();
        Ok(())
    }

    fn init_device_phase1(&mut self, id: DeviceId) {
        let dev = self.registry.device(id);
        if dev.is_playfield() {
            return;
        }

        let ball_switches: Vec<SwitchId> = dev.ball_switches().to_vec();
        let entrance_delay = dev.entrance_count_delay();
        let exit_delay = dev.exit_count_delay();
        let mechanical = dev.is_mechanical_eject();
        let trigger_time = dev.mechanical_eject_trigger_time();
        let jam = dev.jam_switch();
        let entrance = dev.entrance_switch();
        let holds: Vec<SwitchId> = dev.hold_switches().to_vec();
        let targets: Vec<DeviceId> = dev.eject_targets().to_vec();
        let eject_events: Vec<String> = dev.eject_events().to_vec();

        // Count on both settled edges, invalidate on both raw edges.
        for &switch in &ball_switches {
            self.switches
                .add(switch, true, entrance_delay, SwitchHook::CountBalls { device: id });
        }
        for &switch in &ball_switches {
            self.switches
                .add(switch, false, exit_delay, SwitchHook::CountBalls { device: id });
        }
        for &switch in &ball_switches {
            self.switches
                .add(switch, true, 0, SwitchHook::Invalidate { device: id });
        }
        for &switch in &ball_switches {
            self.switches
                .add(switch, false, 0, SwitchHook::Invalidate { device: id });
        }
        if mechanical {
            for &switch in &ball_switches {
                self.switches.add(
                    switch,
                    false,
                    trigger_time,
                    SwitchHook::MechanicalEject { device: id },
                );
            }
        }
        if let Some(switch) = jam {
            self.switches
                .add(switch, true, 0, SwitchHook::JamSwitch { device: id });
        }
        if let Some(switch) = entrance {
            self.switches
                .add(switch, true, 0, SwitchHook::EntranceSwitch { device: id });
        }
        for &switch in &holds {
            self.switches
                .add(switch, true, 0, SwitchHook::Hold { device: id });
        }

        // Service our own eject-request event.
        self.bus.add(
            EventKey::EjectRequest(id),
            1,
            EventHook::EjectRequested { device: id },
        );

        // Watch our targets: volunteer on their requests, resume on
        // their ok-to-receive.
        for &target in &targets {
            self.bus.add(
                EventKey::BallRequest(target),
                1,
                EventHook::TargetBallRequest { device: id, target },
            );
            self.bus.add(
                EventKey::OkToReceive(target),
                1,
                EventHook::ResumeEject { device: id },
            );
        }

        // Named eject triggers.
        for event in &eject_events {
            self.bus.add(
                EventKey::Custom(event.clone()),
                1,
                EventHook::EjectEvent { device: id },
            );
        }
    }

    // ── external stimuli ───────────────────────────────────────

    /// Record a debounced switch edge and settle all consequences.
    pub fn switch_event(&mut self, switch: &str, active: bool) -> Result<(), MachineError> {
        self.require_power()?;
        let id = self.switch_id(switch)?;
        let hooks = self.switches.on_edge(id, active, self.now);
        for hook in hooks {
            self.run_switch_hook(hook);
        }
        self.drain_queue();
        Ok(())
    }

    /// Advance the clock to `to`, firing every settle timer and delay in
    /// deadline order and settling each one's consequences.
    pub fn advance_to(&mut self, to: MsTime) -> Result<(), MachineError> {
        self.require_power()?;
        while let Some(next) = self.next_deadline() {
            if next > to {
                break;
            }
            self.now = next;
            for hook in self.switches.take_due(self.now) {
                self.run_switch_hook(hook);
                self.drain_queue();
            }
            for (_key, hook) in self.delays.take_due(self.now) {
                self.run_delay_hook(hook);
                self.drain_queue();
            }
        }
        if to > self.now {
            self.now = to;
        }
        Ok(())
    }

    /// Advance the clock by `ms`.
    pub fn advance(&mut self, ms: u64) -> Result<(), MachineError> {
        self.advance_to(self.now.after(ms))
    }

    /// Post a typed event and settle its consequences.
    pub fn post(&mut self, event: Event) -> Result<(), MachineError> {
        self.require_power()?;
        self.queue.post(event);
        self.drain_queue();
        Ok(())
    }

    /// Post a free-form named event (eject triggers, confirmation
    /// events, save timer starts).
    pub fn post_named(&mut self, name: &str) -> Result<(), MachineError> {
        self.post(Event::Custom {
            name: name.to_string(),
        })
    }

    /// Relay a drain through any active ball saves. Returns the number
    /// of balls that actually drained (zero when a save swallowed them).
    pub fn ball_drain(&mut self, balls: u32) -> Result<u32, MachineError> {
        self.require_power()?;
        let event = Event::BallDrain { balls };
        self.record_event(&event);
        let handlers = self.bus.snapshot(&event.key());
        let mut remaining = balls;
        for (_, hook) in handlers {
            remaining = self.run_relay_hook(hook, &event, remaining);
        }
        self.drain_queue();
        Ok(remaining)
    }

    // ── public device operations ───────────────────────────────

    /// Eject from a device. See [`EjectArgs`].
    pub fn eject(&mut self, device: &str, args: EjectArgs) -> Result<bool, MachineError> {
        self.require_power()?;
        let id = self.device_id(device)?;
        let target = self.optional_device_id(args.target.as_deref())?;
        let queued = self.with_device(id, |dev, peers, cx| {
            dev.eject(args.balls, target, args.timeout_ms, args.get_ball, peers, cx)
        });
        self.drain_queue();
        Ok(queued)
    }

    /// Eject every ball a device holds. Returns whether anything was
    /// queued.
    pub fn eject_all(&mut self, device: &str, target: Option<&str>) -> Result<bool, MachineError> {
        self.require_power()?;
        let id = self.device_id(device)?;
        let target = self.optional_device_id(target)?;
        let queued = self.with_device(id, |dev, peers, cx| dev.eject_all(target, peers, cx));
        self.drain_queue();
        Ok(queued)
    }

    /// Ask upstream to send a device up to `balls` balls (-1 = fill).
    /// Returns the number actually requested.
    pub fn request_ball(&mut self, device: &str, balls: i32) -> Result<u32, MachineError> {
        self.require_power()?;
        let id = self.device_id(device)?;
        let requested = self.with_device(id, |dev, _peers, cx| dev.request_ball(balls, cx));
        self.drain_queue();
        Ok(requested)
    }

    /// Arm a device for a player-controlled eject.
    pub fn setup_player_controlled_eject(
        &mut self,
        device: &str,
        balls: u32,
        target: Option<&str>,
        trigger_event: Option<&str>,
    ) -> Result<bool, MachineError> {
        self.require_power()?;
        let id = self.device_id(device)?;
        let target = self.optional_device_id(target)?;
        let armed = self.with_device(id, |dev, peers, cx| {
            dev.setup_player_controlled_eject(balls, target, trigger_event, peers, cx)
        });
        self.drain_queue();
        Ok(armed)
    }

    /// Quiesce a device: clear its queue, cancel confirmations and
    /// requests, recount.
    pub fn stop_device(&mut self, device: &str) -> Result<(), MachineError> {
        self.require_power()?;
        let id = self.device_id(device)?;
        self.with_device(id, |dev, peers, cx| dev.stop(peers, cx));
        self.drain_queue();
        Ok(())
    }

    /// Mark an externally-confirmed eject as failed (an escape hatch for
    /// game logic that knows better than the confirmation evidence).
    pub fn eject_failed(&mut self, device: &str, force_retry: bool) -> Result<(), MachineError> {
        self.require_power()?;
        let id = self.device_id(device)?;
        self.with_device(id, |dev, peers, cx| {
            dev.eject_failed(true, force_retry, peers, cx);
        });
        self.drain_queue();
        Ok(())
    }

    // ── ball saves ─────────────────────────────────────────────

    /// Arm a ball save.
    pub fn enable_ball_save(&mut self, name: &str) -> Result<(), MachineError> {
        self.require_power()?;
        let id = self.save_id(name)?;
        self.with_save(id, |save, cx| save.enable(cx));
        self.drain_queue();
        Ok(())
    }

    /// Disarm a ball save.
    pub fn disable_ball_save(&mut self, name: &str) -> Result<(), MachineError> {
        self.require_power()?;
        let id = self.save_id(name)?;
        self.with_save(id, |save, cx| save.disable(cx));
        self.drain_queue();
        Ok(())
    }

    /// Shared access to a ball save, for inspection.
    pub fn ball_save(&self, name: &str) -> Result<&BallSave, MachineError> {
        let id = self.save_id(name)?;
        Ok(&self.saves[id.0 as usize])
    }

    // ── machine-level bookkeeping ──────────────────────────────

    /// Set the number of balls currently in play (maintained by the
    /// embedding game layer; read by ball saves).
    pub fn set_balls_in_play(&mut self, balls: u32) {
        self.balls_in_play = balls;
    }

    /// Balls currently in play.
    pub fn balls_in_play(&self) -> u32 {
        self.balls_in_play
    }

    /// Set the total number of balls the machine knows about, used by
    /// `is_full` checks.
    pub fn set_num_balls_known(&mut self, balls: Option<u32>) {
        self.num_balls_known = balls;
    }

    // ── inspection ─────────────────────────────────────────────

    /// Shared access to a device, for inspection.
    pub fn device(&self, name: &str) -> Result<&BallDevice, MachineError> {
        Ok(self.registry.device(self.device_id(name)?))
    }

    /// The machine's current time.
    pub fn now(&self) -> MsTime {
        self.now
    }

    /// The earliest scheduled deadline (settle timer or delay), if any.
    pub fn next_deadline(&self) -> Option<MsTime> {
        match (self.switches.next_deadline(), self.delays.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether a named delay is currently scheduled.
    pub fn delay_scheduled(&self, key: &DelayKey) -> bool {
        self.delays.is_scheduled(key)
    }

    /// Drain the trace of every event delivered since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.trace)
    }

    /// Render an event's legacy wire name.
    pub fn event_name(&self, event: &Event) -> String {
        event.wire_name(&Names {
            registry: &self.registry,
            saves: &self.saves,
        })
    }

    // ── dispatch ───────────────────────────────────────────────

    fn drain_queue(&mut self) {
        while let Some(pending) = self.queue.pop() {
            self.deliver(pending);
        }
    }

    fn deliver(&mut self, pending: Pending<AfterHook>) {
        let event = pending.event;
        self.record_event(&event);
        let handlers = self.bus.snapshot(&event.key());

        match pending.delivery {
            Delivery::Fire => {
                for (_, hook) in handlers {
                    self.run_event_hook(hook, &event);
                }
            }
            Delivery::Queued { after } => {
                for (_, hook) in handlers {
                    self.run_event_hook(hook, &event);
                }
                self.run_after_hook(after, 0);
            }
            Delivery::Relay { after } => {
                let mut balls = event.relay_balls().unwrap_or(0);
                for (_, hook) in handlers {
                    balls = self.run_relay_hook(hook, &event, balls);
                }
                self.run_after_hook(after, balls);
            }
        }
    }

    fn record_event(&mut self, event: &Event) {
        debug!("event: {}", self.event_name(event));
        self.trace.push(event.clone());
    }

    fn run_event_hook(&mut self, hook: EventHook, event: &Event) {
        match hook {
            EventHook::EjectRequested { device } => {
                if let Event::EjectRequest { balls, target, .. } = *event {
                    self.with_device(device, |dev, peers, cx| {
                        dev.eject(balls, target, None, false, peers, cx);
                    });
                }
            }
            EventHook::TargetBallRequest { device, target } => {
                if let Event::BallRequest { balls, .. } = *event {
                    self.with_device(device, |dev, peers, cx| {
                        dev.eject(balls, Some(target), None, true, peers, cx);
                    });
                }
            }
            EventHook::ResumeEject { device } => {
                self.with_device(device, |dev, peers, cx| dev.do_eject(peers, cx));
            }
            EventHook::SourceEjectAttempt { device } => {
                if let Event::EjectAttempt { balls, target, .. } = *event {
                    self.with_device(device, |dev, _peers, cx| {
                        dev.source_eject_attempt(balls, target, cx);
                    });
                }
            }
            EventHook::SourceEjectFailed { device } => {
                if let Event::EjectFailed { balls, target, .. } = *event {
                    self.with_device(device, |dev, _peers, cx| {
                        dev.source_eject_failed(balls, target, cx);
                    });
                }
            }
            EventHook::ConfirmEjectSuccess { device } => {
                self.with_device(device, |dev, peers, cx| dev.eject_success(peers, cx));
            }
            EventHook::TriggerEject { device } => {
                self.with_device(device, |dev, peers, cx| dev.trigger_eject(peers, cx));
            }
            EventHook::EjectEvent { device } => {
                self.with_device(device, |dev, peers, cx| dev.eject_event_fired(peers, cx));
            }
            EventHook::SaveTimerStart { save } => {
                self.with_save(save, |save, cx| save.timer_start(cx));
            }
            // Relay-only hooks reached through a plain delivery have
            // nothing to claim; ignore them.
            EventHook::RequestedBallReceived { .. } | EventHook::SaveDrain { .. } => {}
        }
    }

    fn run_relay_hook(&mut self, hook: EventHook, event: &Event, balls: u32) -> u32 {
        match hook {
            EventHook::RequestedBallReceived { device } => {
                self.with_device(device, |dev, _peers, cx| dev.requested_ball_received(balls, cx))
            }
            EventHook::SaveDrain { save } => {
                self.with_save(save, |save, cx| save.drain(balls, cx))
            }
            other => {
                self.run_event_hook(other, event);
                balls
            }
        }
    }

    fn run_after_hook(&mut self, after: AfterHook, balls: u32) {
        match after {
            AfterHook::PerformEject {
                device,
                target,
                timeout,
            } => {
                self.with_device(device, |dev, peers, cx| {
                    dev.perform_eject(target, timeout, peers, cx);
                });
            }
            AfterHook::BallsAdded { device } => {
                self.with_device(device, |dev, peers, cx| {
                    dev.balls_added_callback(balls, peers, cx);
                });
            }
            AfterHook::MechanicalAttemptPosted { .. } => {}
        }
    }

    fn run_switch_hook(&mut self, hook: SwitchHook) {
        match hook {
            SwitchHook::CountBalls { device } => {
                self.with_device(device, |dev, peers, cx| {
                    dev.count_balls(peers, cx);
                });
            }
            SwitchHook::Invalidate { device } => {
                self.registry.device_mut(device).invalidate();
            }
            SwitchHook::MechanicalEject { device } => {
                self.with_device(device, |dev, peers, cx| {
                    dev.mechanical_eject_triggered(peers, cx);
                });
            }
            SwitchHook::JamSwitch { device } => {
                self.registry.device_mut(device).jam_switch_hit();
            }
            SwitchHook::EntranceSwitch { device } => {
                self.with_device(device, |dev, peers, cx| {
                    dev.entrance_switch_hit(peers, cx);
                });
            }
            SwitchHook::Hold { device } => {
                self.with_device(device, |dev, _peers, cx| dev.hold_switch_hit(cx));
            }
            SwitchHook::BallLeft { device, balls } => {
                self.with_device(device, |dev, _peers, cx| dev.ball_left(balls, cx));
            }
            SwitchHook::ConfirmSwitch { device } => {
                self.with_device(device, |dev, peers, cx| dev.eject_success(peers, cx));
            }
        }
    }

    fn run_delay_hook(&mut self, hook: DelayHook) {
        match hook {
            DelayHook::HoldReleaseDone { device } => {
                self.with_device(device, |dev, _peers, cx| dev.hold_release_done(cx));
            }
            DelayHook::EjectTimeout { device } => {
                self.with_device(device, |dev, peers, cx| {
                    dev.eject_failed(true, false, peers, cx);
                });
            }
            DelayHook::FakeConfirm { device } => {
                self.with_device(device, |dev, peers, cx| dev.eject_success(peers, cx));
            }
            DelayHook::SaveDisable { save } => {
                self.with_save(save, |save, cx| save.disable(cx));
            }
            DelayHook::SaveHurryUp { save } => {
                self.with_save(save, |save, cx| save.hurry_up(cx));
            }
            DelayHook::SaveGracePeriod { save } => {
                self.with_save(save, |save, cx| save.grace_period(cx));
            }
        }
    }

    fn with_device<R>(
        &mut self,
        id: DeviceId,
        f: impl FnOnce(&mut BallDevice, &skillshot_device::PeerDevices<'_>, &mut Cx<'_>) -> R,
    ) -> R {
        let (dev, peers) = self.registry.split_mut(id);
        let mut cx = Cx {
            now: self.now,
            events: &mut self.queue,
            bus: &mut self.bus,
            delays: &mut self.delays,
            switches: &mut self.switches,
            drivers: self.drivers.as_mut(),
            balls_in_play: self.balls_in_play,
            num_balls_known: self.num_balls_known,
        };
        f(dev, &peers, &mut cx)
    }

    fn with_save<R>(&mut self, id: SaveId, f: impl FnOnce(&mut BallSave, &mut Cx<'_>) -> R) -> R {
        let save = &mut self.saves[id.0 as usize];
        let mut cx = Cx {
            now: self.now,
            events: &mut self.queue,
            bus: &mut self.bus,
            delays: &mut self.delays,
            switches: &mut self.switches,
            drivers: self.drivers.as_mut(),
            balls_in_play: self.balls_in_play,
            num_balls_known: self.num_balls_known,
        };
        f(save, &mut cx)
    }

    // ── lookups ────────────────────────────────────────────────

    fn require_power(&self) -> Result<(), MachineError> {
        if self.powered_up {
            Ok(())
        } else {
            Err(MachineError::NotPoweredUp)
        }
    }

    fn device_id(&self, name: &str) -> Result<DeviceId, MachineError> {
        self.registry
            .lookup(name)
            .ok_or_else(|| MachineError::UnknownDevice {
                name: name.to_string(),
            })
    }

    fn optional_device_id(&self, name: Option<&str>) -> Result<Option<DeviceId>, MachineError> {
        name.map(|n| self.device_id(n)).transpose()
    }

    fn switch_id(&self, name: &str) -> Result<SwitchId, MachineError> {
        self.switch_ids
            .get(name)
            .copied()
            .ok_or_else(|| MachineError::UnknownSwitch {
                name: name.to_string(),
            })
    }

    fn save_id(&self, name: &str) -> Result<SaveId, MachineError> {
        self.save_ids
            .get(name)
            .copied()
            .ok_or_else(|| MachineError::UnknownSave {
                name: name.to_string(),
            })
    }

    /// The interned ID of a coil name, for embedders correlating driver
    /// calls back to configuration.
    pub fn coil_id(&self, name: &str) -> Option<CoilId> {
        self.coil_ids.get(name).copied()
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("now", &self.now)
            .field("devices", &self.registry.len())
            .field("saves", &self.saves.len())
            .field("powered_up", &self.powered_up)
            .field("pending_events", &self.queue.len())
            .finish()
    }
}

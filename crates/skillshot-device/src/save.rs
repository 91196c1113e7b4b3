//! The ball-save adjunct.
//!
//! When enabled, a ball save watches the machine-wide drain relay at high
//! priority. Each drained ball while balls are in play is swallowed (the
//! relay continues with zero) and replaced by asking the source playfield
//! to add a ball, auto-launched or player-controlled per configuration.
//! Three timers shape a timed save: a hurry-up warning, the grace-period
//! start at nominal expiry, and the final disable at expiry plus grace.
//! Unlimited saves skip the counter entirely.

use log::debug;
use skillshot_core::{
    parse_duration_ms, BallSaveConfig, ConfigError, DeviceId, Event, EventKey, HandlerId, SaveId,
};

use crate::hooks::{Cx, DelayHook, DelayKey, EventHook};

/// One ball-save adjunct.
pub struct BallSave {
    id: SaveId,
    name: String,
    source_playfield: DeviceId,
    balls_to_save: i32,
    unlimited: bool,
    active_time: u64,
    hurry_up_time: u64,
    grace_period: u64,
    auto_launch: bool,
    timer_start_events: Vec<String>,
    enabled: bool,
    saves_remaining: i32,
    drain_key: Option<HandlerId>,
}

impl BallSave {
    /// Resolve a ball-save configuration. `source_playfield` must be the
    /// registry ID of the configured playfield.
    pub fn from_config(
        id: SaveId,
        cfg: &BallSaveConfig,
        source_playfield: DeviceId,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            id,
            name: cfg.name.clone(),
            source_playfield,
            balls_to_save: cfg.balls_to_save,
            unlimited: cfg.balls_to_save == -1,
            active_time: parse_duration_ms(&cfg.active_time)?,
            hurry_up_time: parse_duration_ms(&cfg.hurry_up_time)?,
            grace_period: parse_duration_ms(&cfg.grace_period)?,
            auto_launch: cfg.auto_launch,
            timer_start_events: cfg.timer_start_events.clone(),
            enabled: false,
            saves_remaining: 0,
            drain_key: None,
        })
    }

    /// This save's registry ID.
    pub fn id(&self) -> SaveId {
        self.id
    }

    /// The configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the save is armed.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Saves left before the counter disables the save. Meaningless in
    /// unlimited mode.
    pub fn saves_remaining(&self) -> i32 {
        self.saves_remaining
    }

    /// Events that start the timer instead of `enable` doing so.
    pub fn timer_start_events(&self) -> &[String] {
        &self.timer_start_events
    }

    /// Arm the save: reset the counter, watch the drain relay at high
    /// priority, and start the timer unless timer-start events are
    /// configured.
    pub fn enable(&mut self, cx: &mut Cx<'_>) {
        if self.enabled {
            return;
        }
        self.saves_remaining = self.balls_to_save;
        self.enabled = true;
        debug!(
            "ball save '{}': enabling (auto launch: {}, balls to save: {})",
            self.name, self.auto_launch, self.balls_to_save
        );

        self.drain_key = Some(cx.bus.add(
            EventKey::BallDrain,
            1000,
            EventHook::SaveDrain { save: self.id },
        ));

        if self.active_time > 0 && self.timer_start_events.is_empty() {
            self.timer_start(cx);
        }

        cx.events.post(Event::SaveEnabled { save: self.id });
    }

    /// Disarm the save and cancel its timers. Idempotent.
    pub fn disable(&mut self, cx: &mut Cx<'_>) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        debug!("ball save '{}': disabling", self.name);

        if let Some(key) = self.drain_key.take() {
            cx.bus.remove(key);
        }
        cx.delays.remove(&DelayKey::SaveDisable(self.id));
        cx.delays.remove(&DelayKey::SaveHurryUp(self.id));
        cx.delays.remove(&DelayKey::SaveGracePeriod(self.id));

        cx.events.post(Event::SaveDisabled { save: self.id });
    }

    /// Start the three save timers, for timed saves.
    pub fn timer_start(&mut self, cx: &mut Cx<'_>) {
        if self.active_time == 0 {
            return;
        }
        debug!(
            "ball save '{}': starting timer for {}ms",
            self.name, self.active_time
        );
        cx.delays.add(
            DelayKey::SaveDisable(self.id),
            cx.now.after(self.active_time + self.grace_period),
            DelayHook::SaveDisable { save: self.id },
        );
        cx.delays.add(
            DelayKey::SaveGracePeriod(self.id),
            cx.now.after(self.active_time),
            DelayHook::SaveGracePeriod { save: self.id },
        );
        cx.delays.add(
            DelayKey::SaveHurryUp(self.id),
            cx.now.after(self.active_time - self.hurry_up_time),
            DelayHook::SaveHurryUp { save: self.id },
        );
    }

    /// The hurry-up warning matured.
    pub fn hurry_up(&mut self, cx: &mut Cx<'_>) {
        debug!("ball save '{}': hurry up", self.name);
        cx.events.post(Event::SaveHurryUp { save: self.id });
    }

    /// The grace period started.
    pub fn grace_period(&mut self, cx: &mut Cx<'_>) {
        debug!("ball save '{}': grace period", self.name);
        cx.events.post(Event::SaveGracePeriod { save: self.id });
    }

    /// Relay handler for the drain event: swallow the drained balls and
    /// replace them, returning the count the relay continues with.
    pub fn drain(&mut self, balls: u32, cx: &mut Cx<'_>) -> u32 {
        if balls == 0 || !self.enabled {
            return balls;
        }
        if cx.balls_in_play == 0 {
            debug!(
                "ball save '{}': drain with no balls in play, discarding request",
                self.name
            );
            return balls;
        }

        debug!(
            "ball save '{}': ball(s) drained while active, requesting replacement \
             (auto launch: {})",
            self.name, self.auto_launch
        );
        cx.events.post(Event::SaveSavingBall {
            save: self.id,
            balls,
        });
        cx.events.post(Event::PlayfieldAddBall {
            playfield: self.source_playfield,
            balls,
            player_controlled: !self.auto_launch,
        });

        if !self.unlimited {
            self.saves_remaining -= balls as i32;
            debug!(
                "ball save '{}': saves remaining: {}",
                self.name, self.saves_remaining
            );
            if self.saves_remaining <= 0 {
                debug!(
                    "ball save '{}': no saves remaining, disabling",
                    self.name
                );
                self.disable(cx);
            }
        }

        0
    }
}

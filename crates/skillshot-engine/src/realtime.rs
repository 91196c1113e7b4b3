//! Realtime input pump: wall clock in, machine stimuli out.
//!
//! The machine itself is lockstep: time only moves when
//! [`advance_to`](crate::Machine::advance_to) is called. This runner
//! bridges it to the real world on a dedicated thread's loop: hardware
//! input events arrive on a crossbeam channel, and between arrivals the
//! runner sleeps exactly until the machine's next scheduled deadline,
//! mapping an injected [`Clock`] onto machine time. Dropping the sender
//! ends the loop.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::warn;
use skillshot_core::{Clock, MsTime};

use crate::machine::Machine;

/// How long to sleep when the machine has nothing scheduled.
const IDLE_POLL_MS: u64 = 50;

/// An external stimulus for the realtime runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    /// A debounced switch edge from the hardware layer.
    Switch {
        /// Configured switch name.
        name: String,
        /// The new state.
        active: bool,
    },
    /// A free-form named event (trigger events, confirmation events).
    Named {
        /// The event name.
        name: String,
    },
    /// Stop the runner.
    Shutdown,
}

/// Drives a powered-up [`Machine`] from a channel of input events and a
/// wall clock.
pub struct RealtimeRunner {
    machine: Machine,
    inputs: Receiver<InputEvent>,
    clock: Box<dyn Clock>,
}

impl RealtimeRunner {
    /// Wrap a powered-up machine. The machine's clock starts tracking
    /// `clock` from the runner's first iteration.
    pub fn new(machine: Machine, inputs: Receiver<InputEvent>, clock: Box<dyn Clock>) -> Self {
        Self {
            machine,
            inputs,
            clock,
        }
    }

    /// Run until [`InputEvent::Shutdown`] arrives or every sender is
    /// dropped. Returns the machine for inspection or reuse.
    pub fn run(mut self) -> Machine {
        loop {
            if let Err(err) = self.machine.advance_to(MsTime(self.clock.now_ms())) {
                warn!("realtime runner: {err}");
                return self.machine;
            }

            let now = self.clock.now_ms();
            let wait = match self.machine.next_deadline() {
                Some(deadline) => deadline.0.saturating_sub(now).max(1),
                None => IDLE_POLL_MS,
            };

            match self.inputs.recv_timeout(Duration::from_millis(wait)) {
                Ok(InputEvent::Switch { name, active }) => {
                    // Bring time up to date before applying the edge so
                    // settle delays are measured from arrival.
                    if let Err(err) = self
                        .machine
                        .advance_to(MsTime(self.clock.now_ms()))
                        .and_then(|()| self.machine.switch_event(&name, active))
                    {
                        warn!("realtime runner: switch '{name}': {err}");
                    }
                }
                Ok(InputEvent::Named { name }) => {
                    if let Err(err) = self.machine.post_named(&name) {
                        warn!("realtime runner: event '{name}': {err}");
                    }
                }
                Ok(InputEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    return self.machine;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}

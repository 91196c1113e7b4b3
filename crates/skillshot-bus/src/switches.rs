//! Debounced-switch state tracking and handler registrations.
//!
//! The external switch controller debounces raw GPIO and reports clean
//! edges. [`SwitchMonitor`] tracks how long each switch has been in its
//! current state, answers `is_active(ms)` / `is_inactive(ms)` queries, and
//! holds handler registrations of the form *(switch, edge-state,
//! settle-ms, hook)*: when a switch enters the registered state and stays
//! there for the registered time, the hook comes due. A bounce before the
//! settle time cancels the pending fire, which is what makes repeated
//! bouncing within the count delays produce no count changes at all.
//!
//! Handlers for the same edge fire in registration order.

use indexmap::IndexMap;
use skillshot_core::{HandlerId, MsTime, SwitchId};

#[derive(Clone, Copy, Debug)]
struct SwitchState {
    active: bool,
    since: MsTime,
    /// Seeded at power-up: the switch is treated as having been in its
    /// state arbitrarily long, so boot counts are immediately valid.
    boot_stable: bool,
}

struct Reg<H> {
    switch: SwitchId,
    state: bool,
    ms: u64,
    hook: H,
}

struct PendingFire {
    reg: HandlerId,
    deadline: MsTime,
    seq: u64,
}

/// Switch state, queries, and settle-timer registrations.
pub struct SwitchMonitor<H> {
    switches: Vec<SwitchState>,
    regs: IndexMap<HandlerId, Reg<H>>,
    pending: Vec<PendingFire>,
    next_id: u64,
    next_seq: u64,
}

impl<H: Clone> SwitchMonitor<H> {
    /// A monitor for `switch_count` switches, all initially inactive.
    pub fn new(switch_count: usize) -> Self {
        Self {
            switches: vec![
                SwitchState {
                    active: false,
                    since: MsTime(0),
                    boot_stable: true,
                };
                switch_count
            ],
            regs: IndexMap::new(),
            pending: Vec::new(),
            next_id: 0,
            next_seq: 0,
        }
    }

    /// Seed a switch's boot state. The state counts as settled for any
    /// query delay. Panics if `switch` is out of range.
    pub fn seed(&mut self, switch: SwitchId, active: bool) {
        let st = &mut self.switches[switch.0 as usize];
        st.active = active;
        st.boot_stable = true;
    }

    /// Register a handler: `hook` comes due whenever `switch` has been in
    /// `state` for `ms` milliseconds (immediately on the edge for 0).
    pub fn add(&mut self, switch: SwitchId, state: bool, ms: u64, hook: H) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.regs.insert(
            id,
            Reg {
                switch,
                state,
                ms,
                hook,
            },
        );
        id
    }

    /// Remove a registration and any pending fire it has scheduled.
    /// Idempotent; returns whether it was installed.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        self.pending.retain(|p| p.reg != id);
        self.regs.shift_remove(&id).is_some()
    }

    /// Record a debounced edge at `now` and return the hooks due
    /// immediately (registrations with `ms == 0`), in registration order.
    ///
    /// Registrations with a settle time are scheduled; a further edge on
    /// the same switch before they fire cancels them. A report matching
    /// the current state is ignored.
    pub fn on_edge(&mut self, switch: SwitchId, active: bool, now: MsTime) -> Vec<H> {
        let st = &mut self.switches[switch.0 as usize];
        if st.active == active {
            return Vec::new();
        }
        st.active = active;
        st.since = now;
        st.boot_stable = false;

        // The state changed: whatever was still settling is moot.
        let regs = &self.regs;
        self.pending
            .retain(|p| regs.get(&p.reg).map(|r| r.switch) != Some(switch));

        let mut immediate = Vec::new();
        let mut scheduled = Vec::new();
        for (id, reg) in &self.regs {
            if reg.switch != switch || reg.state != active {
                continue;
            }
            if reg.ms == 0 {
                immediate.push(reg.hook.clone());
            } else {
                scheduled.push(PendingFire {
                    reg: *id,
                    deadline: now.after(reg.ms),
                    seq: 0,
                });
            }
        }
        for mut p in scheduled {
            p.seq = self.next_seq;
            self.next_seq += 1;
            self.pending.push(p);
        }
        immediate
    }

    /// The earliest pending settle deadline, if any.
    pub fn next_deadline(&self) -> Option<MsTime> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    /// Remove and return the hooks of every settle timer due at or before
    /// `now`, in `(deadline, registration)` order.
    pub fn take_due(&mut self, now: MsTime) -> Vec<H> {
        let mut due: Vec<PendingFire> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline <= now {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.deadline.cmp(&b.deadline).then(a.seq.cmp(&b.seq)));
        due.iter()
            .filter_map(|p| self.regs.get(&p.reg).map(|r| r.hook.clone()))
            .collect()
    }

    /// Whether `switch` is active and has been for at least `ms`.
    pub fn is_active(&self, switch: SwitchId, ms: u64, now: MsTime) -> bool {
        let st = &self.switches[switch.0 as usize];
        st.active && (st.boot_stable || now.since(st.since) >= ms)
    }

    /// Whether `switch` is inactive and has been for at least `ms`.
    pub fn is_inactive(&self, switch: SwitchId, ms: u64, now: MsTime) -> bool {
        let st = &self.switches[switch.0 as usize];
        !st.active && (st.boot_stable || now.since(st.since) >= ms)
    }

    /// The raw current state of `switch`.
    pub fn state(&self, switch: SwitchId) -> bool {
        self.switches[switch.0 as usize].active
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Whether no registrations exist.
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }
}

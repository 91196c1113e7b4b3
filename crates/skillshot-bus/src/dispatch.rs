//! Priority-ordered event subscriptions and the pending-event queue.
//!
//! [`Dispatcher`] holds subscriptions keyed by [`EventKey`]; the machine
//! asks it for a snapshot of the handlers interested in an event and runs
//! the hooks itself. Snapshots are taken before any hook runs, so handlers
//! installed or removed mid-delivery affect only later events.
//!
//! [`EventQueue`] is the FIFO of posted-but-undelivered events. Three
//! delivery modes exist:
//!
//! - **Fire**: deliver to handlers, done.
//! - **Queued**: deliver to handlers, then run a post-commit hook. Used
//!   for eject attempts so the coil fires only after all same-drain
//!   bookkeeping has been delivered.
//! - **Relay**: deliver in descending priority with a mutable ball-count
//!   accumulator; the post-relay hook receives whatever is left.

use std::collections::VecDeque;

use indexmap::IndexMap;
use skillshot_core::{Event, EventKey, HandlerId};

// ── Dispatcher ─────────────────────────────────────────────────────

struct Entry<H> {
    id: HandlerId,
    priority: u32,
    seq: u64,
    hook: H,
}

/// Subscription table: event key → priority-ordered handler hooks.
///
/// Handlers with equal priority fire in installation order. Removal is by
/// [`HandlerId`], never by hook identity.
pub struct Dispatcher<H> {
    handlers: IndexMap<EventKey, Vec<Entry<H>>>,
    next_id: u64,
    next_seq: u64,
}

impl<H: Clone> Dispatcher<H> {
    /// An empty subscription table.
    pub fn new() -> Self {
        Self {
            handlers: IndexMap::new(),
            next_id: 0,
            next_seq: 0,
        }
    }

    /// Install a handler for `key` at `priority` (higher fires first).
    pub fn add(&mut self, key: EventKey, priority: u32, hook: H) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.handlers.entry(key).or_default().push(Entry {
            id,
            priority,
            seq,
            hook,
        });
        id
    }

    /// Remove one handler. Idempotent; returns whether it was installed.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        for entries in self.handlers.values_mut() {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove a batch of handlers by key.
    pub fn remove_keys(&mut self, ids: &[HandlerId]) {
        for id in ids {
            self.remove(*id);
        }
    }

    /// Snapshot the handlers for `key`, highest priority first, stable by
    /// installation order within a priority.
    pub fn snapshot(&self, key: &EventKey) -> Vec<(HandlerId, H)> {
        let Some(entries) = self.handlers.get(key) else {
            return Vec::new();
        };
        let mut ordered: Vec<&Entry<H>> = entries.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        ordered.into_iter().map(|e| (e.id, e.hook.clone())).collect()
    }

    /// Total installed handlers, across all keys.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Whether no handlers are installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: Clone> Default for Dispatcher<H> {
    fn default() -> Self {
        Self::new()
    }
}

// ── EventQueue ─────────────────────────────────────────────────────

/// How a pending event is delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery<A> {
    /// Fire-and-forget.
    Fire,
    /// Deliver, then run the post-commit hook.
    Queued {
        /// Hook to run after delivery completes.
        after: A,
    },
    /// Deliver in priority order with a mutable ball accumulator, then
    /// hand the remainder to the post-relay hook.
    Relay {
        /// Hook receiving the post-relay ball count.
        after: A,
    },
}

/// An event waiting in the queue with its delivery mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pending<A> {
    /// The event to deliver.
    pub event: Event,
    /// Its delivery mode.
    pub delivery: Delivery<A>,
}

/// FIFO of posted-but-undelivered events.
///
/// Posts made while the machine is draining land at the back and are
/// delivered in the same drain, preserving post order machine-wide.
pub struct EventQueue<A> {
    queue: VecDeque<Pending<A>>,
}

impl<A> EventQueue<A> {
    /// An empty queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Post a fire-and-forget event.
    pub fn post(&mut self, event: Event) {
        self.queue.push_back(Pending {
            event,
            delivery: Delivery::Fire,
        });
    }

    /// Post an event whose `after` hook runs once delivery completes.
    pub fn post_queue(&mut self, event: Event, after: A) {
        self.queue.push_back(Pending {
            event,
            delivery: Delivery::Queued { after },
        });
    }

    /// Post a relay event; `after` receives the unclaimed ball count.
    pub fn post_relay(&mut self, event: Event, after: A) {
        self.queue.push_back(Pending {
            event,
            delivery: Delivery::Relay { after },
        });
    }

    /// Take the next pending event, oldest first.
    pub fn pop(&mut self) -> Option<Pending<A>> {
        self.queue.pop_front()
    }

    /// Number of undelivered events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<A> Default for EventQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

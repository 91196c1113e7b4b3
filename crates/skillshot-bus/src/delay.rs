//! Named delay scheduling.
//!
//! A small keyed scheduler: every delay has a caller-chosen key, adding
//! under an existing key replaces the previous delay, and removal by key
//! is idempotent. This is what lets `stop()` and confirmation cancellation
//! tear down in-flight timers without tracking tokens.

use skillshot_core::MsTime;

struct Entry<K, H> {
    key: K,
    at: MsTime,
    seq: u64,
    hook: H,
}

/// Keyed one-shot delay scheduler.
///
/// Deadlines are absolute [`MsTime`] instants. Due entries are handed out
/// in `(deadline, insertion)` order so same-instant delays fire in the
/// order they were scheduled.
pub struct DelayManager<K, H> {
    entries: Vec<Entry<K, H>>,
    next_seq: u64,
}

impl<K: PartialEq + Clone, H> DelayManager<K, H> {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Schedule `hook` to fire at `at`, replacing any delay already
    /// scheduled under `key`.
    pub fn add(&mut self, key: K, at: MsTime, hook: H) {
        self.remove(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { key, at, seq, hook });
    }

    /// Cancel the delay under `key`. Idempotent; returns whether one was
    /// scheduled.
    pub fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| &e.key == key) {
            self.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Whether a delay is currently scheduled under `key`.
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.entries.iter().any(|e| &e.key == key)
    }

    /// The earliest scheduled deadline, if any.
    pub fn next_deadline(&self) -> Option<MsTime> {
        self.entries.iter().map(|e| e.at).min()
    }

    /// Remove and return every delay due at or before `now`, in
    /// `(deadline, insertion)` order.
    pub fn take_due(&mut self, now: MsTime) -> Vec<(K, H)> {
        let mut due: Vec<Entry<K, H>> = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].at <= now {
                due.push(self.entries.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.at.cmp(&b.at).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|e| (e.key, e.hook)).collect()
    }

    /// Number of scheduled delays.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq + Clone, H> Default for DelayManager<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

//! Consumed hardware abstractions.
//!
//! The coordination core never talks to hardware directly; it drives coils
//! through [`DriverBank`] and, in realtime mode, reads wall time through
//! [`Clock`]. Both are injected at construction so tests can substitute
//! recording and manual implementations.

/// Coil driver operations, addressed by [`CoilId`](crate::CoilId).
///
/// Eject coils are pulsed; hold coils are enabled to retain a ball and
/// disabled to release it. Implementations must not block.
pub trait DriverBank {
    /// Fire a single timed pulse on a coil.
    fn pulse(&mut self, coil: crate::CoilId);
    /// Energize a coil continuously.
    fn enable(&mut self, coil: crate::CoilId);
    /// De-energize a coil.
    fn disable(&mut self, coil: crate::CoilId);
}

/// Monotonic wall-clock source for the realtime runner.
///
/// Lockstep operation never consults a clock; time is advanced explicitly.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: std::time::Instant,
}

impl SystemClock {
    /// A clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

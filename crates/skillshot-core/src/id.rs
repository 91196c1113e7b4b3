//! Strongly-typed identifiers and the [`MsTime`] time axis.

use std::fmt;

/// Identifies a ball device within a machine.
///
/// Devices are registered at machine construction and assigned sequential
/// IDs. `DeviceId(n)` corresponds to the n-th configured device (playfields
/// included; they are degenerate registry entries).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a switch within a machine.
///
/// Switch names from the configuration are interned into sequential IDs
/// when the machine is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SwitchId(pub u32);

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SwitchId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a coil (eject or hold driver) within a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoilId(pub u32);

impl fmt::Display for CoilId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CoilId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a ball-save adjunct within a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaveId(pub u32);

impl fmt::Display for SaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SaveId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Key for an installed event or switch handler.
///
/// Allocated from a per-dispatcher monotonic counter. Removal is by key,
/// never by callback identity, so cancellation is always unambiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for HandlerId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// A point on the machine's monotonic millisecond clock.
///
/// Lockstep mode advances this explicitly; the realtime runner maps an
/// injected wall clock onto it. Durations are plain `u64` milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MsTime(pub u64);

impl MsTime {
    /// The instant `ms` milliseconds after this one.
    pub fn after(self, ms: u64) -> MsTime {
        MsTime(self.0 + ms)
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn since(self, earlier: MsTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for MsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for MsTime {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mstime_after_and_since() {
        let t = MsTime(100);
        assert_eq!(t.after(50), MsTime(150));
        assert_eq!(MsTime(150).since(t), 50);
        assert_eq!(t.since(MsTime(150)), 0);
    }

    #[test]
    fn ids_display_as_raw_numbers() {
        assert_eq!(DeviceId(3).to_string(), "3");
        assert_eq!(MsTime(250).to_string(), "250ms");
    }
}

//! Device ownership and name resolution.
//!
//! The registry owns every [`BallDevice`] (playfields included, as
//! degenerate entries); devices refer to each other exclusively through
//! [`DeviceId`] indices assigned here. [`DeviceRegistry::split_mut`] is
//! the aliasing seam: it hands out one device mutably together with a
//! read-only view of all its peers, which is exactly what the eject
//! protocol needs (a source mutates itself while peeking at a target's
//! capacity).

use indexmap::IndexMap;
use skillshot_core::{CoilId, ConfigError, DeviceId, MachineConfig, SwitchId};

use crate::device::BallDevice;

/// A registry plus the switch/coil name tables produced while building it.
pub struct BuiltRegistry {
    /// The device registry.
    pub devices: DeviceRegistry,
    /// Switch name → interned ID, in first-reference order.
    pub switch_ids: IndexMap<String, SwitchId>,
    /// Coil name → interned ID, in first-reference order.
    pub coil_ids: IndexMap<String, CoilId>,
}

/// Owns all ball devices and maps names to IDs.
pub struct DeviceRegistry {
    devices: Vec<BallDevice>,
    by_name: IndexMap<String, DeviceId>,
}

/// Read-only view of every device except the one borrowed mutably.
///
/// Produced by [`DeviceRegistry::split_mut`]; `get` on the excluded ID
/// returns `None`.
pub struct PeerDevices<'a> {
    before: &'a [BallDevice],
    after: &'a [BallDevice],
}

impl<'a> PeerDevices<'a> {
    /// Look up a peer. `None` for the excluded device or an unknown ID.
    pub fn get(&self, id: DeviceId) -> Option<&'a BallDevice> {
        let idx = id.0 as usize;
        if idx < self.before.len() {
            return Some(&self.before[idx]);
        }
        let rel = idx - self.before.len();
        if rel == 0 {
            // The excluded device itself.
            None
        } else {
            // Index 0 of `after` is the excluded device's successor.
            self.after.get(rel - 1)
        }
    }

    /// An empty peer view, for contexts with a single device.
    pub fn empty() -> PeerDevices<'static> {
        PeerDevices {
            before: &[],
            after: &[],
        }
    }
}

impl DeviceRegistry {
    /// Build the registry from a validated configuration.
    ///
    /// Interns every referenced switch and coil name, resolves device and
    /// playfield names to IDs, and parses all duration strings. Call
    /// [`MachineConfig::validate`] first; resolution errors here mirror
    /// validation errors for configs that skipped it.
    pub fn build(config: &MachineConfig) -> Result<BuiltRegistry, ConfigError> {
        config.validate()?;

        let mut by_name: IndexMap<String, DeviceId> = IndexMap::new();
        for dev in &config.devices {
            let id = DeviceId(by_name.len() as u32);
            by_name.insert(dev.name.clone(), id);
        }
        for pf in &config.playfields {
            let id = DeviceId(by_name.len() as u32);
            by_name.insert(pf.name.clone(), id);
        }

        let mut switch_ids: IndexMap<String, SwitchId> = IndexMap::new();
        let mut coil_ids: IndexMap<String, CoilId> = IndexMap::new();
        let intern_switch = |name: &str, table: &mut IndexMap<String, SwitchId>| {
            if let Some(id) = table.get(name) {
                *id
            } else {
                let id = SwitchId(table.len() as u32);
                table.insert(name.to_string(), id);
                id
            }
        };
        let intern_coil = |name: &str, table: &mut IndexMap<String, CoilId>| {
            if let Some(id) = table.get(name) {
                *id
            } else {
                let id = CoilId(table.len() as u32);
                table.insert(name.to_string(), id);
                id
            }
        };

        let mut devices = Vec::with_capacity(by_name.len());
        for dev in &config.devices {
            let id = by_name[&dev.name];
            devices.push(BallDevice::from_config(
                id,
                dev,
                &by_name,
                &mut |n| intern_switch(n, &mut switch_ids),
                &mut |n| intern_coil(n, &mut coil_ids),
            )?);
        }
        for pf in &config.playfields {
            let id = by_name[&pf.name];
            devices.push(BallDevice::playfield(id, pf));
        }

        Ok(BuiltRegistry {
            devices: DeviceRegistry { devices, by_name },
            switch_ids,
            coil_ids,
        })
    }

    /// Look up a device ID by configured name.
    pub fn lookup(&self, name: &str) -> Option<DeviceId> {
        self.by_name.get(name).copied()
    }

    /// The configured name of a device.
    pub fn name(&self, id: DeviceId) -> &str {
        &self.devices[id.0 as usize].name
    }

    /// Shared access to one device.
    pub fn device(&self, id: DeviceId) -> &BallDevice {
        &self.devices[id.0 as usize]
    }

    /// Exclusive access to one device.
    pub fn device_mut(&mut self, id: DeviceId) -> &mut BallDevice {
        &mut self.devices[id.0 as usize]
    }

    /// Borrow one device mutably and every other device immutably.
    pub fn split_mut(&mut self, id: DeviceId) -> (&mut BallDevice, PeerDevices<'_>) {
        let idx = id.0 as usize;
        let (before, rest) = self.devices.split_at_mut(idx);
        let (dev, after) = rest.split_first_mut().expect("device id in range");
        (dev, PeerDevices { before, after })
    }

    /// Iterate all devices in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BallDevice> {
        self.devices.iter()
    }

    /// Number of registered devices (playfields included).
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty. Never true for a built machine.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillshot_core::{DeviceConfig, PlayfieldConfig};

    fn two_device_config() -> MachineConfig {
        MachineConfig {
            devices: vec![
                DeviceConfig {
                    name: "trough".to_string(),
                    ball_switches: vec!["trough_1".to_string(), "trough_2".to_string()],
                    eject_coil: Some("trough_eject".to_string()),
                    eject_targets: vec!["plunger".to_string()],
                    tags: vec!["trough".to_string()],
                    ..DeviceConfig::default()
                },
                DeviceConfig {
                    name: "plunger".to_string(),
                    ball_switches: vec!["plunger_ball".to_string()],
                    mechanical_eject: true,
                    eject_targets: vec!["playfield".to_string()],
                    ..DeviceConfig::default()
                },
            ],
            playfields: vec![PlayfieldConfig::default()],
            ball_saves: Vec::new(),
        }
    }

    #[test]
    fn build_assigns_sequential_ids() {
        let built = DeviceRegistry::build(&two_device_config()).unwrap();
        let reg = built.devices;
        assert_eq!(reg.lookup("trough"), Some(DeviceId(0)));
        assert_eq!(reg.lookup("plunger"), Some(DeviceId(1)));
        assert_eq!(reg.lookup("playfield"), Some(DeviceId(2)));
        assert_eq!(reg.lookup("vuk"), None);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn build_interns_switches_in_reference_order() {
        let built = DeviceRegistry::build(&two_device_config()).unwrap();
        assert_eq!(built.switch_ids.get("trough_1"), Some(&SwitchId(0)));
        assert_eq!(built.switch_ids.get("trough_2"), Some(&SwitchId(1)));
        assert_eq!(built.switch_ids.get("plunger_ball"), Some(&SwitchId(2)));
        assert_eq!(built.coil_ids.get("trough_eject"), Some(&CoilId(0)));
    }

    #[test]
    fn split_mut_excludes_self_and_sees_peers() {
        let built = DeviceRegistry::build(&two_device_config()).unwrap();
        let mut reg = built.devices;
        let (dev, peers) = reg.split_mut(DeviceId(1));
        assert_eq!(dev.name(), "plunger");
        assert!(peers.get(DeviceId(1)).is_none());
        assert_eq!(peers.get(DeviceId(0)).unwrap().name(), "trough");
        assert_eq!(peers.get(DeviceId(2)).unwrap().name(), "playfield");
        assert!(peers.get(DeviceId(9)).is_none());
    }

    #[test]
    fn playfield_entries_are_flagged() {
        let built = DeviceRegistry::build(&two_device_config()).unwrap();
        assert!(built.devices.device(DeviceId(2)).is_playfield());
        assert!(!built.devices.device(DeviceId(0)).is_playfield());
    }
}

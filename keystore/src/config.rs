// Licensed under the Apache-2.0 license

/// Slots reserved by the key store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmuConfig {
    /// Slot holding the provisioning transaction marker.
    pub provisioning_slot: u32,
    /// Two consecutive slots whose content is pushed over protected RAM to
    /// invalidate the last PROTECTED key used.
    pub protected_ram_invalidation_slots: [u32; 2],
}

impl Default for KmuConfig {
    fn default() -> Self {
        Self {
            provisioning_slot: 186,
            protected_ram_invalidation_slots: [248, 249],
        }
    }
}

impl KmuConfig {
    pub fn is_invalidation_slot(&self, slot: u32) -> bool {
        self.protected_ram_invalidation_slots.contains(&slot)
    }
}

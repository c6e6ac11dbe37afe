/*++

Licensed under the Apache-2.0 license.

File Name:

    kmu.rs

Abstract:

    File contains the emulation of the KMU key slot array.

--*/

use kmu_keystore::hw::{
    KmuHardware, KmuHwError, PushRegion, RevocationPolicy, SlotDestination, SlotSource,
    PROTECTED_RAM_SIZE, SEED_SIZE, SLOT_COUNT, SLOT_SIZE,
};
use log::debug;

/// Content of a provisioned slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProvisionedSlot {
    pub metadata: u32,
    pub value: [u8; SLOT_SIZE],
    pub rpolicy: RevocationPolicy,
    pub dest: SlotDestination,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Provisioned(ProvisionedSlot),
    /// Revoked under the REVOKED policy: unreadable and never reusable.
    Revoked,
}

/// Host model of the KMU slots and of the memories they are pushed to.
pub struct EmulatedKmu {
    slots: Vec<SlotState>,
    blocked: Vec<bool>,
    protected_ram: [u8; PROTECTED_RAM_SIZE],
    seed: [u8; SEED_SIZE],
    provision_fault: Option<u32>,
    write_count: usize,
}

impl Default for EmulatedKmu {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedKmu {
    pub fn new() -> Self {
        Self {
            slots: vec![SlotState::Empty; SLOT_COUNT as usize],
            blocked: vec![false; SLOT_COUNT as usize],
            protected_ram: [0; PROTECTED_RAM_SIZE],
            seed: [0; SEED_SIZE],
            provision_fault: None,
            write_count: 0,
        }
    }

    pub fn slot(&self, slot: u32) -> Option<&SlotState> {
        self.slots.get(slot as usize)
    }

    /// Makes the next write to `slot` fail. The fault fires once.
    pub fn fail_provision_at(&mut self, slot: u32) {
        self.provision_fault = Some(slot);
    }

    /// Flips one bit of the stored value of `slot`. Returns false if the slot
    /// holds no value.
    pub fn flip_value_bit(&mut self, slot: u32, byte: usize, bit: u8) -> bool {
        match self.slots.get_mut(slot as usize) {
            Some(SlotState::Provisioned(provisioned)) if byte < SLOT_SIZE && bit < 8 => {
                provisioned.value[byte] ^= 1 << bit;
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> Vec<SlotState> {
        self.slots.clone()
    }

    /// Number of slot writes and revocations that took effect.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    pub fn is_blocked(&self, slot: u32) -> bool {
        self.blocked.get(slot as usize).copied().unwrap_or(false)
    }

    pub fn protected_ram(&self) -> &[u8; PROTECTED_RAM_SIZE] {
        &self.protected_ram
    }

    pub fn seed(&self) -> &[u8; SEED_SIZE] {
        &self.seed
    }

    /// Device reset: blocks are lifted and volatile memories cleared. Slot
    /// contents survive.
    pub fn reset(&mut self) {
        self.blocked.fill(false);
        self.protected_ram = [0; PROTECTED_RAM_SIZE];
        self.seed = [0; SEED_SIZE];
        self.provision_fault = None;
    }

    fn region_len(region: PushRegion) -> Option<usize> {
        match region {
            PushRegion::PushArea => None,
            PushRegion::ProtectedRam => Some(PROTECTED_RAM_SIZE),
            PushRegion::Seed => Some(SEED_SIZE),
        }
    }
}

impl KmuHardware for EmulatedKmu {
    fn is_slot_empty(&self, slot: u32) -> bool {
        matches!(self.slot(slot), Some(SlotState::Empty))
    }

    fn read_metadata(&self, slot: u32) -> Result<u32, KmuHwError> {
        match self.slot(slot) {
            Some(SlotState::Provisioned(provisioned)) => Ok(provisioned.metadata),
            Some(SlotState::Revoked) => Err(KmuHwError::Revoked),
            _ => Err(KmuHwError::Error),
        }
    }

    fn provision_slot(&mut self, slot: u32, source: &SlotSource) -> Result<(), KmuHwError> {
        if self.provision_fault == Some(slot) {
            self.provision_fault = None;
            debug!("emulated kmu: injected fault on slot {}", slot);
            return Err(KmuHwError::Error);
        }
        if self.is_blocked(slot) || !self.is_slot_empty(slot) {
            return Err(KmuHwError::Error);
        }
        let fits = match Self::region_len(source.dest.region) {
            Some(len) => source.dest.offset + SLOT_SIZE <= len,
            None => true,
        };
        if !fits {
            return Err(KmuHwError::Error);
        }

        self.slots[slot as usize] = SlotState::Provisioned(ProvisionedSlot {
            metadata: source.metadata,
            value: source.value,
            rpolicy: source.rpolicy,
            dest: source.dest,
        });
        self.write_count += 1;
        debug!("emulated kmu: provisioned slot {}", slot);
        Ok(())
    }

    fn revoke_slot(&mut self, slot: u32) -> Result<(), KmuHwError> {
        if self.is_blocked(slot) {
            return Err(KmuHwError::Error);
        }
        let next = match self.slot(slot) {
            Some(SlotState::Provisioned(provisioned)) => match provisioned.rpolicy {
                RevocationPolicy::Rotating => SlotState::Empty,
                RevocationPolicy::Revoked => SlotState::Revoked,
                RevocationPolicy::Locked => return Err(KmuHwError::Error),
            },
            // Revoking twice leaves the slot revoked.
            Some(SlotState::Revoked) => return Ok(()),
            _ => return Err(KmuHwError::Error),
        };
        self.slots[slot as usize] = next;
        self.write_count += 1;
        debug!("emulated kmu: revoked slot {}", slot);
        Ok(())
    }

    fn push_slot(&mut self, slot: u32, push_area: &mut [u8]) -> Result<(), KmuHwError> {
        if self.is_blocked(slot) {
            return Err(KmuHwError::Error);
        }
        let Some(SlotState::Provisioned(provisioned)) = self.slot(slot).copied() else {
            return Err(KmuHwError::Error);
        };
        let offset = provisioned.dest.offset;
        let target = match provisioned.dest.region {
            PushRegion::PushArea => push_area.get_mut(offset..offset + SLOT_SIZE),
            PushRegion::ProtectedRam => self.protected_ram.get_mut(offset..offset + SLOT_SIZE),
            PushRegion::Seed => self.seed.get_mut(offset..offset + SLOT_SIZE),
        };
        target
            .ok_or(KmuHwError::Error)?
            .copy_from_slice(&provisioned.value);
        Ok(())
    }

    fn block_slot_range(&mut self, slot: u32, count: u32) -> Result<(), KmuHwError> {
        let end = slot.checked_add(count).ok_or(KmuHwError::Error)?;
        if end > SLOT_COUNT {
            return Err(KmuHwError::Error);
        }
        self.blocked[slot as usize..end as usize].fill(true);
        debug!("emulated kmu: blocked slots {}..{}", slot, end);
        Ok(())
    }
}

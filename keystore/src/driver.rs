// Licensed under the Apache-2.0 license

use crate::config::KmuConfig;
use crate::crypto::KmuCrypto;
use crate::error::{KmuError, KmuResult};
use crate::hw::{KmuHardware, KmuHwError, SLOT_COUNT};
use crate::metadata::SECONDARY_SLOT_SENTINEL;
use crate::push_area::PushArea;
use crate::wal::{ProvisioningLog, SlotRange};
use log::error;

/// Key store over the KMU slots.
///
/// All entry points take `&mut self`: the push area and the provisioning marker
/// are single resources, so calls are serialized by ownership of the driver.
pub struct Kmu<H: KmuHardware, C: KmuCrypto> {
    pub(crate) hw: H,
    pub(crate) crypto: C,
    pub(crate) config: KmuConfig,
    pub(crate) log: ProvisioningLog,
    pub(crate) push_area: PushArea,
}

impl<H: KmuHardware, C: KmuCrypto> Kmu<H, C> {
    pub fn new(hw: H, crypto: C, config: Option<KmuConfig>) -> Self {
        let config = config.unwrap_or_default();
        Self {
            hw,
            crypto,
            log: ProvisioningLog::new(config.provisioning_slot),
            config,
            push_area: PushArea::new(),
        }
    }

    pub fn config(&self) -> &KmuConfig {
        &self.config
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn into_parts(self) -> (H, C) {
        (self.hw, self.crypto)
    }

    pub fn push_area_is_clear(&self) -> bool {
        self.push_area.is_clear()
    }

    /// Rolls back a provisioning or destroy interrupted by a reset.
    ///
    /// Returns the range that was revoked, `None` if nothing was pending.
    pub fn clean_up_unfinished_provisioning(&mut self) -> KmuResult<Option<SlotRange>> {
        self.log.recover(&mut self.hw)
    }

    /// Metadata word of the primary slot of a key.
    pub(crate) fn read_primary_metadata(&self, slot: u32) -> KmuResult<u32> {
        if slot >= SLOT_COUNT {
            return Err(KmuError::DoesNotExist);
        }
        match self.hw.read_metadata(slot) {
            Ok(SECONDARY_SLOT_SENTINEL) => Err(KmuError::DoesNotExist),
            Ok(word) => Ok(word),
            Err(KmuHwError::Revoked) => Err(KmuError::NotPermitted),
            Err(KmuHwError::Error) => Err(KmuError::DoesNotExist),
        }
    }
}

/// Overwrites protected RAM with the content of the invalidation slots.
pub(crate) fn push_invalidation_slots<H: KmuHardware>(
    hw: &mut H,
    slots: [u32; 2],
) -> KmuResult<()> {
    if slots.iter().any(|slot| hw.is_slot_empty(*slot)) {
        error!("kmu: protected RAM invalidation slots are not provisioned");
        return Err(KmuError::HardwareFailure);
    }
    for slot in slots {
        // Invalidation slots target protected RAM and never touch the push area.
        hw.push_slot(slot, &mut []).map_err(|_| {
            error!("kmu: failed to push invalidation slot {}", slot);
            KmuError::HardwareFailure
        })?;
    }
    Ok(())
}

// Licensed under the Apache-2.0 license

use crate::crypto::KmuCrypto;
use crate::driver::Kmu;
use crate::error::{KmuError, KmuResult};
use crate::hw::{KmuHardware, RevocationPolicy};
use crate::metadata::{KeyUsageScheme, KmuMetadata};
use crate::opaque::OpaqueKey;
use crate::psa::KeyAttributes;
use crate::wal::SlotRange;
use log::{debug, error, info, warn};

impl<H: KmuHardware, C: KmuCrypto> Kmu<H, C> {
    fn key_range(&self, attributes: &KeyAttributes) -> KmuResult<(KmuMetadata, SlotRange)> {
        let slot = attributes.id.kmu_slot();
        let metadata = KmuMetadata::unpack(self.read_primary_metadata(slot)?)?;
        // The span follows the stored key type, not the one the caller passed.
        let key_type = metadata.to_attributes(slot)?.key_type;
        let count = metadata.slot_count(key_type)?;
        Ok((metadata, SlotRange::new(slot, count)))
    }

    /// Revokes every slot of a key.
    ///
    /// The revocation runs under a transaction marker like a provisioning: a
    /// reset halfway is completed by the next call.
    ///
    /// The caller must own the push area: every slot is pushed first, as a
    /// blocked slot can only be told apart from a failing one this way.
    pub fn destroy(&mut self, attributes: &KeyAttributes) -> KmuResult<()> {
        if !attributes.lifetime.is_kmu() {
            return Err(KmuError::DoesNotExist);
        }
        if attributes.lifetime.persistence.is_read_only() {
            return Err(KmuError::NotPermitted);
        }

        self.clean_up_unfinished_provisioning()?;

        let (metadata, range) = self.key_range(attributes)?;
        if metadata.rpolicy == RevocationPolicy::Locked {
            return Err(KmuError::NotPermitted);
        }

        {
            let mut area = self.push_area.acquire();
            for slot in range.slots() {
                if self.hw.push_slot(slot, &mut area).is_err() {
                    warn!("kmu: slot {} is blocked", slot);
                    return Err(KmuError::NotPermitted);
                }
            }
        }

        // The key type is not trusted here: clean as PROTECTED, which covers both regions.
        let key = OpaqueKey {
            scheme: KeyUsageScheme::Protected,
            number_of_slots: range.count,
            slot_id: range.first,
        };
        if let Err(err) = self.clean_key(&key) {
            debug!("kmu: protected RAM not invalidated: {}", err);
        }

        self.log.begin(&mut self.hw, range)?;
        self.clean_up_unfinished_provisioning()?;
        info!("kmu: destroyed key in slots {:?}", range.slots());
        Ok(())
    }

    /// Blocks the slots of a key until the next reset.
    pub fn block(&mut self, attributes: &KeyAttributes) -> KmuResult<()> {
        let (_, range) = self.key_range(attributes)?;
        self.hw
            .block_slot_range(range.first, range.count)
            .map_err(|_| {
                error!("kmu: failed to block slots {:?}", range.slots());
                KmuError::GenericError
            })?;
        info!("kmu: blocked slots {:?}", range.slots());
        Ok(())
    }
}

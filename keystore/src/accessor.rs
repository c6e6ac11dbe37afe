// Licensed under the Apache-2.0 license

//! Read side of the key store: resolving keys and staging their material.

use crate::crypto::KmuCrypto;
use crate::driver::{push_invalidation_slots, Kmu};
use crate::encrypted;
use crate::error::{KmuError, KmuResult};
use crate::hw::{KmuHardware, RevocationPolicy, SLOT_COUNT, SLOT_SIZE};
use crate::metadata::{KeyUsageScheme, KmuMetadata, MetadataWord};
use crate::opaque::OpaqueKey;
use crate::provision::ECC_PUBKEY_UNCOMPRESSED;
use crate::psa::{EccFamily, KeyAttributes, KeyId, KeyType, KeyUsage, Lifetime};
use crate::push_area::{PushAreaGuard, PUSH_AREA_SIZE};
use log::{debug, error};

/// A key resolved from its primary slot. The key material is not read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltinKey {
    pub attributes: KeyAttributes,
    pub handle: OpaqueKey,
}

impl BuiltinKey {
    fn is_secp_r1_public_key(&self) -> bool {
        self.attributes.key_type == KeyType::EccPublicKey(EccFamily::SecpR1)
    }

    /// Length of the key material as stored, without the point indicator.
    fn stored_len(&self) -> usize {
        if self.is_secp_r1_public_key() {
            2 * self.attributes.key_bytes()
        } else {
            self.attributes.key_bytes()
        }
    }

    /// Length of the key in PSA export format.
    pub fn export_len(&self) -> usize {
        self.stored_len() + usize::from(self.is_secp_r1_public_key())
    }
}

/// Key material staged for one crypto operation.
///
/// RAW and ENCRYPTED keys are readable through [`StagedKey::material`]; PROTECTED
/// keys sit in protected RAM and expose nothing. Dropping the guard zeroes the
/// push area and, for PROTECTED keys, overwrites protected RAM. Use
/// [`StagedKey::finish`] to observe a failure of that cleanup.
pub struct StagedKey<'a, H: KmuHardware> {
    hw: &'a mut H,
    area: PushAreaGuard<'a>,
    key: OpaqueKey,
    invalidation_slots: [u32; 2],
    len: usize,
    cleaned: bool,
}

impl<H: KmuHardware> StagedKey<'_, H> {
    pub fn key(&self) -> &OpaqueKey {
        &self.key
    }

    pub fn material(&self) -> &[u8] {
        &self.area[..self.len]
    }

    pub fn finish(mut self) -> KmuResult<()> {
        self.clean()
    }

    fn push_slots(&mut self) -> KmuResult<()> {
        for slot in self.key.slots() {
            self.hw.push_slot(slot, &mut self.area).map_err(|_| {
                error!("kmu: failed to push slot {}", slot);
                KmuError::HardwareFailure
            })?;
        }
        Ok(())
    }

    fn clean(&mut self) -> KmuResult<()> {
        if self.cleaned {
            return Ok(());
        }
        self.cleaned = true;
        self.len = 0;
        self.area.clear();
        if self.key.scheme == KeyUsageScheme::Protected {
            push_invalidation_slots(&mut *self.hw, self.invalidation_slots)?;
        }
        Ok(())
    }
}

impl<H: KmuHardware> Drop for StagedKey<'_, H> {
    fn drop(&mut self) {
        if let Err(err) = self.clean() {
            error!("kmu: failed to clean staged key: {}", err);
        }
    }
}

impl<H: KmuHardware, C: KmuCrypto> Kmu<H, C> {
    /// Lifetime and slot of a KMU key id. No rollback check is performed.
    pub fn get_key_slot(&self, id: KeyId) -> KmuResult<(Lifetime, u32)> {
        let slot = id.kmu_slot();
        let word = MetadataWord(self.read_primary_metadata(slot)?);
        let rpolicy =
            RevocationPolicy::try_from(word.rpolicy()).map_err(|_| KmuError::InvalidArgument)?;
        Ok((Lifetime::kmu(rpolicy.persistence()), slot))
    }

    /// Resolves the key whose primary slot is `slot`.
    pub fn get_builtin_key(&mut self, slot: u32) -> KmuResult<BuiltinKey> {
        self.clean_up_unfinished_provisioning()?;

        let word = self.read_primary_metadata(slot)?;
        // The invalidation slots hold no usable key.
        if self.config.is_invalidation_slot(slot) {
            return Err(KmuError::InvalidArgument);
        }

        let metadata = KmuMetadata::unpack(word)?;
        let attributes = metadata.to_attributes(slot)?;
        let handle = OpaqueKey {
            scheme: metadata.scheme,
            number_of_slots: metadata.slot_count(attributes.key_type)?,
            slot_id: slot,
        };
        Ok(BuiltinKey { attributes, handle })
    }

    /// Pushes the slots of `key` for a crypto operation.
    ///
    /// ENCRYPTED records are decrypted in the push area. The returned guard
    /// owns the push area until it is dropped.
    pub fn prepare_key(&mut self, key: &OpaqueKey) -> KmuResult<StagedKey<'_, H>> {
        let in_bounds = matches!(
            key.slot_id.checked_add(key.number_of_slots),
            Some(end) if end <= SLOT_COUNT
        );
        if key.number_of_slots == 0
            || !in_bounds
            || key.number_of_slots as usize * SLOT_SIZE > PUSH_AREA_SIZE
        {
            return Err(KmuError::InvalidArgument);
        }
        match key.scheme {
            KeyUsageScheme::Seed => return Err(KmuError::InvalidArgument),
            KeyUsageScheme::Encrypted if !cfg!(feature = "encrypted-keys") => {
                return Err(KmuError::NotSupported)
            }
            _ => {}
        }

        let Self {
            hw,
            crypto,
            config,
            push_area,
            ..
        } = self;
        let mut staged = StagedKey {
            hw,
            area: push_area.acquire(),
            key: *key,
            invalidation_slots: config.protected_ram_invalidation_slots,
            len: 0,
            cleaned: false,
        };

        match key.scheme {
            KeyUsageScheme::Raw => {
                staged.push_slots()?;
                staged.len = key.number_of_slots as usize * SLOT_SIZE;
            }
            KeyUsageScheme::Protected => staged.push_slots()?,
            KeyUsageScheme::Encrypted => {
                let metadata = staged
                    .hw
                    .read_metadata(key.slot_id)
                    .map_err(|_| KmuError::DoesNotExist)?;
                staged.push_slots()?;
                staged.len = encrypted::decrypt_in_place(
                    crypto,
                    metadata,
                    &mut staged.area,
                    key.number_of_slots as usize,
                )?;
            }
            KeyUsageScheme::Seed => return Err(KmuError::InvalidArgument),
        }
        debug!("kmu: staged slots {:?}", key.slots());
        Ok(staged)
    }

    /// Zeroes the push area and, for PROTECTED keys, overwrites protected RAM.
    pub fn clean_key(&mut self, key: &OpaqueKey) -> KmuResult<()> {
        self.push_area.acquire().clear();
        if key.scheme == KeyUsageScheme::Protected {
            self.push_prot_ram_inv_slots()?;
        }
        Ok(())
    }

    /// Overwrites protected RAM with the invalidation slots.
    pub fn push_prot_ram_inv_slots(&mut self) -> KmuResult<()> {
        push_invalidation_slots(&mut self.hw, self.config.protected_ram_invalidation_slots)
    }

    /// Copies the material of `key` into `out` in PSA export format.
    ///
    /// Secp_r1 public keys get their uncompressed point indicator back. Returns
    /// the number of bytes written.
    pub fn materialize(&mut self, key: &BuiltinKey, out: &mut [u8]) -> KmuResult<usize> {
        if key.handle.scheme == KeyUsageScheme::Protected {
            return Err(KmuError::NotPermitted);
        }
        let stored_len = key.stored_len();
        let out = out
            .get_mut(..key.export_len())
            .ok_or(KmuError::BufferTooSmall)?;

        let staged = self.prepare_key(&key.handle)?;
        let material = staged
            .material()
            .get(..stored_len)
            .ok_or(KmuError::HardwareFailure)?;
        if key.is_secp_r1_public_key() {
            out[0] = ECC_PUBKEY_UNCOMPRESSED;
            out[1..].copy_from_slice(material);
        } else {
            out.copy_from_slice(material);
        }
        staged.finish()?;
        Ok(out.len())
    }

    /// Copies out the material of a key that carries the EXPORT usage.
    pub fn export_key(&mut self, key: &BuiltinKey, out: &mut [u8]) -> KmuResult<usize> {
        if !key.attributes.usage.contains(KeyUsage::EXPORT) {
            return Err(KmuError::NotPermitted);
        }
        self.materialize(key, out)
    }

    /// Resolves the key at `slot` and fills `key_buffer` the way the crypto core
    /// expects it.
    ///
    /// ECC and HMAC keys cannot be driven from the KMU by the crypto engine and
    /// are materialized. Any other key is represented by its opaque handle.
    pub fn load_builtin_key(
        &mut self,
        slot: u32,
        key_buffer: &mut [u8],
    ) -> KmuResult<(KeyAttributes, usize)> {
        let key = self.get_builtin_key(slot)?;
        let key_type = key.attributes.key_type;
        let len = if key_type.is_ecc() || key_type == KeyType::Hmac {
            self.materialize(&key, key_buffer)?
        } else {
            key.handle.write_to(key_buffer)?
        };
        Ok((key.attributes, len))
    }
}

// Licensed under the Apache-2.0 license

use crate::accessor::BuiltinKey;
use crate::crypto::KmuCrypto;
use crate::driver::Kmu;
use crate::encrypted;
use crate::error::{KmuError, KmuResult};
use crate::hw::{
    KmuHardware, PushRegion, RevocationPolicy, SlotDestination, SlotSource, SEED_SIZE,
    SLOT_COUNT, SLOT_SIZE,
};
use crate::metadata::{KeyUsageScheme, KmuMetadata, SECONDARY_SLOT_SENTINEL};
use crate::psa::{Algorithm, KeyAttributes, KeyId, KeyType, KeyUsage, Lifetime, Persistence};
use crate::push_area::PUSH_AREA_SIZE;
use crate::wal::SlotRange;
use log::{debug, error, info};
use zeroize::Zeroizing;

/// Leading byte of an uncompressed elliptic curve point.
pub const ECC_PUBKEY_UNCOMPRESSED: u8 = 0x04;

/// Largest key accepted by the ENCRYPTED scheme: the record must fit the push area.
pub const MAX_ENCRYPTED_KEY_SIZE: usize = PUSH_AREA_SIZE - 2 * SLOT_SIZE;

/// Largest key produced by [`Kmu::generate_key`].
const MAX_GENERATED_KEY_SIZE: usize = 48;

/// Checks the key length for `scheme` and returns the bytes to store with
/// their destination.
fn payload(
    scheme: KeyUsageScheme,
    key_type: KeyType,
    key: &[u8],
) -> KmuResult<(&[u8], PushRegion)> {
    match scheme {
        KeyUsageScheme::Protected => {
            if key_type != KeyType::Aes {
                return Err(KmuError::NotSupported);
            }
            match key.len() {
                16 | 24 | 32 => Ok((key, PushRegion::ProtectedRam)),
                _ => Err(KmuError::InvalidArgument),
            }
        }
        KeyUsageScheme::Raw | KeyUsageScheme::Encrypted => {
            let stored = match key.len() {
                // Compressed points are not supported; the indicator is put back when read.
                65 | 97 if key[0] == ECC_PUBKEY_UNCOMPRESSED => &key[1..],
                16 | 24 | 32 | 48 => key,
                _ => return Err(KmuError::InvalidArgument),
            };
            if scheme == KeyUsageScheme::Encrypted
                && (!cfg!(feature = "encrypted-keys") || stored.len() > MAX_ENCRYPTED_KEY_SIZE)
            {
                return Err(KmuError::NotSupported);
            }
            Ok((stored, PushRegion::PushArea))
        }
        KeyUsageScheme::Seed => {
            if key.len() != SEED_SIZE {
                return Err(KmuError::InvalidArgument);
            }
            Ok((key, PushRegion::Seed))
        }
    }
}

impl<H: KmuHardware, C: KmuCrypto> Kmu<H, C> {
    /// Stores `key` in the slots starting at `slot_id`.
    ///
    /// A key spanning several slots is written under a transaction marker, so
    /// that a reset halfway leaves nothing behind once the next call has rolled
    /// it back.
    ///
    /// # Arguments
    ///
    /// * `attributes` - Attributes of the key; the id selects the key usage scheme.
    /// * `slot_id` - First slot of the key.
    /// * `key` - Key material in PSA export format.
    pub fn provision(
        &mut self,
        attributes: &KeyAttributes,
        slot_id: u32,
        key: &[u8],
    ) -> KmuResult<()> {
        self.clean_up_unfinished_provisioning()?;

        let metadata = KmuMetadata::from_attributes(attributes, &self.config)?;
        let word = metadata.pack();
        let (stored, region) = payload(metadata.scheme, attributes.key_type, key)?;

        let mut workspace = Zeroizing::new([0u8; PUSH_AREA_SIZE]);
        let len = if metadata.scheme == KeyUsageScheme::Encrypted {
            let mut padded = Zeroizing::new([0u8; MAX_ENCRYPTED_KEY_SIZE]);
            padded[..stored.len()].copy_from_slice(stored);
            let padded_len = stored.len().div_ceil(SLOT_SIZE) * SLOT_SIZE;
            encrypted::encrypt(
                &mut self.crypto,
                word,
                &padded[..padded_len],
                &mut workspace[..],
            )?
        } else {
            workspace[..stored.len()].copy_from_slice(stored);
            stored.len()
        };

        let count = len.div_ceil(SLOT_SIZE);
        // The record must span exactly the slots its metadata accounts for.
        if count as u32 != metadata.slot_count(attributes.key_type)? {
            return Err(KmuError::InvalidArgument);
        }

        self.write_slots(
            slot_id,
            word,
            metadata.rpolicy,
            region,
            &workspace[..count * SLOT_SIZE],
        )
    }

    fn write_slots(
        &mut self,
        first: u32,
        metadata: u32,
        rpolicy: RevocationPolicy,
        region: PushRegion,
        data: &[u8],
    ) -> KmuResult<()> {
        let range = SlotRange::new(first, (data.len() / SLOT_SIZE) as u32);
        let in_bounds = matches!(first.checked_add(range.count), Some(end) if end <= SLOT_COUNT);
        if !in_bounds || range.contains(self.log.marker_slot()) {
            return Err(KmuError::InvalidArgument);
        }
        // Nothing is written unless the whole range is free.
        if range.slots().any(|slot| !self.hw.is_slot_empty(slot)) {
            return Err(KmuError::AlreadyExists);
        }

        let transactional = range.count > 1;
        if transactional {
            self.log.begin(&mut self.hw, range)?;
        }

        for (i, (slot, chunk)) in range.slots().zip(data.chunks_exact(SLOT_SIZE)).enumerate() {
            let source = SlotSource {
                value: chunk.try_into().map_err(|_| KmuError::GenericError)?,
                metadata: if i == 0 {
                    metadata
                } else {
                    SECONDARY_SLOT_SENTINEL
                },
                rpolicy,
                dest: SlotDestination {
                    region,
                    offset: i * SLOT_SIZE,
                },
            };
            if self.hw.provision_slot(slot, &source).is_err() {
                // The slot was verified empty: this is not a race.
                error!("kmu: failed to provision slot {}", slot);
                if let Err(err) = self.clean_up_unfinished_provisioning() {
                    error!("kmu: rollback of slots {:?} failed: {}", range, err);
                }
                return Err(KmuError::HardwareFailure);
            }
            debug!("kmu: provisioned slot {}", slot);
        }

        if transactional {
            self.log.commit(&mut self.hw)?;
        }
        info!("kmu: provisioned key in slots {:?}", range.slots());
        Ok(())
    }

    /// Provisions `data` at the slot named by the key id and returns the stored key.
    pub fn import_key(
        &mut self,
        attributes: &KeyAttributes,
        data: &[u8],
    ) -> KmuResult<BuiltinKey> {
        let slot = attributes.id.kmu_slot();
        self.provision(attributes, slot, data)?;
        self.get_builtin_key(slot)
    }

    /// Imports a fresh symmetric key drawn from the random source.
    pub fn generate_key(&mut self, attributes: &KeyAttributes) -> KmuResult<BuiltinKey> {
        match attributes.key_type {
            KeyType::Aes | KeyType::Chacha20 | KeyType::Hmac | KeyType::RawData => {}
            _ => return Err(KmuError::NotSupported),
        }
        let len = attributes.key_bytes();
        if len > MAX_GENERATED_KEY_SIZE {
            return Err(KmuError::NotSupported);
        }

        let mut material = Zeroizing::new([0u8; MAX_GENERATED_KEY_SIZE]);
        self.crypto.random(&mut material[..len])?;
        self.import_key(attributes, &material[..len])
    }

    /// Fills the protected RAM invalidation slots with random data if either is empty.
    pub fn provision_prot_ram_inv_slots(&mut self) -> KmuResult<()> {
        let [first, second] = self.config.protected_ram_invalidation_slots;
        if !self.hw.is_slot_empty(first) && !self.hw.is_slot_empty(second) {
            return Ok(());
        }

        // An ordinary 256-bit PROTECTED key covers both slots.
        let attributes = KeyAttributes {
            id: KeyId::from_kmu_slot(KeyUsageScheme::Protected, first),
            key_type: KeyType::Aes,
            algorithm: Algorithm::Ctr,
            bits: 256,
            usage: KeyUsage::ENCRYPT,
            lifetime: Lifetime::kmu(Persistence::Default),
        };
        let mut material = Zeroizing::new([0u8; 2 * SLOT_SIZE]);
        self.crypto.random(&mut material[..])?;
        self.provision(&attributes, first, &material[..])
    }
}

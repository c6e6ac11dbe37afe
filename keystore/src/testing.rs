// Licensed under the Apache-2.0 license

//! Minimal in-memory stand-ins for unit tests. The full model with fault
//! injection lives in the `emulator-kmu` crate.

use crate::crypto::{KmuCrypto, AES_256_KEY_SIZE, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{KmuError, KmuResult};
use crate::hw::{
    KmuHardware, KmuHwError, PushRegion, RevocationPolicy, SlotSource, SLOT_COUNT, SLOT_SIZE,
};

#[derive(Clone, Copy)]
struct Slot {
    metadata: u32,
    value: [u8; SLOT_SIZE],
    rpolicy: RevocationPolicy,
    region: PushRegion,
    offset: usize,
}

pub struct FakeKmu {
    slots: [Option<Slot>; SLOT_COUNT as usize],
}

impl FakeKmu {
    pub fn new() -> Self {
        Self {
            slots: [None; SLOT_COUNT as usize],
        }
    }

    /// Occupies `slot` with a dummy secondary slot.
    pub fn fill(&mut self, slot: u32, rpolicy: RevocationPolicy) {
        self.slots[slot as usize] = Some(Slot {
            metadata: u32::MAX,
            value: [0xee; SLOT_SIZE],
            rpolicy,
            region: PushRegion::PushArea,
            offset: 0,
        });
    }

    pub fn rpolicy(&self, slot: u32) -> Option<RevocationPolicy> {
        self.slots[slot as usize].map(|s| s.rpolicy)
    }
}

impl KmuHardware for FakeKmu {
    fn is_slot_empty(&self, slot: u32) -> bool {
        self.slots[slot as usize].is_none()
    }

    fn read_metadata(&self, slot: u32) -> Result<u32, KmuHwError> {
        self.slots[slot as usize]
            .map(|s| s.metadata)
            .ok_or(KmuHwError::Error)
    }

    fn provision_slot(&mut self, slot: u32, source: &SlotSource) -> Result<(), KmuHwError> {
        let entry = &mut self.slots[slot as usize];
        if entry.is_some() {
            return Err(KmuHwError::Error);
        }
        *entry = Some(Slot {
            metadata: source.metadata,
            value: source.value,
            rpolicy: source.rpolicy,
            region: source.dest.region,
            offset: source.dest.offset,
        });
        Ok(())
    }

    fn revoke_slot(&mut self, slot: u32) -> Result<(), KmuHwError> {
        let entry = &mut self.slots[slot as usize];
        if matches!(entry, Some(s) if s.rpolicy != RevocationPolicy::Locked) {
            *entry = None;
            Ok(())
        } else {
            Err(KmuHwError::Error)
        }
    }

    fn push_slot(&mut self, slot: u32, push_area: &mut [u8]) -> Result<(), KmuHwError> {
        let s = self.slots[slot as usize].ok_or(KmuHwError::Error)?;
        if s.region == PushRegion::PushArea {
            push_area
                .get_mut(s.offset..s.offset + SLOT_SIZE)
                .ok_or(KmuHwError::Error)?
                .copy_from_slice(&s.value);
        }
        Ok(())
    }

    fn block_slot_range(&mut self, _slot: u32, _count: u32) -> Result<(), KmuHwError> {
        Ok(())
    }
}

/// Deterministic, insecure stand-in for the crypto engine. The "AEAD" is a
/// keyed XOR with an additive tag, enough to exercise layout and tamper paths.
pub struct FakeCrypto {
    counter: u8,
}

impl FakeCrypto {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    fn tag(key: &[u8; AES_256_KEY_SIZE], aad: &[u8], ciphertext: &[u8]) -> [u8; GCM_TAG_SIZE] {
        let mut tag = [0u8; GCM_TAG_SIZE];
        for (i, b) in aad.iter().chain(ciphertext).enumerate() {
            tag[i % GCM_TAG_SIZE] = tag[i % GCM_TAG_SIZE].wrapping_add(*b).rotate_left(1);
        }
        for (t, k) in tag.iter_mut().zip(key) {
            *t ^= k;
        }
        tag
    }

    fn keystream(key: &[u8; AES_256_KEY_SIZE], nonce: &[u8; GCM_NONCE_SIZE], buffer: &mut [u8]) {
        for (i, b) in buffer.iter_mut().enumerate() {
            *b ^= key[i % AES_256_KEY_SIZE] ^ nonce[i % GCM_NONCE_SIZE] ^ i as u8;
        }
    }
}

impl KmuCrypto for FakeCrypto {
    fn random(&mut self, buf: &mut [u8]) -> KmuResult<()> {
        for b in buf.iter_mut() {
            self.counter = self.counter.wrapping_add(0x3b);
            *b = self.counter;
        }
        Ok(())
    }

    fn derive_key(&mut self, label: &[u8], context: &[u8], out: &mut [u8]) -> KmuResult<()> {
        for (i, b) in out.iter_mut().enumerate() {
            *b = label[i % label.len()] ^ context[i % context.len()] ^ (i as u8).wrapping_mul(7);
        }
        Ok(())
    }

    fn aead_encrypt(
        &mut self,
        key: &[u8; AES_256_KEY_SIZE],
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> KmuResult<[u8; GCM_TAG_SIZE]> {
        Self::keystream(key, nonce, buffer);
        Ok(Self::tag(key, aad, buffer))
    }

    fn aead_decrypt(
        &mut self,
        key: &[u8; AES_256_KEY_SIZE],
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8; GCM_TAG_SIZE],
    ) -> KmuResult<()> {
        if Self::tag(key, aad, buffer) != *tag {
            return Err(KmuError::GenericError);
        }
        Self::keystream(key, nonce, buffer);
        Ok(())
    }
}

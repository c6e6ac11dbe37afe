// Licensed under the Apache-2.0 license

//! Envelope for keys of the ENCRYPTED usage scheme.
//!
//! A record occupies whole slots and is laid out as `[nonce][ciphertext][tag]`.
//! The nonce slot holds 16 random bytes: all of them are the KDF context for the
//! record key and the first 12 are the GCM nonce. The metadata word of the key
//! is bound to the ciphertext as associated data.

use crate::crypto::{KmuCrypto, AES_256_KEY_SIZE, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use crate::error::{KmuError, KmuResult};
use crate::hw::SLOT_SIZE;
use log::error;
use zeroize::{Zeroize, Zeroizing};

/// Domain separation label of the record key derivation.
pub const KDF_LABEL: &[u8] = b"KMU";

/// Slots added to a key by the envelope: nonce and tag.
pub const ENVELOPE_SLOTS: usize = 2;

/// Derives the AES-256 key protecting the record whose nonce slot is `nonce`.
pub fn derive_slot_key<C: KmuCrypto>(
    crypto: &mut C,
    nonce: &[u8; SLOT_SIZE],
) -> KmuResult<Zeroizing<[u8; AES_256_KEY_SIZE]>> {
    let mut key = Zeroizing::new([0u8; AES_256_KEY_SIZE]);
    crypto.derive_key(KDF_LABEL, nonce, &mut key[..])?;
    Ok(key)
}

fn gcm_nonce(nonce: &[u8; SLOT_SIZE]) -> [u8; GCM_NONCE_SIZE] {
    let mut gcm_nonce = [0u8; GCM_NONCE_SIZE];
    gcm_nonce.copy_from_slice(&nonce[..GCM_NONCE_SIZE]);
    gcm_nonce
}

/// Encrypts a slot aligned `plaintext` into `out`. Returns the record length.
///
/// # Arguments
///
/// * `crypto` - Crypto engine providing randomness, KDF and AEAD.
/// * `metadata` - Metadata word of the key, used as associated data.
/// * `plaintext` - Zero padded key material, a multiple of the slot size.
/// * `out` - Receives the record.
pub fn encrypt<C: KmuCrypto>(
    crypto: &mut C,
    metadata: u32,
    plaintext: &[u8],
    out: &mut [u8],
) -> KmuResult<usize> {
    let record_len = SLOT_SIZE + plaintext.len() + GCM_TAG_SIZE;
    if plaintext.is_empty() || plaintext.len() % SLOT_SIZE != 0 || out.len() < record_len {
        return Err(KmuError::GenericError);
    }

    let mut nonce = [0u8; SLOT_SIZE];
    crypto.random(&mut nonce)?;
    let key = derive_slot_key(crypto, &nonce)?;

    let (nonce_slot, rest) = out.split_at_mut(SLOT_SIZE);
    let (ciphertext, rest) = rest.split_at_mut(plaintext.len());
    nonce_slot.copy_from_slice(&nonce);
    ciphertext.copy_from_slice(plaintext);
    let tag = crypto.aead_encrypt(
        &key,
        &gcm_nonce(&nonce),
        &metadata.to_le_bytes(),
        ciphertext,
    )?;
    rest[..GCM_TAG_SIZE].copy_from_slice(&tag);
    Ok(record_len)
}

/// Decrypts a record of `total_slots` slots held in `area`.
///
/// The plaintext replaces the record at the start of `area` and the remainder of
/// the record is zeroed. Returns the plaintext length. Any failure, including an
/// authentication failure, is reported as a hardware failure.
pub fn decrypt_in_place<C: KmuCrypto>(
    crypto: &mut C,
    metadata: u32,
    area: &mut [u8],
    total_slots: usize,
) -> KmuResult<usize> {
    let record_len = total_slots * SLOT_SIZE;
    if total_slots <= ENVELOPE_SLOTS || area.len() < record_len {
        error!("kmu: encrypted record of {} slots does not fit", total_slots);
        return Err(KmuError::HardwareFailure);
    }
    let plaintext_len = record_len - SLOT_SIZE - GCM_TAG_SIZE;

    let mut nonce = [0u8; SLOT_SIZE];
    nonce.copy_from_slice(&area[..SLOT_SIZE]);
    let key = derive_slot_key(crypto, &nonce).map_err(|_| KmuError::HardwareFailure)?;

    let mut tag = [0u8; GCM_TAG_SIZE];
    tag.copy_from_slice(&area[SLOT_SIZE + plaintext_len..record_len]);

    crypto
        .aead_decrypt(
            &key,
            &gcm_nonce(&nonce),
            &metadata.to_le_bytes(),
            &mut area[SLOT_SIZE..SLOT_SIZE + plaintext_len],
            &tag,
        )
        .map_err(|_| {
            error!("kmu: encrypted key failed authentication");
            KmuError::HardwareFailure
        })?;

    area.copy_within(SLOT_SIZE..SLOT_SIZE + plaintext_len, 0);
    area[plaintext_len..record_len].zeroize();
    Ok(plaintext_len)
}

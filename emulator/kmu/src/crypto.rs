/*++

Licensed under the Apache-2.0 license.

File Name:

    crypto.rs

Abstract:

    File contains a software stand-in for the CRACEN KDF, AEAD and RNG engines.

--*/

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use hkdf::Hkdf;
use kmu_keystore::crypto::{KmuCrypto, AES_256_KEY_SIZE, GCM_NONCE_SIZE, GCM_TAG_SIZE};
use kmu_keystore::{KmuError, KmuResult};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Software crypto backend.
///
/// Key derivation is HKDF-SHA256 over a master key, with the label as salt and
/// the context as info.
pub struct SoftCrypto {
    master_key: Zeroizing<[u8; AES_256_KEY_SIZE]>,
    rng: StdRng,
}

impl SoftCrypto {
    /// Deterministic backend for reproducible tests.
    pub fn new(master_key: [u8; AES_256_KEY_SIZE], seed: u64) -> Self {
        Self {
            master_key: Zeroizing::new(master_key),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn cipher(key: &[u8; AES_256_KEY_SIZE]) -> KmuResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(key).map_err(|_| KmuError::InvalidArgument)
    }
}

impl KmuCrypto for SoftCrypto {
    fn random(&mut self, buf: &mut [u8]) -> KmuResult<()> {
        self.rng.fill_bytes(buf);
        Ok(())
    }

    fn derive_key(&mut self, label: &[u8], context: &[u8], out: &mut [u8]) -> KmuResult<()> {
        Hkdf::<Sha256>::new(Some(label), &self.master_key[..])
            .expand(context, out)
            .map_err(|_| KmuError::InvalidArgument)
    }

    fn aead_encrypt(
        &mut self,
        key: &[u8; AES_256_KEY_SIZE],
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> KmuResult<[u8; GCM_TAG_SIZE]> {
        let tag = Self::cipher(key)?
            .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, buffer)
            .map_err(|_| KmuError::GenericError)?;
        let mut out = [0u8; GCM_TAG_SIZE];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    fn aead_decrypt(
        &mut self,
        key: &[u8; AES_256_KEY_SIZE],
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8; GCM_TAG_SIZE],
    ) -> KmuResult<()> {
        Self::cipher(key)?
            .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, buffer, Tag::from_slice(tag))
            .map_err(|_| KmuError::GenericError)
    }
}

// Licensed under the Apache-2.0 license

use crate::error::KmuResult;

pub const AES_256_KEY_SIZE: usize = 32;
pub const GCM_NONCE_SIZE: usize = 12;
pub const GCM_TAG_SIZE: usize = 16;

/// Cryptographic primitives the key store depends on.
///
/// Implementations are expected to hold the master key encryption key used by
/// [`KmuCrypto::derive_key`]; it never crosses this interface.
pub trait KmuCrypto {
    /// Fills `buf` from a cryptographically secure source.
    fn random(&mut self, buf: &mut [u8]) -> KmuResult<()>;

    /// Derives `out.len()` bytes from the master key encryption key.
    ///
    /// # Arguments
    ///
    /// * `label` - Domain separation label.
    /// * `context` - Derivation context.
    /// * `out` - Output key material.
    fn derive_key(&mut self, label: &[u8], context: &[u8], out: &mut [u8]) -> KmuResult<()>;

    /// AES-256-GCM encryption of `buffer` in place. Returns the tag.
    fn aead_encrypt(
        &mut self,
        key: &[u8; AES_256_KEY_SIZE],
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> KmuResult<[u8; GCM_TAG_SIZE]>;

    /// AES-256-GCM decryption of `buffer` in place. `buffer` is left unspecified on
    /// authentication failure.
    fn aead_decrypt(
        &mut self,
        key: &[u8; AES_256_KEY_SIZE],
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8; GCM_TAG_SIZE],
    ) -> KmuResult<()>;
}

// Licensed under the Apache-2.0 license

//! Metadata word stored in the primary slot of every key.
//!
//! | Field              | Bits   |
//! |--------------------|--------|
//! | `version`          | 3:0    |
//! | `key_usage_scheme` | 5:4    |
//! | reserved           | 15:6   |
//! | `algorithm`        | 19:16  |
//! | `size`             | 22:20  |
//! | `rpolicy`          | 24:23  |
//! | `usage_flags`      | 31:25  |
//!
//! The word is part of the on-device format and must stay stable across releases.

use crate::config::KmuConfig;
use crate::error::{KmuError, KmuResult};
use crate::hw::RevocationPolicy;
use crate::psa::{
    Algorithm, EccFamily, HashAlgorithm, KeyAttributes, KeyId, KeyType, KeyUsage, Lifetime,
};
use bitfield::bitfield;

pub const METADATA_VERSION: u8 = 0;

/// Metadata word of every slot of a key except the first.
pub const SECONDARY_SLOT_SENTINEL: u32 = u32::MAX;

const VERSION_MASK: u32 = 0xf;

// The sentinel carries version 0xf and can never be mistaken for a real record.
const _: () = assert!(SECONDARY_SLOT_SENTINEL & VERSION_MASK != METADATA_VERSION as u32);

bitfield! {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct MetadataWord(u32);
    impl Debug;
    u8;
    pub version, set_version: 3, 0;
    pub key_usage_scheme, set_key_usage_scheme: 5, 4;
    pub algorithm, set_algorithm: 19, 16;
    pub size, set_size: 22, 20;
    pub rpolicy, set_rpolicy: 24, 23;
    pub usage_flags, set_usage_flags: 31, 25;
}

/// Usage flag bit `i` of the metadata word stands for `USAGE_FLAGS_MAPPING[i]`.
pub const USAGE_FLAGS_MAPPING: [KeyUsage; 7] = [
    KeyUsage::ENCRYPT,
    KeyUsage::DECRYPT,
    KeyUsage::SIGN_HASH.union(KeyUsage::SIGN_MESSAGE),
    KeyUsage::VERIFY_HASH.union(KeyUsage::VERIFY_MESSAGE),
    KeyUsage::DERIVE,
    KeyUsage::EXPORT,
    KeyUsage::COPY,
];

/// How the bytes of a key are protected at rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyUsageScheme {
    /// AES key pushed straight into the crypto engine's write-only key registers.
    Protected = 0,
    /// Entropy for the KDF seed register.
    Seed = 1,
    /// Key wrapped with AES-GCM under a key derived from the master key.
    Encrypted = 2,
    /// Key stored as-is and pushed to the shared push area.
    Raw = 3,
}

impl TryFrom<u8> for KeyUsageScheme {
    type Error = KmuError;

    fn try_from(value: u8) -> Result<Self, KmuError> {
        match value {
            0 => Ok(KeyUsageScheme::Protected),
            1 => Ok(KeyUsageScheme::Seed),
            2 => Ok(KeyUsageScheme::Encrypted),
            3 => Ok(KeyUsageScheme::Raw),
            _ => Err(KmuError::InvalidArgument),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetadataAlgorithm {
    Chacha20 = 1,
    Chacha20Poly1305 = 2,
    AesGcm = 3,
    AesCcm = 4,
    AesEcb = 5,
    AesCtr = 6,
    AesCbc = 7,
    Sp800108CounterCmac = 8,
    Cmac = 9,
    Ed25519 = 10,
    Ecdsa = 11,
    Ed25519ph = 12,
    Hmac = 13,
    Ecdh = 14,
}

impl MetadataAlgorithm {
    pub const ALL: [MetadataAlgorithm; 14] = [
        MetadataAlgorithm::Chacha20,
        MetadataAlgorithm::Chacha20Poly1305,
        MetadataAlgorithm::AesGcm,
        MetadataAlgorithm::AesCcm,
        MetadataAlgorithm::AesEcb,
        MetadataAlgorithm::AesCtr,
        MetadataAlgorithm::AesCbc,
        MetadataAlgorithm::Sp800108CounterCmac,
        MetadataAlgorithm::Cmac,
        MetadataAlgorithm::Ed25519,
        MetadataAlgorithm::Ecdsa,
        MetadataAlgorithm::Ed25519ph,
        MetadataAlgorithm::Hmac,
        MetadataAlgorithm::Ecdh,
    ];

    /// Decodes the algorithm field. 0 (unset) and 15 (reserved) yield `None`.
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| *alg as u8 == raw)
    }

    /// Metadata tag for a PSA algorithm, if the KMU can store it.
    pub fn for_psa(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::StreamCipher => Some(MetadataAlgorithm::Chacha20),
            Algorithm::Chacha20Poly1305 => Some(MetadataAlgorithm::Chacha20Poly1305),
            Algorithm::Gcm => Some(MetadataAlgorithm::AesGcm),
            Algorithm::Ccm => Some(MetadataAlgorithm::AesCcm),
            Algorithm::EcbNoPadding => Some(MetadataAlgorithm::AesEcb),
            Algorithm::Ctr => Some(MetadataAlgorithm::AesCtr),
            Algorithm::CbcNoPadding => Some(MetadataAlgorithm::AesCbc),
            Algorithm::Sp800108CounterCmac => Some(MetadataAlgorithm::Sp800108CounterCmac),
            Algorithm::Cmac => Some(MetadataAlgorithm::Cmac),
            Algorithm::PureEddsa => Some(MetadataAlgorithm::Ed25519),
            Algorithm::Ed25519ph => Some(MetadataAlgorithm::Ed25519ph),
            Algorithm::Ecdsa(_) => Some(MetadataAlgorithm::Ecdsa),
            Algorithm::Hmac(HashAlgorithm::Sha256) => Some(MetadataAlgorithm::Hmac),
            Algorithm::Ecdh => Some(MetadataAlgorithm::Ecdh),
            Algorithm::Hmac(_) | Algorithm::None => None,
        }
    }

    /// Whether support for the algorithm is compiled in.
    pub fn is_enabled(self) -> bool {
        match self {
            MetadataAlgorithm::Chacha20 => cfg!(feature = "chacha20"),
            MetadataAlgorithm::Chacha20Poly1305 => cfg!(feature = "chacha20-poly1305"),
            MetadataAlgorithm::AesGcm => cfg!(feature = "aes-gcm"),
            MetadataAlgorithm::AesCcm => cfg!(feature = "aes-ccm"),
            MetadataAlgorithm::AesEcb => cfg!(feature = "aes-ecb"),
            MetadataAlgorithm::AesCtr => cfg!(feature = "aes-ctr"),
            MetadataAlgorithm::AesCbc => cfg!(feature = "aes-cbc"),
            MetadataAlgorithm::Sp800108CounterCmac => cfg!(feature = "sp800-108-counter-cmac"),
            MetadataAlgorithm::Cmac => cfg!(feature = "cmac"),
            MetadataAlgorithm::Ed25519 => cfg!(feature = "pure-eddsa"),
            MetadataAlgorithm::Ecdsa => cfg!(feature = "ecdsa"),
            MetadataAlgorithm::Ed25519ph => cfg!(feature = "ed25519ph"),
            MetadataAlgorithm::Hmac => cfg!(feature = "hmac"),
            MetadataAlgorithm::Ecdh => cfg!(feature = "ecdh"),
        }
    }

    /// Checks that the key type and usage of `attributes` are valid for this algorithm.
    fn check_key(self, attributes: &KeyAttributes) -> KmuResult<()> {
        let key_type = attributes.key_type;
        let usage = attributes.usage;
        // Key pairs that are only used to verify are not stored.
        let verify_only_pair = key_type.is_ecc_key_pair() && !usage.can_sign();
        let valid = match self {
            MetadataAlgorithm::Chacha20 | MetadataAlgorithm::Chacha20Poly1305 => {
                key_type == KeyType::Chacha20
            }
            MetadataAlgorithm::AesGcm
            | MetadataAlgorithm::AesCcm
            | MetadataAlgorithm::AesEcb
            | MetadataAlgorithm::AesCtr
            | MetadataAlgorithm::AesCbc
            | MetadataAlgorithm::Sp800108CounterCmac
            | MetadataAlgorithm::Cmac => key_type == KeyType::Aes,
            MetadataAlgorithm::Ed25519 | MetadataAlgorithm::Ed25519ph => {
                key_type.ecc_family() == Some(EccFamily::TwistedEdwards) && !verify_only_pair
            }
            MetadataAlgorithm::Ecdsa => {
                key_type.ecc_family() == Some(EccFamily::SecpR1) && !verify_only_pair
            }
            MetadataAlgorithm::Hmac => key_type == KeyType::Hmac && usage.can_sign(),
            // Only the private half takes part in a key agreement.
            MetadataAlgorithm::Ecdh => {
                usage.can_derive() && key_type == KeyType::EccKeyPair(EccFamily::SecpR1)
            }
        };
        if valid {
            Ok(())
        } else {
            Err(KmuError::NotSupported)
        }
    }

    /// PSA key type and algorithm of a decoded record.
    fn psa_key(self, usage: KeyUsage) -> (KeyType, Algorithm) {
        // A key that can sign is a private key.
        let signing_key = |family| {
            if usage.can_sign() {
                KeyType::EccKeyPair(family)
            } else {
                KeyType::EccPublicKey(family)
            }
        };
        match self {
            MetadataAlgorithm::Chacha20 => (KeyType::Chacha20, Algorithm::StreamCipher),
            MetadataAlgorithm::Chacha20Poly1305 => {
                (KeyType::Chacha20, Algorithm::Chacha20Poly1305)
            }
            MetadataAlgorithm::AesGcm => (KeyType::Aes, Algorithm::Gcm),
            MetadataAlgorithm::AesCcm => (KeyType::Aes, Algorithm::Ccm),
            MetadataAlgorithm::AesEcb => (KeyType::Aes, Algorithm::EcbNoPadding),
            MetadataAlgorithm::AesCtr => (KeyType::Aes, Algorithm::Ctr),
            MetadataAlgorithm::AesCbc => (KeyType::Aes, Algorithm::CbcNoPadding),
            MetadataAlgorithm::Sp800108CounterCmac => {
                (KeyType::Aes, Algorithm::Sp800108CounterCmac)
            }
            MetadataAlgorithm::Cmac => (KeyType::Aes, Algorithm::Cmac),
            MetadataAlgorithm::Ed25519 => {
                (signing_key(EccFamily::TwistedEdwards), Algorithm::PureEddsa)
            }
            MetadataAlgorithm::Ed25519ph => {
                (signing_key(EccFamily::TwistedEdwards), Algorithm::Ed25519ph)
            }
            MetadataAlgorithm::Ecdsa => (
                signing_key(EccFamily::SecpR1),
                Algorithm::Ecdsa(HashAlgorithm::Any),
            ),
            MetadataAlgorithm::Hmac => (KeyType::Hmac, Algorithm::Hmac(HashAlgorithm::Sha256)),
            MetadataAlgorithm::Ecdh => (KeyType::EccKeyPair(EccFamily::SecpR1), Algorithm::Ecdh),
        }
    }
}

/// Key size class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SizeClass {
    Bits128 = 1,
    Bits192 = 2,
    Bits255 = 3,
    Bits256 = 4,
    /// 384 bits of KDF seed material.
    Bits384Seed = 5,
    Bits384 = 6,
}

impl TryFrom<u8> for SizeClass {
    type Error = KmuError;

    fn try_from(value: u8) -> Result<Self, KmuError> {
        match value {
            1 => Ok(SizeClass::Bits128),
            2 => Ok(SizeClass::Bits192),
            3 => Ok(SizeClass::Bits255),
            4 => Ok(SizeClass::Bits256),
            5 => Ok(SizeClass::Bits384Seed),
            6 => Ok(SizeClass::Bits384),
            _ => Err(KmuError::DataInvalid),
        }
    }
}

impl SizeClass {
    pub fn from_key_bits(bits: u16) -> KmuResult<Self> {
        match bits {
            128 => Ok(SizeClass::Bits128),
            192 => Ok(SizeClass::Bits192),
            255 => Ok(SizeClass::Bits255),
            256 => Ok(SizeClass::Bits256),
            384 => Ok(SizeClass::Bits384),
            _ => Err(KmuError::NotSupported),
        }
    }

    pub const fn key_bits(self) -> u16 {
        match self {
            SizeClass::Bits128 => 128,
            SizeClass::Bits192 => 192,
            SizeClass::Bits255 => 255,
            SizeClass::Bits256 => 256,
            SizeClass::Bits384Seed | SizeClass::Bits384 => 384,
        }
    }
}

/// Decoded metadata record.
///
/// Fields that are only validated when converting to attributes are kept
/// optional: SEED records carry no algorithm and decoding them must not depend
/// on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmuMetadata {
    pub scheme: KeyUsageScheme,
    pub algorithm: Option<MetadataAlgorithm>,
    pub size: Option<SizeClass>,
    pub rpolicy: RevocationPolicy,
    pub usage_flags: u8,
}

impl KmuMetadata {
    pub fn pack(&self) -> u32 {
        let mut word = MetadataWord(0);
        word.set_version(METADATA_VERSION);
        word.set_key_usage_scheme(self.scheme as u8);
        word.set_algorithm(self.algorithm.map_or(0, |alg| alg as u8));
        word.set_size(self.size.map_or(0, |size| size as u8));
        word.set_rpolicy(self.rpolicy as u8);
        word.set_usage_flags(self.usage_flags);
        word.0
    }

    pub fn unpack(raw: u32) -> KmuResult<Self> {
        let word = MetadataWord(raw);
        if word.version() != METADATA_VERSION {
            return Err(KmuError::BadState);
        }
        Ok(Self {
            scheme: KeyUsageScheme::try_from(word.key_usage_scheme())?,
            algorithm: MetadataAlgorithm::from_raw(word.algorithm()),
            size: SizeClass::try_from(word.size()).ok(),
            rpolicy: RevocationPolicy::try_from(word.rpolicy())?,
            usage_flags: word.usage_flags(),
        })
    }

    /// Builds the record for a key about to be provisioned.
    pub fn from_attributes(attributes: &KeyAttributes, config: &KmuConfig) -> KmuResult<Self> {
        let scheme = attributes.id.kmu_scheme()?;

        if scheme == KeyUsageScheme::Protected {
            let restricted = KeyUsage::EXPORT | KeyUsage::COPY;
            if attributes.usage.intersects(restricted) {
                return Err(KmuError::InvalidArgument);
            }
            // Protected RAM only feeds the AES engine.
            if attributes.key_type != KeyType::Aes {
                return Err(KmuError::NotSupported);
            }
        }

        if scheme == KeyUsageScheme::Seed {
            return Ok(Self {
                scheme,
                algorithm: None,
                size: Some(SizeClass::Bits384Seed),
                rpolicy: RevocationPolicy::Locked,
                usage_flags: 0,
            });
        }

        let algorithm = match MetadataAlgorithm::for_psa(attributes.algorithm)
            .filter(|alg| alg.is_enabled())
        {
            Some(alg) => {
                alg.check_key(attributes)?;
                Some(alg)
            }
            // The protected RAM invalidation key is never used for crypto operations.
            None if attributes.id.kmu_slot() == config.protected_ram_invalidation_slots[0] => {
                None
            }
            None => return Err(KmuError::NotSupported),
        };

        Ok(Self {
            scheme,
            algorithm,
            size: Some(SizeClass::from_key_bits(attributes.bits)?),
            rpolicy: RevocationPolicy::from_persistence(attributes.lifetime.persistence)?,
            usage_flags: encode_usage(attributes.usage)?,
        })
    }

    /// Rebuilds the attributes of the key whose primary slot is `slot`.
    pub fn to_attributes(&self, slot: u32) -> KmuResult<KeyAttributes> {
        let id = KeyId::from_kmu_slot(self.scheme, slot);
        let lifetime = Lifetime::kmu(self.rpolicy.persistence());

        if self.scheme == KeyUsageScheme::Seed {
            return Ok(KeyAttributes {
                id,
                key_type: KeyType::RawData,
                algorithm: Algorithm::None,
                bits: SizeClass::Bits384Seed.key_bits(),
                usage: KeyUsage::empty(),
                lifetime,
            });
        }

        let usage = decode_usage(self.usage_flags)?;
        // Data read back from the KMU was written by us; an unknown tag is corruption.
        let (key_type, algorithm) = self
            .algorithm
            .filter(|alg| alg.is_enabled())
            .ok_or(KmuError::HardwareFailure)?
            .psa_key(usage);
        let bits = self.size.ok_or(KmuError::DataInvalid)?.key_bits();

        if self.scheme == KeyUsageScheme::Protected
            && (key_type != KeyType::Aes || usage.intersects(KeyUsage::EXPORT | KeyUsage::COPY))
        {
            return Err(KmuError::CorruptionDetected);
        }

        Ok(KeyAttributes {
            id,
            key_type,
            algorithm,
            bits,
            usage,
            lifetime,
        })
    }

    /// Number of slots occupied by a key described by this record.
    pub fn slot_count(&self, key_type: KeyType) -> KmuResult<u32> {
        let secp_r1_public = key_type == KeyType::EccPublicKey(EccFamily::SecpR1);
        let count = match self.size.ok_or(KmuError::DataInvalid)? {
            SizeClass::Bits128 => 1,
            SizeClass::Bits192 | SizeClass::Bits255 | SizeClass::Bits256 => {
                if secp_r1_public {
                    4
                } else {
                    2
                }
            }
            SizeClass::Bits384Seed => 3,
            SizeClass::Bits384 => {
                if secp_r1_public {
                    6
                } else {
                    3
                }
            }
        };
        // Nonce and tag.
        if self.scheme == KeyUsageScheme::Encrypted {
            Ok(count + 2)
        } else {
            Ok(count)
        }
    }
}

/// Encodes `attributes` into a metadata word.
pub fn encode(attributes: &KeyAttributes, config: &KmuConfig) -> KmuResult<u32> {
    KmuMetadata::from_attributes(attributes, config).map(|metadata| metadata.pack())
}

/// Decodes the metadata word of the key whose primary slot is `slot`.
pub fn decode(word: u32, slot: u32) -> KmuResult<KeyAttributes> {
    KmuMetadata::unpack(word)?.to_attributes(slot)
}

fn encode_usage(usage: KeyUsage) -> KmuResult<u8> {
    let mut flags = 0u8;
    let mut represented = KeyUsage::empty();
    for (i, mapped) in USAGE_FLAGS_MAPPING.iter().enumerate() {
        if usage.intersects(*mapped) {
            flags |= 1 << i;
            represented |= *mapped;
        }
    }
    if !usage.difference(represented).is_empty() {
        return Err(KmuError::NotSupported);
    }
    Ok(flags)
}

fn decode_usage(flags: u8) -> KmuResult<KeyUsage> {
    let mut usage = KeyUsage::empty();
    let mut remaining = flags;
    let mut i = 0;
    while remaining != 0 {
        if remaining & 1 != 0 {
            usage |= *USAGE_FLAGS_MAPPING.get(i).ok_or(KmuError::GenericError)?;
        }
        remaining >>= 1;
        i += 1;
    }
    Ok(usage)
}

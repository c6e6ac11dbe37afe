// Licensed under the Apache-2.0 license

//! The subset of the PSA Crypto key attribute model consumed and produced by the
//! key store. Raw values match the PSA Crypto API and the CRACEN vendor extensions
//! so that attributes can be exchanged with a PSA core unchanged.

use crate::error::{KmuError, KmuResult};
use crate::metadata::KeyUsageScheme;
use bitflags::bitflags;

bitflags! {
    /// Key usage flags, bit compatible with `psa_key_usage_t`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyUsage: u32 {
        const EXPORT = 0x0000_0001;
        const COPY = 0x0000_0002;
        const CACHE = 0x0000_0004;
        const ENCRYPT = 0x0000_0100;
        const DECRYPT = 0x0000_0200;
        const SIGN_MESSAGE = 0x0000_0400;
        const VERIFY_MESSAGE = 0x0000_0800;
        const SIGN_HASH = 0x0000_1000;
        const VERIFY_HASH = 0x0000_2000;
        const DERIVE = 0x0000_4000;
    }
}

impl Default for KeyUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl KeyUsage {
    pub const fn can_sign(self) -> bool {
        self.intersects(Self::SIGN_MESSAGE.union(Self::SIGN_HASH))
    }

    pub const fn can_derive(self) -> bool {
        self.intersects(Self::DERIVE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EccFamily {
    SecpR1,
    TwistedEdwards,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KeyType {
    #[default]
    None,
    RawData,
    Aes,
    Chacha20,
    Hmac,
    EccKeyPair(EccFamily),
    EccPublicKey(EccFamily),
}

impl KeyType {
    pub const fn is_ecc(self) -> bool {
        matches!(self, KeyType::EccKeyPair(_) | KeyType::EccPublicKey(_))
    }

    pub const fn is_ecc_key_pair(self) -> bool {
        matches!(self, KeyType::EccKeyPair(_))
    }

    pub const fn ecc_family(self) -> Option<EccFamily> {
        match self {
            KeyType::EccKeyPair(family) | KeyType::EccPublicKey(family) => Some(family),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// Wildcard accepted by hash-and-sign policies.
    Any,
    Sha256,
    Sha384,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    None,
    StreamCipher,
    Chacha20Poly1305,
    Gcm,
    Ccm,
    EcbNoPadding,
    Ctr,
    CbcNoPadding,
    Sp800108CounterCmac,
    Cmac,
    PureEddsa,
    Ed25519ph,
    Ecdsa(HashAlgorithm),
    Hmac(HashAlgorithm),
    Ecdh,
}

/// Key persistence level, the low byte of a key lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Persistence {
    #[default]
    Volatile,
    Default,
    /// CRACEN: the key may be destroyed, but its slots are never reused.
    Revokable,
    /// CRACEN: built-in key that can never be destroyed.
    BuiltinReadOnly,
    ReadOnly,
    Other(u8),
}

impl Persistence {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => Persistence::Volatile,
            0x01 => Persistence::Default,
            0x02 => Persistence::Revokable,
            0x03 => Persistence::BuiltinReadOnly,
            0xff => Persistence::ReadOnly,
            other => Persistence::Other(other),
        }
    }

    pub const fn raw(self) -> u8 {
        match self {
            Persistence::Volatile => 0x00,
            Persistence::Default => 0x01,
            Persistence::Revokable => 0x02,
            Persistence::BuiltinReadOnly => 0x03,
            Persistence::ReadOnly => 0xff,
            Persistence::Other(raw) => raw,
        }
    }

    pub const fn is_read_only(self) -> bool {
        matches!(self, Persistence::ReadOnly | Persistence::BuiltinReadOnly)
    }
}

/// Key location, the upper 24 bits of a key lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location(u32);

impl Location {
    pub const LOCAL_STORAGE: Self = Self(0);
    pub const CRACEN: Self = Self(0x80_4e00);
    pub const CRACEN_KMU: Self = Self(0x80_4e4b);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & 0x00ff_ffff)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Lifetime {
    pub persistence: Persistence,
    pub location: Location,
}

impl Lifetime {
    pub const fn new(persistence: Persistence, location: Location) -> Self {
        Self {
            persistence,
            location,
        }
    }

    /// Lifetime of a key stored in the KMU.
    pub const fn kmu(persistence: Persistence) -> Self {
        Self::new(persistence, Location::CRACEN_KMU)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            persistence: Persistence::from_raw(raw as u8),
            location: Location::from_raw(raw >> 8),
        }
    }

    pub const fn raw(self) -> u32 {
        (self.location.raw() << 8) | self.persistence.raw() as u32
    }

    pub const fn is_kmu(self) -> bool {
        self.location.raw() == Location::CRACEN_KMU.raw()
    }
}

/// PSA key identifier.
///
/// Identifiers of KMU keys have the form `0x7fff_0000 | scheme << 12 | slot`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyId(pub u32);

impl KeyId {
    const KMU_BASE: u32 = 0x7fff_0000;
    const KMU_SCHEME_SHIFT: u32 = 12;
    const KMU_SCHEME_MASK: u32 = 0xf;
    const KMU_SLOT_MASK: u32 = 0xff;

    pub const fn from_kmu_slot(scheme: KeyUsageScheme, slot: u32) -> Self {
        Self(
            Self::KMU_BASE
                | ((scheme as u32) << Self::KMU_SCHEME_SHIFT)
                | (slot & Self::KMU_SLOT_MASK),
        )
    }

    pub const fn kmu_slot(self) -> u32 {
        self.0 & Self::KMU_SLOT_MASK
    }

    /// Key usage scheme encoded in a KMU key id.
    pub fn kmu_scheme(self) -> KmuResult<KeyUsageScheme> {
        let raw = (self.0 >> Self::KMU_SCHEME_SHIFT) & Self::KMU_SCHEME_MASK;
        KeyUsageScheme::try_from(raw as u8).map_err(|_| KmuError::InvalidArgument)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyAttributes {
    pub id: KeyId,
    pub key_type: KeyType,
    pub algorithm: Algorithm,
    pub bits: u16,
    pub usage: KeyUsage,
    pub lifetime: Lifetime,
}

impl KeyAttributes {
    /// Number of bytes needed to hold `bits` bits of key material.
    pub const fn key_bytes(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }
}

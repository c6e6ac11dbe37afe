// Licensed under the Apache-2.0 license

//! Opaque key store backed by the slots of a Key Management Unit.
//!
//! Keys are written to one or more fixed-size hardware slots together with a
//! packed metadata word describing them. Multi-slot writes are atomic through a
//! single-record write-ahead log kept in a reserved slot. Key material is only
//! read back just in time, into a push area that is zeroed after use.

#![cfg_attr(not(test), no_std)]

pub mod accessor;
pub mod config;
pub mod crypto;
pub mod driver;
pub mod encrypted;
pub mod error;
pub mod hw;
pub mod lifecycle;
pub mod metadata;
pub mod opaque;
pub mod provision;
pub mod psa;
pub mod push_area;
#[cfg(test)]
mod testing;
pub mod wal;

pub use accessor::{BuiltinKey, StagedKey};
pub use config::KmuConfig;
pub use crypto::KmuCrypto;
pub use driver::Kmu;
pub use error::{KmuError, KmuResult};
pub use hw::{KmuHardware, KmuHwError, PushRegion, RevocationPolicy, SlotSource};
pub use metadata::{decode, encode, KeyUsageScheme};
pub use opaque::{OpaqueKey, OPAQUE_KEY_SIZE};
pub use psa::{
    Algorithm, EccFamily, HashAlgorithm, KeyAttributes, KeyId, KeyType, KeyUsage, Lifetime,
    Location, Persistence,
};
pub use wal::{ProvisioningLog, SlotRange};

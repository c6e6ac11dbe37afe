// Licensed under the Apache-2.0 license

//! Interface to the KMU slot primitive.
//!
//! The key store never caches slot state; every decision is taken on what the
//! hardware reports at the time of the call.

use crate::error::{KmuError, KmuResult};
use crate::psa::Persistence;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Width of a single key slot.
pub const SLOT_SIZE: usize = 16;
/// Number of slots in the KMU.
pub const SLOT_COUNT: u32 = 256;
/// Size of the protected RAM region that AES keys of the PROTECTED scheme are pushed to.
pub const PROTECTED_RAM_SIZE: usize = 32;
/// Size of the seed register that SEED scheme keys are pushed to.
pub const SEED_SIZE: usize = 48;

/// Errors reported by the slot primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KmuHwError {
    /// The slot has been revoked.
    Revoked,
    /// Any other failure: empty slot, blocked slot, rejected write.
    Error,
}

/// Revocation policy stored with every slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RevocationPolicy {
    /// Revoking erases the slot and makes it available again.
    Rotating = 1,
    /// The slot can never be revoked.
    Locked = 2,
    /// Revoking makes the slot permanently unusable.
    Revoked = 3,
}

impl TryFrom<u8> for RevocationPolicy {
    type Error = KmuError;

    fn try_from(value: u8) -> Result<Self, KmuError> {
        match value {
            1 => Ok(RevocationPolicy::Rotating),
            2 => Ok(RevocationPolicy::Locked),
            3 => Ok(RevocationPolicy::Revoked),
            _ => Err(KmuError::StorageFailure),
        }
    }
}

impl RevocationPolicy {
    pub fn from_persistence(persistence: Persistence) -> KmuResult<Self> {
        match persistence {
            Persistence::ReadOnly | Persistence::BuiltinReadOnly => Ok(RevocationPolicy::Locked),
            Persistence::Default => Ok(RevocationPolicy::Rotating),
            Persistence::Revokable => Ok(RevocationPolicy::Revoked),
            _ => Err(KmuError::InvalidArgument),
        }
    }

    pub const fn persistence(self) -> Persistence {
        match self {
            RevocationPolicy::Rotating => Persistence::Default,
            RevocationPolicy::Locked => Persistence::BuiltinReadOnly,
            RevocationPolicy::Revoked => Persistence::Revokable,
        }
    }
}

/// Memory region a slot is copied to when pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PushRegion {
    /// The shared push area owned by the key store.
    PushArea,
    /// Write-only key registers of the symmetric crypto engine.
    ProtectedRam,
    /// The KDF seed register.
    Seed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotDestination {
    pub region: PushRegion,
    /// Byte offset inside `region`.
    pub offset: usize,
}

/// Everything written to a slot by a provision call.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SlotSource {
    pub value: [u8; SLOT_SIZE],
    pub metadata: u32,
    #[zeroize(skip)]
    pub rpolicy: RevocationPolicy,
    #[zeroize(skip)]
    pub dest: SlotDestination,
}

/// Raw access to the KMU slots.
pub trait KmuHardware {
    fn is_slot_empty(&self, slot: u32) -> bool;

    /// Returns the metadata word of a provisioned slot.
    fn read_metadata(&self, slot: u32) -> Result<u32, KmuHwError>;

    /// Writes an empty slot. Slots are write-once until revoked.
    fn provision_slot(&mut self, slot: u32, source: &SlotSource) -> Result<(), KmuHwError>;

    fn revoke_slot(&mut self, slot: u32) -> Result<(), KmuHwError>;

    /// Copies the slot value to its destination. `push_area` receives the value
    /// when the destination is [`PushRegion::PushArea`].
    fn push_slot(&mut self, slot: u32, push_area: &mut [u8]) -> Result<(), KmuHwError>;

    /// Locks `count` slots starting at `slot` until the next reset.
    fn block_slot_range(&mut self, slot: u32, count: u32) -> Result<(), KmuHwError>;
}

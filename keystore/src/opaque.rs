// Licensed under the Apache-2.0 license

use crate::error::{KmuError, KmuResult};
use crate::metadata::KeyUsageScheme;
use core::ops::Range;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Size of the serialized form of an [`OpaqueKey`].
pub const OPAQUE_KEY_SIZE: usize = core::mem::size_of::<OpaqueKeyBuffer>();

/// Handle standing in for a key whose bytes stay in the KMU until staged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpaqueKey {
    pub scheme: KeyUsageScheme,
    pub number_of_slots: u32,
    pub slot_id: u32,
}

/// Wire form of [`OpaqueKey`] handed to the crypto core as the key buffer.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
struct OpaqueKeyBuffer {
    key_usage_scheme: U32,
    number_of_slots: U32,
    slot_id: U32,
}

impl OpaqueKey {
    pub fn slots(&self) -> Range<u32> {
        self.slot_id..self.slot_id + self.number_of_slots
    }

    /// Serializes the handle into the start of `out`. Returns the number of bytes written.
    pub fn write_to(&self, out: &mut [u8]) -> KmuResult<usize> {
        let buffer = OpaqueKeyBuffer {
            key_usage_scheme: U32::new(self.scheme as u32),
            number_of_slots: U32::new(self.number_of_slots),
            slot_id: U32::new(self.slot_id),
        };
        out.get_mut(..OPAQUE_KEY_SIZE)
            .ok_or(KmuError::BufferTooSmall)?
            .copy_from_slice(buffer.as_bytes());
        Ok(OPAQUE_KEY_SIZE)
    }

    pub fn from_bytes(bytes: &[u8]) -> KmuResult<Self> {
        let prefix = bytes
            .get(..OPAQUE_KEY_SIZE)
            .ok_or(KmuError::InvalidArgument)?;
        let buffer =
            OpaqueKeyBuffer::read_from_bytes(prefix).map_err(|_| KmuError::InvalidArgument)?;
        let scheme = u8::try_from(buffer.key_usage_scheme.get())
            .map_err(|_| KmuError::InvalidArgument)
            .and_then(KeyUsageScheme::try_from)?;
        Ok(Self {
            scheme,
            number_of_slots: buffer.number_of_slots.get(),
            slot_id: buffer.slot_id.get(),
        })
    }
}

// Licensed under the Apache-2.0 license

use core::ops::{Deref, DerefMut};
use zeroize::Zeroize;

/// Size of the shared push area: six slots.
pub const PUSH_AREA_SIZE: usize = 96;

/// RAM that slots with the [`crate::hw::PushRegion::PushArea`] destination are
/// pushed to.
///
/// The area can only be reached through [`PushArea::acquire`], which hands out a
/// single exclusive guard that zeroes the area when dropped.
pub struct PushArea {
    bytes: [u8; PUSH_AREA_SIZE],
}

impl Default for PushArea {
    fn default() -> Self {
        Self::new()
    }
}

impl PushArea {
    pub const fn new() -> Self {
        Self {
            bytes: [0; PUSH_AREA_SIZE],
        }
    }

    pub fn acquire(&mut self) -> PushAreaGuard<'_> {
        PushAreaGuard {
            bytes: &mut self.bytes,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }
}

pub struct PushAreaGuard<'a> {
    bytes: &'a mut [u8; PUSH_AREA_SIZE],
}

impl PushAreaGuard<'_> {
    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }
}

impl Deref for PushAreaGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl DerefMut for PushAreaGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..]
    }
}

impl Drop for PushAreaGuard<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

// Licensed under the Apache-2.0 license

//! Single-record write-ahead log over the KMU slots.
//!
//! Before a range of slots is written or revoked as a unit, the range is recorded
//! in a dedicated marker slot. The marker is removed once the operation is
//! complete. Finding a marker on entry therefore means an operation was
//! interrupted, and every slot of the recorded range is revoked.

use crate::error::{KmuError, KmuResult};
use crate::hw::{
    KmuHardware, PushRegion, RevocationPolicy, SlotDestination, SlotSource, SLOT_SIZE,
};
use bitfield::bitfield;
use core::ops::Range;
use log::{debug, error, warn};

bitfield! {
    /// Metadata word of the marker slot.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TransactionMarker(u32);
    impl Debug;
    u32;
    pub slot_count, set_slot_count: 7, 0;
    pub first_slot, set_first_slot: 31, 8;
}

/// A contiguous run of slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotRange {
    pub first: u32,
    pub count: u32,
}

impl SlotRange {
    pub const fn new(first: u32, count: u32) -> Self {
        Self { first, count }
    }

    pub fn slots(&self) -> Range<u32> {
        self.first..self.first + self.count
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.slots().contains(&slot)
    }

    fn marker(&self) -> TransactionMarker {
        let mut marker = TransactionMarker(0);
        marker.set_first_slot(self.first);
        marker.set_slot_count(self.count);
        marker
    }

    fn from_marker(marker: TransactionMarker) -> Self {
        Self::new(marker.first_slot(), marker.slot_count())
    }
}

pub struct ProvisioningLog {
    marker_slot: u32,
}

impl ProvisioningLog {
    pub const fn new(marker_slot: u32) -> Self {
        Self { marker_slot }
    }

    pub fn marker_slot(&self) -> u32 {
        self.marker_slot
    }

    /// The range recorded by an unfinished operation, if any.
    pub fn pending<H: KmuHardware>(&self, hw: &H) -> Option<SlotRange> {
        hw.read_metadata(self.marker_slot)
            .ok()
            .map(|word| SlotRange::from_marker(TransactionMarker(word)))
    }

    /// Records `range` as in progress.
    pub fn begin<H: KmuHardware>(&self, hw: &mut H, range: SlotRange) -> KmuResult<()> {
        let source = SlotSource {
            value: [0; SLOT_SIZE],
            metadata: range.marker().0,
            rpolicy: RevocationPolicy::Rotating,
            dest: SlotDestination {
                region: PushRegion::PushArea,
                offset: 0,
            },
        };
        hw.provision_slot(self.marker_slot, &source).map_err(|_| {
            error!("kmu: failed to write transaction marker for {:?}", range);
            KmuError::HardwareFailure
        })?;
        debug!("kmu: transaction started for {:?}", range);
        Ok(())
    }

    /// Removes the marker: the recorded operation is complete.
    pub fn commit<H: KmuHardware>(&self, hw: &mut H) -> KmuResult<()> {
        hw.revoke_slot(self.marker_slot).map_err(|_| {
            error!("kmu: failed to clear transaction marker");
            KmuError::HardwareFailure
        })?;
        debug!("kmu: transaction committed");
        Ok(())
    }

    /// Revokes every slot of an unfinished operation, then the marker itself.
    ///
    /// Slots that are already empty are skipped: a previous recovery may have
    /// been interrupted halfway. Returns the range that was rolled back.
    pub fn recover<H: KmuHardware>(&self, hw: &mut H) -> KmuResult<Option<SlotRange>> {
        let Some(range) = self.pending(hw) else {
            return Ok(None);
        };
        warn!("kmu: rolling back unfinished transaction on {:?}", range);

        for slot in range.slots() {
            if hw.revoke_slot(slot).is_err() && !hw.is_slot_empty(slot) {
                error!("kmu: failed to revoke slot {} during rollback", slot);
                return Err(KmuError::HardwareFailure);
            }
        }

        self.commit(hw)?;
        Ok(Some(range))
    }
}

// Licensed under the Apache-2.0 license

use emulator_kmu::{EmulatedKmu, SlotState};
use kmu_keystore::hw::{PushRegion, RevocationPolicy, SlotDestination, SlotSource, SLOT_SIZE};
use kmu_keystore::{KeyUsageScheme, KmuError, KmuHardware, ProvisioningLog, SlotRange};
use tests_integration::{aes_gcm, is_empty, new_kmu, reboot, secp256r1_point, secp256r1_public_key};

const MARKER_SLOT: u32 = 186;

fn secondary(offset: usize) -> SlotSource {
    SlotSource {
        value: [0xa5; SLOT_SIZE],
        metadata: u32::MAX,
        rpolicy: RevocationPolicy::Rotating,
        dest: SlotDestination {
            region: PushRegion::PushArea,
            offset,
        },
    }
}

#[test]
fn test_failed_write_rolls_back() {
    for failing_slot in 20..24 {
        let mut kmu = new_kmu();
        let attrs = secp256r1_public_key(KeyUsageScheme::Raw, 20);
        kmu.hardware_mut().fail_provision_at(failing_slot);

        assert_eq!(
            kmu.provision(&attrs, 20, &secp256r1_point()),
            Err(KmuError::HardwareFailure)
        );
        assert_eq!(
            kmu.hardware().snapshot(),
            EmulatedKmu::new().snapshot(),
            "fault at slot {}",
            failing_slot
        );
        assert_eq!(kmu.get_builtin_key(20), Err(KmuError::DoesNotExist));

        // The range is usable again once rolled back.
        kmu.provision(&attrs, 20, &secp256r1_point()).unwrap();
    }
}

#[test]
fn test_interrupted_provisioning_is_rolled_back_after_reset() {
    let mut kmu = new_kmu();
    let log = ProvisioningLog::new(MARKER_SLOT);
    let range = SlotRange::new(30, 3);
    log.begin(kmu.hardware_mut(), range).unwrap();
    kmu.hardware_mut().provision_slot(30, &secondary(0)).unwrap();
    kmu.hardware_mut().provision_slot(31, &secondary(16)).unwrap();

    let mut kmu = reboot(kmu);
    assert_eq!(kmu.get_builtin_key(30), Err(KmuError::DoesNotExist));
    for slot in range.slots() {
        assert!(is_empty(&kmu, slot), "slot {}", slot);
    }
    assert!(is_empty(&kmu, MARKER_SLOT));
    assert_eq!(kmu.clean_up_unfinished_provisioning(), Ok(None));
}

#[test]
fn test_rollback_is_idempotent() {
    let mut kmu = new_kmu();
    let log = ProvisioningLog::new(MARKER_SLOT);
    let range = SlotRange::new(30, 3);
    log.begin(kmu.hardware_mut(), range).unwrap();
    // A previous rollback already revoked the first slot before a reset.
    kmu.hardware_mut().provision_slot(31, &secondary(16)).unwrap();

    assert_eq!(kmu.clean_up_unfinished_provisioning(), Ok(Some(range)));
    assert_eq!(kmu.hardware().snapshot(), EmulatedKmu::new().snapshot());
    assert_eq!(kmu.clean_up_unfinished_provisioning(), Ok(None));
}

#[test]
fn test_occupied_range_is_untouched() {
    let mut kmu = new_kmu();
    let attrs = aes_gcm(KeyUsageScheme::Raw, 40, 256);
    kmu.provision(&attrs, 40, &[1; 32]).unwrap();

    let snapshot = kmu.hardware().snapshot();
    let writes = kmu.hardware().write_count();

    let overlapping = aes_gcm(KeyUsageScheme::Raw, 39, 256);
    assert_eq!(
        kmu.provision(&overlapping, 39, &[2; 32]),
        Err(KmuError::AlreadyExists)
    );
    let overlapping = aes_gcm(KeyUsageScheme::Raw, 41, 256);
    assert_eq!(
        kmu.provision(&overlapping, 41, &[2; 32]),
        Err(KmuError::AlreadyExists)
    );

    assert_eq!(kmu.hardware().snapshot(), snapshot);
    assert_eq!(kmu.hardware().write_count(), writes);
}

#[test]
fn test_reserved_and_out_of_range_slots() {
    let mut kmu = new_kmu();

    let attrs = aes_gcm(KeyUsageScheme::Raw, MARKER_SLOT - 1, 256);
    assert_eq!(
        kmu.provision(&attrs, MARKER_SLOT - 1, &[1; 32]),
        Err(KmuError::InvalidArgument)
    );
    let attrs = aes_gcm(KeyUsageScheme::Raw, 255, 256);
    assert_eq!(
        kmu.provision(&attrs, 255, &[1; 32]),
        Err(KmuError::InvalidArgument)
    );
    assert_eq!(kmu.hardware().write_count(), 0);
}

#[test]
fn test_single_slot_key_needs_no_marker() {
    let mut kmu = new_kmu();
    let attrs = aes_gcm(KeyUsageScheme::Raw, 50, 128);
    kmu.provision(&attrs, 50, &[1; 16]).unwrap();
    assert_eq!(kmu.hardware().write_count(), 1);

    let attrs = aes_gcm(KeyUsageScheme::Raw, 51, 256);
    kmu.provision(&attrs, 51, &[1; 32]).unwrap();
    // Marker write, two slots, marker revocation.
    assert_eq!(kmu.hardware().write_count(), 5);
    assert!(is_empty(&kmu, MARKER_SLOT));
}

#[test]
fn test_interrupted_destroy_completes_after_reset() {
    let mut kmu = new_kmu();
    let attrs = aes_gcm(KeyUsageScheme::Raw, 60, 256);
    kmu.provision(&attrs, 60, &[4; 32]).unwrap();

    // Reset after the marker and the first revocation.
    let log = ProvisioningLog::new(MARKER_SLOT);
    log.begin(kmu.hardware_mut(), SlotRange::new(60, 2)).unwrap();
    kmu.hardware_mut().revoke_slot(60).unwrap();

    let mut kmu = reboot(kmu);
    assert_eq!(kmu.get_key_slot(attrs.id), Err(KmuError::DoesNotExist));
    assert!(matches!(
        kmu.hardware().slot(61),
        Some(SlotState::Provisioned(_))
    ));

    assert_eq!(
        kmu.clean_up_unfinished_provisioning(),
        Ok(Some(SlotRange::new(60, 2)))
    );
    assert!(is_empty(&kmu, 61));
    assert!(is_empty(&kmu, MARKER_SLOT));
}

// Licensed under the Apache-2.0 license

use emulator_kmu::SlotState;
use kmu_keystore::{KeyUsageScheme, KmuError};
use tests_integration::{aes_gcm, is_empty, new_kmu};

#[test]
fn test_invalidation_slots_are_provisioned_once() {
    let mut kmu = new_kmu();
    assert_eq!(kmu.push_prot_ram_inv_slots(), Err(KmuError::HardwareFailure));

    kmu.provision_prot_ram_inv_slots().unwrap();
    assert!(!is_empty(&kmu, 248));
    assert!(!is_empty(&kmu, 249));
    let writes = kmu.hardware().write_count();
    let snapshot = kmu.hardware().snapshot();

    kmu.provision_prot_ram_inv_slots().unwrap();
    assert_eq!(kmu.hardware().write_count(), writes);
    assert_eq!(kmu.hardware().snapshot(), snapshot);

    // Not a key that can be used.
    assert_eq!(kmu.get_builtin_key(248), Err(KmuError::InvalidArgument));

    kmu.push_prot_ram_inv_slots().unwrap();
    let mut expected = [0u8; 32];
    for (i, slot) in [248u32, 249].into_iter().enumerate() {
        match kmu.hardware().slot(slot) {
            Some(SlotState::Provisioned(stored)) => {
                expected[i * 16..(i + 1) * 16].copy_from_slice(&stored.value)
            }
            other => panic!("unexpected slot state {:?}", other),
        }
    }
    assert_eq!(kmu.hardware().protected_ram(), &expected);
}

#[test]
fn test_staged_protected_key_is_invalidated() {
    let mut kmu = new_kmu();
    kmu.provision_prot_ram_inv_slots().unwrap();

    let key = [0x5cu8; 32];
    kmu.provision(&aes_gcm(KeyUsageScheme::Protected, 10, 256), 10, &key)
        .unwrap();
    let builtin = kmu.get_builtin_key(10).unwrap();

    {
        let staged = kmu.prepare_key(&builtin.handle).unwrap();
        assert!(staged.material().is_empty());
        assert_eq!(staged.key(), &builtin.handle);
        staged.finish().unwrap();
    }
    assert_ne!(kmu.hardware().protected_ram(), &key);

    // Dropping the guard cleans up as well.
    drop(kmu.prepare_key(&builtin.handle).unwrap());
    assert_ne!(kmu.hardware().protected_ram(), &key);

    kmu.clean_key(&builtin.handle).unwrap();
    assert_ne!(kmu.hardware().protected_ram(), &key);
}

#[test]
fn test_staged_raw_key() {
    let mut kmu = new_kmu();
    let key = [0x21u8; 24];
    kmu.provision(&aes_gcm(KeyUsageScheme::Raw, 10, 192), 10, &key)
        .unwrap();
    let builtin = kmu.get_builtin_key(10).unwrap();

    {
        let staged = kmu.prepare_key(&builtin.handle).unwrap();
        assert_eq!(staged.material().len(), 32);
        assert_eq!(&staged.material()[..24], &key);
        assert!(staged.material()[24..].iter().all(|b| *b == 0));
    }
    assert!(kmu.push_area_is_clear());
}

#[test]
fn test_protected_key_without_invalidation_slots() {
    let mut kmu = new_kmu();
    kmu.provision(
        &aes_gcm(KeyUsageScheme::Protected, 10, 128),
        10,
        &[0x5c; 16],
    )
    .unwrap();
    let builtin = kmu.get_builtin_key(10).unwrap();

    let staged = kmu.prepare_key(&builtin.handle).unwrap();
    assert_eq!(staged.finish(), Err(KmuError::HardwareFailure));
}

// Licensed under the Apache-2.0 license

use emulator_kmu::{EmulatedKmu, SlotState, SoftCrypto};
use kmu_keystore::{KeyUsage, KeyUsageScheme, Kmu, KmuError};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tests_integration::{aes_gcm, new_kmu, secp256r1_point, secp256r1_public_key, MASTER_KEY};

fn exportable_aes(slot: u32, bits: u16) -> kmu_keystore::KeyAttributes {
    let mut attrs = aes_gcm(KeyUsageScheme::Encrypted, slot, bits);
    attrs.usage |= KeyUsage::EXPORT;
    attrs
}

#[test]
fn test_encrypted_key_round_trip() {
    let mut kmu = new_kmu();
    let mut rng = StdRng::seed_from_u64(1);

    for (slot, bits) in [(10u32, 128u16), (20, 192), (30, 256)] {
        let mut key = vec![0u8; usize::from(bits / 8)];
        rng.fill_bytes(&mut key);
        let attrs = exportable_aes(slot, bits);
        kmu.provision(&attrs, slot, &key).unwrap();

        let builtin = kmu.get_builtin_key(slot).unwrap();
        assert_eq!(builtin.handle.scheme, KeyUsageScheme::Encrypted);
        // Nonce and tag take a slot each.
        assert_eq!(
            builtin.handle.number_of_slots,
            key.len().div_ceil(16) as u32 + 2
        );

        let mut out = [0u8; 32];
        let len = kmu.export_key(&builtin, &mut out).unwrap();
        assert_eq!(hex::encode(&out[..len]), hex::encode(&key));
        assert!(kmu.push_area_is_clear());
    }
}

#[test]
fn test_ciphertext_is_stored() {
    let mut kmu = new_kmu();
    let key = [0x61u8; 32];
    kmu.provision(&exportable_aes(10, 256), 10, &key).unwrap();

    for slot in 10..14 {
        match kmu.hardware().slot(slot) {
            Some(SlotState::Provisioned(stored)) => {
                assert_ne!(stored.value, [0x61u8; 16], "slot {}", slot)
            }
            other => panic!("unexpected slot state {:?}", other),
        }
    }
}

#[test]
fn test_encrypted_public_key() {
    let mut kmu = new_kmu();
    let attrs = secp256r1_public_key(KeyUsageScheme::Encrypted, 40);
    let point = secp256r1_point();
    kmu.provision(&attrs, 40, &point).unwrap();

    let builtin = kmu.get_builtin_key(40).unwrap();
    assert_eq!(builtin.handle.number_of_slots, 6);
    let mut out = [0u8; 65];
    assert_eq!(kmu.export_key(&builtin, &mut out), Ok(65));
    assert_eq!(out, point);
}

#[test]
fn test_oversized_encrypted_key() {
    let mut kmu = new_kmu();
    let mut attrs = secp256r1_public_key(KeyUsageScheme::Encrypted, 40);
    attrs.bits = 384;
    let mut point = [0x17u8; 97];
    point[0] = 0x04;
    assert_eq!(
        kmu.provision(&attrs, 40, &point),
        Err(KmuError::NotSupported)
    );
    assert_eq!(kmu.hardware().write_count(), 0);
}

#[test]
fn test_tampering_is_detected() {
    // Nonce, ciphertext and tag slots.
    for (slot, byte) in [(10u32, 0usize), (10, 15), (11, 3), (12, 9), (13, 0)] {
        let mut kmu = new_kmu();
        kmu.provision(&exportable_aes(10, 256), 10, &[0x33; 32]).unwrap();
        assert!(kmu.hardware_mut().flip_value_bit(slot, byte, 0));

        let builtin = kmu.get_builtin_key(10).unwrap();
        let mut out = [0u8; 32];
        assert_eq!(
            kmu.export_key(&builtin, &mut out),
            Err(KmuError::HardwareFailure),
            "slot {} byte {}",
            slot,
            byte
        );
        assert_eq!(out, [0u8; 32]);
        assert!(kmu.push_area_is_clear());
    }
}

#[test]
fn test_record_is_bound_to_master_key() {
    let mut kmu = new_kmu();
    kmu.provision(&exportable_aes(10, 128), 10, &[0x44; 16]).unwrap();
    let builtin = kmu.get_builtin_key(10).unwrap();

    let (hw, _) = kmu.into_parts();
    let mut other_device: Kmu<EmulatedKmu, SoftCrypto> =
        Kmu::new(hw, SoftCrypto::new([!MASTER_KEY[0]; 32], 0), None);
    assert_eq!(
        other_device.export_key(&builtin, &mut [0u8; 16]),
        Err(KmuError::HardwareFailure)
    );
}

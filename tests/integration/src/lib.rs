// Licensed under the Apache-2.0 license

//! Shared setup for the key store integration tests.

use emulator_kmu::{EmulatedKmu, SlotState, SoftCrypto};
use kmu_keystore::{
    Algorithm, EccFamily, HashAlgorithm, KeyAttributes, KeyId, KeyType, KeyUsage,
    KeyUsageScheme, Kmu, Lifetime, Persistence,
};
use log::LevelFilter;
use simple_logger::SimpleLogger;

pub type TestKmu = Kmu<EmulatedKmu, SoftCrypto>;

pub const MASTER_KEY: [u8; 32] = [0x3c; 32];

pub fn init_logger() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
}

pub fn new_kmu() -> TestKmu {
    init_logger();
    Kmu::new(EmulatedKmu::new(), SoftCrypto::new(MASTER_KEY, 0), None)
}

/// Rebuilds a driver over the slots of `hw`, as after a device reset.
pub fn reboot(kmu: TestKmu) -> TestKmu {
    let (mut hw, crypto) = kmu.into_parts();
    hw.reset();
    Kmu::new(hw, crypto, None)
}

pub fn attributes(
    scheme: KeyUsageScheme,
    slot: u32,
    key_type: KeyType,
    algorithm: Algorithm,
    bits: u16,
    usage: KeyUsage,
    persistence: Persistence,
) -> KeyAttributes {
    KeyAttributes {
        id: KeyId::from_kmu_slot(scheme, slot),
        key_type,
        algorithm,
        bits,
        usage,
        lifetime: Lifetime::kmu(persistence),
    }
}

pub fn aes_gcm(scheme: KeyUsageScheme, slot: u32, bits: u16) -> KeyAttributes {
    attributes(
        scheme,
        slot,
        KeyType::Aes,
        Algorithm::Gcm,
        bits,
        KeyUsage::ENCRYPT | KeyUsage::DECRYPT,
        Persistence::Default,
    )
}

pub fn secp256r1_public_key(scheme: KeyUsageScheme, slot: u32) -> KeyAttributes {
    attributes(
        scheme,
        slot,
        KeyType::EccPublicKey(EccFamily::SecpR1),
        Algorithm::Ecdsa(HashAlgorithm::Sha256),
        256,
        KeyUsage::VERIFY_HASH | KeyUsage::VERIFY_MESSAGE | KeyUsage::EXPORT,
        Persistence::Default,
    )
}

/// An uncompressed P-256 point: indicator followed by 64 coordinate bytes.
pub fn secp256r1_point() -> [u8; 65] {
    let mut point = [0u8; 65];
    point[0] = 0x04;
    for (i, byte) in point[1..].iter_mut().enumerate() {
        *byte = i as u8 + 1;
    }
    point
}

pub fn is_empty(kmu: &TestKmu, slot: u32) -> bool {
    matches!(kmu.hardware().slot(slot), Some(SlotState::Empty))
}

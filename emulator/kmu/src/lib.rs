/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the KMU emulator library.

--*/

pub mod crypto;
pub mod kmu;

pub use crypto::SoftCrypto;
pub use kmu::{EmulatedKmu, ProvisionedSlot, SlotState};

// Licensed under the Apache-2.0 license

use thiserror_no_std::Error;

pub type KmuResult<T> = Result<T, KmuError>;

/// Errors reported by the key store.
///
/// Slot primitive failures are not converted automatically: each operation maps
/// [`crate::hw::KmuHwError`] to the kind it documents.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmuError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not supported")]
    NotSupported,
    #[error("key slots already in use")]
    AlreadyExists,
    #[error("key does not exist")]
    DoesNotExist,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("hardware failure")]
    HardwareFailure,
    #[error("unsupported metadata version")]
    BadState,
    #[error("generic error")]
    GenericError,
    #[error("invalid key size class")]
    DataInvalid,
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("corrupted key metadata")]
    CorruptionDetected,
    #[error("invalid revocation policy")]
    StorageFailure,
}

//! Destripe error types

use thiserror::Error;

/// Construction failure: bad arguments or an unusable backing device.
///
/// All variants are fatal to construction and never partially applied —
/// any resource acquired before the failing check is released before the
/// error is returned.
#[derive(Error, Debug)]
pub enum ConstructError {
    /// Fewer than the three leading positional arguments
    #[error("not enough arguments (need at least 3)")]
    NotEnoughArguments,

    /// Stripe count failed to parse or is outside 2..=16
    #[error("invalid stripe count (must be 2-16)")]
    InvalidStripeCount,

    /// Stripe index failed to parse or is >= stripe count
    #[error("invalid stripe index (must be 0 - stripes-1)")]
    InvalidStripeIndex,

    /// Chunk size failed to parse or is zero
    #[error("invalid chunk size")]
    InvalidChunkSize,

    /// Chunk size is not a power of two or is smaller than one page
    #[error("chunk size must be a power of two, at least {min} sectors")]
    UnalignedChunkSize { min: u64 },

    /// Target length is not a whole number of chunks
    #[error("target length not divisible by chunk size")]
    UnalignedLength,

    /// Total argument count does not describe exactly one device
    #[error("destripe needs 3 arguments and 1 destination device specified")]
    WrongArgumentCount,

    /// Device-count token present but not 1
    #[error("destination device count must be 1")]
    InvalidDeviceCount,

    /// Target name exceeds the cached-name bound
    #[error("target name too long (max {max} bytes)")]
    NameTooLong { max: usize },

    /// Device start sector failed to parse
    #[error("couldn't parse destination device start sector")]
    InvalidDeviceStart,

    /// Backing device name did not resolve to a handle
    #[error("invalid destination device: {0}")]
    DeviceUnavailable(#[source] std::io::Error),

    /// Backing device capacity query failed
    #[error("error reading destination device capacity: {0}")]
    CapacityQuery(#[source] std::io::Error),

    /// Backing device is too small for stripe_count * target_length
    #[error("device capacity {actual} sectors below required {required}")]
    InsufficientCapacity { required: u64, actual: u64 },
}

/// Completion error reported by the backing device, as classified by the
/// completion monitor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// Transient condition; passed through unchanged on read-ahead
    /// requests and never counted against device health there.
    #[error("operation would block")]
    WouldBlock,

    /// The backing device does not support the operation (e.g. discard);
    /// passed through unchanged, not a device-health signal.
    #[error("operation not supported")]
    Unsupported,

    /// Any other device failure; counted against the device and eligible
    /// to raise a health event.
    #[error("device error: {0}")]
    Device(String),
}

/// Runtime command channel rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Malformed command, or a well-formed command that is not
    /// implemented (currently all of them).
    #[error("invalid argument")]
    InvalidArgument,
}

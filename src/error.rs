//! Error types and the numeric status contract.
//!
//! Every fallible operation returns [`Result`]. Each [`Error`] maps to one
//! [`ErrorKind`], and each kind has a stable negative status code so that
//! callers bridging to C-style interfaces can keep the numeric contract.

use crate::transport::UsbError;
use crate::types::{ChipType, SessionState};

/// The error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Context buffers could not be allocated.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// The bus could not be queried for devices.
    #[error("device enumeration failed: {0}")]
    Enumeration(#[source] UsbError),

    /// Opening a device failed. `code` follows the classic open status table
    /// (-3 not found, -4 open failed, -5 claim failed, -6 reset failed,
    /// -7 default baud rate failed).
    #[error("unable to open device ({code}): {message}")]
    Open {
        /// Detailed open status.
        code: i32,
        /// Description of the failure.
        message: String,
    },

    /// The requested baud rate cannot be achieved within tolerance.
    #[error("unsupported baud rate: requested {requested}, nearest achievable {actual}")]
    UnsupportedBaudRate {
        /// The requested baud rate.
        requested: u32,
        /// The nearest achievable baud rate.
        actual: u32,
    },

    /// Invalid configuration argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not supported for this chip type.
    #[error("unsupported operation for chip type {0:?}")]
    UnsupportedChip(ChipType),

    /// The operation is not allowed in the current session state.
    #[error("{operation} not allowed while session is {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// A USB transfer failed or timed out.
    #[error("transfer failed: {0}")]
    Transport(#[from] UsbError),

    /// A transfer moved fewer bytes than requested.
    #[error("short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// An EEPROM word address beyond the chip's EEPROM.
    #[error("EEPROM address {address:#04x} out of range (max {max:#04x})")]
    OutOfRange {
        /// The rejected word address.
        address: u16,
        /// The highest valid word address.
        max: u16,
    },

    /// The strings do not fit the EEPROM image.
    #[error("EEPROM strings need {needed} bytes, only {available} available")]
    EepromSizeExceeded {
        /// Bytes the string descriptors require.
        needed: usize,
        /// Bytes left in the string area.
        available: usize,
    },

    /// EEPROM checksum verification failed.
    #[error("EEPROM checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    EepromChecksum {
        /// Checksum word stored in the image.
        stored: u16,
        /// Checksum computed over the image.
        computed: u16,
    },

    /// The EEPROM image layout is inconsistent.
    #[error("EEPROM format error: {0}")]
    EepromFormat(String),

    /// The context was used after `destroy`.
    #[error("context used after destroy")]
    UseAfterFree,
}

/// A specialized `Result` type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] with a stable numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Resource exhaustion at context creation. Fatal for the context.
    Allocation,
    /// Bus query failure. Retryable.
    Enumeration,
    /// Device not found or already claimed.
    Open,
    /// Unsupported configuration value.
    Config,
    /// Operation attempted from a disallowed state.
    InvalidState,
    /// Transient I/O failure, short transfer or timeout.
    Transport,
    /// Address or index outside chip bounds.
    OutOfRange,
    /// Corrupt persisted data.
    Format,
    /// Operation on a destroyed context.
    UseAfterFree,
}

impl ErrorKind {
    const ALL: [ErrorKind; 9] = [
        ErrorKind::Allocation,
        ErrorKind::Enumeration,
        ErrorKind::Open,
        ErrorKind::Config,
        ErrorKind::InvalidState,
        ErrorKind::Transport,
        ErrorKind::OutOfRange,
        ErrorKind::Format,
        ErrorKind::UseAfterFree,
    ];

    /// The stable negative status code for this kind.
    pub fn code(self) -> i32 {
        match self {
            Self::Allocation => -1,
            Self::Enumeration => -2,
            Self::Open => -3,
            Self::Config => -4,
            Self::InvalidState => -5,
            Self::Transport => -6,
            Self::OutOfRange => -7,
            Self::Format => -8,
            Self::UseAfterFree => -9,
        }
    }

    /// Look up the kind for a status code. Non-negative codes are not errors.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Whether an operation failing with this kind may be retried as-is.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Enumeration | Self::Transport)
    }
}

impl Error {
    /// The [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Allocation(_) => ErrorKind::Allocation,
            Error::Enumeration(_) => ErrorKind::Enumeration,
            Error::Open { .. } => ErrorKind::Open,
            Error::UnsupportedBaudRate { .. }
            | Error::InvalidArgument(_)
            | Error::UnsupportedChip(_)
            | Error::EepromSizeExceeded { .. } => ErrorKind::Config,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::Transport(_) | Error::ShortTransfer { .. } => ErrorKind::Transport,
            Error::OutOfRange { .. } => ErrorKind::OutOfRange,
            Error::EepromChecksum { .. } | Error::EepromFormat(_) => ErrorKind::Format,
            Error::UseAfterFree => ErrorKind::UseAfterFree,
        }
    }

    /// The stable negative status code of this error.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

/// Collapse a result into a status code: `0` on success, the error code otherwise.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

/// Collapse a transfer result into a status code: the byte count on
/// success, the error code otherwise.
pub fn transfer_status(result: &Result<usize>) -> i32 {
    match result {
        Ok(n) => i32::try_from(*n).unwrap_or(i32::MAX),
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_negative_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for kind in ErrorKind::ALL {
            assert!(kind.code() < 0);
            assert!(seen.insert(kind.code()), "duplicate code for {kind:?}");
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
        assert_eq!(ErrorKind::from_code(5), None);
    }

    #[test]
    fn short_transfer_is_transport() {
        let e = Error::ShortTransfer {
            expected: 1,
            actual: 0,
        };
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert!(e.kind().is_retryable());
    }

    #[test]
    fn baud_rate_is_config() {
        let e = Error::UnsupportedBaudRate {
            requested: 1,
            actual: 2,
        };
        assert_eq!(e.code(), ErrorKind::Config.code());
        assert!(!e.kind().is_retryable());
    }

    #[test]
    fn status_helpers() {
        let ok: Result<usize> = Ok(1);
        assert_eq!(transfer_status(&ok), 1);
        assert_eq!(status_code(&ok), 0);

        let err: Result<usize> = Err(Error::UseAfterFree);
        assert_eq!(transfer_status(&err), -9);
        assert_eq!(status_code(&err), -9);
    }
}

//! Session configuration.

use std::time::Duration;

use crate::types::Interface;

/// Default read/write timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read/write chunk size.
const DEFAULT_CHUNKSIZE: usize = 4096;

/// Default bound on enumerated string descriptors, in UTF-16 code units.
pub const DEFAULT_STRING_MAX_LEN: usize = 128;

/// Tunables of a [`DeviceContext`](crate::DeviceContext).
///
/// ```
/// use std::time::Duration;
/// use ftdi_session::{Interface, SessionConfig};
///
/// let config = SessionConfig::default()
///     .write_timeout(Duration::from_millis(500))
///     .interface(Interface::B);
/// assert_eq!(config.write_chunksize, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Timeout of IN transfers.
    pub read_timeout: Duration,
    /// Timeout of OUT transfers and control requests.
    pub write_timeout: Duration,
    /// Bytes requested per bulk read.
    pub read_chunksize: usize,
    /// Largest bulk write issued at once.
    pub write_chunksize: usize,
    /// Port opened on multi-interface chips.
    pub interface: Interface,
    /// Enumerated strings longer than this many UTF-16 units are truncated.
    pub string_max_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            read_chunksize: DEFAULT_CHUNKSIZE,
            write_chunksize: DEFAULT_CHUNKSIZE,
            interface: Interface::Any,
            string_max_len: DEFAULT_STRING_MAX_LEN,
        }
    }
}

impl SessionConfig {
    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the bulk read chunk size.
    pub fn read_chunksize(mut self, chunksize: usize) -> Self {
        self.read_chunksize = chunksize;
        self
    }

    /// Set the bulk write chunk size. Zero is treated as one.
    pub fn write_chunksize(mut self, chunksize: usize) -> Self {
        self.write_chunksize = chunksize.max(1);
        self
    }

    /// Select the interface to open.
    pub fn interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// Bound enumerated strings to `max_len` UTF-16 units.
    pub fn string_max_len(mut self, max_len: usize) -> Self {
        self.string_max_len = max_len;
        self
    }
}

//! FTDI EEPROM support: reading, writing, encoding, and decoding.
//!
//! The EEPROM on FTDI chips stores device identification, USB descriptor
//! strings, pin configuration, and other settings. This module provides:
//!
//! - [`RawEeprom`] - A raw image and the chip type it belongs to.
//! - [`EepromConfig`] - The structured configuration, with
//!   [`EepromConfig::build`] to encode it.
//! - [`decode`] - Verify and decode a raw image into an [`EepromImage`].
//! - I/O operations on [`DeviceContext`](crate::DeviceContext) for reading,
//!   writing and erasing the physical EEPROM.

pub mod build;
pub mod decode;
mod io;
mod types;

pub use decode::decode;
pub use types::{DriveGroup, EepromConfig, EepromImage, RawEeprom};

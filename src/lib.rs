//! Host-side sessions with FTDI USB I/O chips.
//!
//! This crate drives the FTDI AM/BM, FT2232C, FT232R, FT2232H and FT4232H
//! families over USB: device discovery, session lifecycle and baud rate
//! configuration, the bitbang GPIO mode, the FT232R chip ID and the
//! configuration EEPROM. It uses [nusb](https://crates.io/crates/nusb) as
//! the USB backend, with no C dependencies or `libusb` required.
//!
//! # Quick Start
//!
//! ```no_run
//! use ftdi_session::{constants::pid, DeviceContext, NusbBus, FTDI_VID};
//!
//! let mut ctx = DeviceContext::create(NusbBus::new())?;
//! for dev in ctx.find_all(FTDI_VID, pid::FT232)? {
//!     println!("{:?} {:?}", dev.description, dev.serial);
//! }
//!
//! ctx.open(FTDI_VID, pid::FT232)?;
//! ctx.set_baudrate(9600)?;
//! ctx.enable_bitbang(0xFF)?;
//! assert_eq!(ctx.write_bitbang(0xFF)?, 1);
//! ctx.disable_bitbang()?;
//! ctx.close()?;
//! ctx.destroy()?;
//! # Ok::<(), ftdi_session::Error>(())
//! ```
//!
//! # Features
//!
//! - **Device discovery**: Enumerate connected devices with bounded string
//!   descriptors, or pick one with a [`DeviceFilter`].
//! - **Sessions**: Open, configure (baud rate, line properties, latency,
//!   flow control, modem lines), transfer data, close and destroy through
//!   [`DeviceContext`].
//! - **Bitbang**: Drive the data pins directly and sample them back.
//! - **Chip ID**: Read the unique FTDIChip-ID of FT232R chips.
//! - **EEPROM**: Read, write, erase, decode and build EEPROM images with
//!   chip-aware defaults.
//! - **Status codes**: Every [`Error`] maps to a stable negative code, and
//!   the context remembers the last failure.
//! - **Simulation**: [`transport::MockBus`] emulates FTDI chips in memory.

mod baudrate;
mod bitbang;
pub mod config;
pub mod constants;
pub mod context;
pub mod device_info;
pub mod eeprom;
pub mod error;
mod identity;
pub mod transport;
pub mod types;

// ---- Convenience re-exports ----

pub use config::SessionConfig;
pub use constants::FTDI_VID;
pub use context::DeviceContext;
pub use device_info::{find_all, find_device, DescriptorString, DeviceDescriptor, DeviceFilter};
pub use eeprom::{EepromConfig, EepromImage, RawEeprom};
pub use error::{status_code, transfer_status, Error, ErrorKind, Result};
pub use transport::{NusbBus, UsbBus, UsbError, UsbHandle};
pub use types::*;

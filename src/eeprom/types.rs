//! EEPROM data types.

use crate::constants::{cbus, FTDI_MAX_EEPROM_SIZE};
use crate::error::{Error, Result};
use crate::types::ChipType;

/// A raw EEPROM image as stored on (or destined for) a chip.
///
/// Holds the full 256-byte buffer, the populated size in bytes, and the
/// chip type the layout belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct RawEeprom {
    buf: [u8; FTDI_MAX_EEPROM_SIZE],
    size: usize,
    chip_type: ChipType,
}

impl std::fmt::Debug for RawEeprom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawEeprom")
            .field("chip_type", &self.chip_type)
            .field("size", &self.size)
            .field("checksum", &format_args!("{:#06x}", self.stored_checksum()))
            .finish_non_exhaustive()
    }
}

impl RawEeprom {
    /// Wrap an image of `bytes.len()` bytes for `chip_type`.
    ///
    /// The length must be 64, 128 or 256 bytes and fit the chip.
    pub fn from_bytes(chip_type: ChipType, bytes: &[u8]) -> Result<Self> {
        if !matches!(bytes.len(), 0x40 | 0x80 | 0x100) || bytes.len() > chip_type.eeprom_size() {
            return Err(Error::EepromFormat(format!(
                "{} byte image does not fit a {:?} EEPROM",
                bytes.len(),
                chip_type
            )));
        }
        let mut buf = [0u8; FTDI_MAX_EEPROM_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buf,
            size: bytes.len(),
            chip_type,
        })
    }

    pub(crate) fn from_parts(chip_type: ChipType, buf: [u8; FTDI_MAX_EEPROM_SIZE], size: usize) -> Self {
        Self {
            buf,
            size,
            chip_type,
        }
    }

    /// The populated bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.size]
    }

    /// The full 256-byte buffer, including anything past the populated size.
    pub(crate) fn buf(&self) -> &[u8; FTDI_MAX_EEPROM_SIZE] {
        &self.buf
    }

    /// Populated size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The chip type the layout is interpreted for.
    pub fn chip_type(&self) -> ChipType {
        self.chip_type
    }

    /// Whether the image is erased (all 0xFF).
    pub fn is_blank(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0xFF)
    }

    /// Little-endian word at word address `addr`, `None` past the
    /// populated size.
    pub fn word(&self, addr: usize) -> Option<u16> {
        (addr < self.size / 2).then(|| self.word_at(addr))
    }

    fn word_at(&self, addr: usize) -> u16 {
        u16::from_le_bytes([self.buf[addr * 2], self.buf[addr * 2 + 1]])
    }

    /// The checksum stored in the last word.
    pub fn stored_checksum(&self) -> u16 {
        self.word_at(self.size / 2 - 1)
    }

    /// The checksum computed over every word but the last.
    pub fn computed_checksum(&self) -> u16 {
        super::build::checksum(&self.buf, self.size)
    }
}

/// Drive strength, Schmitt trigger and slew settings of one IO group
/// (H-type chips).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveGroup {
    /// Drive strength: 0 = 4 mA, 1 = 8 mA, 2 = 12 mA, 3 = 16 mA.
    pub drive: u8,
    /// Schmitt trigger input.
    pub schmitt: bool,
    /// Slow slew rate.
    pub slow_slew: bool,
}

impl DriveGroup {
    pub(crate) fn from_nibble(nibble: u8) -> Self {
        Self {
            drive: nibble & 0x03,
            slow_slew: nibble & 0x04 != 0,
            schmitt: nibble & 0x08 != 0,
        }
    }

    pub(crate) fn nibble(self) -> u8 {
        let mut v = self.drive.min(3);
        if self.slow_slew {
            v |= 0x04;
        }
        if self.schmitt {
            v |= 0x08;
        }
        v
    }
}

/// Structured EEPROM configuration.
///
/// Produced by [`decode`](super::decode::decode) and consumed by
/// [`EepromConfig::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EepromConfig {
    /// USB vendor ID.
    pub vendor_id: u16,
    /// USB product ID.
    pub product_id: u16,
    /// bcdDevice.
    pub release_number: u16,

    /// Self-powered rather than bus-powered.
    pub self_powered: bool,
    /// Supports remote wakeup.
    pub remote_wakeup: bool,
    /// Maximum bus current in mA.
    pub max_power: u16,
    /// Not plug-and-play (legacy PnP byte after the strings).
    pub is_not_pnp: bool,

    /// Input endpoint is isochronous.
    pub in_is_isochronous: bool,
    /// Output endpoint is isochronous.
    pub out_is_isochronous: bool,
    /// Pull pins down during suspend.
    pub suspend_pull_downs: bool,
    /// Report the serial number string.
    pub use_serial: bool,
    /// Report `usb_version` as bcdUSB.
    pub use_usb_version: bool,
    /// bcdUSB.
    pub usb_version: u16,

    /// Manufacturer string.
    pub manufacturer: Option<String>,
    /// Product description string.
    pub product: Option<String>,
    /// Serial number string.
    pub serial: Option<String>,

    /// Hardware type of channel A (see [`channel`](crate::constants::channel)).
    pub channel_a_type: u8,
    /// Hardware type of channel B.
    pub channel_b_type: u8,
    /// Channels A to D load the virtual COM port driver.
    pub channel_vcp: [bool; 4],
    /// Channels A to D drive RS485 enable (FT4232H).
    pub channel_rs485: [bool; 4],
    /// Suspend on DBUS7 low (FT2232H).
    pub suspend_dbus7: bool,

    /// High current drive (FT232R).
    pub high_current: bool,
    /// High current drive on channel A (FT2232C).
    pub high_current_a: bool,
    /// High current drive on channel B (FT2232C).
    pub high_current_b: bool,
    /// External oscillator (FT232R).
    pub external_oscillator: bool,
    /// Signal inversion mask (FT232R, see [`invert`](crate::constants::invert)).
    pub invert: u8,
    /// CBUS0-4 functions (FT232R, see [`cbus`](crate::constants::cbus)).
    pub cbus_function: [u8; 5],
    /// IO drive groups 0-3 (H-type).
    pub drive_groups: [DriveGroup; 4],

    /// External EEPROM part: 0x46, 0x56 or 0x66 for 93xx parts.
    /// `None` for layouts that do not record it (AM, BM, R-type).
    pub eeprom_chip: Option<u8>,
    /// Image size in bytes.
    pub size: usize,
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            vendor_id: crate::constants::FTDI_VID,
            product_id: crate::constants::pid::FT232,
            release_number: 0,
            self_powered: false,
            remote_wakeup: false,
            max_power: 100,
            is_not_pnp: false,
            in_is_isochronous: false,
            out_is_isochronous: false,
            suspend_pull_downs: false,
            use_serial: false,
            use_usb_version: false,
            usb_version: 0x0200,
            manufacturer: None,
            product: None,
            serial: None,
            channel_a_type: 0,
            channel_b_type: 0,
            channel_vcp: [false; 4],
            channel_rs485: [false; 4],
            suspend_dbus7: false,
            high_current: false,
            high_current_a: false,
            high_current_b: false,
            external_oscillator: false,
            invert: 0,
            cbus_function: [0; 5],
            drive_groups: [DriveGroup::default(); 4],
            eeprom_chip: None,
            size: 0x80,
        }
    }
}

impl EepromConfig {
    /// Defaults appropriate for `chip_type`. Missing strings fall back to
    /// the chip's stock manufacturer and product names.
    pub fn init_defaults(
        chip_type: ChipType,
        manufacturer: Option<&str>,
        product: Option<&str>,
        serial: Option<&str>,
    ) -> Self {
        let mut cfg = Self {
            product_id: chip_type.default_product_id(),
            release_number: chip_type.release_number(),
            manufacturer: Some(manufacturer.unwrap_or("FTDI").to_owned()),
            product: Some(product.unwrap_or(chip_type.default_product_name()).to_owned()),
            serial: serial.map(str::to_owned),
            use_serial: serial.is_some(),
            channel_vcp: [true; 4],
            ..Self::default()
        };

        match chip_type {
            ChipType::Am => cfg.usb_version = 0x0101,
            ChipType::Ft232R => {
                cfg.cbus_function = [
                    cbus::TXLED,
                    cbus::RXLED,
                    cbus::TXDEN,
                    cbus::PWREN,
                    cbus::SLEEP,
                ];
            }
            ChipType::Ft2232H | ChipType::Ft4232H => {
                cfg.eeprom_chip = Some(0x56);
                cfg.size = 0x100;
            }
            ChipType::Ft2232C => cfg.eeprom_chip = Some(0x46),
            ChipType::Bm => {}
        }
        cfg
    }

    /// The three string descriptors.
    pub fn strings(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.manufacturer.as_deref(),
            self.product.as_deref(),
            self.serial.as_deref(),
        )
    }
}

/// A decoded EEPROM: the raw image together with the configuration
/// derived from it.
///
/// The image is an owned copy, so the decoded fields can never drift from
/// the bytes they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EepromImage {
    raw: RawEeprom,
    config: EepromConfig,
}

impl EepromImage {
    pub(crate) fn new(raw: RawEeprom, config: EepromConfig) -> Self {
        Self { raw, config }
    }

    /// The backing raw image.
    pub fn raw(&self) -> &RawEeprom {
        &self.raw
    }

    /// The decoded configuration.
    pub fn config(&self) -> &EepromConfig {
        &self.config
    }

    /// Take the decoded configuration, e.g. to edit and rebuild it.
    pub fn into_config(self) -> EepromConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_is_bounded_by_populated_size() {
        let mut bytes = [0u8; 0x40];
        bytes[0x3E] = 0x34;
        bytes[0x3F] = 0x12;
        let raw = RawEeprom::from_bytes(ChipType::Bm, &bytes).unwrap();
        assert_eq!(raw.word(0x1F), Some(0x1234));
        assert_eq!(raw.word(0x20), None);
        assert_eq!(raw.word(usize::MAX / 2), None);
        assert_eq!(raw.stored_checksum(), 0x1234);
    }

    #[test]
    fn computed_checksum_matches_built_image() {
        let raw = EepromConfig::init_defaults(ChipType::Bm, None, None, Some("C1"))
            .build(ChipType::Bm)
            .unwrap();
        assert_eq!(raw.computed_checksum(), raw.stored_checksum());
    }
}

//! EEPROM access over an open session: reading, writing and erasing the
//! physical part.

use log::{debug, info};

use crate::constants::*;
use crate::context::DeviceContext;
use crate::error::{Error, Result};
use crate::transport::UsbBus;
use crate::types::ChipType;

use super::RawEeprom;

/// Written during erase to find where the address lines wrap.
const MAGIC: u16 = 0x55AA;

/// Detect the populated size of a full 256-byte dump.
///
/// Smaller 93xx parts ignore the upper address bits, so their contents
/// repeat across the dump. The R-type's internal EEPROM is always 128
/// bytes.
pub(crate) fn detect_size(chip_type: ChipType, buf: &[u8; FTDI_MAX_EEPROM_SIZE]) -> usize {
    if chip_type == ChipType::Ft232R {
        0x80
    } else if buf.iter().all(|&b| b == 0xFF) {
        // Blank: nothing to detect.
        FTDI_MAX_EEPROM_SIZE
    } else if buf[..0x80] == buf[0x80..] {
        0x80
    } else if buf[..0x40] == buf[0x40..0x80] {
        0x40
    } else {
        0x100
    }
}

impl<B: UsbBus> DeviceContext<B> {
    fn eeprom_word(&mut self, operation: &'static str, addr: u16) -> Result<u16> {
        let data = self.control_in(operation, SIO_READ_EEPROM_REQUEST, 0, addr, 2)?;
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }

    /// Read one 16-bit EEPROM word.
    ///
    /// `addr` is a word address below the chip's
    /// [`eeprom_words`](ChipType::eeprom_words).
    pub fn read_eeprom_location(&mut self, addr: u16) -> Result<u16> {
        self.track(|ctx| {
            let words = ctx.open_chip_type("read_eeprom_location")?.eeprom_words();
            if addr >= words {
                return Err(Error::OutOfRange {
                    address: addr,
                    max: words - 1,
                });
            }
            ctx.eeprom_word("read_eeprom_location", addr)
        })
    }

    /// Write one 16-bit EEPROM word.
    ///
    /// `addr` is bounded like [`read_eeprom_location`](Self::read_eeprom_location).
    /// The checksum is not updated, so writing inside the checksummed image
    /// leaves it failing to decode until it is rewritten as a whole.
    pub fn write_eeprom_location(&mut self, addr: u16, value: u16) -> Result<()> {
        self.track(|ctx| {
            let words = ctx.open_chip_type("write_eeprom_location")?.eeprom_words();
            if addr >= words {
                return Err(Error::OutOfRange {
                    address: addr,
                    max: words - 1,
                });
            }
            ctx.control_out("write_eeprom_location", SIO_WRITE_EEPROM_REQUEST, value, addr)
        })
    }

    /// Read the whole EEPROM and detect its populated size.
    ///
    /// An erased part is returned as a blank image; decoding it fails.
    pub fn read_eeprom(&mut self) -> Result<RawEeprom> {
        self.track(|ctx| {
            let chip_type = ctx.open_chip_type("read_eeprom")?;
            let mut buf = [0u8; FTDI_MAX_EEPROM_SIZE];
            for addr in 0..chip_type.eeprom_words() {
                let word = ctx.eeprom_word("read_eeprom", addr)?;
                let off = usize::from(addr) * 2;
                buf[off..off + 2].copy_from_slice(&word.to_le_bytes());
            }

            let size = detect_size(chip_type, &buf);
            debug!("read {chip_type:?} EEPROM, {size} bytes populated");
            Ok(RawEeprom::from_parts(chip_type, buf, size))
        })
    }

    /// Write `image` to the EEPROM.
    ///
    /// The image must have been built for the open chip type. The chip is
    /// reset and its latency timer set first, the sequence FTDI's own
    /// programming tool uses.
    pub fn write_eeprom(&mut self, image: &RawEeprom) -> Result<()> {
        self.track(|ctx| {
            let chip_type = ctx.open_chip_type("write_eeprom")?;
            if image.chip_type() != chip_type {
                return Err(Error::InvalidArgument("EEPROM image built for another chip type"));
            }

            let index = ctx.usb_index();
            ctx.control_out("write_eeprom", SIO_RESET_REQUEST, SIO_RESET_SIO, index)?;
            ctx.control_out("write_eeprom", SIO_SET_LATENCY_TIMER_REQUEST, 0x77, index)?;

            for (addr, w) in (0u16..).zip(image.as_bytes().chunks_exact(2)) {
                let value = u16::from_le_bytes([w[0], w[1]]);
                ctx.control_out("write_eeprom", SIO_WRITE_EEPROM_REQUEST, value, addr)?;
            }
            info!("wrote {} byte EEPROM image", image.size());
            Ok(())
        })
    }

    /// Erase the EEPROM and detect the external part.
    ///
    /// Returns 0x46, 0x56 or 0x66 for a 93x46, 93x56 or 93x66, or `None`
    /// when the part could not be identified. The R-type's internal EEPROM
    /// cannot be erased.
    pub fn erase_eeprom(&mut self) -> Result<Option<u8>> {
        self.track(|ctx| {
            let chip_type = ctx.open_chip_type("erase_eeprom")?;
            if chip_type == ChipType::Ft232R {
                return Err(Error::UnsupportedChip(chip_type));
            }

            ctx.control_out("erase_eeprom", SIO_ERASE_EEPROM_REQUEST, 0, 0)?;

            // The magic word written at 0xC0 shows up lower on smaller parts.
            ctx.control_out("erase_eeprom", SIO_WRITE_EEPROM_REQUEST, MAGIC, 0xC0)?;
            let mut part = None;
            for (addr, id) in [(0x00, 0x46), (0x40, 0x56), (0xC0, 0x66)] {
                if ctx.eeprom_word("erase_eeprom", addr)? == MAGIC {
                    part = Some(id);
                    break;
                }
            }

            ctx.control_out("erase_eeprom", SIO_ERASE_EEPROM_REQUEST, 0, 0)?;
            debug!("erased EEPROM, part {part:02x?}");
            Ok(part)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r_type_is_always_128() {
        let buf = [0u8; FTDI_MAX_EEPROM_SIZE];
        assert_eq!(detect_size(ChipType::Ft232R, &buf), 0x80);
    }

    #[test]
    fn mirrored_halves_are_128() {
        let mut buf = [0u8; FTDI_MAX_EEPROM_SIZE];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i % 0x80) as u8;
        }
        assert_eq!(detect_size(ChipType::Bm, &buf), 0x80);
    }

    #[test]
    fn mirrored_quarters_are_64() {
        let mut buf = [0u8; FTDI_MAX_EEPROM_SIZE];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i % 0x40) as u8;
        }
        buf[0xFF] = 0xEE;
        assert_eq!(detect_size(ChipType::Bm, &buf), 0x40);
    }

    #[test]
    fn distinct_contents_are_256() {
        let mut buf = [0u8; FTDI_MAX_EEPROM_SIZE];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(detect_size(ChipType::Ft2232H, &buf), 0x100);
    }

    #[test]
    fn blank_keeps_full_size() {
        let buf = [0xFF; FTDI_MAX_EEPROM_SIZE];
        assert_eq!(detect_size(ChipType::Bm, &buf), FTDI_MAX_EEPROM_SIZE);
    }
}

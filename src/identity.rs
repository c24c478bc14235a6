//! FTDIChip-ID of R-type chips.

use log::debug;

use crate::constants::*;
use crate::context::DeviceContext;
use crate::error::{Error, Result};
use crate::transport::UsbBus;

/// XOR key applied after the bit shuffle.
const CHIP_ID_KEY: u32 = 0xA5F0_F7D1;

impl<B: UsbBus> DeviceContext<B> {
    /// Read the unique FTDIChip-ID burned into R-type silicon.
    ///
    /// The value is read from the chip on every call. Other chip types fail
    /// with [`Error::UnsupportedChip`].
    pub fn read_chip_id(&mut self) -> Result<u32> {
        self.track(|ctx| {
            let chip_type = ctx.open_chip_type("read_chip_id")?;
            if !chip_type.has_chip_id() {
                return Err(Error::UnsupportedChip(chip_type));
            }

            let a = ctx.control_in("read_chip_id", SIO_READ_EEPROM_REQUEST, 0, CHIP_ID_ADDR_HI, 2)?;
            let b = ctx.control_in("read_chip_id", SIO_READ_EEPROM_REQUEST, 0, CHIP_ID_ADDR_LO, 2)?;
            let id = decode_chip_id(
                u16::from_le_bytes([a[0], a[1]]),
                u16::from_le_bytes([b[0], b[1]]),
            );
            debug!("chip id {id:#010x}");
            Ok(id)
        })
    }
}

/// Combine the two EEPROM words into the chip ID.
///
/// Each word is byte-swapped, every byte of the combined value gets its
/// bits shuffled, and the result is XORed with a fixed key.
pub(crate) fn decode_chip_id(hi: u16, lo: u16) -> u32 {
    let a = (u32::from(hi.swap_bytes()) << 16) | u32::from(lo.swap_bytes());
    u32::from_le_bytes(a.to_le_bytes().map(chipid_shift)) ^ CHIP_ID_KEY
}

/// Bit shuffle of one chip ID byte.
fn chipid_shift(v: u8) -> u8 {
    ((v & 1) << 1)
        | ((v & 2) << 5)
        | ((v & 4) >> 2)
        | ((v & 8) << 4)
        | ((v & 16) >> 1)
        | ((v & 32) >> 1)
        | ((v & 64) >> 4)
        | ((v & 128) >> 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_is_a_permutation() {
        let mut seen = [false; 256];
        for v in 0..=255u8 {
            seen[usize::from(chipid_shift(v))] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn single_bit_mapping() {
        assert_eq!(chipid_shift(0x01), 0x02);
        assert_eq!(chipid_shift(0x02), 0x40);
        assert_eq!(chipid_shift(0x04), 0x01);
        assert_eq!(chipid_shift(0x08), 0x80);
        assert_eq!(chipid_shift(0x10), 0x08);
        assert_eq!(chipid_shift(0x20), 0x10);
        assert_eq!(chipid_shift(0x40), 0x04);
        assert_eq!(chipid_shift(0x80), 0x20);
    }

    #[test]
    fn zero_words_give_the_key() {
        assert_eq!(decode_chip_id(0, 0), CHIP_ID_KEY);
    }

    #[test]
    fn word_order_matters() {
        assert_ne!(decode_chip_id(0x1234, 0x5678), decode_chip_id(0x5678, 0x1234));
    }
}

//! EEPROM encoding: turn an [`EepromConfig`] into a checksummed image.

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::ChipType;

use super::{EepromConfig, RawEeprom};

/// EEPROM checksum over the first `size - 2` bytes of `buf`.
///
/// Each little-endian word is XORed into the accumulator, which is then
/// rotated left by one. The seed is 0xAAAA. `size` must be an image size
/// no larger than `buf`; [`RawEeprom::computed_checksum`] is the public
/// entry point.
pub(crate) fn checksum(buf: &[u8], size: usize) -> u16 {
    buf[..size - 2]
        .chunks_exact(2)
        .fold(EEPROM_CHECKSUM_SEED, |acc, w| {
            (acc ^ u16::from_le_bytes([w[0], w[1]])).rotate_left(1)
        })
}

/// Byte offset where the string descriptors start for each layout.
///
/// Offsets above the image size wrap around the size mask.
pub(super) fn string_area(chip_type: ChipType) -> usize {
    match chip_type {
        ChipType::Am | ChipType::Bm => 0x94,
        ChipType::Ft2232C => 0x96,
        ChipType::Ft232R => 0x98,
        ChipType::Ft2232H | ChipType::Ft4232H => 0x9A,
    }
}

/// Whether the layout carries the legacy PnP block after the strings.
fn has_pnp_block(chip_type: ChipType) -> bool {
    !matches!(chip_type, ChipType::Am | ChipType::Bm)
}

/// Sequential writer honouring the image size mask.
struct Cursor<'a> {
    buf: &'a mut [u8],
    mask: usize,
    pos: usize,
}

impl Cursor<'_> {
    fn put(&mut self, byte: u8) {
        self.buf[self.pos & self.mask] = byte;
        self.pos += 1;
    }

    /// Write a USB string descriptor, returning its total length.
    fn put_string(&mut self, s: &str) -> u8 {
        let len = (s.len() * 2 + 2) as u8;
        self.put(len);
        self.put(USB_DT_STRING);
        for b in s.bytes() {
            self.put(b);
            self.put(0);
        }
        len
    }
}

impl EepromConfig {
    /// Encode this configuration as an image for `chip_type`.
    pub fn build(&self, chip_type: ChipType) -> Result<RawEeprom> {
        let size = self.size;
        if !matches!(size, 0x80 | 0x100) || size > chip_type.eeprom_size() {
            return Err(Error::InvalidArgument("EEPROM size must be 128 or 256 bytes"));
        }

        let strings = [&self.manufacturer, &self.product, &self.serial];
        if strings.iter().flat_map(|s| s.as_deref()).any(|s| !s.is_ascii()) {
            return Err(Error::InvalidArgument("EEPROM strings must be ASCII"));
        }
        // Descriptors plus the PnP block must end before the checksum word.
        let start = string_area(chip_type);
        let footprint: usize = strings
            .iter()
            .flat_map(|s| s.as_deref())
            .map(|s| s.len() * 2 + 2)
            .sum::<usize>()
            + if has_pnp_block(chip_type) { 3 } else { 0 };
        if (start & (size - 1)) + footprint > size - 2 {
            return Err(Error::EepromSizeExceeded {
                needed: footprint,
                available: size - 2 - (start & (size - 1)),
            });
        }

        let mut buf = [0u8; FTDI_MAX_EEPROM_SIZE];

        buf[0x02..0x04].copy_from_slice(&self.vendor_id.to_le_bytes());
        buf[0x04..0x06].copy_from_slice(&self.product_id.to_le_bytes());
        buf[0x06..0x08].copy_from_slice(&self.release_number.to_le_bytes());

        let mut attributes = 0x80u8;
        if self.self_powered {
            attributes |= 0x40;
        }
        if self.remote_wakeup {
            attributes |= 0x20;
        }
        buf[0x08] = attributes;
        buf[0x09] = (self.max_power / MAX_POWER_MILLIAMP_PER_UNIT).min(0xFF) as u8;

        if chip_type != ChipType::Am {
            if self.in_is_isochronous {
                buf[0x0A] |= 0x01;
            }
            if self.out_is_isochronous {
                buf[0x0A] |= 0x02;
            }
            if self.suspend_pull_downs {
                buf[0x0A] |= 0x04;
            }
            if self.use_serial {
                buf[0x0A] |= USE_SERIAL_NUM;
            }
            if self.use_usb_version && matches!(chip_type, ChipType::Bm | ChipType::Ft2232C) {
                buf[0x0A] |= USE_USB_VERSION;
            }
        }

        // String descriptors and their pointer/length pairs.
        let mut cursor = Cursor {
            buf: &mut buf,
            mask: size - 1,
            pos: start,
        };
        let mut pointers = [0u8; 3];
        let mut lengths = [0u8; 3];
        for (i, s) in strings.iter().enumerate() {
            pointers[i] = (cursor.pos as u8) | if i == 0 { 0 } else { 0x80 };
            lengths[i] = s.as_deref().map_or(0, |s| cursor.put_string(s));
        }
        if has_pnp_block(chip_type) {
            cursor.put(0x02);
            cursor.put(0x03);
            cursor.put(u8::from(self.is_not_pnp));
        }
        for i in 0..3 {
            buf[0x0E + 2 * i] = pointers[i];
            buf[0x0F + 2 * i] = lengths[i];
        }

        let chip_byte = self.eeprom_chip.unwrap_or(0);
        match chip_type {
            ChipType::Am => {}
            ChipType::Bm => {
                buf[0x0C..0x0E].copy_from_slice(&self.usb_version.to_le_bytes());
            }
            ChipType::Ft2232C => {
                buf[0x00] = self.channel_a_type & 0x07;
                buf[0x01] = self.channel_b_type & 0x07;
                for (i, (vcp, high)) in [
                    (self.channel_vcp[0], self.high_current_a),
                    (self.channel_vcp[1], self.high_current_b),
                ]
                .into_iter()
                .enumerate()
                {
                    if vcp {
                        buf[i] |= DRIVER_VCP;
                    }
                    if high {
                        buf[i] |= HIGH_CURRENT_DRIVE;
                    }
                }
                buf[0x0C..0x0E].copy_from_slice(&self.usb_version.to_le_bytes());
                buf[0x14] = chip_byte;
            }
            ChipType::Ft232R => {
                buf[0x00] = 0;
                if self.high_current {
                    buf[0x00] |= HIGH_CURRENT_DRIVE_R;
                }
                // Inverted on R-type: bit set means D2XX.
                if !self.channel_vcp[0] {
                    buf[0x00] |= DRIVER_VCP;
                }
                if self.external_oscillator {
                    buf[0x00] |= 0x02;
                }
                buf[0x01] = 0x40;
                buf[0x0B] = self.invert;
                buf[0x0C..0x0E].copy_from_slice(&self.usb_version.to_le_bytes());
                let cb = self.cbus_function.map(|f| f & 0x0F);
                buf[0x14] = cb[0] | (cb[1] << 4);
                buf[0x15] = cb[2] | (cb[3] << 4);
                buf[0x16] = cb[4];
            }
            ChipType::Ft2232H => {
                buf[0x00] = self.channel_a_type & 0x07;
                buf[0x01] = self.channel_b_type & 0x07;
                if self.channel_vcp[0] {
                    buf[0x00] |= DRIVER_VCP;
                }
                if self.channel_vcp[1] {
                    buf[0x01] |= DRIVER_VCP;
                }
                if self.suspend_dbus7 {
                    buf[0x01] |= SUSPEND_DBUS7;
                }
                self.put_drive_groups(&mut buf);
                buf[0x18] = chip_byte;
            }
            ChipType::Ft4232H => {
                // C and D share bytes 0 and 1 with A and B, one nibble up.
                for (i, vcp) in self.channel_vcp.iter().enumerate() {
                    if *vcp {
                        buf[i % 2] |= DRIVER_VCP << (4 * (i / 2));
                    }
                }
                for (i, rs485) in self.channel_rs485.iter().enumerate() {
                    if *rs485 {
                        buf[0x0B] |= 0x10 << i;
                    }
                }
                self.put_drive_groups(&mut buf);
                buf[0x18] = chip_byte;
            }
        }

        let csum = checksum(&buf, size);
        buf[size - 2..size].copy_from_slice(&csum.to_le_bytes());

        Ok(RawEeprom::from_parts(chip_type, buf, size))
    }

    fn put_drive_groups(&self, buf: &mut [u8]) {
        let g = self.drive_groups.map(|g| g.nibble());
        buf[0x0C] = g[0] | (g[1] << 4);
        buf[0x0D] = g[2] | (g[3] << 4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_of_zeroes() {
        // 63 rounds of rotate-left over the seed.
        let buf = [0u8; 0x80];
        assert_eq!(checksum(&buf, 0x80), 0xAAAAu16.rotate_left(63));
    }

    #[test]
    fn build_writes_checksum_in_last_word() {
        let cfg = EepromConfig::init_defaults(ChipType::Ft232R, None, None, Some("A1"));
        let raw = cfg.build(ChipType::Ft232R).unwrap();
        assert_eq!(raw.size(), 0x80);
        assert_eq!(raw.stored_checksum(), checksum(raw.as_bytes(), 0x80));
    }

    #[test]
    fn strings_wrap_into_small_images() {
        let cfg = EepromConfig::init_defaults(ChipType::Bm, Some("M"), Some("P"), Some("S"));
        let raw = cfg.build(ChipType::Bm).unwrap();
        let b = raw.as_bytes();
        // 0x94 masked to 0x14 for a 128 byte image
        assert_eq!(b[0x0E], 0x94);
        assert_eq!(&b[0x14..0x18], &[4, USB_DT_STRING, b'M', 0]);
        assert_eq!(b[0x10], 0x80 | 0x98);
        assert_eq!(b[0x11], 4);
    }

    #[test]
    fn oversized_strings_rejected() {
        // 2 * (80 + 2) + 3 bytes against 0x7E - 0x18 available
        let long = "x".repeat(40);
        let cfg = EepromConfig::init_defaults(ChipType::Ft232R, Some(&long), Some(&long), None);
        assert!(matches!(
            cfg.build(ChipType::Ft232R),
            Err(Error::EepromSizeExceeded { .. })
        ));
    }

    #[test]
    fn strings_filling_the_area_exactly_fit() {
        // 47 chars take 96 bytes, plus 2 header and 3 PnP bytes: 101 of 102.
        let s = "y".repeat(47);
        let mut cfg = EepromConfig::init_defaults(ChipType::Ft232R, None, None, None);
        cfg.manufacturer = Some(s);
        cfg.product = None;
        let raw = cfg.build(ChipType::Ft232R).unwrap();
        assert_eq!(raw.stored_checksum(), checksum(raw.as_bytes(), 0x80));
    }

    #[test]
    fn r_type_cannot_hold_256_bytes() {
        let mut cfg = EepromConfig::init_defaults(ChipType::Ft232R, None, None, None);
        cfg.size = 0x100;
        assert!(cfg.build(ChipType::Ft232R).is_err());
    }

    #[test]
    fn drive_group_nibbles() {
        let g = super::super::DriveGroup {
            drive: 3,
            schmitt: true,
            slow_slew: false,
        };
        assert_eq!(g.nibble(), 0x0B);
        assert_eq!(super::super::DriveGroup::from_nibble(0x0B), g);
    }
}

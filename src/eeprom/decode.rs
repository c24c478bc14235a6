//! EEPROM decoding: parse a raw image into an [`EepromConfig`].

use log::info;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::ChipType;

use super::build::string_area;
use super::{DriveGroup, EepromConfig, EepromImage, RawEeprom};

/// Decode the string descriptor referenced by the pointer/length pair at
/// `slot` (0 manufacturer, 1 product, 2 serial).
///
/// Strings are stored as USB string descriptors: length byte, type byte
/// (0x03), then UTF-16LE characters of which only the low byte is used.
fn decode_string(raw: &RawEeprom, slot: usize) -> Result<Option<String>> {
    const NAMES: [&str; 3] = ["manufacturer", "product", "serial"];

    let buf = raw.buf();
    let size = raw.size();
    let mask = size - 1;
    let len = usize::from(buf[0x0F + 2 * slot]);
    if len == 0 {
        return Ok(None);
    }
    if len < 2 || len % 2 != 0 || len > size - 2 {
        return Err(Error::EepromFormat(format!(
            "{} string length {len} invalid",
            NAMES[slot]
        )));
    }

    let start = usize::from(buf[0x0E + 2 * slot]) & mask;
    if usize::from(buf[start]) != len || buf[(start + 1) & mask] != USB_DT_STRING {
        return Err(Error::EepromFormat(format!(
            "{} string descriptor at {start:#04x} malformed",
            NAMES[slot]
        )));
    }

    let s = (0..(len - 2) / 2)
        .map(|j| char::from(buf[(start + 2 + 2 * j) & mask]))
        .collect();
    Ok(Some(s))
}

fn decode_drive_groups(buf: &[u8], cfg: &mut EepromConfig) {
    cfg.drive_groups = [
        DriveGroup::from_nibble(buf[0x0C] & 0x0F),
        DriveGroup::from_nibble(buf[0x0C] >> 4),
        DriveGroup::from_nibble(buf[0x0D] & 0x0F),
        DriveGroup::from_nibble(buf[0x0D] >> 4),
    ];
}

/// Decode `raw` into its configuration.
///
/// Nothing is modified: the returned [`EepromImage`] holds its own copy of
/// the image. Blank images, checksum mismatches and string descriptors
/// that do not match their pointers all fail with a format error. With
/// `verbose`, the decoded fields are logged at info level.
pub fn decode(raw: &RawEeprom, verbose: bool) -> Result<EepromImage> {
    if raw.is_blank() {
        return Err(Error::EepromFormat("EEPROM is blank".into()));
    }

    let size = raw.size();
    let computed = raw.computed_checksum();
    let stored = raw.stored_checksum();
    if computed != stored {
        return Err(Error::EepromChecksum { stored, computed });
    }

    let chip_type = raw.chip_type();
    let buf = raw.buf();
    let word = |off: usize| u16::from_le_bytes([buf[off], buf[off + 1]]);

    let mut cfg = EepromConfig {
        vendor_id: word(0x02),
        product_id: word(0x04),
        release_number: word(0x06),
        self_powered: buf[0x08] & 0x40 != 0,
        remote_wakeup: buf[0x08] & 0x20 != 0,
        max_power: u16::from(buf[0x09]) * MAX_POWER_MILLIAMP_PER_UNIT,
        manufacturer: decode_string(raw, 0)?,
        product: decode_string(raw, 1)?,
        serial: decode_string(raw, 2)?,
        size,
        ..EepromConfig::default()
    };

    if chip_type != ChipType::Am {
        cfg.in_is_isochronous = buf[0x0A] & 0x01 != 0;
        cfg.out_is_isochronous = buf[0x0A] & 0x02 != 0;
        cfg.suspend_pull_downs = buf[0x0A] & 0x04 != 0;
        cfg.use_serial = buf[0x0A] & USE_SERIAL_NUM != 0;
        cfg.use_usb_version = buf[0x0A] & USE_USB_VERSION != 0;
    }

    if chip_type != ChipType::Am && chip_type != ChipType::Bm {
        // The PnP block follows the last string descriptor, or opens the
        // string area when there are none.
        let mask = size - 1;
        let end = (0..3)
            .filter(|&i| buf[0x0F + 2 * i] != 0)
            .map(|i| (usize::from(buf[0x0E + 2 * i]) & mask) + usize::from(buf[0x0F + 2 * i]))
            .max()
            .unwrap_or(string_area(chip_type) & mask);
        cfg.is_not_pnp = buf[(end + 2) & mask] != 0;
    }

    match chip_type {
        ChipType::Am => {}
        ChipType::Bm => cfg.usb_version = word(0x0C),
        ChipType::Ft2232C => {
            cfg.channel_a_type = buf[0x00] & 0x07;
            cfg.channel_b_type = buf[0x01] & 0x07;
            cfg.channel_vcp[0] = buf[0x00] & DRIVER_VCP != 0;
            cfg.channel_vcp[1] = buf[0x01] & DRIVER_VCP != 0;
            cfg.high_current_a = buf[0x00] & HIGH_CURRENT_DRIVE != 0;
            cfg.high_current_b = buf[0x01] & HIGH_CURRENT_DRIVE != 0;
            cfg.usb_version = word(0x0C);
            cfg.eeprom_chip = Some(buf[0x14]);
        }
        ChipType::Ft232R => {
            // R-type inverts the VCP flag
            cfg.channel_vcp[0] = buf[0x00] & DRIVER_VCP == 0;
            cfg.high_current = buf[0x00] & HIGH_CURRENT_DRIVE_R != 0;
            cfg.external_oscillator = buf[0x00] & 0x02 != 0;
            cfg.invert = buf[0x0B];
            cfg.usb_version = word(0x0C);
            cfg.cbus_function = [
                buf[0x14] & 0x0F,
                buf[0x14] >> 4,
                buf[0x15] & 0x0F,
                buf[0x15] >> 4,
                buf[0x16] & 0x0F,
            ];
        }
        ChipType::Ft2232H => {
            cfg.channel_a_type = buf[0x00] & 0x07;
            cfg.channel_b_type = buf[0x01] & 0x07;
            cfg.channel_vcp[0] = buf[0x00] & DRIVER_VCP != 0;
            cfg.channel_vcp[1] = buf[0x01] & DRIVER_VCP != 0;
            cfg.suspend_dbus7 = buf[0x01] & SUSPEND_DBUS7 != 0;
            decode_drive_groups(buf, &mut cfg);
            cfg.eeprom_chip = Some(buf[0x18]);
        }
        ChipType::Ft4232H => {
            for i in 0..4 {
                cfg.channel_vcp[i] = (buf[i % 2] >> (4 * (i / 2))) & DRIVER_VCP != 0;
                cfg.channel_rs485[i] = buf[0x0B] & (0x10 << i) != 0;
            }
            decode_drive_groups(buf, &mut cfg);
            cfg.eeprom_chip = Some(buf[0x18]);
        }
    }

    if verbose {
        log_config(chip_type, &cfg);
    }

    Ok(EepromImage::new(raw.clone(), cfg))
}

fn log_config(chip_type: ChipType, cfg: &EepromConfig) {
    info!("{:?} EEPROM, {} bytes", chip_type, cfg.size);
    info!("VID:     {:#06x}", cfg.vendor_id);
    info!("PID:     {:#06x}", cfg.product_id);
    info!("Release: {:#06x}", cfg.release_number);
    if let Some(m) = &cfg.manufacturer {
        info!("Manufacturer: {m}");
    }
    if let Some(p) = &cfg.product {
        info!("Product:      {p}");
    }
    if let Some(s) = &cfg.serial {
        info!("Serial:       {s}");
    }
    info!(
        "{} powered, {} mA max{}",
        if cfg.self_powered { "self" } else { "bus" },
        cfg.max_power,
        if cfg.remote_wakeup { ", remote wakeup" } else { "" }
    );
    if cfg.use_usb_version {
        info!("USB version: {:#06x}", cfg.usb_version);
    }
    if chip_type == ChipType::Ft232R {
        info!("CBUS functions: {:?}", cfg.cbus_function);
        if cfg.invert != 0 {
            info!("Inverted signals: {:#04x}", cfg.invert);
        }
    }
    if chip_type.is_h_type() {
        info!("Drive groups: {:?}", cfg.drive_groups);
    }
}

//! Property-based tests for EEPROM build/decode.
//!
//! Uses `proptest` to generate EEPROM field values and images, and checks
//! that build() followed by decode() preserves the fields, and that any
//! corruption of a built image is caught by the checksum.

use ftdi_session::eeprom::{self, EepromConfig, RawEeprom};
use ftdi_session::{ChipType, Error};
use proptest::prelude::*;

/// Short ASCII strings; three of them always fit every layout.
fn short_ascii_string() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{1,12}"
}

fn chip_type_strategy() -> impl Strategy<Value = ChipType> {
    prop::sample::select(ChipType::ALL.to_vec())
}

fn built_image() -> impl Strategy<Value = RawEeprom> {
    (chip_type_strategy(), short_ascii_string(), short_ascii_string()).prop_map(
        |(chip, product, serial)| {
            EepromConfig::init_defaults(chip, None, Some(&product), Some(&serial))
                .build(chip)
                .unwrap()
        },
    )
}

proptest! {
    /// init_defaults + build + decode preserves the common fields.
    #[test]
    fn eeprom_round_trip_init_defaults(
        chip in chip_type_strategy(),
        manufacturer in short_ascii_string(),
        product in short_ascii_string(),
        serial in short_ascii_string(),
        max_power in (0u16..=250).prop_map(|p| p * 2),
        self_powered in any::<bool>(),
        remote_wakeup in any::<bool>(),
    ) {
        let mut cfg = EepromConfig::init_defaults(
            chip,
            Some(&manufacturer),
            Some(&product),
            Some(&serial),
        );
        cfg.max_power = max_power;
        cfg.self_powered = self_powered;
        cfg.remote_wakeup = remote_wakeup;

        let raw = cfg.build(chip).unwrap();
        prop_assert_eq!(raw.stored_checksum(), raw.computed_checksum());

        let image = eeprom::decode(&raw, false).unwrap();
        let decoded = image.config();
        prop_assert_eq!(decoded.vendor_id, cfg.vendor_id, "vendor_id mismatch for {:?}", chip);
        prop_assert_eq!(decoded.product_id, cfg.product_id, "product_id mismatch for {:?}", chip);
        prop_assert_eq!(decoded.release_number, cfg.release_number);
        prop_assert_eq!(decoded.max_power, max_power);
        prop_assert_eq!(decoded.self_powered, self_powered);
        prop_assert_eq!(decoded.remote_wakeup, remote_wakeup);
        prop_assert_eq!(decoded.strings(), cfg.strings());
        if chip != ChipType::Am {
            prop_assert_eq!(decoded.use_serial, cfg.use_serial, "use_serial mismatch for {:?}", chip);
        }
        prop_assert_eq!(decoded.eeprom_chip, cfg.eeprom_chip);
    }

    /// vendor_id and product_id round-trip for all chip types.
    #[test]
    fn eeprom_vid_pid_round_trip(
        chip in chip_type_strategy(),
        vid in any::<u16>(),
        pid in any::<u16>(),
    ) {
        let mut cfg = EepromConfig::init_defaults(chip, Some("MFG"), Some("PRD"), Some("SN"));
        cfg.vendor_id = vid;
        cfg.product_id = pid;

        let raw = cfg.build(chip).unwrap();
        let decoded = eeprom::decode(&raw, false).unwrap().into_config();
        prop_assert_eq!(decoded.vendor_id, vid);
        prop_assert_eq!(decoded.product_id, pid);
    }

    /// Any single flipped bit, the checksum word included, is detected.
    #[test]
    fn single_bit_corruption_is_detected(
        raw in built_image(),
        pos in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = raw.as_bytes().to_vec();
        let i = pos.index(bytes.len());
        bytes[i] ^= 1 << bit;

        let corrupt = RawEeprom::from_bytes(raw.chip_type(), &bytes).unwrap();
        let result = eeprom::decode(&corrupt, false);
        prop_assert!(
            matches!(result, Err(Error::EepromChecksum { .. })),
            "byte {} bit {} not detected: {:?}", i, bit, result
        );
    }

    /// Arbitrary images either decode or fail cleanly.
    #[test]
    fn decode_never_panics(
        chip in chip_type_strategy(),
        bytes in prop::collection::vec(any::<u8>(), 0x80),
    ) {
        let raw = RawEeprom::from_bytes(chip, &bytes).unwrap();
        let _ = eeprom::decode(&raw, true);
    }

    /// A fixed-up checksum does not make garbage decode without validation.
    #[test]
    fn decode_with_valid_checksum_validates_strings(
        chip in chip_type_strategy(),
        mut bytes in prop::collection::vec(any::<u8>(), 0x80),
    ) {
        let csum = RawEeprom::from_bytes(chip, &bytes).unwrap().computed_checksum();
        bytes[0x7E..].copy_from_slice(&csum.to_le_bytes());
        let raw = RawEeprom::from_bytes(chip, &bytes).unwrap();

        if let Ok(image) = eeprom::decode(&raw, false) {
            // Every string that decoded has a well-formed descriptor behind it.
            for slot in 0..3 {
                let len = usize::from(bytes[0x0F + 2 * slot]);
                if len == 0 {
                    continue;
                }
                let ptr = usize::from(bytes[0x0E + 2 * slot]) & 0x7F;
                prop_assert_eq!(usize::from(bytes[ptr]), len);
                prop_assert_eq!(bytes[(ptr + 1) & 0x7F], 0x03);
            }
            prop_assert_eq!(image.raw(), &raw);
        }
    }

    /// build never panics for any max_power value.
    #[test]
    fn eeprom_build_max_power_no_panic(
        chip in chip_type_strategy(),
        max_power in any::<u16>(),
    ) {
        let mut cfg = EepromConfig::init_defaults(chip, Some("Test"), Some("Dev"), Some("SER1"));
        cfg.max_power = max_power;
        let raw = cfg.build(chip).unwrap();
        let decoded = eeprom::decode(&raw, false).unwrap().into_config();
        prop_assert_eq!(decoded.max_power, (max_power / 2).min(255) * 2);
    }
}

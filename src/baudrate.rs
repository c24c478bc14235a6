//! Baud rate divisor calculation.
//!
//! FTDI chips derive the serial clock from a base clock through a divisor
//! with three fractional bits. The fraction is not stored in binary but
//! through a lookup code, and each chip generation has its own base clock:
//!
//! - **AM**: 24 MHz, only a subset of fractions supported.
//! - **BM/2232C/R**: 48 MHz with a /16 predivisor.
//! - **H-type**: 120 MHz with a /10 predivisor, or the 48 MHz path for
//!   rates too low for the fast clock.

use crate::constants::{AM_CLK, C_CLK, H_CLK};
use crate::types::ChipType;

/// Encoded divisor for a `SIO_SET_BAUDRATE` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BaudDivisor {
    /// The rate the chip will actually run at.
    pub actual: u32,
    /// `wValue` of the request.
    pub value: u16,
    /// `wIndex` of the request.
    pub index: u16,
}

/// Sub-divisor eighths to wire fraction code.
const FRAC_CODE: [u32; 8] = [0, 3, 2, 4, 1, 5, 6, 7];

/// AM fractions it cannot do are rounded down by this much...
const AM_ROUND_DOWN: [u32; 8] = [0, 0, 0, 1, 0, 3, 2, 1];
/// ...or up by this much.
const AM_ROUND_UP: [u32; 8] = [0, 0, 0, 1, 0, 1, 2, 3];

/// Largest divisor in eighths.
const MAX_DIVISOR: u32 = 0x1FFF8;

fn encode(divisor: u32) -> u32 {
    (divisor >> 3) | (FRAC_CODE[(divisor & 7) as usize] << 14)
}

/// Best AM divisor in eighths of the 24 MHz clock and the rate it yields.
fn am_divisor(rate: u32) -> (u32, u32) {
    let mut base = AM_CLK / rate;
    base -= AM_ROUND_DOWN[(base & 7) as usize];

    let mut best: Option<(u32, u32, u32)> = None;
    for step in 0..2 {
        let candidate = match base + step {
            d if d <= 8 => 8,
            // AM cannot divide by 9..=15
            _ if base < 16 => 16,
            d => (d + AM_ROUND_UP[(d & 7) as usize]).min(MAX_DIVISOR),
        };
        let achieved = (AM_CLK + candidate / 2) / candidate;
        let diff = achieved.abs_diff(rate);
        if best.map_or(true, |(_, _, d)| diff < d) {
            best = Some((candidate, achieved, diff));
            if diff == 0 {
                break;
            }
        }
    }

    let (divisor, achieved, _) = best.unwrap_or((8, AM_CLK / 8, 0));
    let encoded = match encode(divisor) {
        // 3 Mbaud and 2 Mbaud have dedicated encodings
        1 => 0,
        0x4001 => 1,
        e => e,
    };
    (encoded, achieved)
}

/// Divisor for a base `clk` behind a predivisor of `prediv`, returned as
/// `(encoded, achieved)`.
fn clk_divisor(rate: u32, clk: u32, prediv: u32) -> (u32, u32) {
    // The three fastest rates use special encodings 0, 1 and 2.
    let fastest = [
        (clk / prediv, 0),
        (clk / (prediv + prediv / 2), 1),
        (clk / (2 * prediv), 2),
    ];
    if let Some(&(achieved, encoded)) = fastest.iter().find(|(r, _)| rate >= *r) {
        return (encoded, achieved);
    }

    // Work in sixteenths, then round to eighths.
    let sixteenths = clk * 16 / prediv / rate;
    let divisor = match sixteenths / 2 + (sixteenths & 1) {
        // 0x20000 itself is valid; anything above is clamped.
        d if d > 0x20000 => 0x1FFFF,
        d => d,
    };

    let doubled = clk * 16 / prediv / divisor;
    let achieved = doubled / 2 + (doubled & 1);
    (encode(divisor), achieved)
}

impl BaudDivisor {
    /// Compute the divisor for `rate` on `chip`, with `usb_index` selecting
    /// the port on multi-interface chips. `None` for a zero rate.
    pub(crate) fn for_rate(rate: u32, chip: ChipType, usb_index: u16) -> Option<Self> {
        if rate == 0 {
            return None;
        }

        let (encoded, actual) = match chip {
            ChipType::Am => am_divisor(rate),
            ChipType::Bm | ChipType::Ft2232C | ChipType::Ft232R => clk_divisor(rate, C_CLK, 16),
            ChipType::Ft2232H | ChipType::Ft4232H => {
                if u64::from(rate) * 10 > u64::from(H_CLK / 0x3FFF) {
                    let (encoded, actual) = clk_divisor(rate, H_CLK, 10);
                    // bit 17 selects the 120 MHz clock
                    (encoded | 0x20000, actual)
                } else {
                    clk_divisor(rate, C_CLK, 16)
                }
            }
        };
        if actual == 0 {
            return None;
        }

        let value = (encoded & 0xFFFF) as u16;
        let index = if chip.is_h_type() || chip == ChipType::Ft2232C {
            // The port lives in the low byte, the divisor high bits above it.
            (((encoded >> 8) as u16) & 0xFF00) | usb_index
        } else {
            (encoded >> 16) as u16
        };

        Some(Self {
            actual,
            value,
            index,
        })
    }

    /// Whether the achieved rate is within ~5% of `requested`.
    pub(crate) fn within_tolerance(&self, requested: u32) -> bool {
        let actual = u64::from(self.actual);
        let requested = u64::from(requested);
        if actual * 2 < requested {
            return false;
        }
        let (lo, hi) = if actual < requested {
            (actual, requested)
        } else {
            (requested, actual)
        };
        lo * 21 >= hi * 20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divisor(rate: u32, chip: ChipType) -> BaudDivisor {
        BaudDivisor::for_rate(rate, chip, 1).unwrap()
    }

    #[test]
    fn bm_9600_exact() {
        let d = divisor(9600, ChipType::Bm);
        assert_eq!(d.actual, 9600);
        assert_eq!(d.value, 0x4138);
        assert!(d.within_tolerance(9600));
    }

    #[test]
    fn bm_classic_table() {
        // Values of the fixed table shipped by early drivers.
        assert_eq!(divisor(115_200, ChipType::Bm).value, 0x001A);
        assert_eq!(divisor(38_400, ChipType::Bm).value, 0xC04E);
        assert_eq!(divisor(300, ChipType::Bm).value, 0x2710);
    }

    #[test]
    fn bm_3000000_special() {
        let d = divisor(3_000_000, ChipType::Bm);
        assert_eq!(d.actual, 3_000_000);
        assert_eq!(d.value, 0);
        assert_eq!(d.index, 0);
    }

    #[test]
    fn bm_between_fast_rates_rejected() {
        // 3.5 Mbaud snaps to 3 Mbaud, well outside 5%.
        let d = divisor(3_500_000, ChipType::Bm);
        assert_eq!(d.actual, 3_000_000);
        assert!(!d.within_tolerance(3_500_000));
    }

    #[test]
    fn h_type_12000000() {
        let d = divisor(12_000_000, ChipType::Ft2232H);
        assert_eq!(d.actual, 12_000_000);
    }

    #[test]
    fn h_type_index_carries_port() {
        let d = BaudDivisor::for_rate(9600, ChipType::Ft4232H, 3).unwrap();
        assert_eq!(d.index & 0xFF, 3);
    }

    #[test]
    fn am_rates() {
        assert_eq!(divisor(3_000_000, ChipType::Am).actual, 3_000_000);
        let d = divisor(9600, ChipType::Am);
        assert!(d.within_tolerance(9600), "actual={}", d.actual);
    }

    #[test]
    fn very_low_rates_do_not_panic() {
        for chip in ChipType::ALL {
            let d = BaudDivisor::for_rate(1, chip, 1).unwrap();
            assert!(d.actual > 0);
        }
    }

    #[test]
    fn zero_is_rejected() {
        assert!(BaudDivisor::for_rate(0, ChipType::Ft232R, 1).is_none());
    }
}

//! Type definitions for FTDI chip communication.
//!
//! These types model the chip variants, serial line properties, bit modes
//! and session states used throughout the crate.

use std::fmt;

use crate::constants::FTDI_MAX_EEPROM_SIZE;

/// Supported FTDI chip types.
///
/// The chip type is detected when a device is opened, from the USB
/// `bcdDevice` descriptor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipType {
    /// Original FTDI chip (FT8U232AM).
    Am,
    /// B-type chip (FT232BM, FT245BM).
    Bm,
    /// Dual-port chip (FT2232C/D/L).
    Ft2232C,
    /// FT232R / FT245R.
    Ft232R,
    /// Dual hi-speed chip (FT2232H).
    Ft2232H,
    /// Quad-port chip (FT4232H).
    Ft4232H,
}

impl ChipType {
    /// Every supported chip type.
    pub const ALL: [ChipType; 6] = [
        ChipType::Am,
        ChipType::Bm,
        ChipType::Ft2232C,
        ChipType::Ft232R,
        ChipType::Ft2232H,
        ChipType::Ft4232H,
    ];

    /// Detect the chip type from `bcdDevice`.
    ///
    /// BM chips report 0x0200 when their serial number is blank, so the
    /// presence of a serial string index disambiguates AM from BM.
    pub fn from_bcd_device(bcd: u16, has_serial: bool) -> Self {
        match bcd {
            0x0400 => Self::Bm,
            0x0200 if !has_serial => Self::Bm,
            0x0200 => Self::Am,
            0x0500 => Self::Ft2232C,
            0x0600 => Self::Ft232R,
            0x0700 => Self::Ft2232H,
            0x0800 => Self::Ft4232H,
            _ => Self::Bm,
        }
    }

    /// Whether this is an H-type (hi-speed) chip.
    #[inline]
    pub fn is_h_type(self) -> bool {
        matches!(self, Self::Ft2232H | Self::Ft4232H)
    }

    /// Whether the chip carries an FTDIChip-ID.
    pub fn has_chip_id(self) -> bool {
        self == Self::Ft232R
    }

    /// Addressable EEPROM size in bytes.
    ///
    /// The R-type has a 128 byte internal EEPROM; the others drive an
    /// external 93xx46/56/66 part of up to 256 bytes.
    pub fn eeprom_size(self) -> usize {
        match self {
            Self::Ft232R => 0x80,
            _ => FTDI_MAX_EEPROM_SIZE,
        }
    }

    /// Number of addressable 16-bit EEPROM words.
    pub fn eeprom_words(self) -> u16 {
        (self.eeprom_size() / 2) as u16
    }

    /// Default product string for this chip type.
    pub fn default_product_name(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Bm => "BM",
            Self::Ft2232C => "Dual RS232",
            Self::Ft232R => "FT232R USB UART",
            Self::Ft2232H => "Dual RS232-HS",
            Self::Ft4232H => "FT4232H",
        }
    }

    /// Default product ID for this chip type.
    pub fn default_product_id(self) -> u16 {
        match self {
            Self::Am | Self::Bm | Self::Ft232R => 0x6001,
            Self::Ft2232C | Self::Ft2232H => 0x6010,
            Self::Ft4232H => 0x6011,
        }
    }

    /// Default USB release number (bcdDevice) for this chip type.
    pub fn release_number(self) -> u16 {
        match self {
            Self::Am => 0x0200,
            Self::Bm => 0x0400,
            Self::Ft2232C => 0x0500,
            Self::Ft232R => 0x0600,
            Self::Ft2232H => 0x0700,
            Self::Ft4232H => 0x0800,
        }
    }
}

/// Parity mode for serial communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
    /// Mark parity (always 1).
    Mark,
    /// Space parity (always 0).
    Space,
}

impl Parity {
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Odd => 1,
            Self::Even => 2,
            Self::Mark => 3,
            Self::Space => 4,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 1.5 stop bits.
    OnePointFive,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::One => 0,
            Self::OnePointFive => 1,
            Self::Two => 2,
        }
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

impl DataBits {
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

/// Break signal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BreakType {
    /// Break off.
    #[default]
    Off,
    /// Break on (hold TX low).
    On,
}

impl BreakType {
    pub(crate) fn wire_value(self) -> u16 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    Disabled,
    /// Hardware RTS/CTS handshake.
    RtsCts,
    /// Hardware DTR/DSR handshake.
    DtrDsr,
    /// Software handshake with the given XON and XOFF characters.
    XonXoff {
        /// Resume character.
        xon: u8,
        /// Pause character.
        xoff: u8,
    },
}

/// Modem and line status as reported by `poll_modem_status`.
///
/// The low byte holds the modem lines, the high byte the line status
/// register, as in the header of every bulk IN packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemStatus {
    raw: u16,
}

impl ModemStatus {
    pub(crate) fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Raw 16-bit status value.
    pub fn raw(self) -> u16 {
        self.raw
    }

    /// Clear To Send.
    pub fn cts(self) -> bool {
        self.raw & 0x10 != 0
    }

    /// Data Set Ready.
    pub fn dsr(self) -> bool {
        self.raw & 0x20 != 0
    }

    /// Ring Indicator.
    pub fn ri(self) -> bool {
        self.raw & 0x40 != 0
    }

    /// Receive Line Signal Detect (DCD).
    pub fn rlsd(self) -> bool {
        self.raw & 0x80 != 0
    }

    /// Data Ready.
    pub fn data_ready(self) -> bool {
        self.raw & 0x0100 != 0
    }

    /// Overrun Error.
    pub fn overrun_error(self) -> bool {
        self.raw & 0x0200 != 0
    }

    /// Parity Error.
    pub fn parity_error(self) -> bool {
        self.raw & 0x0400 != 0
    }

    /// Framing Error.
    pub fn framing_error(self) -> bool {
        self.raw & 0x0800 != 0
    }

    /// Break Interrupt.
    pub fn break_interrupt(self) -> bool {
        self.raw & 0x1000 != 0
    }

    /// Transmitter Holding Register Empty.
    pub fn transmitter_holding_empty(self) -> bool {
        self.raw & 0x2000 != 0
    }

    /// Transmitter Empty.
    pub fn transmitter_empty(self) -> bool {
        self.raw & 0x4000 != 0
    }

    /// Error in the receive FIFO.
    pub fn fifo_error(self) -> bool {
        self.raw & 0x8000 != 0
    }
}

/// Bit mode selection for `SIO_SET_BITMODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitMode {
    /// Normal serial/FIFO mode (bitbang disabled).
    #[default]
    Reset,
    /// Asynchronous bitbang mode (B-type and later).
    BitBang,
    /// MPSSE mode (2232 chips).
    Mpsse,
    /// Synchronous bitbang mode (2232 and R-type chips).
    SyncBB,
    /// MCU host bus emulation mode (2232 chips).
    Mcu,
    /// Fast opto-isolated serial mode (2232 chips).
    Opto,
    /// CBUS bitbang (R-type, CBUS pins configured in EEPROM first).
    Cbus,
    /// Single channel synchronous FIFO mode (FT2232H).
    SyncFf,
}

impl BitMode {
    pub(crate) fn wire_value(self) -> u8 {
        match self {
            Self::Reset => 0x00,
            Self::BitBang => 0x01,
            Self::Mpsse => 0x02,
            Self::SyncBB => 0x04,
            Self::Mcu => 0x08,
            Self::Opto => 0x10,
            Self::Cbus => 0x20,
            Self::SyncFf => 0x40,
        }
    }

    /// Whether data-bus frames drive the pins in this mode.
    ///
    /// CBUS bitbang is excluded: its levels travel in the bitmode request
    /// itself, not in bulk data.
    pub fn is_bitbang(self) -> bool {
        matches!(self, Self::BitBang | Self::SyncBB)
    }
}

/// Port selection for multi-interface chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interface {
    /// The first interface (same as `A`).
    #[default]
    Any,
    /// Interface A.
    A,
    /// Interface B.
    B,
    /// Interface C (FT4232H only).
    C,
    /// Interface D (FT4232H only).
    D,
}

/// Interface resolved to USB interface number, request index and endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InterfaceConfig {
    pub interface_num: u8,
    /// The `wIndex` used in vendor requests (1-based).
    pub usb_index: u16,
    pub write_ep: u8,
    pub read_ep: u8,
}

impl Interface {
    pub(crate) fn config(self) -> InterfaceConfig {
        let n = match self {
            Self::Any | Self::A => 0u8,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        };
        InterfaceConfig {
            interface_num: n,
            usb_index: u16::from(n) + 1,
            write_ep: 0x02 + 2 * n,
            read_ep: 0x81 + 2 * n,
        }
    }
}

/// Lifecycle state of a [`DeviceContext`](crate::DeviceContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Allocated, no device bound.
    Closed,
    /// Bound to a device, in the given bit mode.
    Open(BitMode),
    /// Released by `destroy`; terminal.
    Freed,
}

impl SessionState {
    /// Whether a device is bound.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open(BitMode::Reset) => f.write_str("open"),
            Self::Open(mode) => write!(f, "open in {mode:?} mode"),
            Self::Freed => f.write_str("freed"),
        }
    }
}

//! Protocol constants for FTDI chip communication.
//!
//! Vendor request codes, their sub-commands, and the EEPROM layout.
//! Most users only need [`FTDI_VID`] and the [`pid`] table.

/// Default FTDI vendor ID.
pub const FTDI_VID: u16 = 0x0403;

/// Known FTDI product IDs.
pub mod pid {
    /// FT232AM, FT232BM, FT232R.
    pub const FT232: u16 = 0x6001;
    /// FT2232C/D/H.
    pub const FT2232: u16 = 0x6010;
    /// FT4232H.
    pub const FT4232: u16 = 0x6011;
}

// ---- SIO vendor request codes ----

pub(crate) const SIO_RESET_REQUEST: u8 = 0x00;
pub(crate) const SIO_SET_MODEM_CTRL_REQUEST: u8 = 0x01;
pub(crate) const SIO_SET_FLOW_CTRL_REQUEST: u8 = 0x02;
pub(crate) const SIO_SET_BAUDRATE_REQUEST: u8 = 0x03;
pub(crate) const SIO_SET_DATA_REQUEST: u8 = 0x04;
pub(crate) const SIO_POLL_MODEM_STATUS_REQUEST: u8 = 0x05;
pub(crate) const SIO_SET_EVENT_CHAR_REQUEST: u8 = 0x06;
pub(crate) const SIO_SET_ERROR_CHAR_REQUEST: u8 = 0x07;
pub(crate) const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 0x09;
pub(crate) const SIO_GET_LATENCY_TIMER_REQUEST: u8 = 0x0A;
pub(crate) const SIO_SET_BITMODE_REQUEST: u8 = 0x0B;
pub(crate) const SIO_READ_PINS_REQUEST: u8 = 0x0C;
pub(crate) const SIO_READ_EEPROM_REQUEST: u8 = 0x90;
pub(crate) const SIO_WRITE_EEPROM_REQUEST: u8 = 0x91;
pub(crate) const SIO_ERASE_EEPROM_REQUEST: u8 = 0x92;

// ---- Reset sub-commands ----

pub(crate) const SIO_RESET_SIO: u16 = 0;
pub(crate) const SIO_RESET_PURGE_RX: u16 = 1;
pub(crate) const SIO_RESET_PURGE_TX: u16 = 2;

// ---- Flow control (high byte of wIndex) ----

pub(crate) const SIO_DISABLE_FLOW_CTRL: u16 = 0x0;
pub(crate) const SIO_RTS_CTS_HS: u16 = 0x1 << 8;
pub(crate) const SIO_DTR_DSR_HS: u16 = 0x2 << 8;
pub(crate) const SIO_XON_XOFF_HS: u16 = 0x4 << 8;

// ---- Modem control: line levels in the low byte, their mask above ----

pub(crate) const SIO_SET_DTR_HIGH: u16 = 1 | (0x1 << 8);
pub(crate) const SIO_SET_DTR_LOW: u16 = 0x1 << 8;
pub(crate) const SIO_SET_RTS_HIGH: u16 = 2 | (0x2 << 8);
pub(crate) const SIO_SET_RTS_LOW: u16 = 0x2 << 8;

// ---- Clocks ----

/// H-type clock: 120 MHz.
pub(crate) const H_CLK: u32 = 120_000_000;
/// Standard clock: 48 MHz.
pub(crate) const C_CLK: u32 = 48_000_000;
/// AM clock: 24 MHz.
pub(crate) const AM_CLK: u32 = 24_000_000;

// ---- EEPROM ----

/// Largest EEPROM image handled (93xx66).
pub const FTDI_MAX_EEPROM_SIZE: usize = 256;

/// EEPROM word addresses of the two FTDIChip-ID halves on R-type chips.
pub(crate) const CHIP_ID_ADDR_HI: u16 = 0x43;
pub(crate) const CHIP_ID_ADDR_LO: u16 = 0x44;

/// Checksum seed.
pub(crate) const EEPROM_CHECKSUM_SEED: u16 = 0xAAAA;
/// USB string descriptor type byte.
pub(crate) const USB_DT_STRING: u8 = 0x03;
/// Max power is stored in units of 2 mA.
pub(crate) const MAX_POWER_MILLIAMP_PER_UNIT: u16 = 2;

/// Bit of EEPROM byte 0x0A enabling the serial number string.
pub(crate) const USE_SERIAL_NUM: u8 = 0x08;
/// Bit of EEPROM byte 0x0A enabling the explicit USB version.
pub(crate) const USE_USB_VERSION: u8 = 0x10;
/// Driver type bit: virtual COM port.
pub(crate) const DRIVER_VCP: u8 = 0x08;
pub(crate) const HIGH_CURRENT_DRIVE: u8 = 0x10;
pub(crate) const HIGH_CURRENT_DRIVE_R: u8 = 0x04;
pub(crate) const SUSPEND_DBUS7: u8 = 0x80;

/// Channel hardware types stored in the EEPROM of multi-channel chips.
pub mod channel {
    /// RS232 UART.
    pub const UART: u8 = 0x0;
    /// 245 FIFO.
    pub const FIFO_245: u8 = 0x1;
    /// CPU FIFO.
    pub const CPU: u8 = 0x2;
    /// Opto-isolated.
    pub const OPTO: u8 = 0x4;
}

/// CBUS pin functions (FT232R).
pub mod cbus {
    /// Transmit data enable.
    pub const TXDEN: u8 = 0;
    /// Power enable.
    pub const PWREN: u8 = 1;
    /// Receive LED.
    pub const RXLED: u8 = 2;
    /// Transmit LED.
    pub const TXLED: u8 = 3;
    /// Transmit/receive LED.
    pub const TXRXLED: u8 = 4;
    /// Sleep indicator.
    pub const SLEEP: u8 = 5;
    /// 48 MHz clock output.
    pub const CLK48: u8 = 6;
    /// 24 MHz clock output.
    pub const CLK24: u8 = 7;
    /// 12 MHz clock output.
    pub const CLK12: u8 = 8;
    /// 6 MHz clock output.
    pub const CLK6: u8 = 9;
    /// IO mode for CBUS bitbang.
    pub const IOMODE: u8 = 0x0A;
    /// Bitbang write strobe.
    pub const BB_WR: u8 = 0x0B;
    /// Bitbang read strobe.
    pub const BB_RD: u8 = 0x0C;
}

/// Signal inversion bits (FT232R).
pub mod invert {
    pub const TXD: u8 = 0x01;
    pub const RXD: u8 = 0x02;
    pub const RTS: u8 = 0x04;
    pub const CTS: u8 = 0x08;
    pub const DTR: u8 = 0x10;
    pub const DSR: u8 = 0x20;
    pub const DCD: u8 = 0x40;
    pub const RI: u8 = 0x80;
}

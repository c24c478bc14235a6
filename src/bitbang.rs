//! Bitbang mode: drive the eight data pins directly.
//!
//! In bitbang mode every byte written sets one level per pin. Pins whose
//! bit is set in the direction mask are outputs; the others stay inputs
//! and can be sampled with [`DeviceContext::read_pins`].

use log::debug;

use crate::constants::*;
use crate::context::DeviceContext;
use crate::error::{Error, Result};
use crate::transport::UsbBus;
use crate::types::{BitMode, SessionState};

impl<B: UsbBus> DeviceContext<B> {
    /// Enter asynchronous bitbang mode with `mask` selecting the outputs.
    ///
    /// Only valid while open in the default mode.
    pub fn enable_bitbang(&mut self, mask: u8) -> Result<()> {
        self.track(|ctx| {
            ctx.expect_state("enable_bitbang", |s| s == SessionState::Open(BitMode::Reset))?;
            ctx.program_bitmode("enable_bitbang", mask, BitMode::BitBang)
        })
    }

    /// Write one frame of pin levels. Only valid in a bitbang mode.
    ///
    /// Returns the bytes transferred, which is always 1.
    pub fn write_bitbang(&mut self, frame: u8) -> Result<usize> {
        self.track(|ctx| {
            ctx.expect_state("write_bitbang", |s| {
                matches!(s, SessionState::Open(mode) if mode.is_bitbang())
            })?;
            match ctx.bulk_out("write_bitbang", &[frame])? {
                1 => Ok(1),
                actual => Err(Error::ShortTransfer {
                    expected: 1,
                    actual,
                }),
            }
        })
    }

    /// Leave bitbang mode. Only valid in a bitbang mode.
    pub fn disable_bitbang(&mut self) -> Result<()> {
        self.track(|ctx| {
            ctx.expect_state("disable_bitbang", |s| {
                matches!(s, SessionState::Open(mode) if mode.is_bitbang())
            })?;
            ctx.program_bitmode("disable_bitbang", 0, BitMode::Reset)
        })
    }

    /// Switch to any bit mode the chip family offers.
    ///
    /// Unlike [`enable_bitbang`](Self::enable_bitbang), this may switch
    /// between modes directly. [`BitMode::Reset`] returns to serial mode.
    pub fn set_bitmode(&mut self, mask: u8, mode: BitMode) -> Result<()> {
        self.track(|ctx| {
            ctx.expect_state("set_bitmode", SessionState::is_open)?;
            ctx.program_bitmode("set_bitmode", mask, mode)
        })
    }

    /// Sample the current pin levels, bypassing the read buffer.
    pub fn read_pins(&mut self) -> Result<u8> {
        self.track(|ctx| {
            let index = ctx.usb_index();
            let data = ctx.control_in("read_pins", SIO_READ_PINS_REQUEST, 0, index, 1)?;
            Ok(data[0])
        })
    }

    fn program_bitmode(&mut self, operation: &'static str, mask: u8, mode: BitMode) -> Result<()> {
        let value = u16::from(mask) | (u16::from(mode.wire_value()) << 8);
        let index = self.usb_index();
        self.control_out(operation, SIO_SET_BITMODE_REQUEST, value, index)?;
        self.set_bit_mode_state(mode);
        debug!("bit mode {mode:?}, mask {mask:#04x}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::transport::mock::MockDeviceId;
    use crate::transport::{MockBus, MockDevice};
    use crate::{BitMode, DeviceContext, Error, ErrorKind, SessionState, FTDI_VID};

    fn opened() -> (MockBus, MockDeviceId, DeviceContext<MockBus>) {
        let bus = MockBus::new();
        let id = bus.attach(MockDevice::ft232r("A"));
        let mut ctx = DeviceContext::create(bus.clone()).unwrap();
        ctx.open(FTDI_VID, 0x6001).unwrap();
        (bus, id, ctx)
    }

    #[test]
    fn write_outside_bitbang_is_invalid_state() {
        let (_bus, _id, mut ctx) = opened();
        let err = ctx.write_bitbang(0xFF).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn enable_twice_is_invalid_state() {
        let (_bus, _id, mut ctx) = opened();
        ctx.enable_bitbang(0xFF).unwrap();
        assert_eq!(
            ctx.enable_bitbang(0xFF).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn disable_without_enable_is_invalid_state() {
        let (_bus, _id, mut ctx) = opened();
        assert_eq!(
            ctx.disable_bitbang().unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn set_bitmode_switches_directly() {
        let (bus, id, mut ctx) = opened();
        ctx.set_bitmode(0x0F, BitMode::SyncBB).unwrap();
        assert_eq!(ctx.state(), SessionState::Open(BitMode::SyncBB));
        assert_eq!(bus.bitmode(id), (0x0F, 0x04));
        ctx.disable_bitbang().unwrap();
        assert_eq!(ctx.bit_mode(), Some(BitMode::Reset));
    }

    #[test]
    fn cbus_mode_takes_no_frames() {
        let (bus, id, mut ctx) = opened();
        ctx.set_bitmode(0xF1, BitMode::Cbus).unwrap();
        assert_eq!(
            ctx.write_bitbang(0x01).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            ctx.disable_bitbang().unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert!(bus.written(id).is_empty());
    }

    #[test]
    fn short_frame_is_transport_error() {
        let (bus, id, mut ctx) = opened();
        ctx.enable_bitbang(0xFF).unwrap();
        bus.short_next_write(id);
        let err = ctx.write_bitbang(0xA5).unwrap_err();
        assert!(matches!(err, Error::ShortTransfer { expected: 1, actual: 0 }));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(ctx.last_error_code(), ErrorKind::Transport.code());
        // Still in bitbang; the next frame goes through.
        assert_eq!(ctx.write_bitbang(0xA5).unwrap(), 1);
        assert_eq!(bus.pins(id), 0xA5);
    }
}

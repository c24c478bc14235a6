//! Device session lifecycle and configuration.
//!
//! [`DeviceContext`] is the main type in this crate. It binds to at most one
//! FTDI device at a time and walks through the states
//! `Closed -> Open -> Closed -> Freed`:
//!
//! ```no_run
//! use ftdi_session::{DeviceContext, NusbBus, FTDI_VID};
//!
//! let mut ctx = DeviceContext::create(NusbBus::new())?;
//! ctx.open(FTDI_VID, 0x6001)?;
//! ctx.set_baudrate(115_200)?;
//! ctx.write_data(b"Hello FTDI!\r\n")?;
//! ctx.close()?;
//! ctx.destroy()?;
//! # Ok::<(), ftdi_session::Error>(())
//! ```
//!
//! Every fallible operation returns a [`Result`] and also records the
//! failure on the context, where [`DeviceContext::error_string`] and
//! [`DeviceContext::last_error_code`] report it until the next `open`.

use std::time::Duration;

use log::{debug, trace, warn};

use crate::baudrate::BaudDivisor;
use crate::config::SessionConfig;
use crate::constants::*;
use crate::device_info::{self, DeviceDescriptor, DeviceFilter};
use crate::error::{Error, Result};
use crate::transport::{UsbBus, UsbError, UsbHandle};
use crate::types::*;

/// The rate programmed on every freshly opened device.
const DEFAULT_BAUDRATE: u32 = 9600;

/// The bound device.
struct Link<H> {
    handle: H,
    chip_type: ChipType,
    max_packet_size: usize,
}

/// Message and code of the most recent failure.
#[derive(Debug, Default)]
struct LastError {
    code: i32,
    message: String,
}

impl LastError {
    fn set(&mut self, err: &Error) {
        self.code = err.code();
        self.message = err.to_string();
    }

    fn clear(&mut self) {
        self.code = 0;
        self.message.clear();
    }
}

/// A session with one FTDI device.
///
/// Generic over the [`UsbBus`] so the same logic drives real hardware
/// ([`NusbBus`](crate::NusbBus)) and the simulated
/// [`MockBus`](crate::transport::MockBus).
pub struct DeviceContext<B: UsbBus> {
    bus: B,
    config: SessionConfig,
    state: SessionState,
    link: Option<Link<B::Handle>>,
    baudrate: u32,

    // Payload left over from the last bulk read, modem status stripped.
    read_buffer: Vec<u8>,
    read_offset: usize,

    last_error: LastError,
}

impl<B: UsbBus> std::fmt::Debug for DeviceContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("state", &self.state)
            .field("chip_type", &self.chip_type())
            .field("baudrate", &self.baudrate)
            .field("interface", &self.config.interface)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

// ---- Creation / Teardown ----

impl<B: UsbBus> DeviceContext<B> {
    /// Create a closed context with default configuration.
    pub fn create(bus: B) -> Result<Self> {
        Self::create_with_config(bus, SessionConfig::default())
    }

    /// Create a closed context.
    ///
    /// The read buffer is allocated up front; failure to do so is reported
    /// as an allocation error rather than an abort.
    pub fn create_with_config(bus: B, config: SessionConfig) -> Result<Self> {
        let mut read_buffer = Vec::new();
        read_buffer
            .try_reserve_exact(config.read_chunksize)
            .map_err(|e| Error::Allocation(e.to_string()))?;

        Ok(Self {
            bus,
            config,
            state: SessionState::Closed,
            link: None,
            baudrate: 0,
            read_buffer,
            read_offset: 0,
            last_error: LastError::default(),
        })
    }

    /// Release the context. Only valid once closed; every later call fails
    /// with [`Error::UseAfterFree`].
    pub fn destroy(&mut self) -> Result<()> {
        self.track(|ctx| {
            ctx.expect_state("destroy", |s| s == SessionState::Closed)?;
            ctx.read_buffer = Vec::new();
            ctx.read_offset = 0;
            ctx.state = SessionState::Freed;
            debug!("context destroyed");
            Ok(())
        })
    }
}

// ---- Error reporting ----

impl<B: UsbBus> DeviceContext<B> {
    /// Description of the most recent failure, `""` if there was none.
    pub fn error_string(&self) -> &str {
        &self.last_error.message
    }

    /// Status code of the most recent failure, 0 if there was none.
    pub fn last_error_code(&self) -> i32 {
        self.last_error.code
    }

    /// Run `op`, recording its error (if any) as the last error.
    pub(crate) fn track<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = op(self);
        if let Err(e) = &result {
            trace!("operation failed: {e}");
            self.last_error.set(e);
        }
        result
    }

    /// Fail unless the session state satisfies `allowed`.
    pub(crate) fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(SessionState) -> bool,
    ) -> Result<()> {
        match self.state {
            SessionState::Freed => Err(Error::UseAfterFree),
            state if allowed(state) => Ok(()),
            state => Err(Error::InvalidState { operation, state }),
        }
    }

    /// The detected chip, failing unless open.
    pub(crate) fn open_chip_type(&mut self, operation: &'static str) -> Result<ChipType> {
        self.link(operation).map(|l| l.chip_type)
    }

    fn link(&mut self, operation: &'static str) -> Result<&mut Link<B::Handle>> {
        let state = self.state;
        match (state, self.link.as_mut()) {
            (SessionState::Freed, _) => Err(Error::UseAfterFree),
            (SessionState::Open(_), Some(link)) => Ok(link),
            (state, _) => Err(Error::InvalidState { operation, state }),
        }
    }
}

// ---- Discovery / Opening ----

impl<B: UsbBus> DeviceContext<B> {
    /// List devices with the given ids. See [`device_info::find_all`].
    pub fn find_all(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<DeviceDescriptor<B::Device>>> {
        self.track(|ctx| {
            ctx.expect_state("find_all", |_| true)?;
            device_info::find_all(&ctx.bus, vendor_id, product_id, &ctx.config)
        })
    }

    /// Open the first device with the given ids.
    pub fn open(&mut self, vendor_id: u16, product_id: u16) -> Result<()> {
        self.open_with_filter(&DeviceFilter::new(vendor_id, product_id))
    }

    /// Open the device selected by `filter`.
    pub fn open_with_filter(&mut self, filter: &DeviceFilter) -> Result<()> {
        self.track(|ctx| {
            ctx.begin_open()?;
            let device = device_info::find_device(&ctx.bus, filter, &ctx.config)?;
            ctx.attach(&device)
        })
    }

    /// Open a device returned by [`find_all`](Self::find_all).
    pub fn open_device(&mut self, descriptor: &DeviceDescriptor<B::Device>) -> Result<()> {
        self.track(|ctx| {
            ctx.begin_open()?;
            ctx.attach(descriptor.device())
        })
    }

    fn begin_open(&mut self) -> Result<()> {
        self.expect_state("open", |s| s == SessionState::Closed)?;
        self.last_error.clear();
        Ok(())
    }

    /// Claim `device`, detect the chip, reset it and program the default
    /// baud rate. On failure the claim is given back.
    fn attach(&mut self, device: &B::Device) -> Result<()> {
        let iface = self.config.interface.config();
        let handle = self
            .bus
            .claim(device, iface.interface_num)
            .map_err(|e| match e {
                UsbError::Claim(message) => Error::Open { code: -5, message },
                other => Error::Open {
                    code: -4,
                    message: other.to_string(),
                },
            })?;

        let info = handle.info();
        let chip_type = ChipType::from_bcd_device(info.bcd_device, info.has_serial);
        debug!(
            "opened {:?} (bcdDevice {:#06x}) on interface {:?}",
            chip_type, info.bcd_device, self.config.interface
        );

        self.link = Some(Link {
            handle,
            chip_type,
            max_packet_size: info.max_packet_size,
        });
        self.state = SessionState::Open(BitMode::Reset);

        if let Err(e) = self.reset_device() {
            self.detach();
            return Err(Error::Open {
                code: -6,
                message: format!("reset failed: {e}"),
            });
        }
        if let Err(e) = self.program_baudrate(DEFAULT_BAUDRATE) {
            self.detach();
            return Err(Error::Open {
                code: -7,
                message: format!("default baud rate failed: {e}"),
            });
        }
        Ok(())
    }

    /// Drop the binding and return to `Closed`.
    fn detach(&mut self) {
        if let Some(link) = self.link.take() {
            if let Err(e) = link.handle.release() {
                warn!("releasing device failed: {e}");
            }
        }
        self.state = SessionState::Closed;
        self.baudrate = 0;
        self.read_buffer.clear();
        self.read_offset = 0;
    }

    /// Release the device. Only valid while open.
    pub fn close(&mut self) -> Result<()> {
        self.track(|ctx| {
            ctx.expect_state("close", SessionState::is_open)?;
            ctx.detach();
            debug!("context closed");
            Ok(())
        })
    }

    /// Select the interface of multi-port chips. Only valid while closed;
    /// takes effect on the next open.
    pub fn set_interface(&mut self, interface: Interface) -> Result<()> {
        self.track(|ctx| {
            ctx.expect_state("set_interface", |s| s == SessionState::Closed)?;
            ctx.config.interface = interface;
            Ok(())
        })
    }
}

// ---- Transfers ----

impl<B: UsbBus> DeviceContext<B> {
    /// `wIndex` selecting the configured port.
    pub(crate) fn usb_index(&self) -> u16 {
        self.config.interface.config().usb_index
    }

    pub(crate) fn control_out(
        &mut self,
        operation: &'static str,
        request: u8,
        value: u16,
        index: u16,
    ) -> Result<()> {
        let timeout = self.config.write_timeout;
        trace!("control out {request:#04x} value={value:#06x} index={index:#06x}");
        self.link(operation)?
            .handle
            .control_out(request, value, index, timeout)?;
        Ok(())
    }

    /// Control IN request that must return exactly `length` bytes.
    pub(crate) fn control_in(
        &mut self,
        operation: &'static str,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<Vec<u8>> {
        let timeout = self.config.read_timeout;
        let data = self
            .link(operation)?
            .handle
            .control_in(request, value, index, length, timeout)?;
        trace!("control in {request:#04x} index={index:#06x} -> {data:02x?}");
        if data.len() < usize::from(length) {
            return Err(Error::ShortTransfer {
                expected: usize::from(length),
                actual: data.len(),
            });
        }
        Ok(data)
    }

    pub(crate) fn bulk_out(&mut self, operation: &'static str, data: &[u8]) -> Result<usize> {
        let timeout = self.config.write_timeout;
        let ep = self.config.interface.config().write_ep;
        let n = self.link(operation)?.handle.bulk_out(ep, data, timeout)?;
        trace!("bulk out {} of {} byte(s)", n, data.len());
        Ok(n)
    }
}

// ---- Reset / Purge ----

impl<B: UsbBus> DeviceContext<B> {
    fn reset_device(&mut self) -> Result<()> {
        let index = self.usb_index();
        self.control_out("usb_reset", SIO_RESET_REQUEST, SIO_RESET_SIO, index)?;
        self.read_buffer.clear();
        self.read_offset = 0;
        Ok(())
    }

    /// Reset the chip's serial engine and drop buffered input.
    pub fn usb_reset(&mut self) -> Result<()> {
        self.track(|ctx| ctx.reset_device())
    }

    /// Clear the chip's receive FIFO and the local read buffer.
    pub fn purge_rx_buffer(&mut self) -> Result<()> {
        self.track(|ctx| {
            let index = ctx.usb_index();
            ctx.control_out("purge_rx_buffer", SIO_RESET_REQUEST, SIO_RESET_PURGE_RX, index)?;
            ctx.read_buffer.clear();
            ctx.read_offset = 0;
            Ok(())
        })
    }

    /// Clear the chip's transmit FIFO.
    pub fn purge_tx_buffer(&mut self) -> Result<()> {
        self.track(|ctx| {
            let index = ctx.usb_index();
            ctx.control_out("purge_tx_buffer", SIO_RESET_REQUEST, SIO_RESET_PURGE_TX, index)
        })
    }

    /// Clear both FIFOs.
    pub fn purge_buffers(&mut self) -> Result<()> {
        self.purge_rx_buffer()?;
        self.purge_tx_buffer()
    }
}

// ---- Serial Configuration ----

impl<B: UsbBus> DeviceContext<B> {
    /// Set the baud rate.
    ///
    /// The divisor is computed for the detected chip. If the nearest
    /// achievable rate is more than ~5% off, nothing is programmed and
    /// [`Error::UnsupportedBaudRate`] reports the nearest rate. In any bit
    /// mode other than [`BitMode::Reset`] the chip clocks pins at four
    /// times the programmed rate, so `rate * 4` is sent.
    pub fn set_baudrate(&mut self, rate: u32) -> Result<()> {
        self.track(|ctx| ctx.program_baudrate(rate))
    }

    fn program_baudrate(&mut self, rate: u32) -> Result<()> {
        let chip_type = self.open_chip_type("set_baudrate")?;
        let scaled = self.bit_mode().is_some_and(|mode| mode != BitMode::Reset);

        let effective = if scaled {
            rate.checked_mul(4)
                .ok_or(Error::InvalidArgument("baud rate too large"))?
        } else {
            rate
        };

        let divisor = BaudDivisor::for_rate(effective, chip_type, self.usb_index())
            .ok_or(Error::InvalidArgument("baud rate must be > 0"))?;
        if !divisor.within_tolerance(effective) {
            return Err(Error::UnsupportedBaudRate {
                requested: rate,
                actual: if scaled {
                    divisor.actual / 4
                } else {
                    divisor.actual
                },
            });
        }

        self.control_out(
            "set_baudrate",
            SIO_SET_BAUDRATE_REQUEST,
            divisor.value,
            divisor.index,
        )?;
        self.baudrate = rate;
        debug!("baud rate {} (actual {})", rate, divisor.actual);
        Ok(())
    }

    /// Set data bits, stop bits, parity and break.
    pub fn set_line_property(
        &mut self,
        bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
        break_type: BreakType,
    ) -> Result<()> {
        let value = bits.wire_value()
            | (parity.wire_value() << 8)
            | (stop_bits.wire_value() << 11)
            | (break_type.wire_value() << 14);
        self.track(|ctx| {
            let index = ctx.usb_index();
            ctx.control_out("set_line_property", SIO_SET_DATA_REQUEST, value, index)
        })
    }

    /// Set the latency timer in milliseconds (1..=255).
    pub fn set_latency_timer(&mut self, latency_ms: u8) -> Result<()> {
        self.track(|ctx| {
            if latency_ms == 0 {
                return Err(Error::InvalidArgument("latency must be 1..=255 ms"));
            }
            let index = ctx.usb_index();
            ctx.control_out(
                "set_latency_timer",
                SIO_SET_LATENCY_TIMER_REQUEST,
                u16::from(latency_ms),
                index,
            )
        })
    }

    /// Read the latency timer in milliseconds.
    pub fn latency_timer(&mut self) -> Result<u8> {
        self.track(|ctx| {
            let index = ctx.usb_index();
            let data = ctx.control_in("latency_timer", SIO_GET_LATENCY_TIMER_REQUEST, 0, index, 1)?;
            Ok(data[0])
        })
    }

    /// Set the read timeout for transfers.
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.config.read_timeout = timeout;
    }

    /// Set the write timeout for transfers.
    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.config.write_timeout = timeout;
    }

    /// Set the largest bulk write issued at once. Zero is treated as one.
    pub fn set_write_chunksize(&mut self, chunksize: usize) {
        self.config.write_chunksize = chunksize.max(1);
    }
}

// ---- Flow Control / Modem Lines ----

impl<B: UsbBus> DeviceContext<B> {
    /// Select the flow control handshake.
    pub fn set_flow_control(&mut self, flow: FlowControl) -> Result<()> {
        self.track(|ctx| {
            let (value, mode) = match flow {
                FlowControl::Disabled => (0, SIO_DISABLE_FLOW_CTRL),
                FlowControl::RtsCts => (0, SIO_RTS_CTS_HS),
                FlowControl::DtrDsr => (0, SIO_DTR_DSR_HS),
                FlowControl::XonXoff { xon, xoff } => {
                    (u16::from(xon) | (u16::from(xoff) << 8), SIO_XON_XOFF_HS)
                }
            };
            let index = mode | ctx.usb_index();
            ctx.control_out("set_flow_control", SIO_SET_FLOW_CTRL_REQUEST, value, index)
        })
    }

    /// Drive the DTR line.
    pub fn set_dtr(&mut self, high: bool) -> Result<()> {
        let value = if high { SIO_SET_DTR_HIGH } else { SIO_SET_DTR_LOW };
        self.set_modem_control("set_dtr", value)
    }

    /// Drive the RTS line.
    pub fn set_rts(&mut self, high: bool) -> Result<()> {
        let value = if high { SIO_SET_RTS_HIGH } else { SIO_SET_RTS_LOW };
        self.set_modem_control("set_rts", value)
    }

    /// Drive DTR and RTS in a single request.
    pub fn set_dtr_rts(&mut self, dtr: bool, rts: bool) -> Result<()> {
        let dtr = if dtr { SIO_SET_DTR_HIGH } else { SIO_SET_DTR_LOW };
        let rts = if rts { SIO_SET_RTS_HIGH } else { SIO_SET_RTS_LOW };
        self.set_modem_control("set_dtr_rts", dtr | rts)
    }

    fn set_modem_control(&mut self, operation: &'static str, value: u16) -> Result<()> {
        self.track(|ctx| {
            let index = ctx.usb_index();
            ctx.control_out(operation, SIO_SET_MODEM_CTRL_REQUEST, value, index)
        })
    }

    /// Set the character that flushes the receive buffer early when seen.
    pub fn set_event_char(&mut self, ch: u8, enable: bool) -> Result<()> {
        self.set_special_char("set_event_char", SIO_SET_EVENT_CHAR_REQUEST, ch, enable)
    }

    /// Set the character inserted into the stream on a line error.
    pub fn set_error_char(&mut self, ch: u8, enable: bool) -> Result<()> {
        self.set_special_char("set_error_char", SIO_SET_ERROR_CHAR_REQUEST, ch, enable)
    }

    fn set_special_char(
        &mut self,
        operation: &'static str,
        request: u8,
        ch: u8,
        enable: bool,
    ) -> Result<()> {
        let value = u16::from(ch) | (u16::from(enable) << 8);
        self.track(|ctx| {
            let index = ctx.usb_index();
            ctx.control_out(operation, request, value, index)
        })
    }

    /// Read the modem and line status bits.
    pub fn poll_modem_status(&mut self) -> Result<ModemStatus> {
        self.track(|ctx| {
            let index = ctx.usb_index();
            let data =
                ctx.control_in("poll_modem_status", SIO_POLL_MODEM_STATUS_REQUEST, 0, index, 2)?;
            Ok(ModemStatus::from_raw(
                u16::from(data[0]) | (u16::from(data[1]) << 8),
            ))
        })
    }
}

// ---- Accessors ----

impl<B: UsbBus> DeviceContext<B> {
    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The detected chip, while open.
    pub fn chip_type(&self) -> Option<ChipType> {
        self.link.as_ref().map(|l| l.chip_type)
    }

    /// The active bit mode, while open.
    pub fn bit_mode(&self) -> Option<BitMode> {
        match self.state {
            SessionState::Open(mode) => Some(mode),
            _ => None,
        }
    }

    pub(crate) fn set_bit_mode_state(&mut self, mode: BitMode) {
        if self.state.is_open() {
            self.state = SessionState::Open(mode);
        }
    }

    /// The last baud rate set, 0 when closed.
    pub fn baudrate(&self) -> u32 {
        self.baudrate
    }

    /// wMaxPacketSize of the bound interface, while open.
    pub fn max_packet_size(&self) -> Option<usize> {
        self.link.as_ref().map(|l| l.max_packet_size)
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The bus this context talks to.
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

// ---- Data Transfer ----

impl<B: UsbBus> DeviceContext<B> {
    /// Write `data` in chunks of the configured write chunk size.
    ///
    /// Returns the number of bytes written, which is always `data.len()`:
    /// a chunk the device does not fully accept fails with a short
    /// transfer error.
    pub fn write_data(&mut self, data: &[u8]) -> Result<usize> {
        self.track(|ctx| {
            ctx.expect_state("write_data", SessionState::is_open)?;
            let mut written = 0;
            for chunk in data.chunks(ctx.config.write_chunksize) {
                let n = ctx.bulk_out("write_data", chunk)?;
                written += n;
                if n < chunk.len() {
                    return Err(Error::ShortTransfer {
                        expected: data.len(),
                        actual: written,
                    });
                }
            }
            Ok(written)
        })
    }

    /// Read up to `buf.len()` payload bytes.
    ///
    /// The two modem status bytes the chip prefixes to every packet are
    /// stripped. Returns 0 when the chip had nothing to send.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.track(|ctx| {
            ctx.expect_state("read_data", SessionState::is_open)?;
            if buf.is_empty() {
                return Ok(0);
            }

            // Serve leftovers first
            if ctx.read_offset < ctx.read_buffer.len() {
                let pending = &ctx.read_buffer[ctx.read_offset..];
                let n = pending.len().min(buf.len());
                buf[..n].copy_from_slice(&pending[..n]);
                ctx.read_offset += n;
                return Ok(n);
            }

            let timeout = ctx.config.read_timeout;
            let chunk = ctx.config.read_chunksize;
            let ep = ctx.config.interface.config().read_ep;
            let link = ctx.link("read_data")?;
            let packet_size = link.max_packet_size;
            let mut raw = link.handle.bulk_in(ep, chunk, timeout)?;

            let len = strip_modem_status(&mut raw, packet_size);
            let n = len.min(buf.len());
            buf[..n].copy_from_slice(&raw[..n]);

            ctx.read_buffer.clear();
            ctx.read_buffer.extend_from_slice(&raw[n..len]);
            ctx.read_offset = 0;
            Ok(n)
        })
    }
}

/// Strip the 2-byte modem status header from each packet of a bulk read.
/// Returns the number of payload bytes, compacted to the front of `data`.
fn strip_modem_status(data: &mut [u8], packet_size: usize) -> usize {
    if packet_size <= 2 {
        return 0;
    }
    let total = data.len();
    let mut write_pos = 0;

    for pkt_start in (0..total).step_by(packet_size) {
        let pkt_end = (pkt_start + packet_size).min(total);
        if pkt_end - pkt_start <= 2 {
            continue;
        }
        let payload = pkt_start + 2..pkt_end;
        let len = payload.len();
        data.copy_within(payload, write_pos);
        write_pos += len;
    }

    write_pos
}

impl<B: UsbBus> Drop for DeviceContext<B> {
    fn drop(&mut self) {
        if self.link.is_some() {
            warn!("context dropped while open; releasing device");
            self.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockBus, MockDevice};
    use crate::ErrorKind;

    fn opened() -> (MockBus, crate::transport::mock::MockDeviceId, DeviceContext<MockBus>) {
        let bus = MockBus::new();
        let id = bus.attach(MockDevice::ft232r("A"));
        let mut ctx = DeviceContext::create(bus.clone()).unwrap();
        ctx.open(FTDI_VID, pid::FT232).unwrap();
        (bus, id, ctx)
    }

    #[test]
    fn strip_modem_status_single_packet() {
        let mut data = vec![0u8; 64];
        data[0] = 0x01;
        data[1] = 0x60;
        for (i, byte) in data.iter_mut().enumerate().skip(2) {
            *byte = i as u8;
        }

        let stripped = strip_modem_status(&mut data, 64);
        assert_eq!(stripped, 62);
        for (i, byte) in data.iter().enumerate().take(62) {
            assert_eq!(*byte, (i + 2) as u8);
        }
    }

    #[test]
    fn strip_modem_status_multiple_packets() {
        let mut data = vec![
            0xAA, 0xBB, 2, 3, 4, 5, 6, 7, // packet 1
            0xCC, 0xDD, 10, 11, 12, 13, 14, 15, // packet 2
        ];
        assert_eq!(strip_modem_status(&mut data, 8), 12);
        assert_eq!(&data[..12], &[2, 3, 4, 5, 6, 7, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn strip_modem_status_short() {
        assert_eq!(strip_modem_status(&mut [0x01, 0x60], 64), 0);
        assert_eq!(strip_modem_status(&mut [], 64), 0);
    }

    #[test]
    fn allocation_failure_is_reported() {
        let config = SessionConfig::default().read_chunksize(usize::MAX);
        let err = DeviceContext::create_with_config(MockBus::new(), config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Allocation);
    }

    #[test]
    fn open_resets_and_programs_9600() {
        let (bus, id, ctx) = opened();
        let log = bus.control_log(id);
        assert_eq!(log[0].request, SIO_RESET_REQUEST);
        assert_eq!(log[1].request, SIO_SET_BAUDRATE_REQUEST);
        assert_eq!(log[1].value, 0x4138);
        assert_eq!(ctx.baudrate(), 9600);
        assert_eq!(ctx.chip_type(), Some(ChipType::Ft232R));
        assert_eq!(ctx.bit_mode(), Some(BitMode::Reset));
    }

    #[test]
    fn reset_failure_is_code_6_and_releases() {
        let bus = MockBus::new();
        let id = bus.attach(MockDevice::ft232r("A"));
        bus.fail_request(id, Some(SIO_RESET_REQUEST));
        let mut ctx = DeviceContext::create(bus.clone()).unwrap();
        let err = ctx.open(FTDI_VID, pid::FT232).unwrap_err();
        assert!(matches!(err, Error::Open { code: -6, .. }));
        assert_eq!(ctx.state(), SessionState::Closed);
        assert!(!bus.is_claimed(id));
    }

    #[test]
    fn baud_failure_is_code_7() {
        let bus = MockBus::new();
        let id = bus.attach(MockDevice::ft232r("A"));
        bus.fail_request(id, Some(SIO_SET_BAUDRATE_REQUEST));
        let mut ctx = DeviceContext::create(bus).unwrap();
        assert!(matches!(
            ctx.open(FTDI_VID, pid::FT232),
            Err(Error::Open { code: -7, .. })
        ));
    }

    #[test]
    fn not_found_is_code_3() {
        let mut ctx = DeviceContext::create(MockBus::new()).unwrap();
        let err = ctx.open(FTDI_VID, pid::FT232).unwrap_err();
        assert!(matches!(err, Error::Open { code: -3, .. }));
        assert_eq!(ctx.last_error_code(), ErrorKind::Open.code());
        assert!(ctx.error_string().contains("not found"));
    }

    #[test]
    fn missing_interface_is_code_4() {
        let bus = MockBus::new();
        bus.attach(MockDevice::ft232r("A"));
        let mut ctx = DeviceContext::create(bus).unwrap();
        ctx.set_interface(Interface::B).unwrap();
        assert!(matches!(
            ctx.open(FTDI_VID, pid::FT232),
            Err(Error::Open { code: -4, .. })
        ));
    }

    #[test]
    fn set_interface_only_while_closed() {
        let (_bus, _id, mut ctx) = opened();
        assert_eq!(
            ctx.set_interface(Interface::B).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn write_data_chunks() {
        let (bus, id, mut ctx) = opened();
        ctx.set_write_chunksize(3);
        assert_eq!(ctx.write_data(b"abcdefg").unwrap(), 7);
        assert_eq!(bus.written(id), b"abcdefg");
    }

    #[test]
    fn short_write_is_transport_error() {
        let (bus, id, mut ctx) = opened();
        bus.short_next_write(id);
        let err = ctx.write_data(b"abc").unwrap_err();
        assert!(matches!(err, Error::ShortTransfer { expected: 3, actual: 2 }));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn read_data_strips_status_and_buffers() {
        let (bus, id, mut ctx) = opened();
        let payload: Vec<u8> = (0..100).collect();
        bus.queue_rx(id, &payload);

        let mut buf = [0u8; 70];
        assert_eq!(ctx.read_data(&mut buf).unwrap(), 70);
        assert_eq!(&buf[..], &payload[..70]);
        assert_eq!(ctx.read_data(&mut buf).unwrap(), 30);
        assert_eq!(&buf[..30], &payload[70..]);
        assert_eq!(ctx.read_data(&mut buf).unwrap(), 0);
    }

    #[test]
    fn latency_timer_round_trip() {
        let (_bus, _id, mut ctx) = opened();
        ctx.set_latency_timer(2).unwrap();
        assert_eq!(ctx.latency_timer().unwrap(), 2);
        assert_eq!(
            ctx.set_latency_timer(0).unwrap_err().kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn line_property_encoding() {
        let (bus, id, mut ctx) = opened();
        ctx.set_line_property(DataBits::Seven, StopBits::Two, Parity::Even, BreakType::On)
            .unwrap();
        let last = *bus.control_log(id).last().unwrap();
        assert_eq!(last.request, SIO_SET_DATA_REQUEST);
        assert_eq!(last.value, 7 | (2 << 8) | (2 << 11) | (1 << 14));
        assert_eq!(last.index, 1);
    }

    #[test]
    fn purge_requests() {
        let (bus, id, mut ctx) = opened();
        ctx.purge_buffers().unwrap();
        let values: Vec<u16> = bus
            .control_log(id)
            .iter()
            .skip(2)
            .map(|r| r.value)
            .collect();
        assert_eq!(values, [SIO_RESET_PURGE_RX, SIO_RESET_PURGE_TX]);
    }

    #[test]
    fn drop_while_open_releases() {
        let (bus, id, ctx) = opened();
        assert!(bus.is_claimed(id));
        drop(ctx);
        assert!(!bus.is_claimed(id));
    }

    #[test]
    fn flow_control_encoding() {
        let (bus, id, mut ctx) = opened();
        ctx.set_flow_control(FlowControl::RtsCts).unwrap();
        ctx.set_flow_control(FlowControl::XonXoff { xon: 0x11, xoff: 0x13 })
            .unwrap();
        ctx.set_flow_control(FlowControl::Disabled).unwrap();

        let log: Vec<_> = bus.control_log(id).into_iter().skip(2).collect();
        assert!(log.iter().all(|r| r.request == SIO_SET_FLOW_CTRL_REQUEST));
        assert_eq!((log[0].value, log[0].index), (0, 0x0101));
        assert_eq!((log[1].value, log[1].index), (0x1311, 0x0401));
        assert_eq!((log[2].value, log[2].index), (0, 0x0001));
    }

    #[test]
    fn modem_lines_follow_requests() {
        let (bus, id, mut ctx) = opened();
        ctx.set_dtr(true).unwrap();
        assert_eq!(bus.modem_lines(id), 0x01);
        ctx.set_rts(true).unwrap();
        assert_eq!(bus.modem_lines(id), 0x03);
        ctx.set_dtr(false).unwrap();
        assert_eq!(bus.modem_lines(id), 0x02);
        ctx.set_dtr_rts(true, false).unwrap();
        assert_eq!(bus.modem_lines(id), 0x01);

        let last = *bus.control_log(id).last().unwrap();
        assert_eq!(last.request, SIO_SET_MODEM_CTRL_REQUEST);
        assert_eq!(last.value, 0x0301);
    }

    #[test]
    fn special_chars_encoding() {
        let (bus, id, mut ctx) = opened();
        ctx.set_event_char(b'\n', true).unwrap();
        ctx.set_error_char(0x00, false).unwrap();

        let log: Vec<_> = bus.control_log(id).into_iter().skip(2).collect();
        assert_eq!(log[0].request, SIO_SET_EVENT_CHAR_REQUEST);
        assert_eq!(log[0].value, 0x010A);
        assert_eq!(log[1].request, SIO_SET_ERROR_CHAR_REQUEST);
        assert_eq!(log[1].value, 0x0000);
    }

    #[test]
    fn modem_status_is_decoded() {
        let (bus, id, mut ctx) = opened();
        let status = ctx.poll_modem_status().unwrap();
        assert_eq!(status.raw(), 0x6001);
        assert!(status.transmitter_empty());
        assert!(status.transmitter_holding_empty());
        assert!(!status.cts());

        bus.set_modem_status(id, 0x0130);
        let status = ctx.poll_modem_status().unwrap();
        assert!(status.cts());
        assert!(status.dsr());
        assert!(!status.ri());
        assert!(status.data_ready());
        assert!(!status.overrun_error());
    }

    #[test]
    fn modem_operations_need_open_session() {
        let mut ctx = DeviceContext::create(MockBus::new()).unwrap();
        assert_eq!(ctx.set_dtr(true).unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(
            ctx.set_flow_control(FlowControl::DtrDsr).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            ctx.poll_modem_status().unwrap_err().kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(ctx.last_error_code(), ErrorKind::InvalidState.code());
    }

    #[test]
    fn second_interface_claims_independently() {
        let bus = MockBus::new();
        bus.attach(
            MockDevice::new(FTDI_VID, pid::FT2232, 0x0700)
                .with_strings(Some("FTDI"), Some("Dual RS232-HS"), Some("D1")),
        );

        let mut a = DeviceContext::create(bus.clone()).unwrap();
        a.set_interface(Interface::A).unwrap();
        a.open(FTDI_VID, pid::FT2232).unwrap();

        let mut b = DeviceContext::create(bus.clone()).unwrap();
        b.set_interface(Interface::B).unwrap();
        b.open(FTDI_VID, pid::FT2232).unwrap();

        let mut again = DeviceContext::create(bus).unwrap();
        again.set_interface(Interface::A).unwrap();
        assert!(matches!(
            again.open(FTDI_VID, pid::FT2232),
            Err(Error::Open { code: -5, .. })
        ));

        b.close().unwrap();
        a.close().unwrap();
    }

    #[test]
    fn timeout_surfaces_as_transport() {
        let (bus, id, mut ctx) = opened();
        bus.fail_next_transfers(id, 1);
        let err = ctx.set_baudrate(115_200).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        // The session stays usable.
        ctx.set_baudrate(115_200).unwrap();
    }
}

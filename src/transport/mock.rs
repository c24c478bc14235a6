//! Simulated FTDI devices for tests and demos.
//!
//! [`MockBus`] holds any number of [`MockDevice`]s and answers the FTDI
//! vendor requests the way a chip would: EEPROM reads and writes land in
//! an in-memory image, bit modes and pin levels are tracked, and bulk
//! writes are captured for inspection. Faults can be injected per device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::trace;

use super::{HandleInfo, UsbBus, UsbError, UsbHandle, UsbIds, UsbStrings};
use crate::constants::*;
use crate::eeprom::EepromConfig;
use crate::types::ChipType;

/// Modem status bytes prefixed to every bulk IN packet until changed.
const MODEM_STATUS: [u8; 2] = [0x01, 0x60];

/// A control request seen by a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRecord {
    /// bRequest.
    pub request: u8,
    /// wValue.
    pub value: u16,
    /// wIndex.
    pub index: u16,
}

/// Handle to a device attached to a [`MockBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockDeviceId(usize);

/// Blueprint of a simulated device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    ids: UsbIds,
    strings: UsbStrings,
    storage: Vec<u8>,
    chip_id_words: [u16; 2],
    max_packet_size: usize,
}

impl MockDevice {
    /// A device with the given ids, no strings and an erased EEPROM.
    pub fn new(vendor_id: u16, product_id: u16, bcd_device: u16) -> Self {
        // Only the R-type decodes regardless of the serial string.
        let chip = ChipType::from_bcd_device(bcd_device, true);
        Self {
            ids: UsbIds {
                vendor_id,
                product_id,
                bcd_device,
            },
            strings: UsbStrings::default(),
            storage: vec![0xFF; chip.eeprom_size()],
            chip_id_words: [0x0000, 0x0000],
            max_packet_size: if chip.is_h_type() { 512 } else { 64 },
        }
    }

    /// An FT232R with stock strings, a matching EEPROM and a chip ID.
    pub fn ft232r(serial: &str) -> Self {
        let dev = Self::new(FTDI_VID, pid::FT232, 0x0600)
            .with_strings(Some("FTDI"), Some("FT232R USB UART"), Some(serial))
            .with_chip_id_words([0x3F1A, 0x7C42]);
        match EepromConfig::init_defaults(ChipType::Ft232R, Some("FTDI"), None, Some(serial))
            .build(ChipType::Ft232R)
        {
            Ok(raw) => dev.with_eeprom(raw.as_bytes()),
            Err(_) => dev,
        }
    }

    /// Set the string descriptors.
    pub fn with_strings(
        mut self,
        manufacturer: Option<&str>,
        product: Option<&str>,
        serial: Option<&str>,
    ) -> Self {
        self.strings = UsbStrings {
            manufacturer: manufacturer.map(str::to_owned),
            product: product.map(str::to_owned),
            serial: serial.map(str::to_owned),
        };
        self
    }

    /// Load an EEPROM image. Smaller parts than the chip's address space
    /// mirror, the way a 93x46 wraps its address lines.
    pub fn with_eeprom(mut self, image: &[u8]) -> Self {
        if !image.is_empty() {
            let len = self.storage.len();
            self.storage = image.iter().copied().cycle().take(len).collect();
        }
        self
    }

    /// Set the two raw words read back from the chip ID addresses.
    pub fn with_chip_id_words(mut self, words: [u16; 2]) -> Self {
        self.chip_id_words = words;
        self
    }
}

#[derive(Debug)]
struct SimChip {
    blueprint: MockDevice,
    claimed: [bool; 4],
    disconnected: bool,
    control_log: Vec<ControlRecord>,
    written: Vec<u8>,
    rx: VecDeque<u8>,
    pins: u8,
    modem_lines: u8,
    modem_status: [u8; 2],
    bitmask: u8,
    bitmode: u8,
    latency: u8,
    failing_transfers: usize,
    failing_request: Option<u8>,
    short_next_write: bool,
}

impl SimChip {
    fn new(blueprint: MockDevice) -> Self {
        Self {
            blueprint,
            claimed: [false; 4],
            disconnected: false,
            control_log: Vec::new(),
            written: Vec::new(),
            rx: VecDeque::new(),
            pins: 0,
            modem_lines: 0,
            modem_status: MODEM_STATUS,
            bitmask: 0,
            bitmode: 0,
            latency: 16,
            failing_transfers: 0,
            failing_request: None,
            short_next_write: false,
        }
    }

    fn chip_type(&self) -> ChipType {
        ChipType::from_bcd_device(
            self.blueprint.ids.bcd_device,
            self.blueprint.strings.serial.is_some(),
        )
    }

    fn interface_count(&self) -> u8 {
        match self.chip_type() {
            ChipType::Ft2232C | ChipType::Ft2232H => 2,
            ChipType::Ft4232H => 4,
            _ => 1,
        }
    }

    fn check_transfer(&mut self, timeout: Duration) -> Result<(), UsbError> {
        if self.disconnected {
            return Err(UsbError::Disconnected);
        }
        if self.failing_transfers > 0 {
            self.failing_transfers -= 1;
            return Err(UsbError::Timeout(timeout));
        }
        Ok(())
    }

    fn eeprom_offset(&self, addr: u16) -> usize {
        (usize::from(addr) * 2) % self.blueprint.storage.len()
    }

    fn control_out(&mut self, record: ControlRecord, timeout: Duration) -> Result<(), UsbError> {
        self.check_transfer(timeout)?;
        if self.failing_request == Some(record.request) {
            return Err(UsbError::Timeout(timeout));
        }
        self.control_log.push(record);

        let ControlRecord {
            request,
            value,
            index,
        } = record;
        match request {
            SIO_RESET_REQUEST => match value {
                SIO_RESET_SIO => {
                    self.rx.clear();
                    self.bitmode = 0;
                }
                SIO_RESET_PURGE_RX => self.rx.clear(),
                _ => {}
            },
            SIO_SET_LATENCY_TIMER_REQUEST => self.latency = value as u8,
            SIO_SET_MODEM_CTRL_REQUEST => {
                let mask = (value >> 8) as u8;
                self.modem_lines = (self.modem_lines & !mask) | (value as u8 & mask);
            }
            SIO_SET_BITMODE_REQUEST => {
                self.bitmask = value as u8;
                self.bitmode = (value >> 8) as u8;
            }
            SIO_WRITE_EEPROM_REQUEST => {
                let off = self.eeprom_offset(index);
                self.blueprint.storage[off..off + 2].copy_from_slice(&value.to_le_bytes());
            }
            SIO_ERASE_EEPROM_REQUEST => self.blueprint.storage.fill(0xFF),
            _ => {}
        }
        Ok(())
    }

    fn control_in(
        &mut self,
        record: ControlRecord,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, UsbError> {
        self.check_transfer(timeout)?;
        if self.failing_request == Some(record.request) {
            return Err(UsbError::Timeout(timeout));
        }
        self.control_log.push(record);

        let mut data = match record.request {
            SIO_READ_EEPROM_REQUEST => {
                let chip_id_slot = match record.index {
                    CHIP_ID_ADDR_HI => Some(0),
                    CHIP_ID_ADDR_LO => Some(1),
                    _ => None,
                };
                match chip_id_slot {
                    Some(slot) if self.chip_type().has_chip_id() => {
                        self.blueprint.chip_id_words[slot].to_le_bytes().to_vec()
                    }
                    _ => {
                        let off = self.eeprom_offset(record.index);
                        self.blueprint.storage[off..off + 2].to_vec()
                    }
                }
            }
            SIO_GET_LATENCY_TIMER_REQUEST => vec![self.latency],
            SIO_READ_PINS_REQUEST => vec![self.pins],
            SIO_POLL_MODEM_STATUS_REQUEST => self.modem_status.to_vec(),
            other => return Err(UsbError::Bus(format!("request {other:#04x} stalled"))),
        };
        data.truncate(usize::from(length));
        Ok(data)
    }

    fn bulk_out(&mut self, data: &[u8], timeout: Duration) -> Result<usize, UsbError> {
        self.check_transfer(timeout)?;
        let accepted = if std::mem::take(&mut self.short_next_write) {
            data.len().saturating_sub(1)
        } else {
            data.len()
        };
        let data = &data[..accepted];
        self.written.extend_from_slice(data);

        if self.bitmode != 0 {
            if let Some(&level) = data.last() {
                self.pins = (self.pins & !self.bitmask) | (level & self.bitmask);
            }
        }
        Ok(accepted)
    }

    fn bulk_in(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, UsbError> {
        self.check_transfer(timeout)?;
        let packet = self.blueprint.max_packet_size;
        let mut out = Vec::new();
        loop {
            if out.len() + self.modem_status.len() > max_len {
                break;
            }
            out.extend_from_slice(&self.modem_status);
            let room = (packet - self.modem_status.len()).min(max_len - out.len());
            let n = room.min(self.rx.len());
            out.extend(self.rx.drain(..n));
            if self.rx.is_empty() {
                break;
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct BusState {
    chips: Vec<SimChip>,
    fail_enumeration: bool,
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory USB bus of simulated FTDI devices.
///
/// Cloning yields another handle to the same bus, so a test can keep one
/// clone for inspection while a [`DeviceContext`](crate::DeviceContext)
/// owns the other.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a device. Devices enumerate in attach order.
    pub fn attach(&self, device: MockDevice) -> MockDeviceId {
        let mut state = lock(&self.state);
        state.chips.push(SimChip::new(device));
        MockDeviceId(state.chips.len() - 1)
    }

    fn with_chip<T>(&self, id: MockDeviceId, f: impl FnOnce(&mut SimChip) -> T) -> T {
        f(&mut lock(&self.state).chips[id.0])
    }

    /// Make the next enumerations fail (or succeed again).
    pub fn fail_enumeration(&self, fail: bool) {
        lock(&self.state).fail_enumeration = fail;
    }

    /// Time out the next `n` transfers on the device.
    pub fn fail_next_transfers(&self, id: MockDeviceId, n: usize) {
        self.with_chip(id, |c| c.failing_transfers = n);
    }

    /// Time out every control request with code `request`.
    pub fn fail_request(&self, id: MockDeviceId, request: Option<u8>) {
        self.with_chip(id, |c| c.failing_request = request);
    }

    /// Accept one byte less than offered on the next bulk write.
    pub fn short_next_write(&self, id: MockDeviceId) {
        self.with_chip(id, |c| c.short_next_write = true);
    }

    /// Unplug the device; claimed handles start failing.
    pub fn disconnect(&self, id: MockDeviceId) {
        self.with_chip(id, |c| c.disconnected = true);
    }

    /// Control requests received so far.
    pub fn control_log(&self, id: MockDeviceId) -> Vec<ControlRecord> {
        self.with_chip(id, |c| c.control_log.clone())
    }

    /// Bytes received through bulk writes so far.
    pub fn written(&self, id: MockDeviceId) -> Vec<u8> {
        self.with_chip(id, |c| c.written.clone())
    }

    /// Whether a handle currently claims any interface of the device.
    pub fn is_claimed(&self, id: MockDeviceId) -> bool {
        self.with_chip(id, |c| c.claimed.contains(&true))
    }

    /// DTR (bit 0) and RTS (bit 1) as last driven by the host.
    pub fn modem_lines(&self, id: MockDeviceId) -> u8 {
        self.with_chip(id, |c| c.modem_lines)
    }

    /// Set the modem status reported by polling and in bulk IN headers.
    pub fn set_modem_status(&self, id: MockDeviceId, status: u16) {
        self.with_chip(id, |c| c.modem_status = status.to_le_bytes());
    }

    /// The EEPROM storage as the chip addresses it.
    pub fn eeprom(&self, id: MockDeviceId) -> Vec<u8> {
        self.with_chip(id, |c| c.blueprint.storage.clone())
    }

    /// Current pin levels.
    pub fn pins(&self, id: MockDeviceId) -> u8 {
        self.with_chip(id, |c| c.pins)
    }

    /// Drive the pin levels seen by `read_pins`.
    pub fn set_pins(&self, id: MockDeviceId, pins: u8) {
        self.with_chip(id, |c| c.pins = pins);
    }

    /// Active bit mode as `(mask, mode)` wire values.
    pub fn bitmode(&self, id: MockDeviceId) -> (u8, u8) {
        self.with_chip(id, |c| (c.bitmask, c.bitmode))
    }

    /// Queue bytes for the device to send to the host.
    pub fn queue_rx(&self, id: MockDeviceId, data: &[u8]) {
        self.with_chip(id, |c| c.rx.extend(data));
    }
}

impl UsbBus for MockBus {
    type Device = MockDeviceId;
    type Handle = MockHandle;

    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<MockDeviceId>, UsbError> {
        let state = lock(&self.state);
        if state.fail_enumeration {
            return Err(UsbError::Bus("simulated bus failure".into()));
        }
        Ok(state
            .chips
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                !c.disconnected
                    && c.blueprint.ids.vendor_id == vendor_id
                    && c.blueprint.ids.product_id == product_id
            })
            .map(|(i, _)| MockDeviceId(i))
            .collect())
    }

    fn ids(&self, device: &MockDeviceId) -> UsbIds {
        self.with_chip(*device, |c| c.blueprint.ids)
    }

    fn read_strings(&self, device: &MockDeviceId, _timeout: Duration) -> Result<UsbStrings, UsbError> {
        self.with_chip(*device, |c| {
            if c.disconnected {
                return Err(UsbError::Disconnected);
            }
            Ok(c.blueprint.strings.clone())
        })
    }

    fn claim(&self, device: &MockDeviceId, interface: u8) -> Result<MockHandle, UsbError> {
        let info = self.with_chip(*device, |c| {
            if c.disconnected {
                return Err(UsbError::Disconnected);
            }
            if interface >= c.interface_count() {
                return Err(UsbError::Bus(format!("no interface {interface}")));
            }
            let slot = &mut c.claimed[usize::from(interface)];
            if *slot {
                return Err(UsbError::Claim("interface busy".into()));
            }
            *slot = true;
            Ok(HandleInfo {
                bcd_device: c.blueprint.ids.bcd_device,
                has_serial: c.blueprint.strings.serial.is_some(),
                max_packet_size: c.blueprint.max_packet_size,
            })
        })?;
        trace!("mock: claimed {device:?} interface {interface}");

        Ok(MockHandle {
            state: Arc::clone(&self.state),
            id: *device,
            interface,
            info,
        })
    }
}

/// A claimed simulated device. Dropping it releases the claim.
#[derive(Debug)]
pub struct MockHandle {
    state: Arc<Mutex<BusState>>,
    id: MockDeviceId,
    interface: u8,
    info: HandleInfo,
}

impl MockHandle {
    fn chip<T>(&self, f: impl FnOnce(&mut SimChip) -> T) -> T {
        f(&mut lock(&self.state).chips[self.id.0])
    }
}

impl UsbHandle for MockHandle {
    fn info(&self) -> HandleInfo {
        self.info
    }

    fn control_out(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        timeout: Duration,
    ) -> Result<(), UsbError> {
        let record = ControlRecord {
            request,
            value,
            index,
        };
        self.chip(|c| c.control_out(record, timeout))
    }

    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, UsbError> {
        let record = ControlRecord {
            request,
            value,
            index,
        };
        self.chip(|c| c.control_in(record, length, timeout))
    }

    fn bulk_out(&mut self, _endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, UsbError> {
        self.chip(|c| c.bulk_out(data, timeout))
    }

    fn bulk_in(
        &mut self,
        _endpoint: u8,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, UsbError> {
        self.chip(|c| c.bulk_in(max_len, timeout))
    }

    fn release(self) -> Result<(), UsbError> {
        drop(self);
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        let slot = usize::from(self.interface);
        self.chip(|c| c.claimed[slot] = false);
    }
}

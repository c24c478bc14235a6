//! Transport over real hardware using `nusb`.

use std::time::Duration;

use log::{debug, trace};
use nusb::transfer::{Buffer, Bulk, ControlIn, ControlOut, ControlType, In, Out, Recipient};
use nusb::{DeviceInfo, MaybeFuture};

use super::{HandleInfo, UsbBus, UsbError, UsbHandle, UsbIds, UsbStrings};

/// US English, the language FTDI chips report their strings in.
const LANGUAGE_EN_US: u16 = 0x0409;

/// The system USB bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NusbBus;

impl NusbBus {
    /// Create a handle to the system bus.
    pub fn new() -> Self {
        Self
    }
}

impl UsbBus for NusbBus {
    type Device = DeviceInfo;
    type Handle = NusbHandle;

    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>, UsbError> {
        let devices: Vec<DeviceInfo> = nusb::list_devices()
            .wait()
            .map_err(|e| UsbError::Bus(e.to_string()))?
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .collect();
        trace!(
            "{} device(s) match {:04x}:{:04x}",
            devices.len(),
            vendor_id,
            product_id
        );
        Ok(devices)
    }

    fn ids(&self, device: &DeviceInfo) -> UsbIds {
        UsbIds {
            vendor_id: device.vendor_id(),
            product_id: device.product_id(),
            bcd_device: device.device_version(),
        }
    }

    fn read_strings(&self, device: &DeviceInfo, timeout: Duration) -> Result<UsbStrings, UsbError> {
        // Strings need an open handle, but no claimed interface.
        let dev = device.open().wait()?;
        let desc = dev.device_descriptor();

        let fetch = |index| -> Result<String, UsbError> {
            Ok(dev
                .get_string_descriptor(index, LANGUAGE_EN_US, timeout)
                .wait()?)
        };

        Ok(UsbStrings {
            manufacturer: desc.manufacturer_string_index().map(fetch).transpose()?,
            product: desc.product_string_index().map(fetch).transpose()?,
            serial: desc.serial_number_string_index().map(fetch).transpose()?,
        })
    }

    fn claim(&self, device: &DeviceInfo, interface: u8) -> Result<NusbHandle, UsbError> {
        let dev = device.open().wait()?;

        // Detach ftdi_sio or similar before claiming.
        let iface = dev
            .detach_and_claim_interface(interface)
            .wait()
            .map_err(|e| UsbError::Claim(e.to_string()))?;

        let desc = dev.device_descriptor();
        let info = HandleInfo {
            bcd_device: desc.device_version(),
            has_serial: desc.serial_number_string_index().is_some(),
            max_packet_size: max_packet_size(&dev, interface),
        };
        debug!(
            "claimed interface {} of {:04x}:{:04x}",
            interface,
            device.vendor_id(),
            device.product_id()
        );

        Ok(NusbHandle {
            _device: dev,
            interface: iface,
            info,
        })
    }
}

/// A claimed FTDI interface.
pub struct NusbHandle {
    // Keeps the device open for as long as the interface is claimed.
    _device: nusb::Device,
    interface: nusb::Interface,
    info: HandleInfo,
}

impl std::fmt::Debug for NusbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NusbHandle")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl UsbHandle for NusbHandle {
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
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    data: &[],
                },
                timeout,
            )
            .wait()?;
        Ok(())
    }

    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, UsbError> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index,
                    length,
                },
                timeout,
            )
            .wait()?;
        Ok(data)
    }

    fn bulk_out(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize, UsbError> {
        let mut ep = self.interface.endpoint::<Bulk, Out>(endpoint)?;
        let mut buf = Buffer::new(data.len());
        buf.extend_from_slice(data);

        let completion = ep.transfer_blocking(buf, timeout);
        completion.status?;
        Ok(completion.actual_len)
    }

    fn bulk_in(
        &mut self,
        endpoint: u8,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, UsbError> {
        let mut ep = self.interface.endpoint::<Bulk, In>(endpoint)?;
        let completion = ep.transfer_blocking(Buffer::new(max_len), timeout);
        completion.status?;
        let mut data = completion.buffer.into_vec();
        data.truncate(completion.actual_len);
        Ok(data)
    }

    fn release(self) -> Result<(), UsbError> {
        // nusb releases the interface and closes the device on drop.
        drop(self.interface);
        Ok(())
    }
}

/// wMaxPacketSize of the first endpoint of `interface_num`, falling back
/// to the full-speed size when the descriptor is unavailable.
fn max_packet_size(device: &nusb::Device, interface_num: u8) -> usize {
    const FULL_SPEED: usize = 64;

    let Ok(config) = device.active_configuration() else {
        return FULL_SPEED;
    };

    for group in config.interfaces() {
        if group.interface_number() != interface_num {
            continue;
        }
        for alt in group.alt_settings() {
            if let Some(ep) = alt.endpoints().next() {
                return ep.max_packet_size();
            }
        }
    }

    FULL_SPEED
}

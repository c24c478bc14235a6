//! USB transport boundary.
//!
//! The session logic talks to hardware only through [`UsbBus`] (discovery
//! and claiming) and [`UsbHandle`] (transfers on a claimed device). Two
//! implementations ship with the crate:
//!
//! - [`NusbBus`]: real hardware through `nusb`.
//! - [`MockBus`]: an in-memory FTDI chip simulation for tests and demos.

pub mod mock;
pub mod nusb;

use std::time::Duration;

pub use self::mock::{MockBus, MockDevice};
pub use self::nusb::NusbBus;

/// Errors reported by a transport.
#[derive(Debug, thiserror::Error)]
pub enum UsbError {
    /// An error from the nusb USB layer.
    #[error("USB error: {0}")]
    Usb(#[from] ::nusb::Error),

    /// A USB transfer error.
    #[error("USB transfer error: {0}")]
    Transfer(#[from] ::nusb::transfer::TransferError),

    /// A descriptor read failed.
    #[error("descriptor error: {0}")]
    Descriptor(#[from] ::nusb::GetDescriptorError),

    /// The interface could not be claimed.
    #[error("unable to claim interface: {0}")]
    Claim(String),

    /// The transfer did not complete in time.
    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),

    /// The device is gone.
    #[error("device disconnected")]
    Disconnected,

    /// The bus could not be queried.
    #[error("bus error: {0}")]
    Bus(String),
}

/// Identification fields of an enumerated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbIds {
    /// idVendor.
    pub vendor_id: u16,
    /// idProduct.
    pub product_id: u16,
    /// bcdDevice.
    pub bcd_device: u16,
}

/// String descriptors of a device, as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbStrings {
    /// iManufacturer.
    pub manufacturer: Option<String>,
    /// iProduct.
    pub product: Option<String>,
    /// iSerialNumber.
    pub serial: Option<String>,
}

/// Facts about a claimed device needed to drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleInfo {
    /// bcdDevice, used for chip detection.
    pub bcd_device: u16,
    /// Whether the device descriptor names a serial number string.
    pub has_serial: bool,
    /// wMaxPacketSize of the claimed interface's bulk endpoints.
    pub max_packet_size: usize,
}

/// Device discovery and claiming.
pub trait UsbBus {
    /// Opaque reference to an enumerated, unclaimed device.
    type Device: Clone + std::fmt::Debug;
    /// A claimed device.
    type Handle: UsbHandle;

    /// All attached devices with the given ids, in bus enumeration order.
    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<Self::Device>, UsbError>;

    /// Identification of an enumerated device.
    fn ids(&self, device: &Self::Device) -> UsbIds;

    /// Fetch the string descriptors of a device without claiming it.
    fn read_strings(&self, device: &Self::Device, timeout: Duration)
        -> Result<UsbStrings, UsbError>;

    /// Open the device and claim `interface` exclusively.
    fn claim(&self, device: &Self::Device, interface: u8) -> Result<Self::Handle, UsbError>;
}

/// Transfers on a claimed device.
///
/// All calls block until the transfer completes or `timeout` expires.
pub trait UsbHandle {
    /// Descriptor facts of the claimed device.
    fn info(&self) -> HandleInfo;

    /// Vendor OUT control request without data stage.
    fn control_out(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        timeout: Duration,
    ) -> Result<(), UsbError>;

    /// Vendor IN control request. May return fewer than `length` bytes.
    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, UsbError>;

    /// Bulk OUT transfer. Returns the number of bytes accepted.
    fn bulk_out(&mut self, endpoint: u8, data: &[u8], timeout: Duration)
        -> Result<usize, UsbError>;

    /// Bulk IN transfer of at most `max_len` bytes.
    fn bulk_in(&mut self, endpoint: u8, max_len: usize, timeout: Duration)
        -> Result<Vec<u8>, UsbError>;

    /// Give up the claim on the device.
    fn release(self) -> Result<(), UsbError>
    where
        Self: Sized;
}

//! Device discovery and enumeration.
//!
//! Use [`find_all`] to list connected FTDI devices with their strings, or
//! [`DeviceFilter`] to pick a single device by description, serial number
//! or position.

use log::{debug, trace};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::transport::UsbBus;

/// A string descriptor bounded to a maximum length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorString {
    value: String,
    truncated: bool,
}

impl DescriptorString {
    /// Keep at most `max_len` UTF-16 code units of `s`.
    ///
    /// Characters outside the basic plane count as two units and are never
    /// split.
    pub fn bounded(s: &str, max_len: usize) -> Self {
        let mut units = 0;
        let mut end = s.len();
        for (i, c) in s.char_indices() {
            if units + c.len_utf16() > max_len {
                end = i;
                break;
            }
            units += c.len_utf16();
        }
        Self {
            value: s[..end].to_owned(),
            truncated: end < s.len(),
        }
    }

    /// The (possibly truncated) text.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether the device reported a longer string than was kept.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl std::fmt::Display for DescriptorString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)?;
        if self.truncated {
            f.write_str("...")?;
        }
        Ok(())
    }
}

impl PartialEq<str> for DescriptorString {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

/// An enumerated device.
///
/// `D` is the transport's opaque device reference; pass the descriptor to
/// [`DeviceContext::open_device`](crate::DeviceContext::open_device) to
/// claim it.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor<D> {
    /// idVendor.
    pub vendor_id: u16,
    /// idProduct.
    pub product_id: u16,
    /// Manufacturer string, if the device has one.
    pub manufacturer: Option<DescriptorString>,
    /// Product description string, if the device has one.
    pub description: Option<DescriptorString>,
    /// Serial number string, if the device has one.
    pub serial: Option<DescriptorString>,
    device: D,
}

impl<D> DeviceDescriptor<D> {
    /// The transport's reference to the device.
    pub fn device(&self) -> &D {
        &self.device
    }
}

/// Filtering criteria for finding FTDI devices.
///
/// All fields beyond `vendor_id` and `product_id` are optional. When set,
/// they further restrict which devices match.
///
/// # Example
///
/// ```
/// use ftdi_session::DeviceFilter;
///
/// let filter = DeviceFilter::new(0x0403, 0x6001)
///     .serial("FT123456")
///     .index(0);
/// assert_eq!(filter.serial.as_deref(), Some("FT123456"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    /// USB vendor ID to match.
    pub vendor_id: u16,
    /// USB product ID to match.
    pub product_id: u16,
    /// If set, match against the USB product description string.
    pub description: Option<String>,
    /// If set, match against the USB serial number string.
    pub serial: Option<String>,
    /// Select the Nth matching device (0-based). Defaults to 0.
    pub index: usize,
}

impl DeviceFilter {
    /// Create a new filter matching the given vendor and product IDs.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            description: None,
            serial: None,
            index: 0,
        }
    }

    /// Require the product description to match.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Require the serial number to match.
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Select the Nth matching device (0-based).
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    fn needs_strings(&self) -> bool {
        self.description.is_some() || self.serial.is_some()
    }
}

/// List all devices with the given ids, in bus enumeration order.
///
/// String descriptors are read for every device and bounded to
/// `config.string_max_len`. No device is claimed. Zero matches is not an
/// error.
pub fn find_all<B: UsbBus>(
    bus: &B,
    vendor_id: u16,
    product_id: u16,
    config: &SessionConfig,
) -> Result<Vec<DeviceDescriptor<B::Device>>> {
    let devices = bus
        .enumerate(vendor_id, product_id)
        .map_err(Error::Enumeration)?;

    let max_len = config.string_max_len;
    let bound = |s: Option<String>| s.map(|s| DescriptorString::bounded(&s, max_len));

    let mut found = Vec::with_capacity(devices.len());
    for device in devices {
        let ids = bus.ids(&device);
        let strings = bus
            .read_strings(&device, config.read_timeout)
            .map_err(Error::Enumeration)?;
        trace!(
            "{:04x}:{:04x} manufacturer={:?} product={:?} serial={:?}",
            ids.vendor_id,
            ids.product_id,
            strings.manufacturer,
            strings.product,
            strings.serial
        );
        found.push(DeviceDescriptor {
            vendor_id: ids.vendor_id,
            product_id: ids.product_id,
            manufacturer: bound(strings.manufacturer),
            description: bound(strings.product),
            serial: bound(strings.serial),
            device,
        });
    }

    debug!(
        "found {} device(s) matching {:04x}:{:04x}",
        found.len(),
        vendor_id,
        product_id
    );
    Ok(found)
}

/// Find a single device matching `filter`.
///
/// Strings are only read when the filter needs them. Fails with an open
/// error (code -3) when nothing matches.
pub fn find_device<B: UsbBus>(
    bus: &B,
    filter: &DeviceFilter,
    config: &SessionConfig,
) -> Result<B::Device> {
    let candidates = bus
        .enumerate(filter.vendor_id, filter.product_id)
        .map_err(Error::Enumeration)?;

    let mut match_count = 0usize;
    for device in candidates {
        if filter.needs_strings() {
            let strings = bus
                .read_strings(&device, config.read_timeout)
                .map_err(Error::Enumeration)?;
            if let Some(expected) = &filter.description {
                if strings.product.as_deref() != Some(expected.as_str()) {
                    continue;
                }
            }
            if let Some(expected) = &filter.serial {
                if strings.serial.as_deref() != Some(expected.as_str()) {
                    continue;
                }
            }
        }

        if match_count == filter.index {
            return Ok(device);
        }
        match_count += 1;
    }

    Err(Error::Open {
        code: -3,
        message: "device not found".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockBus, MockDevice};

    #[test]
    fn bounded_keeps_short_strings() {
        let s = DescriptorString::bounded("FT232R USB UART", 128);
        assert_eq!(s.as_str(), "FT232R USB UART");
        assert!(!s.is_truncated());
    }

    #[test]
    fn bounded_truncates_and_flags() {
        let long = "a".repeat(200);
        let s = DescriptorString::bounded(&long, 128);
        assert_eq!(s.as_str().len(), 128);
        assert!(s.is_truncated());
    }

    #[test]
    fn bounded_counts_utf16_units() {
        // U+1F600 takes two UTF-16 units and must not be split.
        let s = DescriptorString::bounded("ab\u{1F600}", 3);
        assert_eq!(s.as_str(), "ab");
        assert!(s.is_truncated());
        let s = DescriptorString::bounded("ab\u{1F600}", 4);
        assert!(!s.is_truncated());
    }

    #[test]
    fn find_all_preserves_bus_order() {
        let bus = MockBus::new();
        bus.attach(MockDevice::ft232r("A"));
        bus.attach(MockDevice::ft232r("B"));
        bus.attach(MockDevice::new(0x0403, 0x6010, 0x0700));

        let found = find_all(&bus, 0x0403, 0x6001, &SessionConfig::default()).unwrap();
        let serials: Vec<_> = found
            .iter()
            .map(|d| d.serial.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(serials, ["A", "B"]);
    }

    #[test]
    fn find_all_empty_is_ok() {
        let bus = MockBus::new();
        let found = find_all(&bus, 0x0403, 0x6001, &SessionConfig::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn find_all_never_claims() {
        let bus = MockBus::new();
        let dev = bus.attach(MockDevice::ft232r("A"));
        find_all(&bus, 0x0403, 0x6001, &SessionConfig::default()).unwrap();
        assert!(!bus.is_claimed(dev));
    }

    #[test]
    fn filter_by_serial_and_index() {
        let bus = MockBus::new();
        bus.attach(MockDevice::ft232r("A"));
        let b = bus.attach(MockDevice::ft232r("B"));
        let c = bus.attach(MockDevice::ft232r("C"));
        let config = SessionConfig::default();

        let found = find_device(&bus, &DeviceFilter::new(0x0403, 0x6001).serial("B"), &config);
        assert_eq!(found.unwrap(), b);

        let found = find_device(&bus, &DeviceFilter::new(0x0403, 0x6001).index(2), &config);
        assert_eq!(found.unwrap(), c);

        let missing = find_device(&bus, &DeviceFilter::new(0x0403, 0x6001).serial("Z"), &config);
        assert!(matches!(missing, Err(Error::Open { code: -3, .. })));
    }
}

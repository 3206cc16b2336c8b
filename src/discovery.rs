//! Device selection
//!
//! Enumerates all present HID device interfaces, builds a
//! [`DeviceDescriptor`] for each candidate, and returns the descriptors
//! matching a caller predicate. Failures while querying one candidate skip
//! that candidate only; an enumeration anomaly stops the scan and returns
//! whatever was collected so far.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::types::{usage_page, DeviceDescriptor, DeviceString, OpenDevice, ReportDescriptor};
use crate::HidAdapter;

/// Enumerate HID interfaces and return the descriptors accepted by
/// `predicate`.
///
/// Descriptors rejected by the predicate are released immediately; accepted
/// ones are owned by the caller from here on. Never fails: enumeration
/// problems are logged and reduce the result, possibly to an empty list.
pub fn select_devices<F>(adapter: &Arc<dyn HidAdapter>, mut predicate: F) -> Vec<DeviceDescriptor>
where
    F: FnMut(&DeviceDescriptor) -> bool,
{
    let paths = match adapter.enumerate() {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Failed to enumerate HID interfaces: {e}");
            return Vec::new();
        }
    };

    let mut devices = Vec::new();
    for item in paths {
        let path = match item {
            Ok(path) => path,
            Err(e) => {
                // Anything but plain exhaustion is anomalous; keep what we have.
                warn!("HID enumeration stopped early: {e}");
                break;
            }
        };

        let Some(descriptor) = build_descriptor(adapter, &path) else {
            continue;
        };

        if predicate(&descriptor) {
            devices.push(descriptor);
        }
        // Rejected descriptors drop here, releasing their preparsed data.
    }

    info!("Selected {} HID device(s)", devices.len());
    devices
}

/// Query one candidate device and assemble its descriptor.
///
/// Returns `None` on any hard failure (open, preparsed data, attributes,
/// capabilities); string descriptors are best-effort. The query handle is
/// closed before returning either way.
fn build_descriptor(adapter: &Arc<dyn HidAdapter>, path: &str) -> Option<DeviceDescriptor> {
    let device = match adapter.open(path) {
        Ok(token) => OpenDevice::new(adapter.clone(), token),
        Err(e) => {
            warn!("Failed to open device {path}: {e}");
            return None;
        }
    };

    let attributes = match adapter.attributes(device.token()) {
        Ok(attributes) => attributes,
        Err(e) => {
            warn!("Failed to get attributes of device {path}: {e}");
            return None;
        }
    };

    let descriptor = match adapter.preparsed_data(device.token()) {
        Ok(token) => ReportDescriptor::new(adapter.clone(), token),
        Err(e) => {
            warn!("Failed to get preparsed data for device {path}: {e}");
            return None;
        }
    };

    let caps = match adapter.capabilities(descriptor.token()) {
        Ok(caps) => caps,
        Err(e) => {
            warn!("Failed to get capabilities of device {path}: {e}");
            return None;
        }
    };

    let manufacturer = adapter.device_string(device.token(), DeviceString::Manufacturer);
    let product = adapter.device_string(device.token(), DeviceString::Product);
    let serial = adapter.device_string(device.token(), DeviceString::Serial);

    let buttons = adapter.max_usage_list_len(descriptor.token(), usage_page::BUTTON);

    debug!(
        "Found device: VID={:04X} PID={:04X} page={:02X} usage={:02X} path={path}",
        attributes.vendor_id, attributes.product_id, caps.usage_page, caps.usage
    );

    Some(DeviceDescriptor {
        path: path.to_string(),
        vendor_id: attributes.vendor_id,
        product_id: attributes.product_id,
        version: attributes.version,
        usage_page: caps.usage_page,
        usage: caps.usage,
        manufacturer,
        product,
        serial,
        buttons,
        input_report_len: caps.input_report_len,
        descriptor,
    })
    // `device` drops here, closing the query handle.
}

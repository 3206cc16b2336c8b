//! Common types for device identity and decoded input

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::HidAdapter;

/// HID usage pages used by 6-DoF controllers
pub mod usage_page {
    /// Generic Desktop page (axes, multi-axis controller)
    pub const GENERIC_DESKTOP: u16 = 0x01;
    /// Button page
    pub const BUTTON: u16 = 0x09;
}

/// Generic Desktop usages
pub mod usage {
    /// Multi-axis controller (3D mice report this top-level usage)
    pub const MULTI_AXIS_CONTROLLER: u16 = 0x08;
    /// X translation
    pub const X: u16 = 0x30;
    /// Y translation
    pub const Y: u16 = 0x31;
    /// Z translation
    pub const Z: u16 = 0x32;
    /// X rotation
    pub const RX: u16 = 0x33;
    /// Y rotation
    pub const RY: u16 = 0x34;
    /// Z rotation
    pub const RZ: u16 = 0x35;
}

/// HIDP status codes returned by scaled-usage-value queries.
///
/// Only these two count as "value present"; everything else is a decode
/// failure for the queried field.
pub mod status {
    /// The usage was found on the report and its value extracted
    pub const SUCCESS: i32 = 0x11 << 16;
    /// The usage exists on the device but not on this report id.
    ///
    /// Devices that multiplex axis subsets across report ids return this for
    /// the absent axes; the extracted value is still usable.
    pub const INCOMPATIBLE_REPORT_ID: i32 = 0xC011_000A_u32 as i32;
}

/// Opaque handle to an open device, issued by a [`HidAdapter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken(pub u64);

/// Opaque handle to adapter-owned preparsed report-descriptor data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorToken(pub u64);

/// Vendor/product identity of a device
#[derive(Debug, Clone, Copy)]
pub struct DeviceAttributes {
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
}

/// Capability fields read from preparsed descriptor data
#[derive(Debug, Clone, Copy)]
pub struct DeviceCaps {
    /// Top-level usage page of the device's application collection
    pub usage_page: u16,
    /// Top-level usage
    pub usage: u16,
    /// Input report length in bytes, including the report id byte
    pub input_report_len: usize,
}

/// Which descriptor string to fetch (all best-effort)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceString {
    Manufacturer,
    Product,
    Serial,
}

/// Raw result of a scaled-usage-value query.
///
/// `status` is the adapter-reported HIDP status; see [`status`].
#[derive(Debug, Clone, Copy)]
pub struct UsageValue {
    pub value: i32,
    pub status: i32,
}

/// Scoped owner of an open device handle.
///
/// Closes the handle via the adapter exactly once, either through an explicit
/// [`close`](OpenDevice::close) or on drop.
pub struct OpenDevice {
    adapter: Arc<dyn HidAdapter>,
    token: DeviceToken,
    closed: bool,
}

impl OpenDevice {
    pub(crate) fn new(adapter: Arc<dyn HidAdapter>, token: DeviceToken) -> Self {
        Self {
            adapter,
            token,
            closed: false,
        }
    }

    pub fn token(&self) -> DeviceToken {
        self.token
    }

    /// Close the device handle. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.adapter.close(self.token);
        }
    }
}

impl Drop for OpenDevice {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for OpenDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDevice")
            .field("token", &self.token)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Scoped owner of adapter-held preparsed descriptor data.
///
/// Move-only; released via the adapter exactly once, either through an
/// explicit [`release`](ReportDescriptor::release) or on drop.
pub struct ReportDescriptor {
    adapter: Arc<dyn HidAdapter>,
    token: DescriptorToken,
    released: bool,
}

impl ReportDescriptor {
    pub(crate) fn new(adapter: Arc<dyn HidAdapter>, token: DescriptorToken) -> Self {
        Self {
            adapter,
            token,
            released: false,
        }
    }

    pub fn token(&self) -> DescriptorToken {
        self.token
    }

    /// Release the preparsed data. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.adapter.release_preparsed_data(self.token);
        }
    }
}

impl Drop for ReportDescriptor {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ReportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDescriptor")
            .field("token", &self.token)
            .field("released", &self.released)
            .finish()
    }
}

/// Identity and capability snapshot of one physical device.
///
/// Built by the selector during enumeration; immutable afterwards. Owns the
/// preparsed descriptor data for its lifetime.
#[derive(Debug)]
pub struct DeviceDescriptor {
    /// OS device interface path
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    /// Top-level usage page
    pub usage_page: u16,
    /// Top-level usage
    pub usage: u16,
    /// Manufacturer string; empty when the device does not report one
    pub manufacturer: String,
    /// Product string; empty when the device does not report one
    pub product: String,
    /// Serial number string; empty when the device does not report one
    pub serial: String,
    /// Maximum number of button usages an input report can assert
    pub buttons: usize,
    /// Input report length in bytes
    pub input_report_len: usize,
    /// Preparsed descriptor data, exclusively owned by this record
    pub descriptor: ReportDescriptor,
}

impl DeviceDescriptor {
    /// True for Generic Desktop multi-axis controllers (3D mice)
    pub fn is_multi_axis_controller(&self) -> bool {
        self.usage_page == usage_page::GENERIC_DESKTOP
            && self.usage == usage::MULTI_AXIS_CONTROLLER
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UsagePage:{:X},Usage:{:X},{},{}",
            self.usage_page, self.usage, self.product, self.manufacturer
        )
    }
}

/// Which axis, if any, failed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisError {
    NoError,
    Tx,
    Ty,
    Tz,
    Rx,
    Ry,
    Rz,
}

/// Decode outcome carried on every event.
///
/// `code` is the raw adapter status of the failing query, `0` when no axis
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub axis: AxisError,
    pub code: i32,
}

impl FieldError {
    /// All six axes decoded
    pub const NONE: FieldError = FieldError {
        axis: AxisError::NoError,
        code: 0,
    };
}

/// Signed translation or rotation triple
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisTriple {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One decoded input report.
///
/// Axes at or after the first failing axis hold `0`; axes before it hold their
/// decoded values. The button set is computed independently of the axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Currently asserted button usages, in report order; possibly empty
    pub buttons: Vec<u16>,
    /// Tx, Ty, Tz
    pub translation: AxisTriple,
    /// Rx, Ry, Rz
    pub rotation: AxisTriple,
    /// First failing axis, if any, with its status code
    pub error: FieldError,
}

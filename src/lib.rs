//! Report decoding and event streaming for 6-DoF HID multi-axis controllers
//!
//! This crate discovers a multi-axis controller (a 3D navigation mouse
//! reporting the Generic Desktop "multi-axis controller" usage), decodes its
//! raw input reports into button/translation/rotation events, and exposes
//! those events as a cancellable stream:
//!
//! - [`select_devices`] enumerates HID interfaces and builds a
//!   [`DeviceDescriptor`] per candidate matching a caller predicate.
//! - [`decode_report`] turns one raw report into one [`InputEvent`], using the
//!   device's own report descriptor to locate fields.
//! - [`ControllerSession`] runs the background read/decode loop.
//! - [`observe_controller`] wires it all together and returns an
//!   [`EventStream`].
//!
//! All OS access goes through the [`HidAdapter`] trait. The crate ships a
//! Windows implementation ([`WindowsAdapter`]) built on `hidapi` plus the
//! HIDP descriptor APIs; tests run against a scripted mock.

pub mod controller;
pub mod decoder;
pub mod discovery;
pub mod error;
pub mod session;
pub mod types;

#[cfg(target_os = "windows")]
mod windows;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::{observe_controller, EventStream};
pub use decoder::{decode_report, sign_extend};
pub use discovery::select_devices;
pub use error::HidError;
pub use session::ControllerSession;
pub use types::{
    status, usage, usage_page, AxisError, AxisTriple, DescriptorToken, DeviceAttributes,
    DeviceCaps, DeviceDescriptor, DeviceString, DeviceToken, FieldError, InputEvent, OpenDevice,
    ReportDescriptor, UsageValue,
};

#[cfg(target_os = "windows")]
pub use windows::WindowsAdapter;

/// Enumeration of device interface paths.
///
/// Exhaustion is the benign "no more items" terminal; an `Err` item is an
/// enumeration anomaly, after which the iterator yields nothing further.
/// Dropping the iterator releases the underlying enumeration context.
pub type DevicePaths = Box<dyn Iterator<Item = Result<String, HidError>> + Send>;

/// Boundary to the OS HID subsystem.
///
/// Everything the selector, decoder, and session need from the operating
/// system: interface enumeration, device open/close/read, and the
/// descriptor-driven queries that extract fields from raw reports without a
/// fixed schema. Each operation is independently fallible; recovery policy
/// lives with the callers.
///
/// Handles are opaque tokens. Callers wrap them in [`OpenDevice`] /
/// [`ReportDescriptor`] so every exit path closes or releases them exactly
/// once; releasing a token twice through those wrappers is a no-op.
pub trait HidAdapter: Send + Sync {
    /// List all present HID device interfaces.
    fn enumerate(&self) -> Result<DevicePaths, HidError>;

    /// Open a device by path with shared read+write access (other opens of
    /// the same path must still succeed).
    fn open(&self, path: &str) -> Result<DeviceToken, HidError>;

    /// Close an open device. Unknown tokens are ignored.
    fn close(&self, device: DeviceToken);

    /// Vendor id, product id, and version of an open device.
    fn attributes(&self, device: DeviceToken) -> Result<DeviceAttributes, HidError>;

    /// Manufacturer/product/serial text. Absence is not an error and yields
    /// an empty string.
    fn device_string(&self, device: DeviceToken, which: DeviceString) -> String;

    /// Retrieve preparsed report-descriptor data for an open device. The
    /// returned token stays valid after the device is closed, until
    /// [`release_preparsed_data`](HidAdapter::release_preparsed_data).
    fn preparsed_data(&self, device: DeviceToken) -> Result<DescriptorToken, HidError>;

    /// Free preparsed descriptor data. Unknown tokens are ignored.
    fn release_preparsed_data(&self, descriptor: DescriptorToken);

    /// Top-level usage page/usage and input report length.
    fn capabilities(&self, descriptor: DescriptorToken) -> Result<DeviceCaps, HidError>;

    /// Maximum number of usages an input report can assert on `usage_page`.
    /// Used to size the pressed-button set.
    fn max_usage_list_len(&self, descriptor: DescriptorToken, usage_page: u16) -> usize;

    /// Extract the usages currently asserted on `usage_page` from one raw
    /// input report.
    fn pressed_usages(
        &self,
        descriptor: DescriptorToken,
        usage_page: u16,
        report: &[u8],
    ) -> Result<Vec<u16>, HidError>;

    /// Extract a single scaled usage value from one raw input report. Always
    /// returns a value/status pair; the status distinguishes success,
    /// incompatible report id, and other failures (see [`types::status`]).
    fn usage_value(
        &self,
        descriptor: DescriptorToken,
        usage_page: u16,
        usage: u16,
        report: &[u8],
    ) -> UsageValue;

    /// Read one raw input report into `buf`, blocking up to `timeout_ms`.
    /// Returns the number of bytes read; `Ok(0)` means the timeout elapsed
    /// with no data.
    fn read_report(
        &self,
        device: DeviceToken,
        buf: &mut [u8],
        timeout_ms: i32,
    ) -> Result<usize, HidError>;
}

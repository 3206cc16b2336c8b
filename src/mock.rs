//! Scripted in-memory adapter for tests
//!
//! Stands in for the OS HID subsystem: a configurable device table, a
//! pushable read queue, per-usage value/status overrides, injectable
//! failures, and open/close + acquire/release counters so lifecycle tests
//! can prove handles are released exactly once.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::HidError;
use crate::types::{
    status, usage, usage_page, DescriptorToken, DeviceAttributes, DeviceCaps, DeviceString,
    DeviceToken, UsageValue,
};
use crate::{DevicePaths, HidAdapter};

/// One fake device visible to enumeration.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    pub usage_page: u16,
    pub usage: u16,
    pub input_report_len: usize,
    pub buttons: usize,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
    pub fail_open: bool,
    pub fail_attributes: bool,
    pub fail_preparsed: bool,
    pub fail_caps: bool,
    pub fail_buttons: bool,
}

impl MockDevice {
    /// A plausible 3D mouse: Generic Desktop / multi-axis controller.
    pub fn multi_axis_controller(path: &str) -> Self {
        Self {
            path: path.to_string(),
            vendor_id: 0x046D,
            product_id: 0xC626,
            version: 0x0111,
            usage_page: usage_page::GENERIC_DESKTOP,
            usage: usage::MULTI_AXIS_CONTROLLER,
            input_report_len: 7,
            buttons: 2,
            manufacturer: Some("Acme".to_string()),
            product: Some("Orbit 3D".to_string()),
            serial: Some("SN-1".to_string()),
            fail_open: false,
            fail_attributes: false,
            fail_preparsed: false,
            fail_caps: false,
            fail_buttons: false,
        }
    }
}

/// One scripted outcome of a `read_report` call.
enum ReadStep {
    Report(Vec<u8>),
    Fail(String),
}

/// Point-in-time view of the lifecycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub opens: usize,
    pub closes: usize,
    pub acquires: usize,
    pub releases: usize,
}

#[derive(Default)]
struct Inner {
    devices: Vec<MockDevice>,
    enumeration_error_after: Option<usize>,
    fail_next_open: AtomicBool,

    next_token: AtomicU64,
    open_handles: Mutex<HashMap<u64, usize>>,
    descriptors: Mutex<HashMap<u64, usize>>,
    last_opened: Mutex<Option<String>>,

    reads: Mutex<VecDeque<ReadStep>>,
    values: Mutex<HashMap<u16, UsageValue>>,

    opens: AtomicUsize,
    closes: AtomicUsize,
    acquires: AtomicUsize,
    releases: AtomicUsize,
}

/// Cloneable handle to the shared mock state; every clone observes the same
/// counters and read queue.
#[derive(Clone)]
pub struct MockAdapter {
    inner: Arc<Inner>,
}

impl MockAdapter {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            inner: Arc::new(Inner {
                devices,
                ..Inner::default()
            }),
        }
    }

    /// Make enumeration yield an `Err` item after `n` paths.
    pub fn with_enumeration_error_after(self, n: usize) -> Self {
        let mut inner = Arc::try_unwrap(self.inner)
            .ok()
            .expect("configure the mock before cloning it");
        inner.enumeration_error_after = Some(n);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn into_adapter(self) -> Arc<dyn HidAdapter> {
        Arc::new(self)
    }

    /// Queue one raw report for the next read.
    pub fn push_report(&self, report: Vec<u8>) {
        self.inner.reads.lock().push_back(ReadStep::Report(report));
    }

    /// Queue a read failure.
    pub fn push_read_error(&self, reason: &str) {
        self.inner
            .reads
            .lock()
            .push_back(ReadStep::Fail(reason.to_string()));
    }

    /// Override the value/status returned for one generic-desktop usage.
    pub fn set_usage_value(&self, axis_usage: u16, value: UsageValue) {
        self.inner.values.lock().insert(axis_usage, value);
    }

    /// Fail the next `open` call regardless of device configuration.
    pub fn fail_next_open(&self) {
        self.inner.fail_next_open.store(true, Ordering::SeqCst);
    }

    pub fn last_opened_path(&self) -> Option<String> {
        self.inner.last_opened.lock().clone()
    }

    pub fn counters(&self) -> Counters {
        Counters {
            opens: self.inner.opens.load(Ordering::SeqCst),
            closes: self.inner.closes.load(Ordering::SeqCst),
            acquires: self.inner.acquires.load(Ordering::SeqCst),
            releases: self.inner.releases.load(Ordering::SeqCst),
        }
    }

    fn device_for_handle(&self, token: DeviceToken) -> Option<&MockDevice> {
        let idx = *self.inner.open_handles.lock().get(&token.0)?;
        self.inner.devices.get(idx)
    }

    fn device_for_descriptor(&self, token: DescriptorToken) -> Option<&MockDevice> {
        let idx = *self.inner.descriptors.lock().get(&token.0)?;
        self.inner.devices.get(idx)
    }

    fn mint_token(&self) -> u64 {
        self.inner.next_token.fetch_add(1, Ordering::SeqCst)
    }
}

impl HidAdapter for MockAdapter {
    fn enumerate(&self) -> Result<DevicePaths, HidError> {
        let mut items: Vec<Result<String, HidError>> = self
            .inner
            .devices
            .iter()
            .map(|d| Ok(d.path.clone()))
            .collect();
        if let Some(n) = self.inner.enumeration_error_after {
            items.truncate(n);
            items.push(Err(HidError::Enumeration("mock enumeration fault".into())));
        }
        Ok(Box::new(items.into_iter()))
    }

    fn open(&self, path: &str) -> Result<DeviceToken, HidError> {
        if self.inner.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(HidError::Open {
                path: path.to_string(),
                reason: "injected open failure".into(),
            });
        }
        let idx = self
            .inner
            .devices
            .iter()
            .position(|d| d.path == path)
            .ok_or_else(|| HidError::DeviceNotFound(path.to_string()))?;
        if self.inner.devices[idx].fail_open {
            return Err(HidError::Open {
                path: path.to_string(),
                reason: "configured to fail".into(),
            });
        }
        let token = self.mint_token();
        self.inner.open_handles.lock().insert(token, idx);
        *self.inner.last_opened.lock() = Some(path.to_string());
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceToken(token))
    }

    fn close(&self, device: DeviceToken) {
        if self.inner.open_handles.lock().remove(&device.0).is_some() {
            self.inner.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn attributes(&self, device: DeviceToken) -> Result<DeviceAttributes, HidError> {
        let dev = self
            .device_for_handle(device)
            .ok_or_else(|| HidError::Hid("unknown device token".into()))?;
        if dev.fail_attributes {
            return Err(HidError::Hid("configured to fail attributes".into()));
        }
        Ok(DeviceAttributes {
            vendor_id: dev.vendor_id,
            product_id: dev.product_id,
            version: dev.version,
        })
    }

    fn device_string(&self, device: DeviceToken, which: DeviceString) -> String {
        let Some(dev) = self.device_for_handle(device) else {
            return String::new();
        };
        let s = match which {
            DeviceString::Manufacturer => &dev.manufacturer,
            DeviceString::Product => &dev.product,
            DeviceString::Serial => &dev.serial,
        };
        s.clone().unwrap_or_default()
    }

    fn preparsed_data(&self, device: DeviceToken) -> Result<DescriptorToken, HidError> {
        let idx = *self
            .inner
            .open_handles
            .lock()
            .get(&device.0)
            .ok_or_else(|| HidError::Hid("unknown device token".into()))?;
        if self.inner.devices[idx].fail_preparsed {
            return Err(HidError::Descriptor("configured to fail preparsed".into()));
        }
        let token = self.mint_token();
        self.inner.descriptors.lock().insert(token, idx);
        self.inner.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(DescriptorToken(token))
    }

    fn release_preparsed_data(&self, descriptor: DescriptorToken) {
        if self.inner.descriptors.lock().remove(&descriptor.0).is_some() {
            self.inner.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn capabilities(&self, descriptor: DescriptorToken) -> Result<DeviceCaps, HidError> {
        let dev = self
            .device_for_descriptor(descriptor)
            .ok_or_else(|| HidError::Descriptor("unknown descriptor token".into()))?;
        if dev.fail_caps {
            return Err(HidError::Descriptor("configured to fail caps".into()));
        }
        Ok(DeviceCaps {
            usage_page: dev.usage_page,
            usage: dev.usage,
            input_report_len: dev.input_report_len,
        })
    }

    fn max_usage_list_len(&self, descriptor: DescriptorToken, _usage_page: u16) -> usize {
        self.device_for_descriptor(descriptor)
            .map(|d| d.buttons)
            .unwrap_or(0)
    }

    fn pressed_usages(
        &self,
        descriptor: DescriptorToken,
        _usage_page: u16,
        report: &[u8],
    ) -> Result<Vec<u16>, HidError> {
        let dev = self
            .device_for_descriptor(descriptor)
            .ok_or_else(|| HidError::Descriptor("unknown descriptor token".into()))?;
        if dev.fail_buttons {
            return Err(HidError::Descriptor("configured to fail buttons".into()));
        }
        // Every non-zero report byte is "a pressed button" for test purposes.
        Ok(report
            .iter()
            .filter(|b| **b != 0)
            .map(|b| u16::from(*b))
            .collect())
    }

    fn usage_value(
        &self,
        _descriptor: DescriptorToken,
        _usage_page: u16,
        usage: u16,
        _report: &[u8],
    ) -> UsageValue {
        self.inner
            .values
            .lock()
            .get(&usage)
            .copied()
            .unwrap_or(UsageValue {
                value: 0,
                status: status::SUCCESS,
            })
    }

    fn read_report(
        &self,
        _device: DeviceToken,
        buf: &mut [u8],
        timeout_ms: i32,
    ) -> Result<usize, HidError> {
        let step = self.inner.reads.lock().pop_front();
        match step {
            Some(ReadStep::Report(report)) => {
                buf.fill(0);
                let n = report.len().min(buf.len());
                buf[..n].copy_from_slice(&report[..n]);
                Ok(n)
            }
            Some(ReadStep::Fail(reason)) => Err(HidError::Read(reason)),
            None => {
                // Behave like a quiet device: block for the timeout, then
                // report "no data".
                std::thread::sleep(Duration::from_millis(timeout_ms.max(0) as u64));
                Ok(0)
            }
        }
    }
}

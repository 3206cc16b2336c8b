//! Windows HID adapter
//!
//! `hidapi` handles interface enumeration, opening, strings, and the timed
//! report read; the descriptor-driven queries (capabilities, button usage
//! lists, scaled usage values) go through the Windows HID parser (HIDP) over
//! preparsed data fetched from a short-lived query handle.
//!
//! Handles issued to callers are opaque tokens backed by registries here, so
//! the portable core never touches OS types.

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::debug;

use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidD_FreePreparsedData, HidD_GetPreparsedData, HidP_GetCaps, HidP_GetUsageValue,
    HidP_GetUsages, HidP_Input, HidP_MaxUsageListLength, HIDP_CAPS, HIDP_STATUS_SUCCESS,
    PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::{CloseHandle, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};

use crate::error::HidError;
use crate::types::{
    DescriptorToken, DeviceAttributes, DeviceCaps, DeviceString, DeviceToken, UsageValue,
};
use crate::{DevicePaths, HidAdapter};

struct OpenEntry {
    hid: Mutex<HidDevice>,
    path: String,
}

/// The production [`HidAdapter`] for Windows.
pub struct WindowsAdapter {
    api: Mutex<HidApi>,
    devices: Mutex<HashMap<u64, Arc<OpenEntry>>>,
    descriptors: Mutex<HashMap<u64, PHIDP_PREPARSED_DATA>>,
    next_token: AtomicU64,
}

impl WindowsAdapter {
    pub fn new() -> Result<Self, HidError> {
        Ok(Self {
            api: Mutex::new(HidApi::new()?),
            devices: Mutex::new(HashMap::new()),
            descriptors: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    fn entry(&self, device: DeviceToken) -> Result<Arc<OpenEntry>, HidError> {
        self.devices
            .lock()
            .get(&device.0)
            .cloned()
            .ok_or_else(|| HidError::Hid("unknown device token".into()))
    }

    fn preparsed(&self, descriptor: DescriptorToken) -> Result<PHIDP_PREPARSED_DATA, HidError> {
        self.descriptors
            .lock()
            .get(&descriptor.0)
            .copied()
            .ok_or_else(|| HidError::Descriptor("unknown descriptor token".into()))
    }

    fn mint_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::SeqCst)
    }
}

impl Drop for WindowsAdapter {
    fn drop(&mut self) {
        // Free any preparsed data callers leaked past the adapter's lifetime.
        for (_, ppd) in self.descriptors.lock().drain() {
            unsafe {
                HidD_FreePreparsedData(ppd);
            }
        }
    }
}

fn wide(path: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(path)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

impl HidAdapter for WindowsAdapter {
    fn enumerate(&self) -> Result<DevicePaths, HidError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;

        let mut paths: Vec<String> = Vec::new();
        for info in api.device_list() {
            let path = info.path().to_string_lossy().into_owned();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        debug!("Enumerated {} HID interface path(s)", paths.len());
        Ok(Box::new(paths.into_iter().map(Ok)))
    }

    fn open(&self, path: &str) -> Result<DeviceToken, HidError> {
        let cpath = CString::new(path).map_err(|_| HidError::Open {
            path: path.to_string(),
            reason: "path contains an interior NUL".into(),
        })?;
        // hidapi opens with FILE_SHARE_READ | FILE_SHARE_WRITE, so other
        // handles to the same interface stay usable.
        let hid = self.api.lock().open_path(&cpath)?;

        let token = self.mint_token();
        self.devices.lock().insert(
            token,
            Arc::new(OpenEntry {
                hid: Mutex::new(hid),
                path: path.to_string(),
            }),
        );
        Ok(DeviceToken(token))
    }

    fn close(&self, device: DeviceToken) {
        // Dropping the hidapi device closes the OS handle.
        self.devices.lock().remove(&device.0);
    }

    fn attributes(&self, device: DeviceToken) -> Result<DeviceAttributes, HidError> {
        let entry = self.entry(device)?;
        let info = entry.hid.lock().get_device_info()?;
        Ok(DeviceAttributes {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            version: info.release_number(),
        })
    }

    fn device_string(&self, device: DeviceToken, which: DeviceString) -> String {
        let Ok(entry) = self.entry(device) else {
            return String::new();
        };
        let hid = entry.hid.lock();
        let s = match which {
            DeviceString::Manufacturer => hid.get_manufacturer_string(),
            DeviceString::Product => hid.get_product_string(),
            DeviceString::Serial => hid.get_serial_number_string(),
        };
        s.ok().flatten().unwrap_or_default()
    }

    fn preparsed_data(&self, device: DeviceToken) -> Result<DescriptorToken, HidError> {
        let entry = self.entry(device)?;
        let path = wide(&entry.path);

        // Query-only handle: access 0 is enough for HidD_GetPreparsedData and
        // never conflicts with the read handle.
        let handle = unsafe {
            CreateFileW(
                path.as_ptr(),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                std::ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                std::ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(HidError::Descriptor(format!(
                "failed to open query handle for {}",
                entry.path
            )));
        }

        let mut ppd: PHIDP_PREPARSED_DATA = 0;
        let ok = unsafe { HidD_GetPreparsedData(handle, &mut ppd) };
        unsafe {
            CloseHandle(handle);
        }
        if ok == 0 {
            return Err(HidError::Descriptor(format!(
                "HidD_GetPreparsedData failed for {}",
                entry.path
            )));
        }

        let token = self.mint_token();
        self.descriptors.lock().insert(token, ppd);
        Ok(DescriptorToken(token))
    }

    fn release_preparsed_data(&self, descriptor: DescriptorToken) {
        if let Some(ppd) = self.descriptors.lock().remove(&descriptor.0) {
            unsafe {
                HidD_FreePreparsedData(ppd);
            }
        }
    }

    fn capabilities(&self, descriptor: DescriptorToken) -> Result<DeviceCaps, HidError> {
        let ppd = self.preparsed(descriptor)?;
        let mut caps: HIDP_CAPS = unsafe { std::mem::zeroed() };
        let status = unsafe { HidP_GetCaps(ppd, &mut caps) };
        if status != HIDP_STATUS_SUCCESS {
            return Err(HidError::Descriptor(format!(
                "HidP_GetCaps failed: 0x{:08X}",
                status as u32
            )));
        }
        Ok(DeviceCaps {
            usage_page: caps.UsagePage,
            usage: caps.Usage,
            input_report_len: caps.InputReportByteLength as usize,
        })
    }

    fn max_usage_list_len(&self, descriptor: DescriptorToken, usage_page: u16) -> usize {
        let Ok(ppd) = self.preparsed(descriptor) else {
            return 0;
        };
        unsafe { HidP_MaxUsageListLength(HidP_Input, usage_page, ppd) as usize }
    }

    fn pressed_usages(
        &self,
        descriptor: DescriptorToken,
        usage_page: u16,
        report: &[u8],
    ) -> Result<Vec<u16>, HidError> {
        let ppd = self.preparsed(descriptor)?;
        let capacity = unsafe { HidP_MaxUsageListLength(HidP_Input, usage_page, ppd) };
        let mut usages = vec![0u16; capacity as usize];
        let mut len = capacity;

        let status = unsafe {
            HidP_GetUsages(
                HidP_Input,
                usage_page,
                0,
                usages.as_mut_ptr(),
                &mut len,
                ppd,
                report.as_ptr() as *mut u8,
                report.len() as u32,
            )
        };
        if status != HIDP_STATUS_SUCCESS {
            return Err(HidError::Descriptor(format!(
                "HidP_GetUsages failed: 0x{:08X}",
                status as u32
            )));
        }
        usages.truncate(len as usize);
        Ok(usages)
    }

    fn usage_value(
        &self,
        descriptor: DescriptorToken,
        usage_page: u16,
        usage: u16,
        report: &[u8],
    ) -> UsageValue {
        let Ok(ppd) = self.preparsed(descriptor) else {
            return UsageValue {
                value: 0,
                status: -1,
            };
        };
        let mut raw: u32 = 0;
        let status = unsafe {
            HidP_GetUsageValue(
                HidP_Input,
                usage_page,
                0,
                usage,
                &mut raw,
                ppd,
                report.as_ptr() as *mut u8,
                report.len() as u32,
            )
        };
        UsageValue {
            value: raw as i32,
            status,
        }
    }

    fn read_report(
        &self,
        device: DeviceToken,
        buf: &mut [u8],
        timeout_ms: i32,
    ) -> Result<usize, HidError> {
        let entry = self.entry(device)?;
        let hid = entry.hid.lock();
        hid.read_timeout(buf, timeout_ms)
            .map_err(|e| HidError::Read(e.to_string()))
    }
}

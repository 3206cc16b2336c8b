//! Error types for device access and decoding

use thiserror::Error;

/// Errors that can occur while enumerating, opening, or reading devices
#[derive(Error, Debug)]
pub enum HidError {
    #[error("Enumeration failed: {0}")]
    Enumeration(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open device {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Descriptor query failed: {0}")]
    Descriptor(String),

    #[error("Read failed: {0}")]
    Read(String),

    // HID-specific errors
    #[error("HID error: {0}")]
    Hid(String),

    #[error("HID permission denied: {0}")]
    PermissionDenied(String),
}

impl From<hidapi::HidError> for HidError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            HidError::PermissionDenied(msg)
        } else {
            HidError::Hid(msg)
        }
    }
}

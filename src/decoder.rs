//! Report decoding
//!
//! Turns one raw input report into one [`InputEvent`] using the device's
//! preparsed report descriptor. The report layout is vendor-defined and
//! self-describing, so every field is located through the adapter's
//! usage-list / usage-value queries rather than fixed offsets.

use tracing::warn;

use crate::types::{
    status, usage, usage_page, AxisError, AxisTriple, DeviceDescriptor, FieldError, InputEvent,
};
use crate::HidAdapter;

/// Axis decode order; fixed so that a short-circuit zeroes a well-defined
/// suffix of the sequence.
const AXIS_SEQUENCE: [(AxisError, u16); 6] = [
    (AxisError::Tx, usage::X),
    (AxisError::Ty, usage::Y),
    (AxisError::Tz, usage::Z),
    (AxisError::Rx, usage::RX),
    (AxisError::Ry, usage::RY),
    (AxisError::Rz, usage::RZ),
];

/// Reinterpret an unsigned 16-bit magnitude as a signed displacement.
///
/// Scaled-usage queries return the field as an unsigned quantity even for
/// signed axes; a set bit 15 marks a two's-complement negative.
pub fn sign_extend(value: i32) -> i32 {
    const SIGN: i32 = 0x8000;
    if value & SIGN == SIGN {
        (SIGN ^ value) - SIGN
    } else {
        value
    }
}

/// Decode one raw report into an event.
///
/// Buttons are extracted first and independently: a failing usage-list query
/// yields an empty button set, never an event-level error. Axes are decoded
/// in [`AXIS_SEQUENCE`] order; "success" and "incompatible report id" both
/// count as a present value (devices multiplex axis subsets across report
/// ids). The first axis with any other status stops axis decoding: the event
/// carries that axis and status code, and that axis plus all later ones
/// hold `0`.
pub fn decode_report(
    adapter: &dyn HidAdapter,
    device: &DeviceDescriptor,
    report: &[u8],
) -> InputEvent {
    let buttons = adapter
        .pressed_usages(device.descriptor.token(), usage_page::BUTTON, report)
        .unwrap_or_default();

    let mut axes = [0i32; 6];
    let mut error = FieldError::NONE;

    for (slot, (axis, axis_usage)) in AXIS_SEQUENCE.iter().enumerate() {
        let result = adapter.usage_value(
            device.descriptor.token(),
            usage_page::GENERIC_DESKTOP,
            *axis_usage,
            report,
        );
        match result.status {
            status::SUCCESS | status::INCOMPATIBLE_REPORT_ID => {
                axes[slot] = sign_extend(result.value);
            }
            code => {
                warn!(
                    "Failed to get usage 0x{axis_usage:02X}: status 0x{:08X}",
                    code as u32
                );
                error = FieldError { axis: *axis, code };
                break;
            }
        }
    }

    InputEvent {
        buttons,
        translation: AxisTriple {
            x: axes[0],
            y: axes[1],
            z: axes[2],
        },
        rotation: AxisTriple {
            x: axes[3],
            y: axes[4],
            z: axes[5],
        },
        error,
    }
}

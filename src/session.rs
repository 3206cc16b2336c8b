//! Controller session: the background read/decode loop
//!
//! One session owns one device. A dedicated reader thread opens the device,
//! reads raw reports, decodes them, and broadcasts the events; the consumer
//! side only sees the broadcast channel and a cancellation flag. The thread
//! owns both the open device and the descriptor, so each is released exactly
//! once when the loop exits, whichever way it exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::decoder::decode_report;
use crate::types::{DeviceDescriptor, InputEvent, OpenDevice};
use crate::HidAdapter;

/// Broadcast channel capacity for decoded events
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Read timeout. Bounds how long a cancellation request can go unobserved
/// while the read is blocked waiting for data.
const READ_TIMEOUT_MS: i32 = 5;

/// How long teardown waits for the reader thread before giving up on it
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A running read/decode loop bound to one device.
///
/// Dropping the session cancels it. Subscribers receive events from the
/// subscription point onward; nothing is replayed.
pub struct ControllerSession {
    /// Kept only so new receivers can be minted; never read from.
    events: broadcast::Receiver<InputEvent>,
    shutdown: Arc<AtomicBool>,
    exited: Mutex<Option<mpsc::Receiver<()>>>,
    reader: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ControllerSession {
    /// Take ownership of `device` and start reading from it.
    ///
    /// The open happens on the reader thread; if it fails, the stream ends
    /// with zero events delivered.
    pub fn start(adapter: Arc<dyn HidAdapter>, device: DeviceDescriptor) -> Self {
        let (tx, events) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = mpsc::channel();

        let flag = Arc::clone(&shutdown);
        let reader = std::thread::Builder::new()
            .name("controller-read".into())
            .spawn(move || {
                run_read_loop(adapter, device, tx, flag);
                let _ = exit_tx.send(());
            })
            .expect("Failed to spawn controller read thread");

        Self {
            events,
            shutdown,
            exited: Mutex::new(Some(exit_rx)),
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Subscribe to decoded events, starting from now.
    pub fn subscribe(&self) -> broadcast::Receiver<InputEvent> {
        self.events.resubscribe()
    }

    /// Request cancellation and wait (bounded) for the read loop to exit.
    ///
    /// Idempotent: cancelling an already-cancelled session is a no-op. If the
    /// loop does not exit within [`TEARDOWN_TIMEOUT`] the thread is left to
    /// finish on its own; it releases the device and descriptor whenever its
    /// blocked read returns.
    pub fn cancel(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let Some(exited) = self.exited.lock().take() else {
            return;
        };
        match exited.recv_timeout(TEARDOWN_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(reader) = self.reader.lock().take() {
                    let _ = reader.join();
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    "Controller read loop did not exit within {:?}; detaching",
                    TEARDOWN_TIMEOUT
                );
            }
        }
    }
}

impl Drop for ControllerSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Body of the reader thread.
///
/// Owns the descriptor and (once opened) the device handle; both drop at the
/// end of this function on every path. Dropping the sender is what ends the
/// event stream for all subscribers.
fn run_read_loop(
    adapter: Arc<dyn HidAdapter>,
    device: DeviceDescriptor,
    events: broadcast::Sender<InputEvent>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Read loop starting for {device}");

    let handle = match adapter.open(&device.path) {
        Ok(token) => OpenDevice::new(Arc::clone(&adapter), token),
        Err(e) => {
            warn!("Failed to open device {}: {e}", device.path);
            return;
        }
    };

    let mut report = vec![0u8; device.input_report_len];

    while !shutdown.load(Ordering::Relaxed) {
        match adapter.read_report(handle.token(), &mut report, READ_TIMEOUT_MS) {
            Ok(len) if len > 0 => {
                let event = decode_report(adapter.as_ref(), &device, &report);
                // No subscribers is fine; the device keeps streaming.
                let _ = events.send(event);
            }
            Ok(_) => {
                // Timeout with no data; loop to re-check the shutdown flag.
            }
            Err(e) => {
                warn!("Read failed for {}: {e}", device.path);
                break;
            }
        }
    }

    debug!("Read loop exiting for {}", device.path);
}

//! Top-level wiring: find a multi-axis controller and stream its events

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::discovery::select_devices;
use crate::session::ControllerSession;
use crate::types::{DeviceDescriptor, InputEvent};
use crate::HidAdapter;

/// Consumer end of a controller session.
///
/// A finite, non-restartable sequence of decoded events:
/// [`recv`](EventStream::recv) yields `None` once the underlying session
/// ends, whether through cancellation, a read failure, or no device having
/// matched in the first place. Dropping the stream cancels the session.
pub struct EventStream {
    events: broadcast::Receiver<InputEvent>,
    session: Option<ControllerSession>,
}

impl EventStream {
    /// Receive the next event, or `None` when the stream has ended.
    ///
    /// A consumer that falls behind the channel capacity skips ahead to the
    /// oldest retained event (logged); events are never reordered.
    pub async fn recv(&mut self) -> Option<InputEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event receiver lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// End the session behind this stream. Idempotent; `recv` drains nothing
    /// further once the channel reports closed.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel();
        }
    }

    /// A stream that is over before it starts.
    fn closed() -> Self {
        let (tx, events) = broadcast::channel(1);
        drop(tx);
        Self {
            events,
            session: None,
        }
    }
}

/// Find the first Generic Desktop multi-axis controller and stream its
/// decoded input.
///
/// Selection is first-match: with several qualifying devices attached the
/// choice follows enumeration order. With none, the returned stream completes
/// immediately with zero events.
pub fn observe_controller(adapter: Arc<dyn HidAdapter>) -> EventStream {
    let mut devices = select_devices(&adapter, DeviceDescriptor::is_multi_axis_controller);

    if devices.is_empty() {
        info!("No multi-axis controller found");
        return EventStream::closed();
    }

    let device = devices.remove(0);
    info!("Using {}, {}", device.product, device.manufacturer);
    drop(devices); // surplus matches release their descriptors here

    let session = ControllerSession::start(adapter, device);
    let events = session.subscribe();
    EventStream {
        events,
        session: Some(session),
    }
}

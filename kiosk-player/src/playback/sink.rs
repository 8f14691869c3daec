//! Broadcast sink contract

use kiosk_common::events::DisplayEvent;

/// Notifies every connected display client
///
/// Fire-and-forget: no acknowledgment, no backpressure and no error.
/// Clients connecting after an emit simply miss that event.
pub trait BroadcastSink: Send + Sync {
    fn emit(&self, event: DisplayEvent);
}

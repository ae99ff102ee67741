//! Event sinks for resource change notifications.

use dpm_core::events::{EventSink, ResourceEvent};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Fans events out to any number of subscribers over a tokio broadcast
/// channel. Slow subscribers lose the oldest events.
#[derive(Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<ResourceEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: ResourceEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!(?event, "No event subscribers");
        }
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn publish(&self, event: ResourceEvent) {
        info!(?event, "Resource event");
    }
}

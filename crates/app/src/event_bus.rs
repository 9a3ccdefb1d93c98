//! In-process outcome bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use whatsend_domain::event::AutomationEvent;

use crate::ports::EventPublisher;

/// Fans automation events out to every live subscriber.
///
/// Publishing never fails; with no subscribers the event is dropped.
#[derive(Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<AutomationEvent>,
}

impl InProcessEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: AutomationEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("automation event dropped, no subscribers");
        }
    }
}

//! Event bus port: publish automation events to whoever listens.

use whatsend_domain::event::AutomationEvent;

/// Publishes automation events to interested subscribers.
///
/// Publishing is synchronous and infallible from the engine's point of view:
/// an event nobody hears is simply dropped.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: AutomationEvent);
}

impl<T: EventPublisher> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: AutomationEvent) {
        (**self).publish(event);
    }
}

//! Capability bridge: the three operations the calling app can invoke.

use whatsend_domain::error::AutomationError;

use crate::ports::{AccessibilitySettings, MessageDispatcher};

/// Errors the bridge surfaces to the caller as tagged failures.
///
/// Every other failure degrades to a `false` result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Accessibility service not enabled")]
    NotEnabled,

    #[error("Another message is already being sent")]
    Busy,
}

impl BridgeError {
    /// Wire tag for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotEnabled => "NOT_ENABLED",
            Self::Busy => "BUSY",
        }
    }
}

/// Permission checks plus send forwarding.
pub struct BridgeService<S, D> {
    settings: S,
    dispatcher: D,
    service_component: String,
}

impl<S, D> BridgeService<S, D>
where
    S: AccessibilitySettings,
    D: MessageDispatcher,
{
    /// `service_component` is the `package/class` identifier the platform
    /// lists once the automation service is enabled.
    pub fn new(settings: S, dispatcher: D, service_component: impl Into<String>) -> Self {
        Self {
            settings,
            dispatcher,
            service_component: service_component.into(),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Whether the platform lists our service among the enabled ones.
    #[must_use]
    pub fn is_automation_enabled(&self) -> bool {
        self.settings
            .enabled_services()
            .is_some_and(|services| services.contains(&self.service_component))
    }

    /// Ask the platform to open its automation settings. Always reports
    /// success.
    #[tracing::instrument(skip(self))]
    pub fn open_automation_settings(&self) -> bool {
        if let Err(err) = self.settings.open_accessibility_settings() {
            tracing::warn!(%err, "failed to open accessibility settings");
        }
        true
    }

    /// Forward a send request to the automation engine.
    ///
    /// `Ok(true)` means only that the target app launch was requested (or
    /// the request queued); the actual outcome arrives as automation events.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotEnabled`] when the automation permission is
    /// absent and [`BridgeError::Busy`] when the engine refuses an
    /// overlapping request.
    #[tracing::instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn send_message(&self, phone: String, message: String) -> Result<bool, BridgeError> {
        if !self.is_automation_enabled() {
            tracing::warn!("send refused, automation permission absent");
            return Err(BridgeError::NotEnabled);
        }

        match self.dispatcher.send_message(phone, message).await {
            Ok(submission) => {
                tracing::debug!(?submission, "send accepted");
                Ok(true)
            }
            Err(AutomationError::Busy) => Err(BridgeError::Busy),
            Err(err) => {
                tracing::warn!(%err, "send could not be started");
                Ok(false)
            }
        }
    }
}

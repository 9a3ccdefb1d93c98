//! Accessibility settings port: permission lookup and the settings screen.

use whatsend_domain::error::HostError;

/// Platform settings the bridge consults.
pub trait AccessibilitySettings {
    /// Raw, colon-separated list of enabled accessibility services, or
    /// `None` when the platform has never stored one.
    fn enabled_services(&self) -> Option<String>;

    /// Ask the platform to show its accessibility settings screen.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the screen cannot be opened.
    fn open_accessibility_settings(&self) -> Result<(), HostError>;
}

impl<T: AccessibilitySettings> AccessibilitySettings for std::sync::Arc<T> {
    fn enabled_services(&self) -> Option<String> {
        (**self).enabled_services()
    }

    fn open_accessibility_settings(&self) -> Result<(), HostError> {
        (**self).open_accessibility_settings()
    }
}
